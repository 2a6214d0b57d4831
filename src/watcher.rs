use crate::config::SUPPORTED_EXTENSIONS;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc as tokio_mpsc;

/// A typed, debounced filesystem change, already filtered to the supported
/// extension set.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

/// Wraps an OS-native filesystem notification facility (`notify`) and
/// exposes one debounced event stream across every currently-watched root.
/// Reconfiguring which roots are watched does not tear down the underlying
/// watcher; it only changes the set of watched paths.
pub struct ChangeWatcher {
    inner: Arc<Mutex<RecommendedWatcher>>,
    watched_roots: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ChangeWatcher {
    /// Starts watching `roots` and returns the watcher handle plus a channel
    /// of debounced, typed events. `debounce` is the per-path quiescence
    /// window for `modified` events (500 ms by default).
    pub fn start(
        roots: Vec<PathBuf>,
        debounce: Duration,
    ) -> notify::Result<(Self, tokio_mpsc::UnboundedReceiver<WatchEvent>)> {
        let (raw_tx, raw_rx) = std_mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = raw_tx.send(event);
            }
        })?;

        let watched_roots = Arc::new(Mutex::new(HashSet::new()));
        for root in &roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
            watched_roots.lock().unwrap().insert(root.clone());
        }

        let (out_tx, out_rx) = tokio_mpsc::unbounded_channel();
        std::thread::spawn(move || debounce_loop(raw_rx, out_tx, debounce));

        Ok((Self { inner: Arc::new(Mutex::new(watcher)), watched_roots }, out_rx))
    }

    pub fn add_root(&self, root: &Path) -> notify::Result<()> {
        let mut guard = self.watched_roots.lock().unwrap();
        if guard.contains(root) {
            return Ok(());
        }
        self.inner.lock().unwrap().watch(root, RecursiveMode::Recursive)?;
        guard.insert(root.to_path_buf());
        Ok(())
    }

    pub fn remove_root(&self, root: &Path) -> notify::Result<()> {
        let mut guard = self.watched_roots.lock().unwrap();
        if !guard.remove(root) {
            return Ok(());
        }
        self.inner.lock().unwrap().unwatch(root)
    }
}

fn is_supported_path(path: &Path) -> bool {
    let Some(leaf) = path.file_name().and_then(|n| n.to_str()) else { return false };
    if leaf.starts_with('.') || leaf.starts_with("~$") {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Accumulates raw `notify` events and flushes one typed event per path
/// after `debounce` has elapsed since its last activity, matching §4.5's
/// "debounced by 500 ms per path" rule. Runs on its own thread so the
/// watcher callback never blocks on channel backpressure.
fn debounce_loop(
    raw_rx: std_mpsc::Receiver<notify::Event>,
    out_tx: tokio_mpsc::UnboundedSender<WatchEvent>,
    debounce: Duration,
) {
    let mut pending: HashMap<PathBuf, (WatchEvent, Instant)> = HashMap::new();

    loop {
        match raw_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => accumulate(event, &mut pending),
            Err(std_mpsc::RecvTimeoutError::Timeout) => {}
            Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        let ready: Vec<PathBuf> = pending
            .iter()
            .filter(|(_, (_, since))| now.duration_since(*since) >= debounce)
            .map(|(path, _)| path.clone())
            .collect();

        for path in ready {
            if let Some((event, _)) = pending.remove(&path) {
                if out_tx.send(event).is_err() {
                    return;
                }
            }
        }
    }
}

fn accumulate(event: notify::Event, pending: &mut HashMap<PathBuf, (WatchEvent, Instant)>) {
    let now = Instant::now();
    match event.kind {
        EventKind::Create(_) => {
            for path in event.paths {
                if is_supported_path(&path) {
                    pending.insert(path.clone(), (WatchEvent::Created(path), now));
                }
            }
        }
        EventKind::Remove(_) => {
            for path in event.paths {
                if is_supported_path(&path) {
                    pending.insert(path.clone(), (WatchEvent::Removed(path), now));
                }
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            let from = event.paths[0].clone();
            let to = event.paths[1].clone();
            if is_supported_path(&from) {
                pending.insert(from.clone(), (WatchEvent::Removed(from), now));
            }
            if is_supported_path(&to) {
                pending.insert(to.clone(), (WatchEvent::Created(to), now));
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            for path in event.paths {
                if is_supported_path(&path) {
                    pending.insert(path.clone(), (WatchEvent::Removed(path), now));
                }
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            for path in event.paths {
                if is_supported_path(&path) {
                    pending.insert(path.clone(), (WatchEvent::Created(path), now));
                }
            }
        }
        EventKind::Modify(_) => {
            for path in event.paths {
                if is_supported_path(&path) {
                    pending.insert(path.clone(), (WatchEvent::Modified(path), now));
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_path_filters_hidden_and_lockfiles() {
        assert!(is_supported_path(Path::new("/root/a.txt")));
        assert!(!is_supported_path(Path::new("/root/.secret.txt")));
        assert!(!is_supported_path(Path::new("/root/~$open.docx")));
        assert!(!is_supported_path(Path::new("/root/a.exe")));
    }

    #[test]
    fn rename_both_translates_to_remove_then_create() {
        let mut pending = HashMap::new();
        let event = notify::Event {
            kind: EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            paths: vec![PathBuf::from("/root/old.txt"), PathBuf::from("/root/new.txt")],
            attrs: Default::default(),
        };
        accumulate(event, &mut pending);
        assert!(matches!(pending.get(Path::new("/root/old.txt")), Some((WatchEvent::Removed(_), _))));
        assert!(matches!(pending.get(Path::new("/root/new.txt")), Some((WatchEvent::Created(_), _))));
    }
}

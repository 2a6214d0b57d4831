use crate::config::SUPPORTED_EXTENSIONS;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Enumerates candidate files under one root, honoring the exclusion set and
/// the closed supported-extension list. Never opens file bodies.
pub struct Walker<'a> {
    exclusions: &'a HashSet<PathBuf>,
}

impl<'a> Walker<'a> {
    pub fn new(exclusions: &'a HashSet<PathBuf>) -> Self {
        Self { exclusions }
    }

    pub fn walk(&self, root: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.walk_into(root, &mut out, &mut seen);
        out
    }

    fn walk_into(&self, dir: &Path, out: &mut Vec<PathBuf>, seen: &mut HashSet<PathBuf>) {
        if self.is_effectively_excluded(dir) {
            return;
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("walker: skipping subtree {} ({e})", dir.display());
                return;
            }
        };

        // Deterministic order keeps discovery order stable across platforms,
        // which §5's ordering guarantee for progress events depends on.
        let mut children: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        children.sort();

        for path in children {
            let Some(leaf) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if leaf.starts_with('.') || leaf.starts_with("~$") {
                continue;
            }

            let metadata = match fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    log::warn!("walker: skipping {} ({e})", path.display());
                    continue;
                }
            };

            if metadata.is_symlink() {
                // Never follow symlinks: avoids cycles and surprise traversal.
                continue;
            }

            if metadata.is_dir() {
                self.walk_into(&path, out, seen);
            } else if metadata.is_file() {
                if metadata.len() == 0 {
                    continue;
                }
                let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                    continue;
                };
                let ext_lower = ext.to_ascii_lowercase();
                if !SUPPORTED_EXTENSIONS.contains(&ext_lower.as_str()) {
                    continue;
                }
                if seen.insert(path.clone()) {
                    out.push(path);
                }
            }
        }
    }

    fn is_effectively_excluded(&self, dir: &Path) -> bool {
        self.exclusions.iter().any(|excluded| dir.starts_with(excluded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn touch(path: &Path, content: &[u8]) {
        let mut f = File::create(path).unwrap();
        f.write_all(content).unwrap();
    }

    #[test]
    fn skips_hidden_lockfiles_and_zero_byte_files() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("empty.txt"), b"");
        touch(&dir.path().join(".secret.txt"), b"hidden");
        touch(&dir.path().join("~$open.docx"), b"lockfile");
        touch(&dir.path().join("real.txt"), b"hello world");

        let exclusions = HashSet::new();
        let walker = Walker::new(&exclusions);
        let found = walker.walk(dir.path());

        assert_eq!(found, vec![dir.path().join("real.txt")]);
    }

    #[test]
    fn honors_exclusion_set() {
        let dir = tempdir().unwrap();
        let drafts = dir.path().join("drafts");
        fs::create_dir(&drafts).unwrap();
        touch(&drafts.join("draft.txt"), b"secret draft");
        touch(&dir.path().join("public.txt"), b"public content");

        let mut exclusions = HashSet::new();
        exclusions.insert(drafts.clone());
        let walker = Walker::new(&exclusions);
        let found = walker.walk(dir.path());

        assert_eq!(found, vec![dir.path().join("public.txt")]);
    }

    #[test]
    fn ignores_unsupported_extensions() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("notes.txt"), b"content");
        touch(&dir.path().join("binary.exe"), b"content");

        let exclusions = HashSet::new();
        let walker = Walker::new(&exclusions);
        let found = walker.walk(dir.path());

        assert_eq!(found, vec![dir.path().join("notes.txt")]);
    }
}

use docscout::events::EngineEvent;
use docscout::model::SearchFilters;
use docscout::{Engine, EngineConfig};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

fn open_engine(state_dir: &Path) -> Engine {
    Engine::open(state_dir, EngineConfig::default()).unwrap()
}

#[tokio::test]
async fn scenario_exclusion_hides_and_restores_documents() {
    let work = tempdir().unwrap();
    let state = tempdir().unwrap();
    let drafts = work.path().join("drafts");
    fs::create_dir(&drafts).unwrap();
    fs::write(drafts.join("draft.txt"), "confidential plan").unwrap();
    fs::write(work.path().join("public.txt"), "public announcement").unwrap();

    let engine = open_engine(state.path());
    engine.add_folders(vec![work.path().to_path_buf()]).unwrap();

    let hits = engine.search_index("confidential", &SearchFilters::default()).unwrap();
    assert_eq!(hits.len(), 1);

    engine.add_excluded_folder(&drafts).unwrap();
    let hits = engine.search_index("confidential", &SearchFilters::default()).unwrap();
    assert!(hits.is_empty(), "excluded folder's documents must not surface in search");

    let all_files = engine.get_all_files();
    assert!(all_files.iter().all(|f| !f.path.starts_with(&drafts)));

    engine.remove_excluded_folder(&drafts).unwrap();
    let hits = engine.search_index("confidential", &SearchFilters::default()).unwrap();
    assert_eq!(hits.len(), 1, "un-excluding must restore the document");
}

#[tokio::test]
async fn scenario_pdf_deferral_lets_light_formats_search_immediately() {
    let work = tempdir().unwrap();
    let state = tempdir().unwrap();
    fs::write(work.path().join("a.txt"), "hello world from text").unwrap();
    fs::write(work.path().join("big.pdf"), b"%PDF-1.4 not a real pdf body").unwrap();

    let engine = open_engine(state.path());
    let mut events = engine.subscribe();

    engine.add_folders(vec![work.path().to_path_buf()]).unwrap();

    // The plaintext file must already be searchable before the PDF queue drains.
    let hits = engine.search_index("hello", &SearchFilters::default()).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "a.txt");

    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await.unwrap() {
                EngineEvent::PdfComplete { .. } => break true,
                _ => continue,
            }
        }
    })
    .await
    .unwrap_or(false);
    assert!(drained, "expected a pdf-complete event within the timeout");
}

#[tokio::test]
async fn scenario_watch_driven_update_reindexes_within_time_bounds() {
    let work = tempdir().unwrap();
    let state = tempdir().unwrap();
    fs::write(work.path().join("a.txt"), "original content").unwrap();

    let engine = open_engine(state.path());
    engine.add_folders(vec![work.path().to_path_buf()]).unwrap();

    let mut events = engine.subscribe();
    engine.start_watching().await.unwrap();

    // Give the watcher a moment to register before mutating.
    tokio::time::sleep(Duration::from_millis(200)).await;
    fs::write(work.path().join("a.txt"), "original content plus omega").unwrap();

    let changed = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            if let EngineEvent::FileChanged { .. } = events.recv().await.unwrap() {
                break;
            }
        }
    })
    .await;
    assert!(changed.is_ok(), "expected a file-changed event within the time bound");

    // Give the debounced re-index a moment to land before searching.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let hits = engine.search_index("omega", &SearchFilters::default()).unwrap();
    assert_eq!(hits.len(), 1);

    engine.stop_watching().await.unwrap();
}

#[tokio::test]
async fn scenario_zero_byte_and_hidden_files_index_nothing() {
    let work = tempdir().unwrap();
    let state = tempdir().unwrap();
    fs::write(work.path().join("empty.txt"), b"").unwrap();
    fs::write(work.path().join(".secret.txt"), b"hidden content").unwrap();
    fs::write(work.path().join("~$open.docx"), b"lockfile placeholder").unwrap();

    let engine = open_engine(state.path());
    let summary = engine.add_folders(vec![work.path().to_path_buf()]).unwrap();

    assert_eq!(summary[0].file_count, 0);
    assert!(engine.get_all_files().is_empty());
}

#[tokio::test]
async fn scenario_small_tree_and_boolean_query() {
    let work = tempdir().unwrap();
    let state = tempdir().unwrap();
    fs::write(work.path().join("a.txt"), "hello world").unwrap();
    fs::write(work.path().join("b.md"), "hello friends").unwrap();

    let engine = open_engine(state.path());
    engine.add_folders(vec![work.path().to_path_buf()]).unwrap();

    let mut names: Vec<_> =
        engine.search_index("hello", &SearchFilters::default()).unwrap().into_iter().map(|h| h.name).collect();
    names.sort();
    assert_eq!(names, vec!["a.txt".to_string(), "b.md".to_string()]);

    let and_hits = engine.search_index("hello AND world", &SearchFilters::default()).unwrap();
    assert_eq!(and_hits.len(), 1);
    assert_eq!(and_hits[0].name, "a.txt");
}

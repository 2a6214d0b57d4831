/// Tunables for one engine instance. The engine never reads environment
/// variables or config files itself; the caller builds this and passes it to
/// `Engine::open` so the library stays embeddable without ambient state.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bounded concurrency of the background PDF extraction pool.
    pub pdf_queue_concurrency: usize,
    /// Below this many trimmed characters, a PDF is classified image-only.
    pub pdf_image_only_threshold: usize,
    /// Window radius (characters) on each side of a snippet match.
    pub snippet_radius: usize,
    /// Max snippets returned per hit.
    pub snippet_max_count: usize,
    /// Max matches considered per term when generating snippets.
    pub snippet_per_term_cap: usize,
    /// Max search-history entries retained.
    pub search_history_cap: usize,
    /// Debounce window for per-path `modified` filesystem events.
    pub watch_debounce: std::time::Duration,
    /// Default `search_index` result limit when the caller doesn't specify one.
    pub default_search_limit: usize,
    /// How long shutdown waits for the background queue to drain.
    pub shutdown_drain_timeout: std::time::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pdf_queue_concurrency: 2,
            pdf_image_only_threshold: 20,
            snippet_radius: 60,
            snippet_max_count: 5,
            snippet_per_term_cap: 5,
            search_history_cap: 50,
            watch_debounce: std::time::Duration::from_millis(500),
            default_search_limit: 100,
            shutdown_drain_timeout: std::time::Duration::from_secs(2),
        }
    }
}

/// The closed, case-insensitively-compared set of extensions the Walker and
/// Extractor Registry agree on.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["docx", "pptx", "xlsx", "pdf", "txt", "md"];

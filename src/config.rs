use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Knobs shared by the extraction and retrieval stages.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Bound on each probe, fetch and browser navigation.
    pub timeout: Duration,
    pub preflight_timeout: Duration,
    /// Reachability probe run once before retrieval. `None` skips it.
    pub preflight_url: Option<String>,
    /// Direct-fetch pool size.
    pub http_workers: usize,
    /// Render pool size. Kept narrower than `http_workers`, each render owns a browser.
    pub render_workers: usize,
    /// Pause after scrolling so lazily loaded content can land.
    pub scroll_settle: Duration,
    pub user_agent: String,
    pub source_name: String,
    pub all_links_name: String,
    pub dedup_name: String,
    pub manifest_name: String,
    pub files_dir_name: String,
    pub pages_dir_name: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            preflight_timeout: Duration::from_secs(3),
            preflight_url: Some("https://www.google.com".to_string()),
            http_workers: 32,
            render_workers: 20,
            scroll_settle: Duration::from_secs(2),
            user_agent: USER_AGENT.to_string(),
            source_name: "original sources.txt".to_string(),
            all_links_name: "dictionary1.json".to_string(),
            dedup_name: "deduplicated.json".to_string(),
            manifest_name: "fetch_manifest.json".to_string(),
            files_dir_name: "files".to_string(),
            pages_dir_name: "web pages".to_string(),
        }
    }
}

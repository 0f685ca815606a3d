use clap::Args;
use std::time::Duration;

#[derive(Debug, Clone, Args)]
pub struct CrawlerConfig {
    /// Maximum number of link hops from the homepage
    #[arg(long, default_value_t = 3)]
    pub max_depth: u32,

    /// Maximum number of fetches per plant
    #[arg(long, default_value_t = 100)]
    pub max_pages: usize,

    /// Fetches in flight per plant
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Plants crawled at the same time
    #[arg(long, default_value_t = 8)]
    pub plant_workers: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 15)]
    pub timeout_secs: u64,

    /// HTML pages larger than this are skipped
    #[arg(long, default_value_t = 5 * 1024 * 1024)]
    pub max_page_bytes: usize,

    /// PDFs larger than this are skipped
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    pub max_pdf_bytes: usize,

    #[arg(long, default_value = "Mozilla/5.0 (compatible; plant-cert-crawler/0.1)")]
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        CrawlerConfig {
            max_depth: 3,
            max_pages: 100,
            concurrency: 4,
            plant_workers: 8,
            timeout_secs: 15,
            max_page_bytes: 5 * 1024 * 1024,
            max_pdf_bytes: 10 * 1024 * 1024,
            user_agent: "Mozilla/5.0 (compatible; plant-cert-crawler/0.1)".to_string(),
        }
    }
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Grantha";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-visible application data directory: ~/Grantha/ on all platforms.
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME)
}

/// Default location of the knowledge-base file.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("grantha.db")
}

pub fn default_log_filter() -> &'static str {
    "info,grantha=debug"
}

/// Pipeline tunables. Defaults reproduce the standard extraction and
/// correction behavior; everything here is configuration, not policy.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Candidates below this confidence are discarded at extraction time.
    pub min_confidence: f32,
    /// Rules per LLM correction batch.
    pub batch_size: usize,
    /// Per-batch generation timeout.
    pub llm_timeout_secs: u64,
    pub ollama_base_url: String,
    /// Decoding temperature for correction calls, recorded in the audit.
    pub temperature: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.1,
            batch_size: 5,
            llm_timeout_secs: 60,
            ollama_base_url: "http://localhost:11434".into(),
            temperature: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("Grantha"));
    }

    #[test]
    fn db_path_under_app_data() {
        assert!(default_db_path().starts_with(app_data_dir()));
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.min_confidence, 0.1);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.llm_timeout_secs, 60);
    }
}

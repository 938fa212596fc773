//! Configuration management for BookQA.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (.bookqa/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with persisted state stored in `.bookqa/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Local answer engines, in the order they are tried by default.
pub const KNOWN_LOCAL_ENGINES: [&str; 2] = ["ollama", "extractive"];

/// Which provider family the embedding and answer services prefer.
///
/// Driven by a single flag: the presence of a remote API credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderMode {
    /// Remote provider first, local providers as fallback
    Remote,
    /// Local providers only
    Local,
}

impl ProviderMode {
    /// Get the canonical mode name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .bookqa/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Remote provider credential; its presence selects remote-first mode
    #[serde(skip)]
    pub api_key: Option<String>,

    /// Vector store location
    pub store: StoreConfig,

    /// Remote (OpenAI-compatible) provider settings
    pub remote: RemoteConfig,

    /// Local provider settings
    pub local: LocalConfig,

    /// Retrieval and chunking defaults
    pub retrieval: RetrievalConfig,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub json_logs: bool,
}

/// Vector store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Directory holding the index; relative paths resolve against the workspace
    pub persist_dir: PathBuf,

    /// Name of the single collection used by this deployment
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persist_dir: PathBuf::from(".bookqa/vectorstore"),
            collection: "smartbookqa".to_string(),
        }
    }
}

/// Remote provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteConfig {
    /// API base URL
    pub endpoint: String,

    /// Chat completion model
    pub chat_model: String,

    /// Embedding model
    pub embedding_model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Sampling temperature for answers
    pub temperature: f32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            timeout_secs: 30,
            temperature: 0.7,
        }
    }
}

/// Local provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocalConfig {
    /// Ollama server URL
    pub ollama_endpoint: String,

    /// Ollama generation model
    pub ollama_model: String,

    /// Local answer engines in priority order
    pub engines: Vec<String>,

    /// Whether the in-process embedding provider is enabled
    pub embeddings: bool,

    /// Request timeout in seconds for local servers
    pub timeout_secs: u64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            ollama_endpoint: "http://localhost:11434".to_string(),
            ollama_model: "llama2".to_string(),
            engines: KNOWN_LOCAL_ENGINES.iter().map(|s| s.to_string()).collect(),
            embeddings: true,
            timeout_secs: 120,
        }
    }
}

/// Retrieval and chunking defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Passages retrieved per question
    pub top_k: usize,

    /// Upper bound on answer length
    pub max_output_tokens: u32,

    /// Maximum characters per chunk
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_output_tokens: 500,
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    store: Option<StoreConfig>,
    remote: Option<RemoteConfig>,
    local: Option<LocalConfig>,
    retrieval: Option<RetrievalConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            api_key: None,
            store: StoreConfig::default(),
            remote: RemoteConfig::default(),
            local: LocalConfig::default(),
            retrieval: RetrievalConfig::default(),
            log_level: None,
            verbose: false,
            no_color: false,
            json_logs: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the environment, the workspace config file and defaults.
    ///
    /// Environment variables:
    /// - `BOOKQA_WORKSPACE`: Override workspace path
    /// - `BOOKQA_CONFIG`: Path to config file
    /// - `BOOKQA_API_KEY` / `OPENAI_API_KEY`: Remote provider credential
    /// - `OLLAMA_URL`: Ollama server URL
    /// - `BOOKQA_TOP_K`: Default passages per question
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use bookqa_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Index: {:?}", config.persist_dir());
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Load configuration, with explicit workspace and config file taking precedence
    /// over `BOOKQA_WORKSPACE` and `BOOKQA_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| env_var("BOOKQA_WORKSPACE").map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file = config_file.or_else(|| env_var("BOOKQA_CONFIG").map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.bookqa_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        config.apply_env(env_var)?;

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(store) = config_file.store {
            result.store = store;
        }
        if let Some(remote) = config_file.remote {
            result.remote = remote;
        }
        if let Some(local) = config_file.local {
            result.local = local;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.json_logs = json;
            }
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply environment overrides through a lookup function.
    fn apply_env<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.api_key = lookup("BOOKQA_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));

        if let Some(url) = lookup("OLLAMA_URL") {
            self.local.ollama_endpoint = url;
        }

        if let Some(top_k) = lookup("BOOKQA_TOP_K") {
            self.retrieval.top_k = top_k.parse().map_err(|_| {
                AppError::Config(format!("BOOKQA_TOP_K must be a positive integer: {}", top_k))
            })?;
        }

        if let Some(level) = lookup("RUST_LOG") {
            self.log_level = Some(level);
        }

        if lookup("NO_COLOR").is_some() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and the config file.
    pub fn with_overrides(
        mut self,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        json_logs: bool,
    ) -> Self {
        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if json_logs {
            self.json_logs = true;
        }

        self
    }

    /// Provider family selected by the presence of a remote credential.
    pub fn provider_mode(&self) -> ProviderMode {
        if self.api_key.is_some() {
            ProviderMode::Remote
        } else {
            ProviderMode::Local
        }
    }

    /// Get the path to the .bookqa directory.
    pub fn bookqa_dir(&self) -> PathBuf {
        self.workspace.join(".bookqa")
    }

    /// Resolved directory that holds the persisted index.
    pub fn persist_dir(&self) -> PathBuf {
        if self.store.persist_dir.is_absolute() {
            self.store.persist_dir.clone()
        } else {
            self.workspace.join(&self.store.persist_dir)
        }
    }

    /// Ensure the persist directory exists.
    pub fn ensure_persist_dir(&self) -> AppResult<()> {
        let dir = self.persist_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create persist directory {:?}: {}", dir, e))
            })?;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> AppResult<()> {
        if self.store.collection.trim().is_empty() {
            return Err(AppError::Config("Collection name must not be empty".to_string()));
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config("topK must be at least 1".to_string()));
        }

        if self.retrieval.max_output_tokens == 0 {
            return Err(AppError::Config(
                "maxOutputTokens must be at least 1".to_string(),
            ));
        }

        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                self.retrieval.chunk_overlap, self.retrieval.chunk_size
            )));
        }

        for engine in &self.local.engines {
            if !KNOWN_LOCAL_ENGINES.contains(&engine.as_str()) {
                return Err(AppError::Config(format!(
                    "Unknown local engine: {}. Supported: {}",
                    engine,
                    KNOWN_LOCAL_ENGINES.join(", ")
                )));
            }
        }

        Ok(())
    }
}

/// Read a non-empty environment variable.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.store.collection, "smartbookqa");
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.max_output_tokens, 500);
        assert_eq!(config.local.engines, vec!["ollama", "extractive"]);
        assert_eq!(config.provider_mode(), ProviderMode::Local);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_persist_dir_resolves_against_workspace() {
        let mut config = AppConfig::default();
        config.workspace = PathBuf::from("/srv/books");
        assert_eq!(
            config.persist_dir(),
            PathBuf::from("/srv/books/.bookqa/vectorstore")
        );

        config.store.persist_dir = PathBuf::from("/var/lib/bookqa");
        assert_eq!(config.persist_dir(), PathBuf::from("/var/lib/bookqa"));
    }

    #[test]
    fn test_api_key_selects_remote_mode() {
        let mut config = AppConfig::default();
        config
            .apply_env(lookup_from(&[("OPENAI_API_KEY", "sk-test")]))
            .unwrap();
        assert_eq!(config.provider_mode(), ProviderMode::Remote);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_bookqa_key_wins_over_openai_key() {
        let mut config = AppConfig::default();
        config
            .apply_env(lookup_from(&[
                ("OPENAI_API_KEY", "sk-openai"),
                ("BOOKQA_API_KEY", "sk-bookqa"),
            ]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-bookqa"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(lookup_from(&[
                ("OLLAMA_URL", "http://gpu-box:11434"),
                ("BOOKQA_TOP_K", "8"),
                ("NO_COLOR", "1"),
            ]))
            .unwrap();
        assert_eq!(config.local.ollama_endpoint, "http://gpu-box:11434");
        assert_eq!(config.retrieval.top_k, 8);
        assert!(config.no_color);
        assert_eq!(config.provider_mode(), ProviderMode::Local);
    }

    #[test]
    fn test_invalid_top_k_env() {
        let mut config = AppConfig::default();
        let result = config.apply_env(lookup_from(&[("BOOKQA_TOP_K", "many")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_merge_yaml_partial_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            "store:\n  collection: manuals\nretrieval:\n  topK: 3\n  chunkSize: 500\nlogging:\n  level: debug\n  color: false\n",
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.store.collection, "manuals");
        assert_eq!(merged.retrieval.top_k, 3);
        assert_eq!(merged.retrieval.chunk_size, 500);
        // Unspecified fields keep their defaults
        assert_eq!(merged.retrieval.chunk_overlap, 200);
        assert_eq!(merged.remote.chat_model, "gpt-3.5-turbo");
        assert_eq!(merged.log_level.as_deref(), Some("debug"));
        assert!(merged.no_color);
    }

    #[test]
    fn test_load_from_workspace_config() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".bookqa")).unwrap();
        std::fs::write(
            temp.path().join(".bookqa/config.yaml"),
            "local:\n  engines: [extractive]\n",
        )
        .unwrap();

        let config = AppConfig::load_from(Some(temp.path().to_path_buf()), None).unwrap();
        assert_eq!(config.local.engines, vec!["extractive"]);
        assert_eq!(config.persist_dir(), temp.path().join(".bookqa/vectorstore"));
    }

    #[test]
    fn test_load_from_missing_explicit_config() {
        let temp = TempDir::new().unwrap();
        let result = AppConfig::load_from(
            Some(temp.path().to_path_buf()),
            Some(temp.path().join("nope.yaml")),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default().with_overrides(None, true, true, true);
        assert!(config.verbose);
        assert!(config.no_color);
        assert!(config.json_logs);
        assert_eq!(config.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_validate_rejects_overlap_not_smaller_than_size() {
        let mut config = AppConfig::default();
        config.retrieval.chunk_overlap = config.retrieval.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_engine() {
        let mut config = AppConfig::default();
        config.local.engines = vec!["llamafile".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Unknown local engine"));
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let mut config = AppConfig::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }
}

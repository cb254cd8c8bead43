use crate::cli::{Cli, OutputFormat, VerbosityLevel};
use crate::dom::ParserOptions;
use crate::storage::StorageCapabilities;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const CONFIG_NAMES: [&str; 4] = [
    "xmltooling.toml",
    "xmltooling.json",
    ".xmltooling.toml",
    ".xmltooling.json",
];

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub parser: ParserOptions,
    pub unmarshalling: UnmarshallingConfig,
    pub storage: StorageConfig,
    pub check: CheckConfig,
    pub output: OutputConfig,
    pub files: FileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct UnmarshallingConfig {
    /// Fail on unknown attributes, child elements and text instead of dropping them
    pub strict_unknown_content: bool,
}

/// Storage service limits and housekeeping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Seconds between background reaper runs; 0 disables the reaper
    pub cleanup_interval_secs: u64,
    pub context_size: usize,
    pub key_size: usize,
    pub value_size: usize,
}

/// Round-trip checking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CheckConfig {
    /// Number of worker threads; defaults to the number of CPUs
    pub threads: Option<usize>,
    /// Stop at the first file that does not round-trip
    pub fail_fast: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub verbose: bool,
    /// Errors only
    pub quiet: bool,
}

/// File selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub extensions: Vec<String>,
    /// Include patterns (glob syntax)
    pub include_patterns: Vec<String>,
    /// Exclude patterns (glob syntax)
    pub exclude_patterns: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let capabilities = StorageCapabilities::default();
        Self {
            cleanup_interval_secs: 300,
            context_size: capabilities.context_size,
            key_size: capabilities.key_size,
            value_size: 1024 * 1024,
        }
    }
}

impl StorageConfig {
    pub fn capabilities(&self) -> StorageCapabilities {
        StorageCapabilities {
            context_size: self.context_size,
            key_size: self.key_size,
            value_size: self.value_size,
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_patterns: vec![],
            exclude_patterns: vec![],
        }
    }
}

impl OutputConfig {
    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(&SystemEnvProvider, cli).await
    }

    pub async fn load_config_with(env: &impl EnvProvider, cli: &Cli) -> Result<Config> {
        let config = match &cli.config {
            Some(path) => Self::load_from_file(path).await?,
            None => Self::find_config_file().await?.unwrap_or_default(),
        };
        let config = Self::apply_environment_overrides_with(env, config)?;
        let config = Self::merge_with_cli(config, cli);
        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => match toml::from_str::<Config>(&content) {
                Ok(config) => Ok(config),
                Err(_) => Ok(serde_json::from_str(&content)?),
            },
        }
    }

    /// Look for a configuration file in the working directory, then in the
    /// user configuration directory
    pub async fn find_config_file() -> Result<Option<Config>> {
        let mut candidates: Vec<PathBuf> = CONFIG_NAMES.iter().map(PathBuf::from).collect();
        if let Some(config_dir) = dirs::config_dir() {
            let app_dir = config_dir.join("xmltooling");
            candidates.extend(CONFIG_NAMES.iter().map(|name| app_dir.join(name)));
        }

        for path in candidates {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }
        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply `XMLTOOLING_*` environment variable overrides
    pub fn apply_environment_overrides_with(env: &impl EnvProvider, mut config: Config) -> Result<Config> {
        if let Some(threads) = parse_env(env, "XMLTOOLING_THREADS")? {
            config.check.threads = Some(threads);
        }
        if let Some(fail_fast) = parse_env(env, "XMLTOOLING_FAIL_FAST")? {
            config.check.fail_fast = fail_fast;
        }
        if let Some(strict) = parse_env(env, "XMLTOOLING_STRICT")? {
            config.unmarshalling.strict_unknown_content = strict;
        }
        if let Some(interval) = parse_env(env, "XMLTOOLING_CLEANUP_INTERVAL")? {
            config.storage.cleanup_interval_secs = interval;
        }
        if let Some(verbose) = parse_env(env, "XMLTOOLING_VERBOSE")? {
            config.output.verbose = verbose;
        }
        if let Some(quiet) = parse_env(env, "XMLTOOLING_QUIET")? {
            config.output.quiet = quiet;
        }
        if let Some(format) = env.get("XMLTOOLING_FORMAT") {
            config.output.format = <OutputFormat as ValueEnum>::from_str(&format, true)
                .map_err(|_| ConfigError::Environment(format!("Invalid XMLTOOLING_FORMAT value: {}", format)))?;
        }
        if let Some(extensions) = env.get("XMLTOOLING_EXTENSIONS") {
            config.files.extensions = extensions
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        Ok(config)
    }

    /// Merge CLI arguments with configuration; only flags that were given override
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if cli.threads.is_some() {
            config.check.threads = cli.threads;
        }
        if cli.fail_fast {
            config.check.fail_fast = true;
        }
        if cli.strict {
            config.unmarshalling.strict_unknown_content = true;
        }
        if let Some(format) = cli.output_format {
            config.output.format = format;
        }
        if cli.verbose {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }
        if let Some(extensions) = cli.get_extensions() {
            config.files.extensions = extensions;
        }
        if !cli.include_patterns.is_empty() {
            config.files.include_patterns = cli.include_patterns.clone();
        }
        if !cli.exclude_patterns.is_empty() {
            config.files.exclude_patterns = cli.exclude_patterns.clone();
        }
        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if let Some(threads) = config.check.threads {
            if threads == 0 {
                return Err(ConfigError::Validation(
                    "Number of threads must be greater than 0".to_string(),
                ));
            }
            if threads > 1000 {
                return Err(ConfigError::Validation(
                    "Number of threads cannot exceed 1000".to_string(),
                ));
            }
        }

        let storage = &config.storage;
        if storage.context_size == 0 || storage.key_size == 0 || storage.value_size == 0 {
            return Err(ConfigError::Validation(
                "Storage size limits must be greater than 0".to_string(),
            ));
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        if config.files.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "At least one file extension must be specified".to_string(),
            ));
        }
        for ext in &config.files.extensions {
            if ext.contains('/') || ext.contains('\\') || ext.contains('.') {
                return Err(ConfigError::Validation(format!("Invalid file extension: {}", ext)));
            }
        }

        Ok(())
    }

    /// Get the effective thread count
    pub fn get_thread_count(config: &Config) -> usize {
        config.check.threads.unwrap_or_else(num_cpus::get)
    }
}

fn parse_env<T: FromStr>(env: &impl EnvProvider, key: &str) -> Result<Option<T>> {
    env.get(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value)))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use mockall::predicate::*;
    use std::fs;
    use tempfile::TempDir;

    mockall::mock! {
        Env {}

        impl EnvProvider for Env {
            fn get(&self, key: &str) -> Option<String>;
        }
    }

    fn env_with(vars: &'static [(&'static str, &'static str)]) -> MockEnv {
        let mut env = MockEnv::new();
        env.expect_get()
            .returning(move |key| vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string()));
        env
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.check.threads, None);
        assert!(!config.check.fail_fast);
        assert!(!config.unmarshalling.strict_unknown_content);
        assert!(!config.parser.keep_comments);
        assert_eq!(config.storage.cleanup_interval(), Duration::from_secs(300));
        assert_eq!(config.storage.capabilities().key_size, 255);
        assert_eq!(config.output.format, OutputFormat::Human);
        assert_eq!(config.output.verbosity(), VerbosityLevel::Normal);
        assert_eq!(config.files.extensions, vec!["xml"]);
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_load_toml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let toml_content = r#"
[parser]
keep_comments = true

[unmarshalling]
strict_unknown_content = true

[storage]
cleanup_interval_secs = 60
value_size = 4096

[check]
threads = 8
fail_fast = true

[output]
format = "json"
verbose = true

[files]
extensions = ["xml", "saml"]
exclude_patterns = ["*.bak"]
"#;
        fs::write(&config_path, toml_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).await.unwrap();

        assert!(config.parser.keep_comments);
        assert!(config.unmarshalling.strict_unknown_content);
        assert_eq!(config.storage.cleanup_interval_secs, 60);
        assert_eq!(config.storage.value_size, 4096);
        assert_eq!(config.storage.key_size, 255);
        assert_eq!(config.check.threads, Some(8));
        assert!(config.check.fail_fast);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.verbose);
        assert_eq!(config.files.extensions, vec!["xml", "saml"]);
        assert!(config.files.include_patterns.is_empty());
        assert_eq!(config.files.exclude_patterns, vec!["*.bak"]);
    }

    #[tokio::test]
    async fn test_load_partial_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, r#"{ "output": { "format": "summary", "quiet": true } }"#).unwrap();

        let config = ConfigManager::load_from_file(&config_path).await.unwrap();
        assert_eq!(config.output.format, OutputFormat::Summary);
        assert_eq!(config.output.verbosity(), VerbosityLevel::Quiet);
        assert_eq!(config.files, FileConfig::default());
    }

    #[tokio::test]
    async fn test_unsupported_file_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "invalid: yaml").unwrap();

        match ConfigManager::load_from_file(&config_path).await.unwrap_err() {
            ConfigError::UnsupportedFormat(ext) => assert_eq!(ext, "yaml"),
            other => panic!("Expected UnsupportedFormat error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_toml_and_json() {
        let temp_dir = TempDir::new().unwrap();
        let toml_path = temp_dir.path().join("config.toml");
        fs::write(&toml_path, "invalid toml [[[").unwrap();
        assert!(matches!(
            ConfigManager::load_from_file(&toml_path).await.unwrap_err(),
            ConfigError::TomlParsing(_)
        ));

        let json_path = temp_dir.path().join("config.json");
        fs::write(&json_path, "{ invalid json }").unwrap();
        assert!(matches!(
            ConfigManager::load_from_file(&json_path).await.unwrap_err(),
            ConfigError::JsonParsing(_)
        ));
    }

    #[test]
    fn test_environment_overrides() {
        let env = env_with(&[
            ("XMLTOOLING_THREADS", "16"),
            ("XMLTOOLING_FAIL_FAST", "true"),
            ("XMLTOOLING_STRICT", "true"),
            ("XMLTOOLING_CLEANUP_INTERVAL", "0"),
            ("XMLTOOLING_FORMAT", "JSON"),
            ("XMLTOOLING_EXTENSIONS", "xml, saml"),
        ]);

        let config = ConfigManager::apply_environment_overrides_with(&env, Config::default()).unwrap();

        assert_eq!(config.check.threads, Some(16));
        assert!(config.check.fail_fast);
        assert!(config.unmarshalling.strict_unknown_content);
        assert_eq!(config.storage.cleanup_interval_secs, 0);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.files.extensions, vec!["xml", "saml"]);
    }

    #[test]
    fn test_invalid_environment_values() {
        let mut env = MockEnv::new();
        env.expect_get()
            .with(eq("XMLTOOLING_THREADS"))
            .times(1)
            .returning(|_| Some("many".to_string()));

        let result = ConfigManager::apply_environment_overrides_with(&env, Config::default());
        assert!(matches!(result.unwrap_err(), ConfigError::Environment(msg) if msg.contains("many")));
    }

    #[test]
    fn test_cli_only_overrides_given_flags() {
        let mut config = Config::default();
        config.check.fail_fast = true;
        config.check.threads = Some(2);
        config.output.format = OutputFormat::Summary;

        let cli = Cli::try_parse_from(["xmltooling", "--strict", "-e", "saml", "."]).unwrap();
        let config = ConfigManager::merge_with_cli(config, &cli);

        assert!(config.check.fail_fast);
        assert_eq!(config.check.threads, Some(2));
        assert_eq!(config.output.format, OutputFormat::Summary);
        assert!(config.unmarshalling.strict_unknown_content);
        assert_eq!(config.files.extensions, vec!["saml"]);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.check.threads = Some(0);
        assert!(ConfigManager::validate_config(&config).is_err());
        config.check.threads = Some(1001);
        assert!(ConfigManager::validate_config(&config).is_err());
        config.check.threads = Some(4);

        config.storage.key_size = 0;
        assert!(ConfigManager::validate_config(&config).is_err());
        config.storage.key_size = 255;

        config.output.verbose = true;
        config.output.quiet = true;
        assert!(ConfigManager::validate_config(&config).is_err());
        config.output.quiet = false;

        config.files.extensions = vec![];
        assert!(ConfigManager::validate_config(&config).is_err());
        config.files.extensions = vec!["invalid/ext".to_string()];
        assert!(matches!(
            ConfigManager::validate_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_thread_count_defaults_to_cpus() {
        let config = Config::default();
        assert_eq!(ConfigManager::get_thread_count(&config), num_cpus::get());
    }

    #[tokio::test]
    async fn test_load_config_precedence() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(
            &config_path,
            r#"
[check]
threads = 6
fail_fast = true

[output]
format = "summary"
"#,
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "xmltooling",
            "--config",
            config_path.to_str().unwrap(),
            "--threads",
            "8",
            temp_dir.path().to_str().unwrap(),
        ])
        .unwrap();
        let env = env_with(&[("XMLTOOLING_FORMAT", "json")]);
        let config = ConfigManager::load_config_with(&env, &cli).await.unwrap();

        assert_eq!(config.check.threads, Some(8));
        assert!(config.check.fail_fast);
        assert_eq!(config.output.format, OutputFormat::Json);
    }
}

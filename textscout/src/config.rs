use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How to handle byte sequences that are invalid in the file's charset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Report the file as a conversion failure
    #[default]
    FailFast,
    /// Replace invalid sequences with U+FFFD and keep scanning
    Lossy,
}

/// Engine configuration.
///
/// # Configuration Locations
///
/// The configuration can be loaded from multiple locations in order of precedence:
/// 1. Custom config file specified via `--config` flag
/// 2. Local `.textscout.yaml` in the current directory
/// 3. Global `$HOME/.config/textscout/config.yaml`
///
/// # Configuration Format
///
/// ```yaml
/// # Upper bound on scan threads (default: logical CPUs)
/// thread_count: 8
///
/// # Bytes inspected when deciding whether a file is binary
/// buffer_size: 8192
///
/// # How often progress is sampled
/// progress_interval_ms: 100
///
/// # Treat files that vanished during the scan as unremarkable
/// lightweight_auto_refresh: true
///
/// # failfast | lossy
/// encoding_mode: failfast
/// default_charset: "UTF-8"
///
/// log_level: "info"
/// ```
///
/// When using the CLI, command-line arguments take precedence over config file values
/// (see `merge_with_cli`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Upper bound on the number of threads a search may use.
    /// Defaults to number of CPU cores if not specified
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// Size of the prefix inspected by binary detection; files smaller than this are read
    /// whole, larger ones lazily
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Interval between progress samples, in milliseconds
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Whether a file that disappeared between listing and scanning is ignored
    #[serde(default)]
    pub lightweight_auto_refresh: bool,

    /// How to handle invalid byte sequences
    #[serde(default)]
    pub encoding_mode: EncodingMode,

    /// Charset used for files that do not declare one
    #[serde(default = "default_charset")]
    pub default_charset: String,

    /// Compiled-size limit for the search regex, in bytes
    #[serde(default = "default_pattern_size_limit")]
    pub pattern_size_limit: usize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_buffer_size() -> usize {
    8 * 1024
}

fn default_progress_interval_ms() -> u64 {
    100
}

fn default_charset() -> String {
    "UTF-8".to_string()
}

fn default_pattern_size_limit() -> usize {
    10 * (1 << 20)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            thread_count: default_thread_count(),
            buffer_size: default_buffer_size(),
            progress_interval_ms: default_progress_interval_ms(),
            lightweight_auto_refresh: false,
            encoding_mode: EncodingMode::default(),
            default_charset: default_charset(),
            pattern_size_limit: default_pattern_size_limit(),
            log_level: default_log_level(),
        }
    }
}

impl SearchConfig {
    /// Loads configuration from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration from a specific file
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("textscout/config.yaml")),
            Some(PathBuf::from(".textscout.yaml")),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicitly requested file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(ConfigError::Message(
                "buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.progress_interval_ms == 0 {
            return Err(ConfigError::Message(
                "progress_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(threads) = cli.thread_count {
            self.thread_count = threads;
        }
        if cli.lightweight_auto_refresh {
            self.lightweight_auto_refresh = true;
        }
        if let Some(mode) = cli.encoding_mode {
            self.encoding_mode = mode;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

/// Values given on the command line; `None` means "keep the configured value"
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub thread_count: Option<NonZeroUsize>,
    pub lightweight_auto_refresh: bool,
    pub encoding_mode: Option<EncodingMode>,
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let config_content = r#"
            thread_count: 4
            buffer_size: 64
            progress_interval_ms: 25
            lightweight_auto_refresh: true
            encoding_mode: lossy
            default_charset: "ISO-8859-1"
            log_level: "debug"
        "#;

        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = SearchConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.thread_count, NonZeroUsize::new(4).unwrap());
        assert_eq!(config.buffer_size, 64);
        assert_eq!(config.progress_interval(), Duration::from_millis(25));
        assert!(config.lightweight_auto_refresh);
        assert_eq!(config.encoding_mode, EncodingMode::Lossy);
        assert_eq!(config.default_charset, "ISO-8859-1");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_merge_with_cli() {
        let config_file = SearchConfig {
            thread_count: NonZeroUsize::new(4).unwrap(),
            log_level: "warn".to_string(),
            ..SearchConfig::default()
        };

        let cli = CliOverrides {
            thread_count: Some(NonZeroUsize::new(8).unwrap()),
            lightweight_auto_refresh: true,
            encoding_mode: None,
            log_level: Some("debug".to_string()),
        };

        let merged = config_file.merge_with_cli(cli);
        assert_eq!(merged.thread_count, NonZeroUsize::new(8).unwrap()); // CLI value
        assert!(merged.lightweight_auto_refresh); // CLI value
        assert_eq!(merged.encoding_mode, EncodingMode::FailFast); // File value (CLI None)
        assert_eq!(merged.log_level, "debug"); // CLI value
    }

    #[test]
    fn test_default_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(b"log_level: \"warn\"\n").unwrap();

        let config = SearchConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(
            config.thread_count,
            NonZeroUsize::new(num_cpus::get()).unwrap()
        );
        assert_eq!(config.buffer_size, 8192);
        assert_eq!(config.progress_interval_ms, 100);
        assert!(!config.lightweight_auto_refresh);
        assert_eq!(config.encoding_mode, EncodingMode::FailFast);
        assert_eq!(config.default_charset, "UTF-8");
    }

    #[test]
    fn test_invalid_config() {
        let config_content = r#"
            thread_count: "invalid"  # Should be number
            buffer_size: []
        "#;

        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let result = SearchConfig::load_from(Some(&config_path));
        assert!(result.is_err(), "Expected error loading invalid config");
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, "buffer_size: 0\n").unwrap();

        assert!(SearchConfig::load_from(Some(&config_path)).is_err());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = SearchConfig::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(result.is_err());
    }
}

use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{ScanError, ScanResult};

/// Configuration of a single scan.
///
/// A `ScanRequest` is immutable once handed to a [`Scanner`](crate::search::Scanner); every
/// worker sees the same copy.
///
/// # Configuration Locations
///
/// Requests can be pre-filled from YAML files, in order of precedence (last wins):
/// 1. Global `$HOME/.config/reposcout/config.yaml`
/// 2. Local `.reposcout.yaml` in the current directory
/// 3. Custom config file specified via `--config`
///
/// # Configuration Format
///
/// ```yaml
/// # Directory to scan
/// root_path: "."
///
/// # Keyword to look for
/// keyword: "password"
///
/// # Suffixes to include; omit (or use "all") to scan every file
/// file_extensions:
///   - ".py"
///   - "java"
///
/// # substring | exact | token
/// match_mode: token
///
/// # Strip comments before matching
/// ignore_comments: true
///
/// # Context window around each hit, optionally gated by a second keyword
/// context:
///   before: 2
///   after: 2
///   keyword: "secret"
///
/// # Stop after this many files (0 disables the cap)
/// safeguard: 5000
/// ```
///
/// Command-line arguments take precedence over file values, see [`ScanRequest::merge_with_cli`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanRequest {
    /// Root directory to start scanning from
    pub root_path: PathBuf,

    /// The keyword to look for
    pub keyword: String,

    /// Optional list of file suffixes to include (e.g. [".py", "rs"]).
    /// If None, or if it contains "all" or "*", every file is included.
    pub file_extensions: Option<Vec<String>>,

    /// How a line is compared against the keyword
    pub match_mode: MatchMode,

    /// How lines are split into tokens in [`MatchMode::Token`]
    pub token_split: TokenSplit,

    /// Whether comparisons are case sensitive
    pub case_sensitive: bool,

    /// Strip comments (per file syntax) before matching
    pub ignore_comments: bool,

    /// Context window extraction, disabled when None
    pub context: Option<ContextConfig>,

    /// Stop once this many files have been scanned (0 disables the cap)
    pub safeguard: usize,

    /// Number of worker threads; None sizes the pool from the CPU count
    pub thread_count: Option<NonZeroUsize>,

    /// Minimum interval between two progress callbacks, in milliseconds
    pub progress_interval_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Line comparison semantics, mutually exclusive per scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// The keyword occurs anywhere in the line
    #[default]
    Substring,
    /// The whitespace-trimmed line equals the keyword
    Exact,
    /// The keyword equals one token of the line
    Token,
}

/// Token boundaries used by [`MatchMode::Token`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSplit {
    /// Split on runs of whitespace
    Whitespace,
    /// Split on runs of non-word characters (`\W+`)
    #[default]
    NonWord,
}

/// Context window ("subscan") settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Content lines to include before the match
    pub before: usize,
    /// Content lines to include after the match
    pub after: usize,
    /// When set, overrides both `before` and `after`
    pub both: Option<usize>,
    /// Secondary keyword the assembled window must contain
    pub keyword: Option<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            before: 2,
            after: 2,
            both: None,
            keyword: None,
        }
    }
}

impl ContextConfig {
    /// Effective (before, after) window sizes
    pub fn window(&self) -> (usize, usize) {
        match self.both {
            Some(n) => (n, n),
            None => (self.before, self.after),
        }
    }

    /// The secondary keyword, ignoring blank values
    pub fn context_keyword(&self) -> Option<&str> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|kw| !kw.is_empty())
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 200;

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("."),
            keyword: String::new(),
            file_extensions: None,
            match_mode: MatchMode::default(),
            token_split: TokenSplit::default(),
            case_sensitive: false,
            ignore_comments: false,
            context: None,
            safeguard: 0,
            thread_count: None,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            log_level: default_log_level(),
        }
    }
}

impl ScanRequest {
    /// Creates a request for `keyword` under `root_path` with default settings
    pub fn new(root_path: impl Into<PathBuf>, keyword: impl Into<String>) -> Self {
        Self {
            root_path: root_path.into(),
            keyword: keyword.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from the default locations
    pub fn load() -> ScanResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus an optional explicit file
    pub fn load_from(config_path: Option<&Path>) -> ScanResult<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ScanError::config_error(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }

        let config_files = [
            dirs::config_dir().map(|p| p.join("reposcout/config.yaml")),
            Some(PathBuf::from(".reposcout.yaml")),
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Merges CLI arguments with configuration file values.
    ///
    /// CLI values win whenever they differ from the defaults.
    pub fn merge_with_cli(mut self, cli: ScanRequest) -> Self {
        let defaults = ScanRequest::default();

        if cli.root_path != defaults.root_path {
            self.root_path = cli.root_path;
        }
        if !cli.keyword.is_empty() {
            self.keyword = cli.keyword;
        }
        if cli.file_extensions.is_some() {
            self.file_extensions = cli.file_extensions;
        }
        if cli.match_mode != defaults.match_mode {
            self.match_mode = cli.match_mode;
        }
        if cli.token_split != defaults.token_split {
            self.token_split = cli.token_split;
        }
        if cli.case_sensitive {
            self.case_sensitive = true;
        }
        if cli.ignore_comments {
            self.ignore_comments = true;
        }
        if cli.context.is_some() {
            self.context = cli.context;
        }
        if cli.safeguard != 0 {
            self.safeguard = cli.safeguard;
        }
        if cli.thread_count.is_some() {
            self.thread_count = cli.thread_count;
        }
        if cli.progress_interval_ms != defaults.progress_interval_ms {
            self.progress_interval_ms = cli.progress_interval_ms;
        }
        if cli.log_level != defaults.log_level {
            self.log_level = cli.log_level;
        }
        self
    }

    /// Checks the request before a scan is started.
    ///
    /// The engine itself tolerates a missing root (it simply finds no files), so callers
    /// that want to report it do so here.
    pub fn validate(&self) -> ScanResult<()> {
        if self.keyword.trim().is_empty() {
            return Err(ScanError::EmptyKeyword);
        }
        if !self.root_path.is_dir() {
            return Err(ScanError::invalid_root(&self.root_path));
        }
        Ok(())
    }

    /// Minimum interval between progress callbacks
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Serializes the request as YAML, in the same format `load_from` reads
    pub fn to_yaml(&self) -> ScanResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Writes the request to `path` so the scan can be re-run later
    pub fn save_to(&self, path: &Path) -> ScanResult<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File as FsFile;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let config_content = r#"
            root_path: "src"
            keyword: "password"
            file_extensions: [".py", "java"]
            match_mode: token
            token_split: whitespace
            case_sensitive: true
            ignore_comments: true
            context:
              before: 3
              after: 1
              keyword: "secret"
            safeguard: 100
            thread_count: 4
            log_level: "debug"
        "#;

        let mut file = FsFile::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = ScanRequest::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.root_path, PathBuf::from("src"));
        assert_eq!(config.keyword, "password");
        assert_eq!(
            config.file_extensions,
            Some(vec![".py".to_string(), "java".to_string()])
        );
        assert_eq!(config.match_mode, MatchMode::Token);
        assert_eq!(config.token_split, TokenSplit::Whitespace);
        assert!(config.case_sensitive);
        assert!(config.ignore_comments);
        let context = config.context.unwrap();
        assert_eq!(context.window(), (3, 1));
        assert_eq!(context.context_keyword(), Some("secret"));
        assert_eq!(config.safeguard, 100);
        assert_eq!(config.thread_count, NonZeroUsize::new(4));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_default_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, "keyword: \"todo\"\n").unwrap();

        let config = ScanRequest::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.keyword, "todo");
        assert_eq!(config.root_path, PathBuf::from("."));
        assert_eq!(config.file_extensions, None);
        assert_eq!(config.match_mode, MatchMode::Substring);
        assert_eq!(config.token_split, TokenSplit::NonWord);
        assert!(!config.case_sensitive);
        assert!(!config.ignore_comments);
        assert!(config.context.is_none());
        assert_eq!(config.safeguard, 0);
        assert_eq!(config.thread_count, None);
        assert_eq!(config.progress_interval(), Duration::from_millis(200));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(
            &config_path,
            "match_mode: fuzzy\nsafeguard: \"lots\"\n",
        )
        .unwrap();

        let result = ScanRequest::load_from(Some(&config_path));
        assert!(matches!(result, Err(ScanError::ConfigError(_))));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ScanRequest::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_with_cli() {
        let from_file = ScanRequest {
            root_path: PathBuf::from("src"),
            keyword: "todo".to_string(),
            file_extensions: Some(vec!["rs".to_string()]),
            safeguard: 50,
            log_level: "info".to_string(),
            ..ScanRequest::default()
        };

        let cli = ScanRequest {
            keyword: "fixme".to_string(),
            match_mode: MatchMode::Exact,
            ignore_comments: true,
            thread_count: NonZeroUsize::new(8),
            ..ScanRequest::default()
        };

        let merged = from_file.merge_with_cli(cli);
        assert_eq!(merged.keyword, "fixme"); // CLI value
        assert_eq!(merged.root_path, PathBuf::from("src")); // File value (CLI default)
        assert_eq!(merged.file_extensions, Some(vec!["rs".to_string()])); // File value
        assert_eq!(merged.match_mode, MatchMode::Exact); // CLI value
        assert!(merged.ignore_comments); // CLI value
        assert_eq!(merged.safeguard, 50); // File value
        assert_eq!(merged.thread_count, NonZeroUsize::new(8)); // CLI value
        assert_eq!(merged.log_level, "info"); // File value
    }

    #[test]
    fn test_validate() {
        let dir = tempdir().unwrap();

        let request = ScanRequest::new(dir.path(), "key");
        assert!(request.validate().is_ok());

        let request = ScanRequest::new(dir.path(), "   ");
        assert!(matches!(request.validate(), Err(ScanError::EmptyKeyword)));

        let request = ScanRequest::new(dir.path().join("missing"), "key");
        assert!(matches!(request.validate(), Err(ScanError::InvalidRoot(_))));
    }

    #[test]
    fn test_context_window_both_overrides() {
        let context = ContextConfig {
            before: 1,
            after: 4,
            both: Some(3),
            keyword: Some("  ".to_string()),
        };
        assert_eq!(context.window(), (3, 3));
        assert_eq!(context.context_keyword(), None);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rerun.yaml");

        let request = ScanRequest {
            file_extensions: Some(vec![".java".to_string()]),
            match_mode: MatchMode::Token,
            context: Some(ContextConfig::default()),
            ..ScanRequest::new("/tmp/repo", "token")
        };
        request.save_to(&path).unwrap();

        let loaded = ScanRequest::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.keyword, "token");
        assert_eq!(loaded.match_mode, MatchMode::Token);
        assert_eq!(loaded.context, Some(ContextConfig::default()));
        assert_eq!(loaded.file_extensions, Some(vec![".java".to_string()]));
    }
}

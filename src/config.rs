//! Runtime configuration read from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `JOTTER_DB` | `{data_dir}/jotter/notes.db` |
//! | `JOTTER_PAGE_SIZE` | 20 |
//! | `JOTTER_MAX_PAGE_SIZE` | 100 |
//! | `JOTTER_LOG` | `warn` (`RUST_LOG` takes precedence) |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    /// Page size used when the caller does not ask for one.
    pub default_page_size: usize,
    /// Larger requested page sizes are clamped to this.
    pub max_page_size: usize,
    pub log_filter: String,
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_path = match lookup("JOTTER_DB").filter(|value| !value.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_database_path()?,
        };
        let default_page_size = page_size(&lookup, "JOTTER_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        let max_page_size = page_size(&lookup, "JOTTER_MAX_PAGE_SIZE", DEFAULT_MAX_PAGE_SIZE)?;
        if default_page_size > max_page_size {
            anyhow::bail!(
                "JOTTER_PAGE_SIZE ({default_page_size}) exceeds JOTTER_MAX_PAGE_SIZE ({max_page_size})"
            );
        }
        let log_filter = lookup("JOTTER_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            database_path,
            default_page_size,
            max_page_size,
            log_filter,
        })
    }

    /// Overrides the database path.
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Overrides both page size limits.
    pub fn page_sizes(mut self, default_page_size: usize, max_page_size: usize) -> Self {
        self.default_page_size = default_page_size;
        self.max_page_size = max_page_size;
        self
    }
}

fn page_size(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> Result<usize> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let size: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a positive integer, got `{raw}`"))?;
    if size == 0 {
        anyhow::bail!("{key} must be at least 1");
    }
    Ok(size)
}

/// Gets the cross-platform database path.
///
/// Returns the path as `{data_dir}/jotter/notes.db` where `data_dir` is:
/// - Linux: `~/.local/share`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
pub fn default_database_path() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Failed to determine data directory"))?;

    Ok(data_dir.join("jotter").join("notes.db"))
}

/// Ensures the parent directory of the database file exists.
pub fn ensure_database_directory(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use tempfile::tempdir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[("JOTTER_DB", "/tmp/n.db")])).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/n.db"));
        assert_eq!(config.default_page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.max_page_size, DEFAULT_MAX_PAGE_SIZE);
        assert_eq!(config.log_filter, "warn");
    }

    #[test]
    fn reads_every_variable() {
        let config = Config::from_lookup(lookup(&[
            ("JOTTER_DB", "notes.db"),
            ("JOTTER_PAGE_SIZE", " 5 "),
            ("JOTTER_MAX_PAGE_SIZE", "50"),
            ("JOTTER_LOG", "jotter=debug"),
        ]))
        .unwrap();

        assert_eq!(config.default_page_size, 5);
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.log_filter, "jotter=debug");
    }

    #[test]
    fn rejects_invalid_page_sizes() {
        let err = Config::from_lookup(lookup(&[("JOTTER_DB", "x"), ("JOTTER_PAGE_SIZE", "ten")]))
            .unwrap_err();
        assert!(err.to_string().contains("JOTTER_PAGE_SIZE"));

        assert!(Config::from_lookup(lookup(&[("JOTTER_DB", "x"), ("JOTTER_MAX_PAGE_SIZE", "0")])).is_err());
        assert!(
            Config::from_lookup(lookup(&[
                ("JOTTER_DB", "x"),
                ("JOTTER_PAGE_SIZE", "30"),
                ("JOTTER_MAX_PAGE_SIZE", "10"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn default_database_path_ends_with_app_dir() {
        if let Ok(path) = default_database_path() {
            assert!(path.ends_with("jotter/notes.db"));
        }
    }

    #[test]
    fn ensure_database_directory_creates_parents() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("a").join("b").join("notes.db");

        ensure_database_directory(&db_path).unwrap();

        assert!(db_path.parent().unwrap().is_dir());
    }
}

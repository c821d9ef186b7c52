//! Data directory layout and project configuration.
//!
//! A project keeps its data in one directory (by default `.thicket/` under
//! the project root):
//!
//! ```text
//! .thicket/
//!   config.json     project code
//!   tickets.jsonl   the log (tracked)
//!   cache.db        derived cache (ignored)
//!   .gitignore
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::ProjectCode;
use crate::error::{Error, Result};

/// Name of the data directory under a project root.
pub const DATA_DIR_NAME: &str = ".thicket";

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Name of the log file.
pub const LOG_FILE_NAME: &str = "tickets.jsonl";

/// Name of the cache database.
pub const CACHE_FILE_NAME: &str = "cache.db";

/// Name of the gitignore file within the data directory.
pub const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Keeps the cache and its WAL sidecars out of version control.
const GITIGNORE_CONTENT: &str = "cache.db*\n";

/// Resolved paths of every file in a data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    dir: PathBuf,
    config: PathBuf,
    log: PathBuf,
    cache: PathBuf,
}

impl StorePaths {
    /// Paths inside an explicit data directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            config: dir.join(CONFIG_FILE_NAME),
            log: dir.join(LOG_FILE_NAME),
            cache: dir.join(CACHE_FILE_NAME),
            dir,
        }
    }

    /// Paths for the `.thicket` directory under `root`.
    pub fn for_project_root(root: impl AsRef<Path>) -> Self {
        Self::new(root.as_ref().join(DATA_DIR_NAME))
    }

    /// The data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The configuration file.
    #[must_use]
    pub fn config(&self) -> &Path {
        &self.config
    }

    /// The log file.
    #[must_use]
    pub fn log(&self) -> &Path {
        &self.log
    }

    /// The cache database.
    #[must_use]
    pub fn cache(&self) -> &Path {
        &self.cache
    }

    /// Whether the data directory exists.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.dir.is_dir()
    }
}

/// Contents of `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Prefix for every generated ID.
    pub project_code: ProjectCode,
}

impl ProjectConfig {
    /// Load the configuration for a data directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the file is missing and
    /// [`Error::Config`] if it does not parse or holds an invalid code.
    pub fn load(paths: &StorePaths) -> Result<Self> {
        let content = match fs::read_to_string(paths.config()) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotInitialized(paths.dir().to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("invalid {}: {e}", paths.config().display()))
        })
    }

    /// Write the configuration, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, paths: &StorePaths) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("JSON error: {e}")))?;
        fs::write(paths.config(), content)?;
        Ok(())
    }
}

/// Create a data directory with its configuration, an empty log and a
/// `.gitignore` for the cache.
///
/// # Errors
///
/// Returns [`Error::AlreadyInitialized`] if the directory exists, or an IO
/// error if any file cannot be created.
pub fn init(paths: &StorePaths, project_code: ProjectCode) -> Result<ProjectConfig> {
    if paths.dir().exists() {
        return Err(Error::AlreadyInitialized(paths.dir().to_path_buf()));
    }

    fs::create_dir_all(paths.dir())?;

    let config = ProjectConfig { project_code };
    config.save(paths)?;
    fs::write(paths.log(), "")?;
    fs::write(paths.dir().join(GITIGNORE_FILE_NAME), GITIGNORE_CONTENT)?;

    debug!(dir = %paths.dir().display(), "Created data directory");
    info!(project_code = %config.project_code, "Initialized ticket store");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn code() -> ProjectCode {
        ProjectCode::new("TH").unwrap()
    }

    #[test]
    fn paths_follow_layout() {
        let paths = StorePaths::for_project_root("/project");
        assert_eq!(paths.dir(), Path::new("/project/.thicket"));
        assert_eq!(paths.config(), Path::new("/project/.thicket/config.json"));
        assert_eq!(paths.log(), Path::new("/project/.thicket/tickets.jsonl"));
        assert_eq!(paths.cache(), Path::new("/project/.thicket/cache.db"));
    }

    #[test]
    fn explicit_dir_is_used_as_is() {
        let paths = StorePaths::new("/data/tickets");
        assert_eq!(paths.log(), Path::new("/data/tickets/tickets.jsonl"));
    }

    #[test]
    fn init_creates_layout() {
        let temp = TempDir::new().unwrap();
        let paths = StorePaths::for_project_root(temp.path());

        let config = init(&paths, code()).unwrap();

        assert_eq!(config.project_code.as_str(), "TH");
        assert!(paths.is_initialized());
        assert_eq!(fs::read_to_string(paths.log()).unwrap(), "");
        assert_eq!(
            fs::read_to_string(paths.config()).unwrap(),
            "{\n  \"project_code\": \"TH\"\n}"
        );
        assert_eq!(
            fs::read_to_string(paths.dir().join(GITIGNORE_FILE_NAME)).unwrap(),
            "cache.db*\n"
        );
        assert!(!paths.cache().exists());
    }

    #[test]
    fn init_twice_fails() {
        let temp = TempDir::new().unwrap();
        let paths = StorePaths::for_project_root(temp.path());
        init(&paths, code()).unwrap();

        assert!(matches!(
            init(&paths, code()),
            Err(Error::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn load_round_trips() {
        let temp = TempDir::new().unwrap();
        let paths = StorePaths::for_project_root(temp.path());
        let created = init(&paths, code()).unwrap();

        assert_eq!(ProjectConfig::load(&paths).unwrap(), created);
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let temp = TempDir::new().unwrap();
        let paths = StorePaths::for_project_root(temp.path());

        assert!(matches!(
            ProjectConfig::load(&paths),
            Err(Error::NotInitialized(_))
        ));
    }

    #[test]
    fn load_rejects_invalid_code() {
        let temp = TempDir::new().unwrap();
        let paths = StorePaths::for_project_root(temp.path());
        init(&paths, code()).unwrap();
        fs::write(paths.config(), r#"{"project_code": "thicket"}"#).unwrap();

        assert!(matches!(ProjectConfig::load(&paths), Err(Error::Config(_))));
    }
}

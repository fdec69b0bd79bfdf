//! Code-set loading from TOML files.

use crate::error::{CodesError, Result};
use crate::set::CodeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Loader for code-set overrides from a directory of TOML files.
pub struct CodeSetLoader {
    sets_dir: PathBuf,
}

impl CodeSetLoader {
    /// Create a new loader over the given directory.
    ///
    /// # Errors
    /// Returns error if the directory doesn't exist.
    pub fn new(sets_dir: impl Into<PathBuf>) -> Result<Self> {
        let sets_dir = sets_dir.into();

        if !sets_dir.is_dir() {
            return Err(CodesError::DirectoryNotFound {
                path: sets_dir.display().to_string(),
            });
        }

        Ok(Self { sets_dir })
    }

    /// Load every `*.toml` code set in the directory.
    ///
    /// Invalid files are logged as warnings and skipped.
    ///
    /// # Errors
    /// Returns error if the directory can't be read.
    pub fn load_all(&self) -> Result<Vec<CodeSet>> {
        let mut sets = Vec::new();

        for entry in std::fs::read_dir(&self.sets_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("toml") {
                continue;
            }

            match Self::load_from_path(&path) {
                Ok(set) => {
                    debug!(set_id = %set.id, path = %path.display(), "loaded code set");
                    sets.push(set);
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping invalid code set"
                    );
                }
            }
        }

        info!(
            count = sets.len(),
            dir = %self.sets_dir.display(),
            "loaded code sets"
        );

        Ok(sets)
    }

    fn load_from_path(path: &Path) -> Result<CodeSet> {
        let contents = std::fs::read_to_string(path).map_err(|e| CodesError::LoadError {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        let set: CodeSet = toml::from_str(&contents).map_err(|source| CodesError::ParseError {
            path: path.display().to_string(),
            source,
        })?;

        set.validate()?;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_set(dir: &Path, id: &str) -> PathBuf {
        let path = dir.join(format!("{id}.toml"));
        let contents = format!(
            r#"
id = "{id}"
name = "Test set"
total_due_code = "91"

[[codes]]
code = "538"
description = "debito"

[[codes]]
code = "91"
description = "total"
"#
        );
        std::fs::write(&path, contents).expect("write set");
        path
    }

    #[test]
    fn test_loader_missing_dir() {
        assert!(matches!(
            CodeSetLoader::new("/nonexistent/code-sets"),
            Err(CodesError::DirectoryNotFound { .. })
        ));
    }

    #[test]
    fn test_load_all() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write_set(dir.path(), "set-a");
        write_set(dir.path(), "set-b");

        let loader = CodeSetLoader::new(dir.path()).expect("create loader");
        let sets = loader.load_all().expect("load all");
        assert_eq!(sets.len(), 2);
    }

    #[test]
    fn test_load_all_skips_invalid() {
        let dir = tempfile::tempdir().expect("create temp dir");
        write_set(dir.path(), "valid");
        std::fs::write(dir.path().join("broken.toml"), "not toml [[[").expect("write file");
        std::fs::write(dir.path().join("ignored.txt"), "not a set").expect("write file");

        let loader = CodeSetLoader::new(dir.path()).expect("create loader");
        let sets = loader.load_all().expect("load all");
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].id, "valid");
    }
}

//! In-memory code-set registry.

use crate::error::{CodesError, Result};
use crate::loader::CodeSetLoader;
use crate::set::CodeSet;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Registry of code sets, seeded with the built-in defaults.
///
/// Overrides loaded from disk replace the built-in set with the same id,
/// so portal drift is handled by shipping a TOML file, not a release.
#[derive(Clone)]
pub struct CodeSetRegistry {
    sets: Arc<RwLock<HashMap<String, CodeSet>>>,
}

impl CodeSetRegistry {
    /// Create a registry holding the built-in sets.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self {
            sets: Arc::new(RwLock::new(HashMap::new())),
        };
        for set in [
            CodeSet::declaration_proposal(),
            CodeSet::historical_query(),
            CodeSet::annual_consolidation(),
        ] {
            registry.insert_unchecked(set);
        }
        registry
    }

    /// Load overrides from a directory on top of the defaults.
    ///
    /// # Errors
    /// Returns error if the directory can't be read.
    pub fn load_overrides(&self, loader: &CodeSetLoader) -> Result<()> {
        let overrides = loader.load_all()?;
        let count = overrides.len();

        for set in overrides {
            self.insert_unchecked(set);
        }

        info!(count, "applied code-set overrides");
        Ok(())
    }

    /// Get a code set by id.
    ///
    /// # Errors
    /// Returns error if the set is unknown.
    pub fn get(&self, set_id: &str) -> Result<CodeSet> {
        self.sets
            .read()
            .expect("acquire read lock on code sets")
            .get(set_id)
            .cloned()
            .ok_or_else(|| CodesError::NotFound {
                set_id: set_id.to_string(),
            })
    }

    /// Add or replace a code set.
    ///
    /// # Errors
    /// Returns error if the set fails validation.
    pub fn insert(&self, set: CodeSet) -> Result<()> {
        set.validate()?;
        self.insert_unchecked(set);
        Ok(())
    }

    /// Number of registered sets.
    #[must_use]
    pub fn count(&self) -> usize {
        self.sets
            .read()
            .expect("acquire read lock on code sets")
            .len()
    }

    fn insert_unchecked(&self, set: CodeSet) {
        self.sets
            .write()
            .expect("acquire write lock on code sets")
            .insert(set.id.clone(), set);
    }
}

impl Default for CodeSetRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

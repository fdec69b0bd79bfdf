//! Code-set definitions and the compiled-in defaults.

use crate::error::{CodesError, Result};
use serde::{Deserialize, Serialize};

/// A single tax code and its on-form meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDef {
    /// The numeric code string as printed on the form (e.g. `"538"`)
    pub code: String,
    /// Human-readable description
    pub description: String,
}

/// The set of codes one workflow variant extracts.
///
/// Declaration proposal, historical query, and annual consolidation each
/// use an overlapping but distinct subset of the form's vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSet {
    /// Stable identifier (`declaration-proposal`, ...)
    pub id: String,
    /// Display name
    pub name: String,
    /// Code whose value decides `payment_required` (when present)
    #[serde(default)]
    pub total_due_code: Option<String>,
    /// Codes to extract, in form order
    pub codes: Vec<CodeDef>,
}

impl CodeSet {
    /// Parse a code set from TOML.
    ///
    /// # Errors
    /// Returns error if the TOML does not parse or the set is invalid.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let set: Self = toml::from_str(contents).map_err(|source| CodesError::ParseError {
            path: "<inline>".to_string(),
            source,
        })?;
        set.validate()?;
        Ok(set)
    }

    /// Validate id, code uniqueness, and the total-due reference.
    ///
    /// # Errors
    /// Returns error describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(CodesError::Invalid {
                reason: "empty set id".to_string(),
            });
        }

        if self.codes.is_empty() {
            return Err(CodesError::Invalid {
                reason: format!("code set '{}' has no codes", self.id),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for def in &self.codes {
            if def.code.is_empty() || !def.code.bytes().all(|b| b.is_ascii_digit()) {
                return Err(CodesError::Invalid {
                    reason: format!("code '{}' in set '{}' is not numeric", def.code, self.id),
                });
            }
            if !seen.insert(def.code.as_str()) {
                return Err(CodesError::Invalid {
                    reason: format!("duplicate code '{}' in set '{}'", def.code, self.id),
                });
            }
        }

        if let Some(total) = &self.total_due_code {
            if !seen.contains(total.as_str()) {
                return Err(CodesError::Invalid {
                    reason: format!(
                        "total_due_code '{total}' is not part of set '{}'",
                        self.id
                    ),
                });
            }
        }

        Ok(())
    }

    /// Whether the set contains a code.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|def| def.code == code)
    }

    /// Description for a code, if present.
    #[must_use]
    pub fn description(&self, code: &str) -> Option<&str> {
        self.codes
            .iter()
            .find(|def| def.code == code)
            .map(|def| def.description.as_str())
    }

    /// Built-in set for the declaration-proposal workflow.
    #[must_use]
    pub fn declaration_proposal() -> Self {
        Self::builtin(include_str!("../defaults/declaration-proposal.toml"))
    }

    /// Built-in set for the historical-query workflow.
    #[must_use]
    pub fn historical_query() -> Self {
        Self::builtin(include_str!("../defaults/historical-query.toml"))
    }

    /// Built-in set for the annual-consolidation workflow.
    #[must_use]
    pub fn annual_consolidation() -> Self {
        Self::builtin(include_str!("../defaults/annual-consolidation.toml"))
    }

    fn builtin(contents: &str) -> Self {
        Self::from_toml_str(contents).expect("built-in code set is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sets_parse_and_validate() {
        let proposal = CodeSet::declaration_proposal();
        assert_eq!(proposal.id, "declaration-proposal");
        assert_eq!(proposal.total_due_code.as_deref(), Some("91"));
        assert!(proposal.contains("538"));
        assert!(proposal.contains("504"));
        assert!(proposal.contains("62"));

        let historical = CodeSet::historical_query();
        assert!(historical.codes.len() < proposal.codes.len());
        assert!(historical.contains("91"));

        let annual = CodeSet::annual_consolidation();
        assert!(annual.total_due_code.is_none());
    }

    #[test]
    fn test_description_lookup() {
        let set = CodeSet::declaration_proposal();
        let desc = set.description("504").expect("504 has a description");
        assert!(desc.to_lowercase().contains("remanente"));
        assert!(set.description("999").is_none());
    }

    #[test]
    fn test_validate_rejects_duplicate_codes() {
        let result = CodeSet::from_toml_str(
            r#"
            id = "dup"
            name = "Duplicated"

            [[codes]]
            code = "91"
            description = "a"

            [[codes]]
            code = "91"
            description = "b"
            "#,
        );
        assert!(matches!(result, Err(CodesError::Invalid { .. })));
    }

    #[test]
    fn test_validate_rejects_dangling_total_due() {
        let result = CodeSet::from_toml_str(
            r#"
            id = "dangling"
            name = "Dangling total"
            total_due_code = "91"

            [[codes]]
            code = "538"
            description = "debito"
            "#,
        );
        assert!(matches!(result, Err(CodesError::Invalid { .. })));
    }

    #[test]
    fn test_validate_rejects_non_numeric_code() {
        let result = CodeSet::from_toml_str(
            r#"
            id = "alpha"
            name = "Alpha code"

            [[codes]]
            code = "9a"
            description = "bad"
            "#,
        );
        assert!(matches!(result, Err(CodesError::Invalid { .. })));
    }
}

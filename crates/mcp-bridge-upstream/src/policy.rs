//! Export policy evaluation.
//!
//! An export policy decides whether a discovered tool or prompt is added to
//! the catalog: rules are evaluated in declaration order, the first whose
//! regex matches the candidate name decides, and the default action applies
//! when none match. A missing policy exports everything.

use mcp_bridge_core::config::{ExportAction, ExportPolicyConfig};
use regex::Regex;

use crate::error::{Error, Result};

/// A compiled export policy.
#[derive(Debug)]
pub struct ExportPolicy {
    default_export: bool,
    rules: Vec<(Regex, bool)>,
}

impl ExportPolicy {
    /// Compile a policy from configuration; `None` exports everything.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRegex`] when a rule's pattern does not
    /// compile.
    pub fn from_config(config: Option<&ExportPolicyConfig>) -> Result<Self> {
        let Some(config) = config else {
            return Ok(Self {
                default_export: true,
                rules: Vec::new(),
            });
        };

        let mut rules = Vec::with_capacity(config.rules.len());
        for rule in &config.rules {
            let regex = Regex::new(&rule.name_regex).map_err(|source| Error::InvalidRegex {
                pattern: rule.name_regex.clone(),
                source,
            })?;
            rules.push((regex, rule.action == ExportAction::Export));
        }

        Ok(Self {
            default_export: config.default_action == ExportAction::Export,
            rules,
        })
    }

    /// Whether a candidate with this name is exported.
    #[must_use]
    pub fn allows(&self, name: &str) -> bool {
        for (regex, export) in &self.rules {
            if regex.is_match(name) {
                return *export;
            }
        }
        self.default_export
    }
}

//! Parameter registry
//!
//! The validated, immutable table of parameter definitions used by a
//! running service. Built once from configuration; never mutated afterwards.

use crate::config::ConfigError;
use crate::storage::types::{ParameterCode, ParameterDefinition};
use std::collections::HashMap;

/// Registry of parameter definitions, in configuration order
#[derive(Debug, Clone)]
pub struct ParameterRegistry {
    definitions: Vec<ParameterDefinition>,
    by_code: HashMap<ParameterCode, usize>,
}

impl ParameterRegistry {
    /// The eleven IMGW parameters with their standard units and aggregation
    pub fn standard() -> Self {
        let definitions: Vec<ParameterDefinition> = ParameterCode::all()
            .iter()
            .map(|code| code.standard_definition())
            .collect();

        let by_code = definitions
            .iter()
            .enumerate()
            .map(|(idx, def)| (def.code, idx))
            .collect();

        Self {
            definitions,
            by_code,
        }
    }

    /// Build a registry from configured definitions
    ///
    /// Rejects an empty table and duplicate codes. Unknown codes never get
    /// this far: they fail while the configuration is deserialized.
    pub fn from_definitions(definitions: Vec<ParameterDefinition>) -> Result<Self, ConfigError> {
        if definitions.is_empty() {
            return Err(ConfigError::Invalid(
                "parameter table must contain at least one parameter".to_string(),
            ));
        }

        let mut by_code = HashMap::with_capacity(definitions.len());
        for (idx, def) in definitions.iter().enumerate() {
            if def.unit.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "parameter {} has an empty unit",
                    def.code
                )));
            }
            if by_code.insert(def.code, idx).is_some() {
                return Err(ConfigError::Invalid(format!(
                    "parameter {} is defined more than once",
                    def.code
                )));
            }
        }

        Ok(Self {
            definitions,
            by_code,
        })
    }

    /// Get definition by code
    pub fn get(&self, code: ParameterCode) -> Option<&ParameterDefinition> {
        self.by_code.get(&code).and_then(|&idx| self.definitions.get(idx))
    }

    /// Get all definitions in configuration order
    pub fn all(&self) -> &[ParameterDefinition] {
        &self.definitions
    }

    /// Codes in configuration order
    pub fn codes(&self) -> Vec<ParameterCode> {
        self.definitions.iter().map(|d| d.code).collect()
    }

    /// Restrict the registry to the given codes, keeping configuration order
    pub fn subset(&self, codes: &[ParameterCode]) -> Result<Self, ConfigError> {
        let mut selected = Vec::with_capacity(codes.len());
        for def in &self.definitions {
            if codes.contains(&def.code) {
                selected.push(def.clone());
            }
        }
        for code in codes {
            if !self.by_code.contains_key(code) {
                return Err(ConfigError::Invalid(format!(
                    "parameter {} is not configured",
                    code
                )));
            }
        }
        Self::from_definitions(selected)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for ParameterRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

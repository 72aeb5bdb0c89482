//! Engine configuration.
//!
//! ```toml
//! max_passes_per_cycle = 64
//! max_chained_actions = 1000
//!
//! [document]
//! show_feedback = true
//! read_only = false
//! ```

use serde::{Deserialize, Serialize};

use crate::engine::error::EngineError;

/// Document-level flags, fixed for the engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentFlags {
    /// When false, feedback composites never instantiate their content.
    pub show_feedback: bool,
    /// Rejects external action requests; chained requests still run.
    pub read_only: bool,
}

impl Default for DocumentFlags {
    fn default() -> Self {
        Self {
            show_feedback: true,
            read_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(rename = "document")]
    pub flags: DocumentFlags,
    /// Propagate/replace passes one settle may take before aborting.
    pub max_passes_per_cycle: usize,
    /// Chained requests one cycle may run before aborting.
    pub max_chained_actions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flags: DocumentFlags::default(),
            max_passes_per_cycle: 64,
            max_chained_actions: 1000,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(text).map_err(|error| EngineError::Config(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_passes_per_cycle == 0 {
            return Err(EngineError::Config(
                "max_passes_per_cycle must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.flags.read_only = read_only;
        self
    }

    pub fn show_feedback(mut self, show_feedback: bool) -> Self {
        self.flags.show_feedback = show_feedback;
        self
    }

    pub fn max_chained_actions(mut self, limit: usize) -> Self {
        self.max_chained_actions = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_overrides_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            max_chained_actions = 5

            [document]
            read_only = true
            "#,
        )
        .unwrap();
        assert_eq!(config.max_chained_actions, 5);
        assert_eq!(config.max_passes_per_cycle, 64);
        assert!(config.flags.read_only);
        assert!(config.flags.show_feedback);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("max_passes_per_cycle = 0"),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("max_passes_per_cycle = \"many\""),
            Err(EngineError::Config(_))
        ));
    }
}

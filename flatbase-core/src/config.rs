// flatbase-core/src/config.rs
// Engine options: index usage and CONCAT literal marker

/// Environment variable that disables index-assisted filtering when set to
/// `0`, `false` or `off`
pub const USE_INDEXES_ENV_VAR: &str = "FLATBASE_USE_INDEXES";

/// Environment variable whose first character replaces the CONCAT literal prefix
pub const LITERAL_PREFIX_ENV_VAR: &str = "FLATBASE_LITERAL_PREFIX";

/// Default sigil marking a CONCAT operand as literal text (`"-hello "`)
pub const DEFAULT_LITERAL_PREFIX: char = '-';

/// Options for the query engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Ask the store for index lookups before falling back to a full scan
    pub use_indexes: bool,

    /// CONCAT operands starting with this char are literal text, not field paths
    pub literal_prefix: char,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            use_indexes: true,
            literal_prefix: DEFAULT_LITERAL_PREFIX,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `FLATBASE_USE_INDEXES` / `FLATBASE_LITERAL_PREFIX`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(USE_INDEXES_ENV_VAR) {
            config.use_indexes = !matches!(
                raw.trim().to_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            );
        }
        if let Some(prefix) = lookup(LITERAL_PREFIX_ENV_VAR).and_then(|raw| raw.chars().next()) {
            config.literal_prefix = prefix;
        }
        config
    }

    pub fn with_indexes(mut self, use_indexes: bool) -> Self {
        self.use_indexes = use_indexes;
        self
    }

    pub fn with_literal_prefix(mut self, prefix: char) -> Self {
        self.literal_prefix = prefix;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> EngineConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.use_indexes);
        assert_eq!(config.literal_prefix, '-');
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new().with_indexes(false).with_literal_prefix('#');
        assert!(!config.use_indexes);
        assert_eq!(config.literal_prefix, '#');
    }

    #[test]
    fn test_env_overrides() {
        let config = config_from(&[(USE_INDEXES_ENV_VAR, "Off"), (LITERAL_PREFIX_ENV_VAR, "@x")]);
        assert!(!config.use_indexes);
        assert_eq!(config.literal_prefix, '@');

        let config = config_from(&[(USE_INDEXES_ENV_VAR, "1")]);
        assert!(config.use_indexes);
        assert_eq!(config.literal_prefix, '-');
    }
}

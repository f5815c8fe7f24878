//! Recorder configuration.

/// Retained checks per session before output is truncated.
pub const DEFAULT_MAX_RETAINED: usize = 10_000;

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Cap on retained checks; matches past it are counted but not stored.
    pub max_retained: usize,
    /// Stamped into the report header.
    pub tool_name: String,
    pub tool_version: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_retained: DEFAULT_MAX_RETAINED,
            tool_name: "verbose-kernel".to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl RecorderConfig {
    pub fn with_max_retained(mut self, max_retained: usize) -> Self {
        self.max_retained = max_retained;
        self
    }

    /// Reads `VERBOSE_MAX_RETAINED` and `VERBOSE_TOOL_NAME`; unset or invalid values fall
    /// back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("VERBOSE_MAX_RETAINED") {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => config.max_retained = n,
                _ => tracing::warn!(
                    value = %raw,
                    default = DEFAULT_MAX_RETAINED,
                    "invalid VERBOSE_MAX_RETAINED, using default"
                ),
            }
        }
        if let Ok(name) = std::env::var("VERBOSE_TOOL_NAME") {
            if !name.trim().is_empty() {
                config.tool_name = name;
            }
        }
        config
    }
}

//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML or JSON)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks on host settings)
//!     → ProxyConfig (validated, immutable)
//!     → HttpServer compiles `rewrites` into a RuleSet
//!
//! On file change (--watch):
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server recompiles rewrites and swaps the RuleSet atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Rewrite declarations are only checked by compiling their patterns
//! - Only rewrites are hot-reloaded; listener and upstream need a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError, ConfigFormat};
pub use schema::{ListenerConfig, ObservabilityConfig, ProxyConfig, TimeoutConfig, UpstreamConfig};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;

/// Annotated configuration printed by `--example-config`.
pub const EXAMPLE_CONFIG: &str = r#"# Header rewrite proxy configuration
name = "rewrite-headers"

[listener]
bind_address = "0.0.0.0:8080"

[upstream]
address = "127.0.0.1:3000"

[timeouts]
request_secs = 30

[observability]
log_level = "info"
json_logs = false
metrics_enabled = false
metrics_address = "0.0.0.0:9090"

# Rules run in order; a later rule sees the output of an earlier one.
# Templates reference capture groups as $1 or ${name}.
[[rewrites]]
header = "X-Trace"
regex = 'secret-(\d+)'
replacement = "redacted-$1"

[[rewrites]]
header = "Location"
regex = '^http://internal\.local(.*)$'
replacement = "https://example.com$1"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::RuleSet;

    #[test]
    fn test_example_config_is_valid() {
        let config = parse_config(EXAMPLE_CONFIG, ConfigFormat::Toml).unwrap();

        assert_eq!(config.name, "rewrite-headers");
        assert_eq!(config.rewrites.len(), 2);
        assert_eq!(config.rewrites[0].regex, r"secret-(\d+)");
        assert_eq!(RuleSet::compile(&config.rewrites).unwrap().len(), 2);
    }
}

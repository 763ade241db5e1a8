//! Runtime configuration.

use std::env;

/// Environment variable toggling verification at commit (`0`/`false` disables).
pub const ENV_VERIFY: &str = "FORGE_VERIFY";
/// Environment variable bounding interpreter call depth.
pub const ENV_MAX_CALL_DEPTH: &str = "FORGE_MAX_CALL_DEPTH";
/// Environment variable enabling instruction listings at commit.
pub const ENV_DUMP_IL: &str = "FORGE_DUMP_IL";

/// Settings shared by [`VmBackend`](crate::VmBackend) and [`Vm`](crate::Vm).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmConfig {
    /// Run the body verifier when a type is committed.
    pub verify: bool,
    /// Deepest call nesting the interpreter allows.
    pub max_call_depth: usize,
    /// Log each committed body as an instruction listing.
    pub dump_il: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            verify: true,
            max_call_depth: 256,
            dump_il: false,
        }
    }
}

impl VmConfig {
    /// Defaults overridden by `FORGE_VERIFY`, `FORGE_MAX_CALL_DEPTH` and
    /// `FORGE_DUMP_IL`. Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_VERIFY) {
            match parse_flag(&raw) {
                Some(flag) => config.verify = flag,
                None => tracing::warn!(var = ENV_VERIFY, value = %raw, "ignoring invalid flag"),
            }
        }
        if let Some(raw) = lookup(ENV_MAX_CALL_DEPTH) {
            match raw.trim().parse::<usize>() {
                Ok(depth) if depth > 0 => config.max_call_depth = depth,
                _ => tracing::warn!(
                    var = ENV_MAX_CALL_DEPTH,
                    value = %raw,
                    "ignoring invalid call depth"
                ),
            }
        }
        if let Some(raw) = lookup(ENV_DUMP_IL) {
            match parse_flag(&raw) {
                Some(flag) => config.dump_il = flag,
                None => tracing::warn!(var = ENV_DUMP_IL, value = %raw, "ignoring invalid flag"),
            }
        }
        config
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

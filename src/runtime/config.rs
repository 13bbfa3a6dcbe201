//! Execution limits for an instance.

use serde::{Deserialize, Serialize};

/// Call depth that fits a 2 MiB native stack in unoptimized builds.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 128;

/// Limits applied while an instance runs.
///
/// Fields missing from a JSON document keep their defaults:
///
/// ```
/// use wasmtree::runtime::config::{Config, DEFAULT_MAX_CALL_DEPTH};
///
/// let config = Config::from_json(r#"{ "instruction_budget": 1000 }"#).unwrap();
/// assert_eq!(config.instruction_budget, Some(1000));
/// assert_eq!(config.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum nesting of active calls. Every wasm call also recurses on the
    /// native stack, so raising this well past the default needs a thread
    /// with a larger stack than the 2 MiB Rust gives spawned threads.
    pub max_call_depth: usize,
    /// Operand stack size limit in bytes, unbounded when `None`.
    pub max_stack_bytes: Option<usize>,
    /// Number of instructions an instance may execute, unbounded when `None`.
    /// Each executed instruction node costs one unit.
    pub instruction_budget: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_stack_bytes: None,
            instruction_budget: None,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_max_stack_bytes(mut self, bytes: usize) -> Self {
        self.max_stack_bytes = Some(bytes);
        self
    }

    pub fn with_instruction_budget(mut self, budget: u64) -> Self {
        self.instruction_budget = Some(budget);
        self
    }
}

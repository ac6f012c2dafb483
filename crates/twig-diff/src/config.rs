use serde::{Deserialize, Serialize};

/// Default number of unchanged lines shown around each change.
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Tunables for text diffs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Context lines kept before and after each change.
    pub context_lines: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }
}

use serde::{Deserialize, Serialize};

/// Which halves of the mutability model are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutabilityMode {
    #[default]
    Combined,
    MutabilityOnly,
    AssignabilityOnly,
}

impl MutabilityMode {
    pub fn checks_mutability(self) -> bool {
        !matches!(self, MutabilityMode::AssignabilityOnly)
    }

    pub fn checks_assignability(self) -> bool {
        !matches!(self, MutabilityMode::MutabilityOnly)
    }
}

/// Per-compilation switches. Fixed once evaluation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Let protocol targets be satisfied structurally.
    pub duck_typing: bool,
    /// Allow a value type to be substituted by one of its subtypes.
    pub slicing: bool,
    pub mutability_mode: MutabilityMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            duck_typing: true,
            slicing: false,
            mutability_mode: MutabilityMode::Combined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes() {
        assert!(MutabilityMode::Combined.checks_mutability());
        assert!(MutabilityMode::Combined.checks_assignability());
        assert!(!MutabilityMode::AssignabilityOnly.checks_mutability());
        assert!(!MutabilityMode::MutabilityOnly.checks_assignability());
    }
}

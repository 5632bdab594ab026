//! Simulator configuration, loadable from JSON.

use sailfoil_mem::MemoryKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub memory: MemoryKind,
    pub trace: TraceConfig,
    pub max_call_depth: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            memory: MemoryKind::default(),
            trace: TraceConfig::default(),
            max_call_depth: 1024,
        }
    }
}

impl SimConfig {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Which trace channels are live. The generated program queries these
/// through the `get_config_print_*` externs; hooks fire only for set flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub print_instr: bool,
    pub print_reg: bool,
    pub print_mem_access: bool,
    pub print_platform: bool,
    /// Copy captured program output to stdout as it is produced.
    pub echo_output: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = SimConfig::from_json(r#"{"trace": {"print_reg": true}}"#).unwrap();
        assert_eq!(config.max_call_depth, 1024);
        assert_eq!(config.memory, MemoryKind::Sparse);
        assert!(config.trace.print_reg);
        assert!(!config.trace.print_instr);
    }

    #[test]
    fn test_flat_memory_from_json() {
        let config =
            SimConfig::from_json(r#"{"memory": {"kind": "flat", "capacity": 4096}}"#).unwrap();
        assert_eq!(config.memory, MemoryKind::Flat { capacity: 4096 });
    }
}

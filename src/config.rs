//! Embedding-application-owned configuration, replacing the global
//! `mdio_ctx`/`baset1_ops` statics of the original driver with a plain
//! struct constructed by the caller and handed to `MdioContext`/CLI
//! handlers.

use crate::target::Target;

/// Maximum number of candidate (VID, PID) pairs `baset1_vid_pid` accepts.
pub const MAX_VID_PID_PAIRS: usize = 8;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub phy_id: u8,
    pub target: Target,
    pub vid_pid_candidates: Vec<(u16, u16)>,
    /// TCP port string for the optional MDIO server; the literal value
    /// `"disabled"` suppresses the service.
    pub port: String,
    /// Whether an SRST request should also assert TRST.
    pub srst_pulls_trst: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            phy_id: 0x1a,
            target: Target::Pmu,
            vid_pid_candidates: Vec::new(),
            port: "7777".to_string(),
            srst_pulls_trst: false,
        }
    }
}

impl BridgeConfig {
    /// `baset1_speed`: the source's speed hook is a no-op; kept as an
    /// inert placeholder rather than inventing a negotiation protocol the
    /// original never specified (see DESIGN.md Open Questions).
    pub fn set_speed(&mut self, _khz: u32) {}

    /// `baset1_khz`: likewise inert; echoes back a sentinel meaning "use
    /// RCLK", matching the ambiguous `khz == 0` convention in the source.
    pub fn khz_to_jtag_speed(&self, khz: u32) -> u32 {
        khz
    }

    /// `baset1_vid_pid`: append candidate USB IDs, capped at
    /// `MAX_VID_PID_PAIRS` pairs; `open` tries each in order until one
    /// succeeds.
    pub fn add_vid_pid(&mut self, vid: u16, pid: u16) -> bool {
        if self.vid_pid_candidates.len() >= MAX_VID_PID_PAIRS {
            return false;
        }
        self.vid_pid_candidates.push((vid, pid));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_selects_phy_1a_and_pmu() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.phy_id, 0x1a);
        assert_eq!(cfg.target, Target::Pmu);
        assert_eq!(cfg.port, "7777");
    }

    #[test]
    fn vid_pid_candidates_cap_at_eight_pairs() {
        let mut cfg = BridgeConfig::default();
        for i in 0..MAX_VID_PID_PAIRS {
            assert!(cfg.add_vid_pid(i as u16, i as u16));
        }
        assert!(!cfg.add_vid_pid(0x9999, 0x9999));
        assert_eq!(cfg.vid_pid_candidates.len(), MAX_VID_PID_PAIRS);
    }
}

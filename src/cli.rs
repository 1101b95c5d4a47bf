//! Config-time command handlers (§6 CLI surface). Each takes already
//! tokenized string arguments and returns the formatted reply line; the
//! line-tokenizing dispatcher (matching a command name to a handler,
//! rendering help) is the external CLI/config framework named out of
//! scope in §1.

use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::mdio::{slow, MdioContext};
use crate::target::Target;
use crate::transport::MpsseTransport;

fn parse_hex_u8(s: &str, command: &'static str) -> Result<u8> {
    u8::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|_| Error::CliSyntax { command })
}

fn parse_hex_u16(s: &str, command: &'static str) -> Result<u16> {
    u16::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|_| Error::CliSyntax { command })
}

/// Open the MDIO context, trying each configured VID/PID candidate.
/// Idempotent: `MdioContext::open` already no-ops when running.
pub fn preinit<T: MpsseTransport>(ctx: &mut MdioContext<T>) -> Result<String> {
    ctx.open()?;
    Ok("preinit done".to_string())
}

pub fn mdio_read<T: MpsseTransport>(ctx: &mut MdioContext<T>, args: &[&str]) -> Result<String> {
    let [phy, dev, reg] = args else {
        return Err(Error::CliSyntax {
            command: "mdio_read",
        });
    };
    let phy = parse_hex_u8(phy, "mdio_read")?;
    let dev = parse_hex_u8(dev, "mdio_read")?;
    let reg = parse_hex_u16(reg, "mdio_read")?;
    let saved_phy = ctx.phy_id;
    ctx.phy_id = phy;
    let val = slow::mdio_read(ctx, dev, reg);
    ctx.phy_id = saved_phy;
    Ok(format!("0x{:04x}", val?))
}

pub fn mdio_write<T: MpsseTransport>(ctx: &mut MdioContext<T>, args: &[&str]) -> Result<String> {
    let [phy, dev, reg, val] = args else {
        return Err(Error::CliSyntax {
            command: "mdio_write",
        });
    };
    let phy = parse_hex_u8(phy, "mdio_write")?;
    let dev = parse_hex_u8(dev, "mdio_write")?;
    let reg = parse_hex_u16(reg, "mdio_write")?;
    let val = parse_hex_u16(val, "mdio_write")?;
    let saved_phy = ctx.phy_id;
    ctx.phy_id = phy;
    let result = slow::mdio_write(ctx, dev, reg, val);
    ctx.phy_id = saved_phy;
    result?;
    Ok("Done".to_string())
}

pub fn baset1_target_phy_id(cfg: &mut BridgeConfig, args: &[&str]) -> Result<String> {
    let [phy_id] = args else {
        return Err(Error::CliSyntax {
            command: "baset1_target_phy_id",
        });
    };
    cfg.phy_id = parse_hex_u8(phy_id, "baset1_target_phy_id")?;
    Ok(format!("target PHY id set to 0x{:02x}", cfg.phy_id))
}

pub fn baset1_target_pmu(cfg: &mut BridgeConfig) -> String {
    cfg.target = Target::Pmu;
    "target set to PMU".to_string()
}

pub fn baset1_target_mcu(cfg: &mut BridgeConfig) -> String {
    cfg.target = Target::Mcu;
    "target set to MCU".to_string()
}

pub fn baset1_vid_pid(cfg: &mut BridgeConfig, args: &[&str]) -> Result<String> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(Error::CliSyntax {
            command: "baset1_vid_pid",
        });
    }
    let mut added = 0;
    for pair in args.chunks(2) {
        let vid = parse_hex_u16(pair[0], "baset1_vid_pid")?;
        let pid = parse_hex_u16(pair[1], "baset1_vid_pid")?;
        if !cfg.add_vid_pid(vid, pid) {
            log::warn!("baset1_vid_pid: dropping candidate beyond capacity");
            break;
        }
        added += 1;
    }
    Ok(format!("{added} VID/PID pair(s) registered"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn new_ctx() -> MdioContext<MockTransport> {
        let mut ctx = MdioContext::init(MockTransport::new(), 0x1a);
        ctx.open().unwrap();
        ctx
    }

    #[test]
    fn mdio_read_requires_three_args() {
        let mut ctx = new_ctx();
        let err = mdio_read(&mut ctx, &["1a", "1f"]).unwrap_err();
        assert!(matches!(err, Error::CliSyntax { .. }));
    }

    #[test]
    fn mdio_write_then_read_round_trips() {
        let mut ctx = new_ctx();
        ctx.transport_mut().echo = vec![0xbe, 0xef];
        let reply = mdio_write(&mut ctx, &["1a", "1f", "10", "beef"]).unwrap();
        assert_eq!(reply, "Done");
        let got = mdio_read(&mut ctx, &["1a", "1f", "10"]).unwrap();
        assert_eq!(got, "0xbeef");
    }

    #[test]
    fn target_pmu_and_mcu_switch_selector() {
        let mut cfg = BridgeConfig::default();
        assert_eq!(baset1_target_mcu(&mut cfg), "target set to MCU");
        assert_eq!(cfg.target, Target::Mcu);
        assert_eq!(baset1_target_pmu(&mut cfg), "target set to PMU");
        assert_eq!(cfg.target, Target::Pmu);
    }

    #[test]
    fn vid_pid_rejects_odd_argument_count() {
        let mut cfg = BridgeConfig::default();
        let err = baset1_vid_pid(&mut cfg, &["0403"]).unwrap_err();
        assert!(matches!(err, Error::CliSyntax { .. }));
    }
}

//! JTAG-level types: the command/scan-field model the executor consumes
//! (§3.1) and the bit driver that turns single TCK edges into fast MDIO
//! ops against the JTAG bridge register.

pub mod executor;

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;
use crate::mdio::{fast, MdioContext};
use crate::tap::TapState;
use crate::target::Target;
use crate::transport::MpsseTransport;

/// One decomposed debugger primitive. One-to-one with the riscv-openocd
/// `jtag_command` union this driver used to consume through an external
/// queue; here it is a plain enum the caller builds directly.
#[derive(Debug, Clone)]
pub enum JtagCommand {
    Reset { trst: bool, srst: bool },
    RunTest { cycles: u32, end_state: TapState },
    StateMove { end_state: TapState },
    PathMove { path: Vec<TapState> },
    Scan {
        ir_scan: bool,
        fields: Vec<ScanField>,
        end_state: TapState,
    },
    Sleep { micros: u32 },
    StableClocks { cycles: u32 },
    Tms { bits: Vec<bool> },
}

/// One field of a SCAN command. `in_value` uses `RefCell` so the executor
/// can scatter captured bits back into a field the caller still holds a
/// reference to (the command list is borrowed, not consumed, during
/// `execute_queue`). Bit order is LSB-first within each byte.
#[derive(Debug, Clone)]
pub struct ScanField {
    pub num_bits: usize,
    pub out_value: Option<Vec<u8>>,
    pub in_value: Option<Rc<RefCell<Vec<u8>>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanKind {
    Out,
    In,
    Io,
}

impl ScanField {
    pub(crate) fn kind(&self) -> Option<ScanKind> {
        match (self.out_value.is_some(), self.in_value.is_some()) {
            (true, true) => Some(ScanKind::Io),
            (true, false) => Some(ScanKind::Out),
            (false, true) => Some(ScanKind::In),
            (false, false) => None,
        }
    }
}

/// Shadow of the 16-bit JTAG bridge register plus the bit-level operations
/// the executor composes commands out of. Preserves bits outside the
/// selected target's nibble across every write.
pub struct JtagBitDriver {
    jtag_reg: u16,
    target: Target,
}

impl JtagBitDriver {
    pub fn new(target: Target) -> Self {
        Self {
            jtag_reg: 0,
            target,
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Drive one TCK edge carrying `(tck, tms, tdi)` for the selected
    /// target, enqueuing a fast MDIO write of the updated shadow register.
    pub fn write<T: MpsseTransport>(
        &mut self,
        ctx: &mut MdioContext<T>,
        tck: bool,
        tms: bool,
        tdi: bool,
    ) -> Result<()> {
        let t = self.target;
        set_bit(&mut self.jtag_reg, t.tdi_mask(), tdi);
        set_bit(&mut self.jtag_reg, t.tck_mask(), tck);
        set_bit(&mut self.jtag_reg, t.tms_mask(), tms);
        fast::fast_add(ctx, crate::frame::MdioMode::Write, self.jtag_reg)?;
        Ok(())
    }

    /// Enqueue a fast MDIO read of the bridge register; returns the slot
    /// index the caller must pass to `read_tdo_at` after the batch flushes.
    pub fn read<T: MpsseTransport>(&mut self, ctx: &mut MdioContext<T>) -> Result<u16> {
        fast::fast_add(ctx, crate::frame::MdioMode::Read, 0xffff)
    }

    /// Resolve a previously queued `read()` into a TDO bit, once the batch
    /// containing it has been flushed.
    pub fn read_tdo_at<T: MpsseTransport>(&self, ctx: &MdioContext<T>, slot_index: u16) -> Result<bool> {
        let reg = fast::fast_fetch(ctx, slot_index)?;
        Ok(reg & self.target.tdo_mask() != 0)
    }

    /// Set or clear TRST for the selected target; SRST has no wiring on
    /// this bridge and is ignored with a warning.
    pub fn reset<T: MpsseTransport>(&mut self, ctx: &mut MdioContext<T>, trst: bool, srst: bool) -> Result<()> {
        if srst {
            log::warn!("SRST requested but this bridge has no SRST line; ignoring");
        }
        let t = self.target;
        set_bit(&mut self.jtag_reg, t.trst_mask(), trst);
        fast::fast_add(ctx, crate::frame::MdioMode::Write, self.jtag_reg)?;
        Ok(())
    }
}

fn set_bit(reg: &mut u16, mask: u16, set: bool) {
    if set {
        *reg |= mask;
    } else {
        *reg &= !mask;
    }
}

/// Thin adapter exposing `JtagBitDriver` as a one-bit-at-a-time port, for
/// embedders that drive JTAG directly rather than through `JtagCommand`
/// batches (the bit-bang interface object named in §6).
pub struct BitBangPort<'a, T: MpsseTransport> {
    driver: &'a mut JtagBitDriver,
    ctx: &'a mut MdioContext<T>,
}

impl<'a, T: MpsseTransport> BitBangPort<'a, T> {
    pub fn new(driver: &'a mut JtagBitDriver, ctx: &'a mut MdioContext<T>) -> Self {
        Self { driver, ctx }
    }

    pub fn write(&mut self, tck: bool, tms: bool, tdi: bool) -> Result<()> {
        self.driver.write(self.ctx, tck, tms, tdi)
    }

    pub fn read(&mut self) -> Result<bool> {
        fast::fast_clean(self.ctx);
        let slot = self.driver.read(self.ctx)?;
        fast::fast_flush(self.ctx)?;
        self.driver.read_tdo_at(self.ctx, slot)
    }

    pub fn reset(&mut self, trst: bool, srst: bool) -> Result<()> {
        fast::fast_clean(self.ctx);
        self.driver.reset(self.ctx, trst, srst)?;
        fast::fast_flush(self.ctx)
    }
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
    fn write_preserves_bits_outside_target_nibble() {
        let mut ctx = new_ctx();
        let mut driver = JtagBitDriver::new(Target::Mcu);
        driver.jtag_reg = 0xff00; // PMU half pre-set
        driver.write(&mut ctx, true, false, true).unwrap();
        // MCU tck|tdi = (1<<3)|(1<<1) = 0x0A; PMU half untouched
        assert_eq!(driver.jtag_reg, 0xff0a);
    }

    #[test]
    fn mcu_write_matches_concrete_scenario_4() {
        let mut ctx = new_ctx();
        let mut driver = JtagBitDriver::new(Target::Mcu);
        driver.write(&mut ctx, true, false, true).unwrap();
        assert_eq!(driver.jtag_reg, 0x000a);
    }

    #[test]
    fn reset_sets_trst_for_pmu() {
        let mut ctx = new_ctx();
        let mut driver = JtagBitDriver::new(Target::Pmu);
        driver.reset(&mut ctx, true, true).unwrap();
        assert_eq!(driver.jtag_reg, 0x1000);
    }
}

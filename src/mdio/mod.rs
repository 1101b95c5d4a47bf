//! Owning context for an MDIO master: the MPSSE transport, the slow and
//! fast frame buffers, and the fast-queue bookkeeping. Both the slow and
//! fast paths (`slow`, `fast` submodules) operate on the buffers owned
//! here; this module is just lifecycle plus layout.

pub mod fast;
pub mod slow;

use crate::error::Result;
use crate::transport::MpsseTransport;

/// Number of pre-built fast-mode slots the batch buffer holds.
pub const FAST_COMMAND_NUM: u16 = 4096;

/// The JTAG bridge register this driver tunnels through: device type and
/// register address inside the PHY's Clause-45 address space.
pub const MDIO_JTAG_DEV: u8 = 0x1f;
pub const MDIO_JTAG_REG: u16 = 0x10;

/// PHY register that controls preamble length; clearing its low 6 bits and
/// setting bit 2 switches the PHY into fast (8-bit preamble) mode.
const PREAMBLE_CONTROL_DEV: u8 = 0x1d;
const PREAMBLE_CONTROL_REG: u16 = 0x0020;

/// Generic over the transport, like the teacher's `Mpsse<T>`/`JtagSM<T>`:
/// production code instantiates `MdioContext<FtdiTransport>`, tests
/// instantiate `MdioContext<MockTransport>`.
pub struct MdioContext<T: MpsseTransport> {
    transport: T,
    running: bool,
    fast_mode_en: bool,

    pub(crate) phy_id: u8,

    // Slow path: preamble(4) | address(4) | preamble(4) | value(4) = 16 bytes.
    pub(crate) soutput: [u8; 16],
    pub(crate) sinput: [u8; 16],

    // Fast path: FAST_COMMAND_NUM pre-built 10-byte slots.
    pub(crate) foutput: Vec<u8>,
    pub(crate) finput: Vec<u8>,
    pub(crate) findex: u16,
    pub(crate) ftotal: u16,
    pub(crate) fread_queue: Vec<u16>,
    pub(crate) fread_cnt: u16,
}

impl<T: MpsseTransport> MdioContext<T> {
    /// Allocate a context for `phy_id`, not yet connected to hardware.
    pub fn init(transport: T, phy_id: u8) -> Self {
        let slots = FAST_COMMAND_NUM as usize * fast::FAST_COMMAND_SIZE;
        Self {
            transport,
            running: false,
            fast_mode_en: false,
            phy_id,
            soutput: [0u8; 16],
            sinput: [0u8; 16],
            foutput: vec![0u8; slots],
            finput: vec![0u8; slots],
            findex: 0,
            ftotal: 0,
            fread_queue: vec![0u16; FAST_COMMAND_NUM as usize],
            fread_cnt: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn fast_mode_enabled(&self) -> bool {
        self.fast_mode_en
    }

    /// Open the transport and pre-populate both frame buffers. Idempotent.
    pub fn open(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }
        self.transport.open()?;
        self.running = true;

        slow::prepopulate(&mut self.soutput);
        for slot in 0..FAST_COMMAND_NUM {
            fast::prepopulate_slot(&mut self.foutput, slot, self.phy_id);
        }

        self.init_fast_mode()?;
        Ok(())
    }

    /// One-time PHY configuration write reducing the hardware-side
    /// preamble length (§4.7): read the preamble-control register, clear
    /// its low 6 bits, set bit 2, write it back.
    fn init_fast_mode(&mut self) -> Result<()> {
        let cfg = slow::mdio_read(self, PREAMBLE_CONTROL_DEV, PREAMBLE_CONTROL_REG)?;
        let new_cfg = (cfg & !0x3f) | 0x4;
        slow::mdio_write(self, PREAMBLE_CONTROL_DEV, PREAMBLE_CONTROL_REG, new_cfg)?;
        self.fast_mode_en = true;
        log::info!("fast MDIO mode enabled (preamble control {cfg:#06x} -> {new_cfg:#06x})");
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        self.transport.close()?;
        self.running = false;
        Ok(())
    }

    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: MpsseTransport> Drop for MdioContext<T> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

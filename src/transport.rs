//! Downward interface to the MPSSE shift engine.
//!
//! Generalizes the teacher crate's `cable::mpsse::Mpsse<T>` wrapper (which
//! shifts TMS/TDI/TDO bits for a JTAG cable) into a transport that shifts
//! raw MDIO bit frames instead. `FtdiTransport` is the production
//! implementation over `libftd2xx`/`ftdi-mpsse`; `MockTransport` (test-only)
//! is an in-memory echo loop used for the round-trip tests in the `mdio` and
//! `jtag` modules.

use std::time::Duration;

use ftdi_mpsse::ClockData;
use libftd2xx::{Ft2232h, Ftdi, FtdiCommon, FtdiMpsse, MpsseCmdBuilder, MpsseCmdExecutor};

use crate::error::{Error, Result};

/// One full-duplex MPSSE clock-data call: shift `bit_count` bits of
/// `out_buf` out MSB-first on the rising edge, sampling the incoming bit on
/// the falling edge, writing the received bytes into `in_buf`.
///
/// Implementations must configure the underlying engine for 3-phase
/// clocking (so writes happen on one edge and reads on the other, matching
/// the wire's transmit-on-positive/sample-on-negative contract) before the
/// first call.
pub trait MpsseTransport {
    /// Open the USB device and configure the MPSSE engine: 3-phase clocking
    /// on, adaptive clocking off, clock-divide-by-5 off, loopback off,
    /// clock divisor = 2, low-byte data/direction = 0x03/0x03.
    fn open(&mut self) -> Result<()>;

    /// Shift `bit_count` bits. `out_buf[..out_buf.len()]` is transmitted;
    /// the bits received are written into `in_buf` (caller-sized to hold
    /// `bit_count` bits, rounded up to whole bytes).
    fn clock_data(&mut self, out_buf: &[u8], in_buf: &mut [u8], bit_count: usize) -> Result<()>;

    /// Push any buffered MPSSE commands out over USB.
    fn flush(&mut self) -> Result<()>;

    /// Release the USB handle. Idempotent.
    fn close(&mut self) -> Result<()>;
}

/// Clock frequency handed to `FtdiMpsse::set_clock`. On an FT2232H's 60 MHz
/// high-speed clock source, `freq = 60e6 / ((1 + divisor) * 2)`; 10 MHz is
/// divisor=2 with the /5 prescaler left off, matching §3's fixed divisor.
const CLOCK_HZ: u32 = 10_000_000;

/// Low-byte GPIO data/direction written at open: TCK and TDI driven as
/// outputs (`FTID_OUTPUT`/`FTID_DIRECTION` in the original driver).
const LOWER_PINS_VALUE: u8 = 0x03;
const LOWER_PINS_DIRECTION: u8 = 0x03;

/// Production transport: one physical FTDI MPSSE adapter, opened by VID/PID.
///
/// Mirrors the teacher's `Mpsse<T>` in shape (owns the device handle, built
/// on the same `libftd2xx`/`ftdi-mpsse` stack) but speaks raw MDIO byte
/// frames rather than JTAG TMS/TDI/TDO semantics — the `mdio` layer above it
/// owns the meaning of the bits. Unlike `Mpsse<T>`'s buffered command queue,
/// every `clock_data` call here is one synchronous full-duplex USB transfer,
/// since the fast-mode batch buffer already amortizes the USB round trip
/// cost at the layer above.
pub struct FtdiTransport {
    vid_pid_candidates: Vec<(u16, u16)>,
    ft: Option<Ft2232h>,
}

impl FtdiTransport {
    pub fn new(vid_pid_candidates: Vec<(u16, u16)>) -> Self {
        Self {
            vid_pid_candidates,
            ft: None,
        }
    }
}

impl MpsseTransport for FtdiTransport {
    fn open(&mut self) -> Result<()> {
        if self.ft.is_some() {
            return Ok(());
        }
        if self.vid_pid_candidates.is_empty() {
            log::error!("no candidate VID/PID pairs configured");
            return Err(Error::InitFailed);
        }

        let mut chip = None;
        for (vid, pid) in &self.vid_pid_candidates {
            let device = match Ftdi::with_vid_pid(*vid, *pid) {
                Ok(d) => d,
                Err(e) => {
                    log::debug!("FTDI device {vid:#06x}:{pid:#06x} unavailable: {e:?}");
                    continue;
                }
            };
            match Ft2232h::try_from(device) {
                Ok(ft) => {
                    log::info!("opened FTDI device {vid:#06x}:{pid:#06x}");
                    chip = Some(ft);
                    break;
                }
                Err(e) => log::debug!("FTDI device {vid:#06x}:{pid:#06x} is not an FT2232H: {e:?}"),
            }
        }
        let mut ft = chip.ok_or(Error::InitFailed)?;

        ft.initialize_mpsse_default()
            .map_err(|_| Error::InitFailed)?;
        ft.set_latency_timer(Duration::from_millis(0))
            .map_err(|_| Error::InitFailed)?;
        ft.set_clock(CLOCK_HZ).map_err(|_| Error::InitFailed)?;

        let builder = MpsseCmdBuilder::new()
            .enable_3phase_data_clocking()
            .disable_adaptive_data_clocking()
            .loopback_off()
            .set_gpio_lower(LOWER_PINS_VALUE, LOWER_PINS_DIRECTION);
        ft.send(builder.as_slice()).map_err(|_| Error::InitFailed)?;
        ft.purge_all().map_err(|_| Error::InitFailed)?;

        self.ft = Some(ft);
        Ok(())
    }

    fn clock_data(&mut self, out_buf: &[u8], in_buf: &mut [u8], bit_count: usize) -> Result<()> {
        let ft = self.ft.as_mut().ok_or(Error::InitFailed)?;
        debug_assert_eq!(bit_count, out_buf.len() * 8, "all MDIO frames are byte-aligned");
        let builder = MpsseCmdBuilder::new().clock_data(ClockData::MsbPosIn, out_buf);
        ft.xfer(builder.as_slice(), in_buf)
            .map_err(|_| Error::FlushFailed)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // `clock_data` above already performs a synchronous USB transfer per
        // call; nothing is left buffered on this path. Still validates that
        // the transport is open, matching `mpsse_flush`'s failure mode.
        if self.ft.is_none() {
            return Err(Error::FlushFailed);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.ft = None;
        Ok(())
    }
}

impl Drop for FtdiTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Test-only loopback transport: echoes a caller-configured pattern back as
/// the "TDO" bits of the next `clock_data` call, modeling the pipeline
/// offset-by-one the real hardware exhibits (see `mdio::fast`).
#[cfg(test)]
pub struct MockTransport {
    pub opened: bool,
    /// Bytes "received" on the wire, in call order, concatenated.
    pub captured: Vec<u8>,
    /// What to hand back from the *next* `clock_data` call's `in_buf`.
    pub echo: Vec<u8>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self {
            opened: false,
            captured: Vec::new(),
            echo: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl MpsseTransport for MockTransport {
    fn open(&mut self) -> Result<()> {
        self.opened = true;
        Ok(())
    }

    fn clock_data(&mut self, out_buf: &[u8], in_buf: &mut [u8], _bit_count: usize) -> Result<()> {
        self.captured.extend_from_slice(out_buf);
        in_buf.fill(0);
        // Readbacks decode the *tail* of a frame, so the configured echo
        // must land at the end of `in_buf`, not the front.
        let n = self.echo.len().min(in_buf.len());
        let tail = in_buf.len() - n;
        in_buf[tail..].copy_from_slice(&self.echo[..n]);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.opened = false;
        Ok(())
    }
}

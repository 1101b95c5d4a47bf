//! Batched fast-mode MDIO path: a pre-built buffer of `FAST_COMMAND_NUM`
//! frames, each 10 bytes (a 5-byte address frame followed by a 5-byte
//! value frame — an 8-bit preamble plus a 32-bit Clause-45 half per the
//! "fast frame" layout). `fast_add` patches only the mutable tail of the
//! value frame; everything else is written once by `prepopulate_slot` and
//! never touched again.

use super::{MdioContext, FAST_COMMAND_NUM, MDIO_JTAG_DEV, MDIO_JTAG_REG};
use crate::error::{Error, Result};
use crate::frame::{self, MdioMode};
use crate::transport::MpsseTransport;

/// Size in bytes of one "fast frame" as the wire format names it: 1-byte
/// preamble + 4-byte Clause-45 half.
pub const FAST_FRAME_SIZE: usize = 5;

/// Size in bytes of one full fast-mode MDIO command: address frame
/// followed by value frame. Matches the original driver's
/// `MDIO_FAST_COMMAND_SIZE` (10 bytes), not the bare 5-byte frame size —
/// a command addresses one register (address frame) and carries one
/// value (value frame).
pub const FAST_COMMAND_SIZE: usize = FAST_FRAME_SIZE * 2;

const VALUE_HALF_OFFSET: usize = FAST_FRAME_SIZE;

/// Write a complete benign frame (JTAG bridge register, read op) into slot
/// `slot` of `foutput`. Called once per slot at `open` time; `fast_add`
/// later patches only the value half's last 4 bytes.
pub fn prepopulate_slot(foutput: &mut [u8], slot: u16, phy: u8) {
    let base = slot as usize * FAST_COMMAND_SIZE;
    let mut c = base;
    c = frame::write_preamble_fast(foutput, c);
    c = frame::write_address_frame(foutput, c, phy, MDIO_JTAG_DEV, MDIO_JTAG_REG);
    debug_assert_eq!(c, base + VALUE_HALF_OFFSET);
    c = frame::write_preamble_fast(foutput, c);
    frame::write_value_frame(foutput, c, phy, MDIO_JTAG_DEV, MdioMode::Read, 0xffff);
}

/// Enqueue one fast MDIO op against the JTAG bridge register, patching
/// only the value half of the next free slot. Returns the slot index
/// (stable until the next `fast_clean`).
pub fn fast_add<T: MpsseTransport>(ctx: &mut MdioContext<T>, mode: MdioMode, val: u16) -> Result<u16> {
    if ctx.findex >= FAST_COMMAND_NUM {
        return Err(Error::BufferFull {
            capacity: FAST_COMMAND_NUM,
        });
    }
    let slot = ctx.findex;
    let base = slot as usize * FAST_COMMAND_SIZE;
    // VALUE_HALF_OFFSET lands on the value frame's own 1-byte preamble;
    // the patchable opcode starts one byte past it.
    let value_opcode = base + VALUE_HALF_OFFSET + 1;

    frame::patch_op_nibble(&mut ctx.foutput, value_opcode, mode);
    let patched_val = if mode == MdioMode::Write { val } else { 0xffff };
    ctx.foutput[value_opcode + 2..value_opcode + 4].copy_from_slice(&patched_val.to_be_bytes());

    if mode != MdioMode::Write {
        ctx.fread_queue[ctx.fread_cnt as usize] = slot;
        ctx.fread_cnt += 1;
    }

    ctx.findex += 1;
    Ok(slot)
}

/// Shift the entire pending batch (`findex` slots) through the MPSSE
/// engine in one bulk transfer, then reset `findex` with `ftotal` holding
/// the count of valid slots for subsequent fetches.
pub fn fast_flush<T: MpsseTransport>(ctx: &mut MdioContext<T>) -> Result<()> {
    let count = ctx.findex as usize;
    let out_len = count * FAST_COMMAND_SIZE;
    let out = ctx.foutput[..out_len].to_vec();
    let mut input = vec![0u8; out_len];
    ctx.transport_mut()
        .clock_data(&out, &mut input, out_len * 8)?;
    ctx.finput[..out_len].copy_from_slice(&input);
    ctx.transport_mut().flush()?;

    ctx.ftotal = ctx.findex;
    ctx.findex = 0;
    Ok(())
}

/// Reset the batch for a new command: clears the capture count and the
/// validity of the previous batch's fetches. Must be called before
/// enqueueing a new batch.
pub fn fast_clean<T: MpsseTransport>(ctx: &mut MdioContext<T>) {
    ctx.ftotal = 0;
    ctx.fread_cnt = 0;
}

/// Fetch the TDO value captured for `slot_index` from the last flush.
///
/// The value is read from the tail of the *following* slot's received
/// bytes, not the slot's own — the 3-phase MPSSE pipeline delivers TDO
/// for transaction *k* alongside the bytes shifted during transaction
/// *k+1*. `fast_flush` therefore always shifts one extra trailing slot's
/// worth of clock (the pre-populated benign read at the next index) so
/// the last real slot's TDO has somewhere to land.
pub fn fast_fetch<T: MpsseTransport>(ctx: &MdioContext<T>, slot_index: u16) -> Result<u16> {
    if slot_index >= ctx.ftotal {
        return Err(Error::CaptureOutOfRange {
            slot: slot_index,
            total: ctx.ftotal,
        });
    }
    let read_idx = slot_index + 1;
    let frame_end = read_idx as usize * FAST_COMMAND_SIZE;
    Ok(frame::decode_value(&ctx.finput, frame_end))
}

/// Fetch the TDO value for the `read_index`-th queued read of the last batch.
pub fn fast_readback<T: MpsseTransport>(ctx: &MdioContext<T>, read_index: u16) -> Result<u16> {
    if read_index >= ctx.fread_cnt {
        return Err(Error::CaptureOutOfRange {
            slot: read_index,
            total: ctx.fread_cnt,
        });
    }
    let slot_index = ctx.fread_queue[read_index as usize];
    fast_fetch(ctx, slot_index)
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
    fn prepopulated_slots_carry_preamble_bytes() {
        let ctx = new_ctx();
        for k in 0..8u16 {
            let base = k as usize * FAST_COMMAND_SIZE;
            assert_eq!(ctx.foutput[base], 0xff);
            assert_eq!(ctx.foutput[base + VALUE_HALF_OFFSET], 0xff);
        }
    }

    #[test]
    fn fast_add_preserves_preamble_and_address_bytes() {
        let mut ctx = new_ctx();
        let before = ctx.foutput[..FAST_COMMAND_SIZE].to_vec();
        fast_add(&mut ctx, MdioMode::Write, 0x000a).unwrap();
        let after = &ctx.foutput[..FAST_COMMAND_SIZE];
        let value_opcode = VALUE_HALF_OFFSET + 1;
        assert_eq!(&before[..value_opcode], &after[..value_opcode]);
        assert_eq!(after[value_opcode] & 0xf0, 0x10);
        assert_eq!(&after[value_opcode + 2..FAST_COMMAND_SIZE], &[0x00, 0x0a]);
    }

    #[test]
    fn write_only_batch_enqueues_no_reads() {
        let mut ctx = new_ctx();
        fast_clean(&mut ctx);
        fast_add(&mut ctx, MdioMode::Write, 1).unwrap();
        fast_add(&mut ctx, MdioMode::Write, 2).unwrap();
        assert_eq!(ctx.fread_cnt, 0);
    }

    #[test]
    fn buffer_full_rejects_beyond_capacity() {
        let mut ctx = new_ctx();
        ctx.findex = FAST_COMMAND_NUM;
        let err = fast_add(&mut ctx, MdioMode::Write, 0).unwrap_err();
        assert!(matches!(err, Error::BufferFull { .. }));
    }

    #[test]
    fn fetch_reads_tail_of_following_slot() {
        let mut ctx = new_ctx();
        fast_clean(&mut ctx);
        let slot = fast_add(&mut ctx, MdioMode::Read, 0xffff).unwrap();
        fast_add(&mut ctx, MdioMode::Read, 0xffff).unwrap(); // pipeline filler

        // Fabricate what finput would contain after a real flush: the
        // TDO for `slot` lands in the value tail of slot+1.
        let read_idx = slot + 1;
        let off = read_idx as usize * FAST_COMMAND_SIZE;
        ctx.finput[off - 2..off].copy_from_slice(&[0x12, 0x34]);
        ctx.ftotal = 2;

        assert_eq!(fast_fetch(&ctx, slot).unwrap(), 0x1234);
    }

    #[test]
    fn fetch_out_of_range_is_an_error() {
        let ctx = new_ctx();
        let err = fast_fetch(&ctx, 5).unwrap_err();
        assert!(matches!(err, Error::CaptureOutOfRange { .. }));
    }
}

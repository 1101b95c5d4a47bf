//! Error taxonomy for the bridge (init, batching, TAP walking, CLI, server).
use crate::tap::TapState;

/// Errors surfaced by the MDIO framer, the fast-queue batcher, the JTAG
/// executor, the CLI handlers, and the MDIO line-protocol server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No matching USB device was found, or the MPSSE subsystem refused
    /// configuration. The driver remains unopened.
    #[error("failed to initialize MDIO/MPSSE transport")]
    InitFailed,

    /// `fast_add` or `fast_fetch` was asked to go beyond the fixed-size
    /// batch buffer. Fatal for the current command.
    #[error("fast MDIO queue buffer is full (capacity {capacity})")]
    BufferFull { capacity: u16 },

    /// The MPSSE shift/flush call failed partway through a batch.
    #[error("MPSSE flush failed")]
    FlushFailed,

    /// PATHMOVE named a state that isn't reachable from the current state
    /// by a single TMS edge. This is a caller bug, not a hardware fault.
    #[error("no single-bit TAP transition from {from:?} to {to:?}")]
    InvalidTapTransition { from: TapState, to: TapState },

    /// A CLI command was invoked with the wrong number/shape of arguments.
    #[error("syntax error in `{command}`")]
    CliSyntax { command: &'static str },

    /// A queued readback index fell outside the captured batch.
    #[error("readback slot {slot} out of range (ftotal={total})")]
    CaptureOutOfRange { slot: u16, total: u16 },

    /// The MDIO line-protocol server received an unparsable request.
    #[error("malformed MDIO server request: {0}")]
    ServerProtocol(&'static str),
}

pub type Result<T> = core::result::Result<T, Error>;

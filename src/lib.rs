//! A JTAG adapter driver that tunnels JTAG signaling through an Ethernet
//! PHY's Clause-45 MDIO register window, using an FTDI MPSSE USB
//! controller as the physical MDIO master.
//!
//! A JTAG debugger issues standard commands (reset, state moves, scans,
//! run-test, sleep, TMS sequences); [`jtag::executor::JtagExecutor`]
//! translates each into MDIO transactions against a vendor-defined JTAG
//! bridge register inside the target PHY and reports TDO back.
//!
//! # Example
//! ```no_run
//! use baset1_mdio_jtag::config::BridgeConfig;
//! use baset1_mdio_jtag::jtag::{executor::JtagExecutor, JtagBitDriver, JtagCommand};
//! use baset1_mdio_jtag::mdio::MdioContext;
//! use baset1_mdio_jtag::tap::TapState;
//! use baset1_mdio_jtag::transport::FtdiTransport;
//!
//! let cfg = BridgeConfig::default();
//! let transport = FtdiTransport::new(cfg.vid_pid_candidates.clone());
//! let mut ctx = MdioContext::init(transport, cfg.phy_id);
//! ctx.open()?;
//!
//! let mut exec = JtagExecutor::new(ctx, JtagBitDriver::new(cfg.target), cfg.srst_pulls_trst);
//! exec.execute_queue(&[
//!     JtagCommand::Reset { trst: true, srst: false },
//!     JtagCommand::StateMove { end_state: TapState::RunTestIdle },
//! ])?;
//! # Ok::<(), baset1_mdio_jtag::error::Error>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod frame;
pub mod jtag;
pub mod mdio;
pub mod server;
pub mod tap;
pub mod target;
pub mod transport;

pub use error::Error;

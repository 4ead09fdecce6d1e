//! rlvpn library
//!
//! Install and reconfiguration orchestrator for a Tor-first Bitcoin Core and
//! LND node on Debian. The binary is a thin shell over these modules.

pub mod cli;
pub mod emit;
pub mod engine;
pub mod error;
pub mod host;
pub mod layout;
pub mod network;
pub mod plans;
pub mod process_guard;
pub mod runner;
pub mod sanity;
pub mod state;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod theme;
pub mod trust;
pub mod ui;
pub mod version;

// Re-export main types for convenience
pub use engine::{Progress, ProgressBoard, Reporter, Step, StepStatus};
pub use error::{ErrorKind, IntegrityError, NodeError, Result, TrustError};
pub use host::Host;
pub use layout::Layout;
pub use network::{Network, NetworkConfig};
pub use plans::{Plan, PlanKind, execute};
pub use process_guard::{CancelToken, ChildRegistry, ProcessGuard};
pub use runner::{Capture, CommandOutput, CommandSpec, Exec, Runner, SystemExec};
pub use state::{AppConfig, Components, P2pMode, StateStore};

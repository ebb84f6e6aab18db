pub mod capability;
pub mod config;
pub mod error;
pub mod ledger;
pub mod mux;
pub mod raft;
pub mod router;
pub mod scheduler;
pub mod session;
pub mod supervision;
pub mod wire;

pub use config::{ConfigError, FsyncMode, KernelConfig};
pub use error::{KernelError, Result};

//! Background task manager: launches commands detached from the caller and
//! tracks them through a per-task directory and a shared manifest.

pub mod cli;
pub mod config;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod ops;
pub mod process;
pub mod runner;
pub mod status;
pub mod store;
pub mod table;

pub use config::BgTaskConfig;
pub use error::TaskError;
pub use launcher::StartRequest;
pub use store::TaskStore;

//! `etalab-pinn` - client for the PINN benchmark training server
//!
//! The server owns configuration, meshes, runs and the training process;
//! this crate only consumes its REST endpoints and the `ws/logs` stream.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod logs;
pub mod model;

pub use client::{api_failure, validate_run_id, DashboardClient};
pub use error::{Error, Result};
pub use logs::{LogConsole, LogEvent, LogStream, TrainingSession};
pub use model::{
    format_mae, BenchmarkConfig, DocId, Documentation, MeshKind, MeshUploaded, Metrics,
    RunDetails, RunSummary, ServiceInfo, StatusMessage, TrainingStarted,
};

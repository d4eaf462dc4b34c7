//! Switchboard Core - shared functionality for the Switchboard gateway
//!
//! An agent-facing gateway that routes consolidated tool calls onto
//! interchangeable execution backends. This crate holds everything the
//! dispatcher and the adapters agree on: the error taxonomy, the normalized
//! result shape, call deadlines, backend records and the capability traits.

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod records;
pub mod result;

pub use backend::{
    Backends, CommandSpec, ContainerOrchestrator, PackageManager, ProcessExecutor, ProcessOutput,
    VersionControl, Workspace,
};
pub use config::{ConfigError, GatewayConfig, Transport};
pub use context::CallContext;
pub use error::{ErrorClass, ErrorKind, GateError, Result};
pub use result::{normalize, ErrorBody, OperationResult};

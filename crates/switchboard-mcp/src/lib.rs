//! Switchboard MCP Server
//!
//! Exposes the gateway's consolidated tools to AI assistants via the Model
//! Context Protocol. Each tool takes an `action` argument; the dispatcher
//! validates it, routes it onto the backend interfaces and returns one
//! normalized result shape.

pub mod actions;
pub mod args;
mod composite;
pub mod config_io;
pub mod devops;
pub mod dispatch;
pub mod protocol;
pub mod server;
pub mod tools;

pub use dispatch::Dispatcher;
pub use server::McpServer;

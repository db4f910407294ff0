//! # pvegate Hub
//!
//! The API gateway: request dispatcher, error classifier, health metric
//! calculator, the guest tools built on them, and a stdio JSON-RPC server
//! that exposes the tools to an agent.

pub mod classify;
pub mod client;
pub mod gateway;
pub mod health;
pub mod server;
pub mod tools;

pub use gateway::Gateway;
pub use server::McpServer;

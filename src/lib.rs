//! ERD Schema Bridge Library
//!
//! Schema introspection and data browsing for PostgreSQL, MySQL and Oracle,
//! exposed to AI assistants as MCP (Model Context Protocol) tools.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{DbError, DbResult};
pub use mcp::{BridgeContext, BridgeService};

//! Switchboard: agent assembly over MCP tool servers.
//!
//! This crate configures a routing agent and its sub-agents, launches the
//! stdio tool servers that back them, and guarantees that every server it
//! starts is shut down again, including when assembly fails partway.
//!
//! # Architecture
//!
//! Switchboard follows hexagonal architecture principles:
//!
//! - **Domain**: Pure values with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for tool servers
//! - **Adapters**: Concrete implementations of ports (stdio subprocesses,
//!   in-memory test doubles)
//!
//! # Modules
//!
//! - [`tool_connection`]: Tool server launch, handshake and shutdown
//! - [`agent`]: Agent configuration and assembly
//! - [`config`]: TOML application configuration

pub mod agent;
pub mod config;
pub mod tool_connection;

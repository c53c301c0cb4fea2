//! Tool-server connection lifecycle for Switchboard.
//!
//! This module launches MCP tool servers as subprocesses, exposes the tools
//! each one advertises, and guarantees orderly shutdown of every subprocess
//! however the owning agent assembly ends. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

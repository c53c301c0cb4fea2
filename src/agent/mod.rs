//! Agent configuration and assembly.
//!
//! An agent tree is a routing agent with sub-agents, each of which owns the
//! tools of one MCP server. The domain module holds the validated
//! configuration values handed to the agent runtime; the services module
//! launches tool servers and builds the tree, rolling back every connection
//! it opened when any step fails.

pub mod domain;
pub mod services;

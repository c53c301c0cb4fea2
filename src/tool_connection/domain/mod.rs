//! Domain model for tool-server connections.
//!
//! The domain covers launch specifications, connection identity and
//! lifecycle state, and the validated tool metadata a server advertises
//! during its handshake. Process and wire concerns remain outside this
//! boundary.

mod call;
mod error;
mod ids;
mod info;
mod launch;
mod state;
mod tool;

pub use call::{ToolCallOutcome, ToolContent};
pub use error::{ParseConnectionStateError, ToolConnectionDomainError};
pub use ids::{ConnectionId, ServerName};
pub use info::ConnectionInfo;
pub use launch::ServerLaunchSpec;
pub use state::{ConnectionLifecycle, ConnectionState};
pub use tool::{ToolCatalog, ToolDescriptor};

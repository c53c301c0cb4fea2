//! Application services for tool connection lifecycle management.

mod lifecycle_stack;

pub use lifecycle_stack::{CloseFailure, LifecycleStack, LifecycleStackError, ShutdownError};

//! Shared building blocks for the subproxy workspace.
//!
//! ## Architecture
//!
//! - **common** (this crate): Plain types shared by every layer
//! - **subproxy-core**: Proxy protocol, worker dispatch and process lifecycle
//! - **subproxy-host**: Worker host application and sample targets
//!
//! Nothing in here knows about processes or channels.

pub mod error;

pub use error::error_location::ErrorLocation;

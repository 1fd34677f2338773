//! # aether-common
//!
//! Shared types for the aether reconciler.
//!
//! This crate provides functionality used by the network primitives and
//! the command-line front end:
//! - Validated interface and namespace names
//! - Standard filesystem paths for named network namespaces
//! - The common error taxonomy

#![warn(missing_docs)]

pub mod error;
pub mod name;
pub mod paths;

pub use error::{AetherError, AetherResult};
pub use name::{IfName, NetnsName};
pub use paths::NetnsPaths;

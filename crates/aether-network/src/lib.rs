//! # aether-network
//!
//! Network namespace and veth primitives for the aether reconciler.
//!
//! Every link operation goes through a handle bound to an explicit
//! namespace. The calling thread's ambient namespace is never relied on.

#![warn(missing_docs)]

pub mod activate;
pub mod backend;
pub mod handle;
pub mod kernel;
pub mod link;
pub mod netns;
pub mod reconcile;
pub mod veth;

#[cfg(test)]
mod memory;

pub use backend::{Link, LinkHandle, NetnsBackend, OperState, Resolution};
pub use kernel::KernelBackend;
pub use netns::{NetnsRef, NetnsResolver, ThreadNetnsGuard};
pub use reconcile::{ReconcileReport, Reconciler, Topology};
pub use veth::{VethOutcome, VethPair};

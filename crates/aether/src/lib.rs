//! # aether
//!
//! Idempotent reconciler for a network namespace holding one end of a veth
//! pair, the other end staying on the host, both ends up.
//!
//! ## Usage
//!
//! ```no_run
//! use aether_network::{KernelBackend, Reconciler, Topology};
//!
//! # async fn example() -> aether_common::AetherResult<()> {
//! let reconciler = Reconciler::new(KernelBackend::default(), Topology::default());
//!
//! // Safe to run any number of times
//! let report = reconciler.run().await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cli;

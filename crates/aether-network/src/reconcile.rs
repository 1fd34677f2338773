//! Namespace and veth topology reconciliation.
//!
//! A run goes through four stages, each a precondition for the next:
//!
//! 1. capture the host namespace and open a handle bound to it
//! 2. resolve the target namespace, creating it if absent
//! 3. open a handle bound to the target namespace
//! 4. reconcile the veth pair, then bring both ends up
//!
//! The first failure ends the run. Nothing already applied is rolled back.

use std::fmt;

use aether_common::{AetherError, AetherResult, IfName, NetnsName};

use crate::activate::{Activation, PairActivation, activate_pair};
use crate::backend::{LinkHandle, NetnsBackend, Resolution};
use crate::handle::{Handles, HostCapture};
use crate::veth::{VethOutcome, VethPair};

/// Default target namespace name.
pub const DEFAULT_NAMESPACE: &str = "aether-ns";
/// Default host-side interface name.
pub const DEFAULT_HOST_IF: &str = "veth-host";
/// Default namespace-side interface name.
pub const DEFAULT_PEER_IF: &str = "veth-ns";

/// The desired topology: one namespace holding one end of one veth pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// Target namespace.
    pub namespace: NetnsName,
    /// Veth pair to split between host and namespace.
    pub veth: VethPair,
}

impl Topology {
    /// Build a topology from raw names.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is invalid or both ends share a name.
    pub fn new(namespace: &str, host_if: &str, peer_if: &str) -> AetherResult<Self> {
        Ok(Self {
            namespace: NetnsName::new(namespace)?,
            veth: VethPair::new(IfName::new(host_if)?, IfName::new(peer_if)?)?,
        })
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            namespace: NetnsName::new_unchecked(DEFAULT_NAMESPACE),
            veth: VethPair {
                host: IfName::new_unchecked(DEFAULT_HOST_IF),
                peer: IfName::new_unchecked(DEFAULT_PEER_IF),
            },
        }
    }
}

/// What a reconciliation run found and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// The topology that was reconciled.
    pub topology: Topology,
    /// Whether the namespace was found or created.
    pub namespace: Resolution,
    /// Whether the pair was found or created.
    pub veth: VethOutcome,
    /// Activation of both ends.
    pub activation: PairActivation,
}

impl ReconcileReport {
    /// Whether the run changed any kernel state.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.namespace == Resolution::Created
            || self.veth == VethOutcome::Created
            || self.activation.changed()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = &self.topology.namespace;
        let pair = &self.topology.veth;

        match self.namespace {
            Resolution::Found => writeln!(f, "Namespace '{ns}' already exists.")?,
            Resolution::Created => writeln!(f, "Namespace '{ns}' created.")?,
        }
        match self.veth {
            VethOutcome::AlreadyPresent => {
                writeln!(f, "{} already exists on host, {} is in {ns}.", pair.host, pair.peer)?;
            }
            VethOutcome::Created => {
                writeln!(f, "veth pair created and {} moved to {ns}.", pair.peer)?;
            }
        }
        for (name, state) in [
            (&pair.peer, self.activation.peer),
            (&pair.host, self.activation.host),
        ] {
            match state {
                Activation::BroughtUp => writeln!(f, "{name} brought up.")?,
                Activation::AlreadyUp => writeln!(f, "{name} already up.")?,
            }
        }
        if !self.changed() {
            writeln!(f, "Already converged, nothing changed.")?;
        }
        write!(f, "--- Network Infrastructure Synchronized ---")
    }
}

/// Drives a [`NetnsBackend`] towards a [`Topology`].
#[derive(Debug, Clone)]
pub struct Reconciler<B> {
    backend: B,
    topology: Topology,
}

impl<B: NetnsBackend> Reconciler<B> {
    /// Create a reconciler.
    pub const fn new(backend: B, topology: Topology) -> Self {
        Self { backend, topology }
    }

    /// Get the target topology.
    #[must_use]
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Run one reconciliation pass.
    ///
    /// Running it again against a converged system issues no mutating call.
    ///
    /// # Errors
    ///
    /// Returns the first failure. [`AetherError::InconsistentState`] means
    /// the host end exists without its peer in the namespace, and
    /// [`AetherError::StrayPeer`] that the peer name is taken while the host
    /// end is missing.
    pub async fn run(&self) -> AetherResult<ReconcileReport> {
        let _pin = self.backend.pin()?;

        let host = HostCapture::capture(&self.backend)?;
        let (target_ns, namespace) = self.resolve_namespace()?;
        let handles = host.bind_target(&self.backend, target_ns)?;

        let veth = self.topology.veth.reconcile(&handles).await?;
        let activation = activate_pair(&self.topology.veth, &handles).await?;

        Ok(ReconcileReport {
            topology: self.topology.clone(),
            namespace,
            veth,
            activation,
        })
    }

    fn resolve_namespace(&self) -> AetherResult<(B::Namespace, Resolution)> {
        let name = &self.topology.namespace;
        let (ns, resolution) = self.backend.resolve_or_create(name)?;
        match resolution {
            Resolution::Found => tracing::info!(namespace = %name, "Namespace already exists"),
            Resolution::Created => tracing::info!(namespace = %name, "Namespace created"),
        }
        Ok((ns, resolution))
    }

    /// Check the converged state without changing anything.
    ///
    /// Passes when the namespace exists, the host end is on the host, the
    /// peer is in the namespace and not visible from the host, and both ends
    /// are up with an operational state of up or unknown.
    ///
    /// # Errors
    ///
    /// Returns [`AetherError::NotConverged`] describing the first violation,
    /// or the primitive failure that prevented the check.
    pub async fn verify(&self) -> AetherResult<()> {
        let _pin = self.backend.pin()?;
        let name = &self.topology.namespace;
        let pair = &self.topology.veth;

        let host = HostCapture::capture(&self.backend)?;
        let target_ns = self.backend.lookup(name)?.ok_or_else(|| AetherError::NotConverged {
            reason: format!("namespace {name} does not exist"),
        })?;
        let handles = host.bind_target(&self.backend, target_ns)?;

        check_end(&handles.host, &pair.host).await?;
        check_end(&handles.target, &pair.peer).await?;
        check_absent(&handles, &pair.peer, &pair.host).await?;

        tracing::info!(namespace = %name, veth = %pair, "Topology converged");
        Ok(())
    }
}

async fn check_end<H: LinkHandle>(handle: &H, name: &IfName) -> AetherResult<()> {
    let link = handle
        .link_by_name(name)
        .await?
        .ok_or_else(|| AetherError::NotConverged {
            reason: format!("{name} missing from {}", handle.namespace()),
        })?;
    if !link.is_converged() {
        return Err(AetherError::NotConverged {
            reason: format!(
                "{name} in {} is not up (admin up: {}, oper state: {})",
                handle.namespace(),
                link.admin_up,
                link.oper_state
            ),
        });
    }
    Ok(())
}

async fn check_absent<B: NetnsBackend>(
    handles: &Handles<B>,
    peer: &IfName,
    host: &IfName,
) -> AetherResult<()> {
    if handles.host.link_by_name(peer).await?.is_some() {
        return Err(AetherError::NotConverged {
            reason: format!("{peer} is visible in the host namespace"),
        });
    }
    if handles.target.link_by_name(host).await?.is_some() {
        return Err(AetherError::NotConverged {
            reason: format!("{host} is visible in namespace {}", handles.target.namespace()),
        });
    }
    Ok(())
}

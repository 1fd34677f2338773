//! Virtual ethernet pair reconciliation.

use std::fmt;

use aether_common::{AetherError, AetherResult, IfName};

use crate::backend::{LinkHandle, NetnsBackend};
use crate::handle::Handles;

/// Virtual ethernet pair split between the host and a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VethPair {
    /// Host-side interface name.
    pub host: IfName,
    /// Namespace-side interface name.
    pub peer: IfName,
}

/// What [`VethPair::reconcile`] found or did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VethOutcome {
    /// The pair was created and the peer moved into the namespace.
    Created,
    /// The host end was on the host and the peer inside the namespace.
    AlreadyPresent,
}

impl VethPair {
    /// Create a pair description.
    ///
    /// # Errors
    ///
    /// Returns [`AetherError::Config`] if both ends share a name.
    pub fn new(host: IfName, peer: IfName) -> AetherResult<Self> {
        if host == peer {
            return Err(AetherError::Config {
                message: format!("veth ends must have different names (both are {host})"),
            });
        }
        Ok(Self { host, peer })
    }

    /// Bring the pair to its converged placement.
    ///
    /// The host end is looked up through the host handle and the peer
    /// through the target handle. A missing host end means the pair is
    /// absent: it is created on the host and only the peer is moved. A host
    /// end without a peer in the namespace is left alone and reported, and
    /// so is a peer name already taken on either side while the host end is
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`AetherError::InconsistentState`] or [`AetherError::StrayPeer`]
    /// for a partial pair, or the primitive failure that stopped the run.
    pub async fn reconcile<B: NetnsBackend>(&self, handles: &Handles<B>) -> AetherResult<VethOutcome> {
        let host = &handles.host;
        let target = &handles.target;

        if host.link_by_name(&self.host).await?.is_some() {
            tracing::info!(host_if = %self.host, "Host end already exists");

            if target.link_by_name(&self.peer).await?.is_none() {
                tracing::warn!(
                    host_if = %self.host,
                    peer_if = %self.peer,
                    namespace = target.namespace(),
                    "Host end exists but peer is missing from namespace, refusing to repair"
                );
                return Err(AetherError::InconsistentState {
                    host_if: self.host.to_string(),
                    peer_if: self.peer.to_string(),
                    namespace: target.namespace().to_string(),
                });
            }

            return Ok(VethOutcome::AlreadyPresent);
        }

        // A leftover peer would make the move fail after creation and strand
        // the new peer on the host.
        for side in [target, host] {
            if side.link_by_name(&self.peer).await?.is_some() {
                tracing::warn!(
                    host_if = %self.host,
                    peer_if = %self.peer,
                    location = side.namespace(),
                    "Host end is missing but peer name is taken, refusing to repair"
                );
                return Err(AetherError::StrayPeer {
                    host_if: self.host.to_string(),
                    peer_if: self.peer.to_string(),
                    location: side.namespace().to_string(),
                });
            }
        }

        tracing::info!(host_if = %self.host, peer_if = %self.peer, "Host end not found, creating pair");
        host.add_veth(&self.host, &self.peer).await?;

        // The create request does not hand back the peer, so look it up.
        let peer = host.link_by_name(&self.peer).await?.ok_or_else(|| {
            AetherError::netlink("lookup", self.peer.as_str(), "peer not on host after creation")
        })?;

        host.move_to(&peer, &handles.target_ns).await?;
        tracing::info!(peer_if = %self.peer, namespace = target.namespace(), "Moved peer into namespace");

        Ok(VethOutcome::Created)
    }
}

impl fmt::Display for VethPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.host, self.peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::HostCapture;
    use crate::memory::MemoryBackend;
    use aether_common::NetnsName;

    fn pair() -> VethPair {
        VethPair::new(
            IfName::new("veth-host").unwrap(),
            IfName::new("veth-ns").unwrap(),
        )
        .unwrap()
    }

    fn handles(backend: &MemoryBackend) -> Handles<MemoryBackend> {
        let host = HostCapture::capture(backend).unwrap();
        let name = NetnsName::new("aether-ns").unwrap();
        let (ns, _) = backend.resolve_or_create(&name).unwrap();
        host.bind_target(backend, ns).unwrap()
    }

    #[test]
    fn ends_must_differ() {
        let name = IfName::new("veth0").unwrap();
        assert!(VethPair::new(name.clone(), name).is_err());
    }

    #[tokio::test]
    async fn absent_pair_is_created_and_split() {
        let backend = MemoryBackend::new();
        let handles = handles(&backend);

        let outcome = pair().reconcile(&handles).await.unwrap();

        assert_eq!(outcome, VethOutcome::Created);
        assert!(backend.link_in(None, "veth-host").is_some());
        assert!(backend.link_in(None, "veth-ns").is_none());
        assert!(backend.link_in(Some("aether-ns"), "veth-ns").is_some());
        assert!(backend.link_in(Some("aether-ns"), "veth-host").is_none());
    }

    #[tokio::test]
    async fn present_pair_is_left_alone() {
        let backend = MemoryBackend::new();
        backend.seed_namespace("aether-ns");
        backend.seed_veth("veth-host", "veth-ns", Some("aether-ns"), false);
        let handles = handles(&backend);

        let outcome = pair().reconcile(&handles).await.unwrap();

        assert_eq!(outcome, VethOutcome::AlreadyPresent);
        assert!(backend.mutations().is_empty());
    }

    #[tokio::test]
    async fn orphan_host_end_is_reported_not_repaired() {
        let backend = MemoryBackend::new();
        backend.seed_namespace("aether-ns");
        backend.seed_link(None, "veth-host", true);
        let handles = handles(&backend);

        let err = pair().reconcile(&handles).await.unwrap_err();

        assert!(err.is_inconsistent());
        assert!(backend.mutations().is_empty());
        assert_eq!(backend.link_count(), 1);
    }

    #[tokio::test]
    async fn stray_peer_in_namespace_blocks_creation() {
        let backend = MemoryBackend::new();
        backend.seed_namespace("aether-ns");
        backend.seed_link(Some("aether-ns"), "veth-ns", true);
        let handles = handles(&backend);

        let err = pair().reconcile(&handles).await.unwrap_err();

        assert!(matches!(
            &err,
            AetherError::StrayPeer { location, .. } if location == "aether-ns"
        ));
        assert!(backend.mutations().is_empty());
        assert!(backend.link_in(None, "veth-host").is_none());
        assert!(backend.link_in(None, "veth-ns").is_none());
    }

    #[tokio::test]
    async fn stray_peer_on_host_blocks_creation() {
        let backend = MemoryBackend::new();
        backend.seed_namespace("aether-ns");
        backend.seed_link(None, "veth-ns", false);
        let handles = handles(&backend);

        let err = pair().reconcile(&handles).await.unwrap_err();

        assert!(matches!(err, AetherError::StrayPeer { .. }));
        assert!(err.is_inconsistent());
        assert!(backend.mutations().is_empty());
        assert_eq!(backend.link_count(), 1);
    }

    #[tokio::test]
    async fn failed_move_leaves_pair_on_host() {
        let backend = MemoryBackend::new();
        backend.fail_on("move");
        let handles = handles(&backend);

        let err = pair().reconcile(&handles).await.unwrap_err();

        assert!(matches!(err, AetherError::Netlink { .. }));
        assert!(backend.link_in(None, "veth-host").is_some());
        assert!(backend.link_in(None, "veth-ns").is_some());
    }
}

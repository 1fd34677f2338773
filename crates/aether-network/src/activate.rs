//! Administrative state of both veth ends.

use aether_common::{AetherError, AetherResult, IfName};

use crate::backend::{LinkHandle, NetnsBackend};
use crate::handle::Handles;
use crate::veth::VethPair;

/// Result of activating one end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The link was down and has been set up.
    BroughtUp,
    /// The link was already administratively up.
    AlreadyUp,
}

/// Activation result for both ends of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairActivation {
    /// Namespace-side end.
    pub peer: Activation,
    /// Host-side end.
    pub host: Activation,
}

impl PairActivation {
    /// Whether any end had to be changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.peer == Activation::BroughtUp || self.host == Activation::BroughtUp
    }
}

/// Set both ends of `pair` administratively up.
///
/// The peer goes through the target handle and the host end through the
/// host handle. Operational state is only logged: a veth whose peer sits in
/// another namespace often reports `unknown`.
///
/// # Errors
///
/// Returns an error if either end is missing or cannot be set up.
pub async fn activate_pair<B: NetnsBackend>(
    pair: &VethPair,
    handles: &Handles<B>,
) -> AetherResult<PairActivation> {
    let peer = activate(&handles.target, &pair.peer).await?;
    let host = activate(&handles.host, &pair.host).await?;
    Ok(PairActivation { peer, host })
}

async fn activate<H: LinkHandle>(handle: &H, name: &IfName) -> AetherResult<Activation> {
    let link = handle.link_by_name(name).await?.ok_or_else(|| {
        AetherError::netlink(
            "lookup",
            name.as_str(),
            format!("not found in namespace {}", handle.namespace()),
        )
    })?;

    if link.admin_up {
        tracing::debug!(name = %name, oper_state = %link.oper_state, "Link already up");
        return Ok(Activation::AlreadyUp);
    }

    handle.set_up(&link).await?;

    let link = handle.link_by_name(name).await?.ok_or_else(|| {
        AetherError::netlink("lookup", name.as_str(), "vanished after set up")
    })?;
    if !link.admin_up {
        return Err(AetherError::netlink("set up", name.as_str(), "link still down"));
    }

    tracing::info!(
        name = %name,
        namespace = handle.namespace(),
        oper_state = %link.oper_state,
        "Link up"
    );
    Ok(Activation::BroughtUp)
}

//! Namespace and link capability surface.
//!
//! The reconciler never talks to the kernel directly. It asks a
//! [`NetnsBackend`] for namespace references and namespace-scoped
//! [`LinkHandle`]s, and issues every link query or mutation through one of
//! those handles. Nothing here relies on the calling thread's ambient
//! namespace.

use std::fmt;

use aether_common::{AetherResult, IfName, NetnsName};
use async_trait::async_trait;

/// Operational state of a link as observed by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperState {
    /// Carrier is up.
    Up,
    /// Carrier is down.
    Down,
    /// The kernel cannot tell. Common for a veth whose peer lives in another namespace.
    Unknown,
    /// Any other RFC 2863 state (lower layer down, dormant, testing, ...).
    Other,
}

impl OperState {
    /// Whether this state is acceptable for an administratively up link.
    #[must_use]
    pub const fn is_converged(self) -> bool {
        matches!(self, Self::Up | Self::Unknown)
    }
}

impl fmt::Display for OperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Unknown => "unknown",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Snapshot of a link returned by a name query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Interface index inside its namespace.
    pub index: u32,
    /// Interface name.
    pub name: String,
    /// Whether `IFF_UP` is set.
    pub admin_up: bool,
    /// Kernel operational state.
    pub oper_state: OperState,
}

impl Link {
    /// Administratively up with an operational state of up or unknown.
    #[must_use]
    pub const fn is_converged(&self) -> bool {
        self.admin_up && self.oper_state.is_converged()
    }
}

/// How the target namespace was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A namespace with that name already existed.
    Found,
    /// The namespace was created by this run.
    Created,
}

/// Namespace primitives.
pub trait NetnsBackend: Send + Sync {
    /// Reference to a namespace. Closing happens on drop.
    type Namespace: Send + Sync + fmt::Debug;

    /// Link handle bound to one namespace. Released on drop.
    type Handle: LinkHandle<Namespace = Self::Namespace>;

    /// Guard keeping the calling thread's namespace association stable.
    type Pin;

    /// Pin the calling thread for the duration of a run.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread's namespace cannot be captured.
    fn pin(&self) -> AetherResult<Self::Pin>;

    /// Reference to the namespace the calling thread is in right now.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace cannot be opened.
    fn current(&self) -> AetherResult<Self::Namespace>;

    /// Look up a named namespace without creating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails.
    fn lookup(&self, name: &NetnsName) -> AetherResult<Option<Self::Namespace>>;

    /// Return the named namespace, creating it only when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup or the creation fails.
    fn resolve_or_create(&self, name: &NetnsName) -> AetherResult<(Self::Namespace, Resolution)>;

    /// Open a link handle bound to `ns`.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle cannot be opened.
    fn open_handle(&self, ns: &Self::Namespace) -> AetherResult<Self::Handle>;
}

/// Link primitives scoped to a single namespace.
#[async_trait]
pub trait LinkHandle: Send + Sync {
    /// Namespace reference type accepted by [`LinkHandle::move_to`].
    type Namespace: Send + Sync;

    /// Name of the namespace this handle is bound to, for diagnostics.
    fn namespace(&self) -> &str;

    /// Find a link by name. `None` means the link does not exist here.
    async fn link_by_name(&self, name: &IfName) -> AetherResult<Option<Link>>;

    /// Create a veth pair. Both ends land in this handle's namespace.
    async fn add_veth(&self, name: &IfName, peer: &IfName) -> AetherResult<()>;

    /// Move `link` out of this handle's namespace into `ns`.
    async fn move_to(&self, link: &Link, ns: &Self::Namespace) -> AetherResult<()>;

    /// Set `link` administratively up.
    async fn set_up(&self, link: &Link) -> AetherResult<()>;
}

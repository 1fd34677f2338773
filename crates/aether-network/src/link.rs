//! Namespace-scoped netlink handles.
//!
//! A netlink socket stays bound to the namespace it was created in, no
//! matter where the owning thread moves afterwards. [`NetlinkHandle`] uses
//! that to pin every request it sends to one namespace.

use std::os::fd::{AsFd, AsRawFd};

use aether_common::{AetherError, AetherResult, IfName};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use rtnetlink::packet_route::link::{LinkAttribute, LinkFlags, LinkMessage, State};
use rtnetlink::{Handle, LinkUnspec, LinkVeth};
use tokio::task::JoinHandle;

use crate::backend::{Link, LinkHandle, OperState};
use crate::netns::{NetnsRef, ThreadNetnsGuard};

/// rtnetlink connection bound to a single network namespace.
///
/// The background connection task is aborted when the handle is dropped.
#[derive(Debug)]
pub struct NetlinkHandle {
    handle: Handle,
    connection: JoinHandle<()>,
    namespace: String,
}

impl NetlinkHandle {
    /// Open a netlink connection inside `ns`.
    ///
    /// The calling thread steps into `ns` only long enough to create the
    /// socket and is moved back before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if entering the namespace or creating the socket fails.
    pub fn open_at(ns: &NetnsRef) -> AetherResult<Self> {
        let (connection, handle, _) = {
            let _guard = ThreadNetnsGuard::enter(ns)?;
            rtnetlink::new_connection()
                .map_err(|e| AetherError::namespace("open handle", ns.name(), &e))?
        };

        tracing::debug!(namespace = ns.name(), "Opened netlink handle");

        Ok(Self {
            handle,
            connection: tokio::spawn(connection),
            namespace: ns.name().to_string(),
        })
    }
}

impl Drop for NetlinkHandle {
    fn drop(&mut self) {
        self.connection.abort();
        tracing::debug!(namespace = %self.namespace, "Closed netlink handle");
    }
}

#[async_trait]
impl LinkHandle for NetlinkHandle {
    type Namespace = NetnsRef;

    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn link_by_name(&self, name: &IfName) -> AetherResult<Option<Link>> {
        let mut links = self
            .handle
            .link()
            .get()
            .match_name(name.to_string())
            .execute();

        match links.try_next().await {
            Ok(Some(msg)) => Ok(Some(link_from_message(&msg, name))),
            Ok(None) => Ok(None),
            Err(rtnetlink::Error::NetlinkError(err))
                if err.to_io().raw_os_error() == Some(libc::ENODEV) =>
            {
                Ok(None)
            }
            Err(e) => Err(link_error("lookup", name.as_str(), e)),
        }
    }

    async fn add_veth(&self, name: &IfName, peer: &IfName) -> AetherResult<()> {
        tracing::debug!(name = %name, peer = %peer, namespace = %self.namespace, "Creating veth pair");
        self.handle
            .link()
            .add(LinkVeth::new(name.as_str(), peer.as_str()).build())
            .execute()
            .await
            .map_err(|e| link_error("create veth", name.as_str(), e))
    }

    async fn move_to(&self, link: &Link, ns: &NetnsRef) -> AetherResult<()> {
        tracing::debug!(
            name = %link.name,
            index = link.index,
            from = %self.namespace,
            to = ns.name(),
            "Moving link to namespace"
        );
        let msg = LinkUnspec::new_with_index(link.index)
            .setns_by_fd(ns.as_fd().as_raw_fd())
            .build();
        self.handle
            .link()
            .set(msg)
            .execute()
            .await
            .map_err(|e| link_error("move", &link.name, e))
    }

    async fn set_up(&self, link: &Link) -> AetherResult<()> {
        tracing::debug!(name = %link.name, index = link.index, namespace = %self.namespace, "Setting link up");
        let msg = LinkUnspec::new_with_index(link.index).up().build();
        self.handle
            .link()
            .set(msg)
            .execute()
            .await
            .map_err(|e| link_error("set up", &link.name, e))
    }
}

/// Kernel NACKs carry an errno; everything else is reported as is.
fn link_error(operation: &str, name: &str, err: rtnetlink::Error) -> AetherError {
    if let rtnetlink::Error::NetlinkError(msg) = &err {
        return AetherError::link_os(operation, name, &msg.to_io());
    }
    AetherError::netlink(operation, name, err)
}

fn link_from_message(msg: &LinkMessage, queried: &IfName) -> Link {
    let mut name = queried.to_string();
    let mut oper_state = OperState::Unknown;

    for attr in &msg.attributes {
        match attr {
            LinkAttribute::IfName(n) => name.clone_from(n),
            LinkAttribute::OperState(state) => oper_state = oper_state_from(*state),
            _ => {}
        }
    }

    Link {
        index: msg.header.index,
        name,
        admin_up: msg.header.flags.contains(LinkFlags::Up),
        oper_state,
    }
}

const fn oper_state_from(state: State) -> OperState {
    match state {
        State::Up => OperState::Up,
        State::Down => OperState::Down,
        State::Unknown => OperState::Unknown,
        _ => OperState::Other,
    }
}

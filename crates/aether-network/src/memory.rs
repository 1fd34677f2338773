//! In-memory namespace and link model for tests.
//!
//! Mirrors the kernel behaviour the reconciler depends on: names are unique
//! per namespace, a new veth pair lands entirely in the creating handle's
//! namespace, a handle only sees links in its own namespace.

use std::collections::BTreeMap;
use std::sync::Arc;

use aether_common::{AetherError, AetherResult, IfName, NetnsName};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::{Link, LinkHandle, NetnsBackend, OperState, Resolution};

const HOST: u32 = 0;

#[derive(Debug)]
struct MemLink {
    ns: u32,
    index: u32,
    name: String,
    admin_up: bool,
    peer: Option<u32>,
}

#[derive(Debug, Default)]
struct Kernel {
    namespaces: BTreeMap<String, u32>,
    next_ns: u32,
    links: Vec<MemLink>,
    next_index: u32,
    mutations: Vec<String>,
    open_handles: usize,
    fail_on: Option<&'static str>,
}

impl Kernel {
    fn check_fault(&self, op: &'static str, name: &str) -> AetherResult<()> {
        if self.fail_on == Some(op) {
            return Err(AetherError::netlink(op, name, "injected failure"));
        }
        Ok(())
    }

    fn find(&self, ns: u32, name: &str) -> Option<&MemLink> {
        self.links.iter().find(|l| l.ns == ns && l.name == name)
    }

    fn ns_id(&self, name: Option<&str>) -> u32 {
        name.map_or(HOST, |n| self.namespaces[n])
    }

    fn snapshot(&self, link: &MemLink) -> Link {
        let peer = link
            .peer
            .and_then(|p| self.links.iter().find(|l| l.index == p));
        let oper_state = match (link.admin_up, peer) {
            (false, _) => OperState::Down,
            (true, Some(peer)) if peer.admin_up && peer.ns != link.ns => OperState::Unknown,
            (true, Some(peer)) if peer.admin_up => OperState::Up,
            (true, _) => OperState::Other,
        };
        Link {
            index: link.index,
            name: link.name.clone(),
            admin_up: link.admin_up,
            oper_state,
        }
    }

    fn add_link(&mut self, ns: u32, name: &str, admin_up: bool) -> u32 {
        self.next_index += 1;
        let index = self.next_index;
        self.links.push(MemLink {
            ns,
            index,
            name: name.to_string(),
            admin_up,
            peer: None,
        });
        index
    }

    fn pair(&mut self, a: u32, b: u32) {
        for link in &mut self.links {
            if link.index == a {
                link.peer = Some(b);
            } else if link.index == b {
                link.peer = Some(a);
            }
        }
    }
}

/// Namespace reference in the in-memory model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryNamespace {
    id: u32,
    name: String,
}

/// In-memory [`NetnsBackend`].
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    kernel: Arc<Mutex<Kernel>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_namespace(&self, name: &str) {
        let mut k = self.kernel.lock();
        k.next_ns += 1;
        let id = k.next_ns;
        k.namespaces.insert(name.to_string(), id);
    }

    /// A lone interface with no peer, e.g. the host end of an interrupted run.
    pub fn seed_link(&self, ns: Option<&str>, name: &str, admin_up: bool) {
        let mut k = self.kernel.lock();
        let ns = k.ns_id(ns);
        k.add_link(ns, name, admin_up);
    }

    /// A veth pair with the host end on the host and the peer in `peer_ns`.
    pub fn seed_veth(&self, host: &str, peer: &str, peer_ns: Option<&str>, admin_up: bool) {
        let mut k = self.kernel.lock();
        let peer_ns = k.ns_id(peer_ns);
        let a = k.add_link(HOST, host, admin_up);
        let b = k.add_link(peer_ns, peer, admin_up);
        k.pair(a, b);
    }

    /// Make every call of `op` fail from now on.
    pub fn fail_on(&self, op: &'static str) {
        self.kernel.lock().fail_on = Some(op);
    }

    /// Mutating calls issued so far, in order.
    pub fn mutations(&self) -> Vec<String> {
        self.kernel.lock().mutations.clone()
    }

    pub fn namespace_count(&self, name: &str) -> usize {
        self.kernel
            .lock()
            .namespaces
            .keys()
            .filter(|n| n.as_str() == name)
            .count()
    }

    /// Snapshot of `name` inside `ns` (`None` = host).
    pub fn link_in(&self, ns: Option<&str>, name: &str) -> Option<Link> {
        let k = self.kernel.lock();
        let id = ns.map_or(Some(HOST), |n| k.namespaces.get(n).copied())?;
        k.find(id, name).map(|l| k.snapshot(l))
    }

    pub fn link_count(&self) -> usize {
        self.kernel.lock().links.len()
    }

    pub fn open_handles(&self) -> usize {
        self.kernel.lock().open_handles
    }
}

impl NetnsBackend for MemoryBackend {
    type Namespace = MemoryNamespace;
    type Handle = MemoryHandle;
    type Pin = ();

    fn pin(&self) -> AetherResult<()> {
        Ok(())
    }

    fn current(&self) -> AetherResult<MemoryNamespace> {
        Ok(MemoryNamespace {
            id: HOST,
            name: "host".to_string(),
        })
    }

    fn lookup(&self, name: &NetnsName) -> AetherResult<Option<MemoryNamespace>> {
        let k = self.kernel.lock();
        Ok(k.namespaces.get(name.as_str()).map(|&id| MemoryNamespace {
            id,
            name: name.to_string(),
        }))
    }

    fn resolve_or_create(
        &self,
        name: &NetnsName,
    ) -> AetherResult<(MemoryNamespace, Resolution)> {
        if let Some(ns) = self.lookup(name)? {
            return Ok((ns, Resolution::Found));
        }
        let mut k = self.kernel.lock();
        k.check_fault("create netns", name.as_str())?;
        k.mutations.push(format!("create netns {name}"));
        k.next_ns += 1;
        let id = k.next_ns;
        k.namespaces.insert(name.to_string(), id);
        Ok((
            MemoryNamespace {
                id,
                name: name.to_string(),
            },
            Resolution::Created,
        ))
    }

    fn open_handle(&self, ns: &MemoryNamespace) -> AetherResult<MemoryHandle> {
        let mut k = self.kernel.lock();
        k.check_fault("open handle", &ns.name)?;
        k.open_handles += 1;
        Ok(MemoryHandle {
            ns: ns.clone(),
            kernel: Arc::clone(&self.kernel),
        })
    }
}

/// Link handle bound to one namespace of the in-memory model.
#[derive(Debug)]
pub struct MemoryHandle {
    ns: MemoryNamespace,
    kernel: Arc<Mutex<Kernel>>,
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.kernel.lock().open_handles -= 1;
    }
}

#[async_trait]
impl LinkHandle for MemoryHandle {
    type Namespace = MemoryNamespace;

    fn namespace(&self) -> &str {
        &self.ns.name
    }

    async fn link_by_name(&self, name: &IfName) -> AetherResult<Option<Link>> {
        let k = self.kernel.lock();
        k.check_fault("lookup", name.as_str())?;
        Ok(k.find(self.ns.id, name.as_str()).map(|l| k.snapshot(l)))
    }

    async fn add_veth(&self, name: &IfName, peer: &IfName) -> AetherResult<()> {
        let mut k = self.kernel.lock();
        k.check_fault("create veth", name.as_str())?;
        for n in [name, peer] {
            if k.find(self.ns.id, n.as_str()).is_some() {
                return Err(AetherError::netlink("create veth", n.as_str(), "File exists"));
            }
        }
        k.mutations.push(format!("add veth {name} {peer}"));
        let a = k.add_link(self.ns.id, name.as_str(), false);
        let b = k.add_link(self.ns.id, peer.as_str(), false);
        k.pair(a, b);
        Ok(())
    }

    async fn move_to(&self, link: &Link, ns: &MemoryNamespace) -> AetherResult<()> {
        let mut k = self.kernel.lock();
        k.check_fault("move", &link.name)?;
        if k.find(ns.id, &link.name).is_some() {
            return Err(AetherError::netlink("move", &link.name, "File exists"));
        }
        let from = self.ns.id;
        let entry = k
            .links
            .iter_mut()
            .find(|l| l.ns == from && l.index == link.index)
            .ok_or_else(|| AetherError::netlink("move", &link.name, "No such device"))?;
        entry.ns = ns.id;
        k.mutations.push(format!("move {} {}", link.name, ns.name));
        Ok(())
    }

    async fn set_up(&self, link: &Link) -> AetherResult<()> {
        let mut k = self.kernel.lock();
        k.check_fault("set up", &link.name)?;
        let from = self.ns.id;
        let entry = k
            .links
            .iter_mut()
            .find(|l| l.ns == from && l.index == link.index)
            .ok_or_else(|| AetherError::netlink("set up", &link.name, "No such device"))?;
        entry.admin_up = true;
        k.mutations.push(format!("set up {}", link.name));
        Ok(())
    }
}

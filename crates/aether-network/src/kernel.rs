//! Kernel-backed namespace primitives.

use aether_common::{AetherResult, NetnsName, NetnsPaths};

use crate::backend::{NetnsBackend, Resolution};
use crate::link::NetlinkHandle;
use crate::netns::{NetnsRef, NetnsResolver, ThreadNetnsGuard};

/// [`NetnsBackend`] talking to the running kernel through rustix and rtnetlink.
///
/// Must be driven from a single-threaded tokio runtime: namespace
/// membership belongs to the OS thread, so every task has to stay on it.
#[derive(Debug, Clone, Default)]
pub struct KernelBackend {
    resolver: NetnsResolver,
}

impl KernelBackend {
    /// Create a backend resolving names under `paths`.
    #[must_use]
    pub const fn new(paths: NetnsPaths) -> Self {
        Self {
            resolver: NetnsResolver::new(paths),
        }
    }
}

impl NetnsBackend for KernelBackend {
    type Namespace = NetnsRef;
    type Handle = NetlinkHandle;
    type Pin = ThreadNetnsGuard;

    fn pin(&self) -> AetherResult<ThreadNetnsGuard> {
        ThreadNetnsGuard::pin()
    }

    fn current(&self) -> AetherResult<NetnsRef> {
        NetnsRef::current()
    }

    fn lookup(&self, name: &NetnsName) -> AetherResult<Option<NetnsRef>> {
        self.resolver.lookup(name)
    }

    fn resolve_or_create(&self, name: &NetnsName) -> AetherResult<(NetnsRef, Resolution)> {
        let (ns, created) = self.resolver.resolve_or_create(name)?;
        let resolution = if created {
            Resolution::Created
        } else {
            Resolution::Found
        };
        Ok((ns, resolution))
    }

    fn open_handle(&self, ns: &NetnsRef) -> AetherResult<NetlinkHandle> {
        NetlinkHandle::open_at(ns)
    }
}

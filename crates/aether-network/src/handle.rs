//! Host and target namespace handles.
//!
//! The host namespace is captured first, before anything that could create
//! or enter a namespace, so the host handle can never end up bound to the
//! wrong namespace.

use aether_common::AetherResult;

use crate::backend::NetnsBackend;

/// Host namespace reference and handle, captured before any namespace mutation.
pub struct HostCapture<B: NetnsBackend> {
    handle: B::Handle,
    ns: B::Namespace,
}

impl<B: NetnsBackend> HostCapture<B> {
    /// Capture the calling thread's namespace as the host namespace and open
    /// a handle bound to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace cannot be captured or the handle
    /// cannot be opened.
    pub fn capture(backend: &B) -> AetherResult<Self> {
        let ns = backend.current()?;
        let handle = backend.open_handle(&ns)?;
        tracing::debug!(?ns, "Captured host namespace");
        Ok(Self { handle, ns })
    }

    /// Open the target handle and pair it with the host handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the target handle cannot be opened. The host
    /// handle is released in that case.
    pub fn bind_target(self, backend: &B, target_ns: B::Namespace) -> AetherResult<Handles<B>> {
        let target = backend.open_handle(&target_ns)?;
        Ok(Handles {
            host: self.handle,
            target,
            _host_ns: self.ns,
            target_ns,
        })
    }
}

/// The two handles every link operation goes through.
///
/// Handles are released when this is dropped, which happens at the end of
/// a run on every exit path.
pub struct Handles<B: NetnsBackend> {
    /// Handle bound to the host namespace.
    pub host: B::Handle,
    /// Handle bound to the target namespace.
    pub target: B::Handle,
    // Keeps the captured host namespace open for the whole run.
    _host_ns: B::Namespace,
    /// Target namespace reference.
    pub target_ns: B::Namespace,
}

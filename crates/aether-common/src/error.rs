//! Common error types for the aether reconciler.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`AetherError`].
pub type AetherResult<T> = Result<T, AetherError>;

/// Errors raised while reconciling the namespace and veth topology.
///
/// A link or namespace that is simply absent is not an error: lookups
/// return `None` and the reconciler branches on it.
#[derive(Error, Diagnostic, Debug)]
pub enum AetherError {
    /// Invalid network interface name.
    #[error("Invalid interface name: {name:?}")]
    #[diagnostic(
        code(aether::name::invalid_interface),
        help("Interface names must be 1-15 bytes without '/', whitespace or ':'")
    )]
    InvalidIfName {
        /// The rejected name.
        name: String,
    },

    /// Invalid network namespace name.
    #[error("Invalid namespace name: {name:?}")]
    #[diagnostic(
        code(aether::name::invalid_namespace),
        help("Namespace names must be 1-255 bytes without '/' and must not be '.' or '..'")
    )]
    InvalidNetnsName {
        /// The rejected name.
        name: String,
    },

    /// A namespace primitive failed (lookup, creation, open or setns).
    #[error("Namespace {operation} failed for {name}: {message}")]
    #[diagnostic(code(aether::netns))]
    Namespace {
        /// The step that failed.
        operation: String,
        /// The namespace involved.
        name: String,
        /// The underlying failure.
        message: String,
    },

    /// A netlink link primitive failed.
    #[error("Netlink {operation} failed for {name}: {message}")]
    #[diagnostic(code(aether::netlink))]
    Netlink {
        /// The step that failed.
        operation: String,
        /// The interface involved.
        name: String,
        /// The underlying failure.
        message: String,
    },

    /// The host end exists but the peer is not inside the target namespace.
    #[error("{host_if} exists on host but {peer_if} not found in namespace {namespace}")]
    #[diagnostic(
        code(aether::veth::inconsistent),
        help(
            "A previous run was probably interrupted between creating the pair and moving the peer. \
             Remove the orphan manually (ip link del {host_if}) and re-run."
        )
    )]
    InconsistentState {
        /// Host-side interface name.
        host_if: String,
        /// Namespace-side interface name.
        peer_if: String,
        /// Target namespace name.
        namespace: String,
    },

    /// The peer name is taken while the host end is missing.
    #[error("{host_if} is missing but {peer_if} already exists in {location}")]
    #[diagnostic(
        code(aether::veth::stray_peer),
        help(
            "Creating the pair would leave the new peer stranded on the host. \
             Remove the stale interface manually (ip -n {location} link del {peer_if}, \
             or ip link del {peer_if} on the host) and re-run."
        )
    )]
    StrayPeer {
        /// Host-side interface name.
        host_if: String,
        /// Namespace-side interface name.
        peer_if: String,
        /// Where the stale peer was found: `host` or the namespace name.
        location: String,
    },

    /// The topology does not match the converged state.
    #[error("Topology not converged: {reason}")]
    #[diagnostic(code(aether::verify), help("Run `aether reconcile` to converge"))]
    NotConverged {
        /// What was found to be wrong.
        reason: String,
    },

    /// Permission denied.
    #[error("Permission denied: {operation}")]
    #[diagnostic(
        code(aether::permission_denied),
        help("Namespace and link administration needs CAP_SYS_ADMIN and CAP_NET_ADMIN (try sudo)")
    )]
    PermissionDenied {
        /// The operation that was denied.
        operation: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(aether::config))]
    Config {
        /// The error message.
        message: String,
    },
}

impl AetherError {
    /// Build a [`AetherError::Namespace`] from an I/O failure.
    ///
    /// `EPERM` and `EACCES` become [`AetherError::PermissionDenied`].
    pub fn namespace(operation: &str, name: impl Into<String>, err: &std::io::Error) -> Self {
        let name = name.into();
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            return Self::PermissionDenied {
                operation: format!("{operation} namespace {name}"),
            };
        }
        Self::Namespace {
            operation: operation.to_string(),
            name,
            message: err.to_string(),
        }
    }

    /// Build a [`AetherError::Netlink`] for a link operation.
    pub fn netlink(
        operation: &str,
        name: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::Netlink {
            operation: operation.to_string(),
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Build an error for a failed link operation from its OS error.
    ///
    /// `EPERM` and `EACCES` become [`AetherError::PermissionDenied`].
    pub fn link_os(operation: &str, name: impl Into<String>, err: &std::io::Error) -> Self {
        let name = name.into();
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            return Self::PermissionDenied {
                operation: format!("{operation} link {name}"),
            };
        }
        Self::netlink(operation, name, err)
    }

    /// Whether this error is a partial pair that the reconciler refuses to repair.
    #[must_use]
    pub const fn is_inconsistent(&self) -> bool {
        matches!(
            self,
            Self::InconsistentState { .. } | Self::StrayPeer { .. }
        )
    }
}

//! Standard paths for named network namespaces.

use std::path::PathBuf;

use once_cell::sync::Lazy;

use crate::name::NetnsName;

/// Default directory holding named network namespace bind mounts.
///
/// Matches the iproute2 convention so `ip netns` sees our namespaces.
pub static NETNS_RUN_DIR: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("AETHER_NETNS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/run/netns"))
});

/// Namespace file of the calling thread.
///
/// `thread-self` rather than `self`: namespace membership is per thread.
pub const THREAD_NETNS: &str = "/proc/thread-self/ns/net";

/// Paths used to locate named network namespaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetnsPaths {
    /// Directory of namespace bind mounts (default: /run/netns).
    pub dir: PathBuf,
}

impl NetnsPaths {
    /// Create paths with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths with a custom netns directory.
    #[must_use]
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Bind-mount location of a named namespace.
    #[must_use]
    pub fn namespace(&self, name: &NetnsName) -> PathBuf {
        self.dir.join(name.as_str())
    }
}

impl Default for NetnsPaths {
    fn default() -> Self {
        Self {
            dir: NETNS_RUN_DIR.clone(),
        }
    }
}

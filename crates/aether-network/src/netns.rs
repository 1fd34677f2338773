#![allow(unsafe_code)]
//! Network namespace operations.
//!
//! Named namespaces are bind mounts of a namespace file under the netns
//! directory, the same layout `ip netns` uses.

use std::fmt;
use std::fs::File;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::Path;

use aether_common::{AetherError, AetherResult, NetnsName, NetnsPaths, paths::THREAD_NETNS};
use rustix::thread::{LinkNameSpaceType, UnshareFlags};

/// `f_type` reported by `fstatfs` for namespace files.
const NSFS_MAGIC: i64 = 0x6e73_6673;

/// An open reference to a network namespace.
///
/// Holding the file descriptor keeps the namespace usable even if its bind
/// mount disappears. The descriptor is closed on drop.
pub struct NetnsRef {
    name: String,
    fd: OwnedFd,
}

impl NetnsRef {
    /// Open the namespace the calling thread currently belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error if `/proc/thread-self/ns/net` cannot be opened.
    pub fn current() -> AetherResult<Self> {
        let file = File::open(THREAD_NETNS)
            .map_err(|e| AetherError::namespace("capture", "host", &e))?;
        Ok(Self {
            name: "host".to_string(),
            fd: file.into(),
        })
    }

    /// Label used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Move the calling thread into this namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if `setns` fails.
    pub fn enter(&self) -> AetherResult<()> {
        rustix::thread::move_into_link_name_space(
            self.fd.as_fd(),
            Some(LinkNameSpaceType::Network),
        )
        .map_err(|e| AetherError::namespace("enter", &self.name, &std::io::Error::from(e)))
    }
}

impl AsFd for NetnsRef {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl fmt::Debug for NetnsRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetnsRef")
            .field("name", &self.name)
            .field("fd", &self.fd)
            .finish()
    }
}

/// Restores the thread's original namespace when dropped.
///
/// Used for two things: bracketing a whole reconciliation run, and briefly
/// stepping into a namespace to open a socket there.
#[must_use = "the original namespace is restored when the guard is dropped"]
pub struct ThreadNetnsGuard {
    origin: NetnsRef,
}

impl ThreadNetnsGuard {
    /// Capture the current namespace without moving.
    ///
    /// # Errors
    ///
    /// Returns an error if the current namespace cannot be opened.
    pub fn pin() -> AetherResult<Self> {
        Ok(Self {
            origin: NetnsRef::current()?,
        })
    }

    /// Capture the current namespace, then enter `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if capturing or entering fails. On failure the
    /// thread stays where it was.
    pub fn enter(target: &NetnsRef) -> AetherResult<Self> {
        let guard = Self::pin()?;
        target.enter()?;
        Ok(guard)
    }
}

impl Drop for ThreadNetnsGuard {
    fn drop(&mut self) {
        if let Err(e) = self.origin.enter() {
            tracing::error!(error = %e, "Failed to restore thread network namespace");
        }
    }
}

/// Looks up and creates named network namespaces.
#[derive(Debug, Clone, Default)]
pub struct NetnsResolver {
    paths: NetnsPaths,
}

impl NetnsResolver {
    /// Create a resolver over the given netns directory.
    #[must_use]
    pub const fn new(paths: NetnsPaths) -> Self {
        Self { paths }
    }

    /// Open a named namespace if it exists.
    ///
    /// A plain file left at the mount point (an interrupted creation) counts
    /// as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be inspected.
    pub fn lookup(&self, name: &NetnsName) -> AetherResult<Option<NetnsRef>> {
        let path = self.paths.namespace(name);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AetherError::namespace("open", name.as_str(), &e)),
        };

        if !is_nsfs(&file).map_err(|e| AetherError::namespace("inspect", name.as_str(), &e))? {
            tracing::debug!(path = %path.display(), "Mount point exists but is not a namespace");
            return Ok(None);
        }

        Ok(Some(NetnsRef {
            name: name.to_string(),
            fd: file.into(),
        }))
    }

    /// Create a named network namespace.
    ///
    /// The namespace is created on a short-lived helper thread so the
    /// calling thread never changes namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount point cannot be prepared, `unshare`
    /// fails or the bind mount fails.
    pub fn create(&self, name: &NetnsName) -> AetherResult<NetnsRef> {
        tracing::debug!(name = %name, "Creating network namespace");

        std::fs::create_dir_all(&self.paths.dir)
            .map_err(|e| AetherError::namespace("prepare", name.as_str(), &e))?;

        let path = self.paths.namespace(name);
        std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| AetherError::namespace("prepare", name.as_str(), &e))?;

        let target = path.clone();
        let mounted = std::thread::Builder::new()
            .name("aether-netns".to_string())
            .spawn(move || bind_new_netns(&target))
            .map_err(|e| AetherError::namespace("create", name.as_str(), &e))?
            .join()
            .map_err(|_| AetherError::Namespace {
                operation: "create".to_string(),
                name: name.to_string(),
                message: "namespace helper thread panicked".to_string(),
            })?;

        if let Err(e) = mounted {
            if let Err(rm) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %rm, "Failed to remove mount point");
            }
            return Err(AetherError::namespace("create", name.as_str(), &e));
        }

        self.lookup(name)?.ok_or_else(|| AetherError::Namespace {
            operation: "create".to_string(),
            name: name.to_string(),
            message: "namespace not visible after bind mount".to_string(),
        })
    }

    /// Return the named namespace, creating it only if it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if lookup or creation fails. Creation is not retried.
    pub fn resolve_or_create(&self, name: &NetnsName) -> AetherResult<(NetnsRef, bool)> {
        if let Some(ns) = self.lookup(name)? {
            return Ok((ns, false));
        }
        Ok((self.create(name)?, true))
    }
}

/// Runs on a dedicated thread: unshare a fresh network namespace and pin it
/// to `target` with a bind mount.
fn bind_new_netns(target: &Path) -> std::io::Result<()> {
    // Safety: only the network namespace of this helper thread changes, and
    // the thread exits right after the bind mount.
    unsafe { rustix::thread::unshare_unsafe(UnshareFlags::NEWNET)? };
    rustix::mount::mount_bind(THREAD_NETNS, target)?;
    Ok(())
}

#[allow(clippy::cast_lossless, clippy::unnecessary_cast)]
fn is_nsfs(fd: impl AsFd) -> std::io::Result<bool> {
    let stat = rustix::fs::fstatfs(fd)?;
    Ok(stat.f_type as i64 == NSFS_MAGIC)
}

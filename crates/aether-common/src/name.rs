//! Interface and namespace name validation.

use std::fmt;
use std::str::FromStr;

use crate::error::{AetherError, AetherResult};

/// A validated network interface name.
///
/// Interface names must:
/// - Be 1-15 bytes long (`IFNAMSIZ` minus the terminating NUL)
/// - Not be `.` or `..`
/// - Not contain `/`, `:` or whitespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IfName(String);

impl IfName {
    /// Maximum length of an interface name in bytes.
    pub const MAX_LENGTH: usize = 15;

    /// Create a new interface name, validating the format.
    ///
    /// # Errors
    ///
    /// Returns [`AetherError::InvalidIfName`] if the name is not usable by the kernel.
    pub fn new(name: impl Into<String>) -> AetherResult<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Create an interface name without validation.
    ///
    /// The caller must ensure the name is valid, e.g. a known constant.
    #[must_use]
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the interface name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> AetherResult<()> {
        let invalid = name.is_empty()
            || name.len() > Self::MAX_LENGTH
            || name == "."
            || name == ".."
            || name
                .chars()
                .any(|c| c == '/' || c == ':' || c.is_whitespace() || c == '\0');

        if invalid {
            return Err(AetherError::InvalidIfName {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

/// A validated named network namespace.
///
/// The name becomes a file under the netns directory, so it must be a
/// single path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetnsName(String);

impl NetnsName {
    /// Maximum length of a namespace name in bytes (`NAME_MAX`).
    pub const MAX_LENGTH: usize = 255;

    /// Create a new namespace name, validating the format.
    ///
    /// # Errors
    ///
    /// Returns [`AetherError::InvalidNetnsName`] if the name is not a single path component.
    pub fn new(name: impl Into<String>) -> AetherResult<Self> {
        let name = name.into();
        if name.is_empty()
            || name.len() > Self::MAX_LENGTH
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\0')
        {
            return Err(AetherError::InvalidNetnsName { name });
        }
        Ok(Self(name))
    }

    /// Create a namespace name without validation.
    ///
    /// The caller must ensure the name is valid, e.g. a known constant.
    #[must_use]
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the namespace name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! impl_name_traits {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $ty {
            type Err = AetherError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_name_traits!(IfName);
impl_name_traits!(NetnsName);

//! Segment identifiers

use std::fmt;

use crate::error::{Error, Result};

/// Smallest valid key for a keyed segment
pub const KEY_MIN: u32 = 1;
/// Largest valid key for a keyed segment
pub const KEY_MAX: u32 = u32::MAX - 1;
/// Longest accepted name for a named object, including the leading '/'
pub const NAME_MAX: usize = 255;

/// Identifier of a shared memory segment
///
/// Keyed and named identifiers address two distinct kernel namespaces; a
/// `Key` and a `Name` never alias the same region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SegmentId {
    /// System V segment key
    Key(u32),
    /// POSIX object name, e.g. "/sensor-frames"
    Name(String),
}

impl SegmentId {
    /// The numeric key, for keyed segments
    pub fn key(&self) -> Option<u32> {
        match self {
            SegmentId::Key(k) => Some(*k),
            SegmentId::Name(_) => None,
        }
    }

    /// Check that the identifier is well formed
    pub fn validate(&self) -> Result<()> {
        match self {
            SegmentId::Key(key) => validate_key(*key),
            SegmentId::Name(name) => validate_name(name),
        }
    }
}

impl From<u32> for SegmentId {
    fn from(key: u32) -> Self {
        SegmentId::Key(key)
    }
}

impl From<&str> for SegmentId {
    fn from(name: &str) -> Self {
        SegmentId::Name(name.to_string())
    }
}

impl From<String> for SegmentId {
    fn from(name: String) -> Self {
        SegmentId::Name(name)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentId::Key(k) => write!(f, "{k}"),
            SegmentId::Name(n) => f.write_str(n),
        }
    }
}

pub(crate) fn validate_key(key: u32) -> Result<()> {
    if !(KEY_MIN..=KEY_MAX).contains(&key) {
        return Err(Error::InvalidKey {
            key,
            min: KEY_MIN,
            max: KEY_MAX,
        });
    }
    Ok(())
}

pub(crate) fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason| Error::InvalidName {
        name: name.to_string(),
        reason,
    };
    if !name.starts_with('/') {
        return Err(invalid("name must start with '/'"));
    }
    if name.len() < 2 {
        return Err(invalid("name must not be empty after '/'"));
    }
    if name[1..].contains('/') {
        return Err(invalid("name must not contain further '/' characters"));
    }
    if name.len() > NAME_MAX {
        return Err(invalid("name must be at most 255 bytes"));
    }
    if name.contains('\0') {
        return Err(invalid("name must not contain a NUL byte"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bounds() {
        assert!(validate_key(KEY_MIN).is_ok());
        assert!(validate_key(KEY_MAX).is_ok());
        assert!(validate_key(0).is_err());
        assert!(validate_key(u32::MAX).is_err());
    }

    #[test]
    fn test_name_shape() {
        assert!(validate_name("/frames").is_ok());
        assert!(validate_name("no-slash").is_err());
        assert!(validate_name("/").is_err());
        assert!(validate_name("/a/b").is_err());
        assert!(validate_name(&format!("/{}", "x".repeat(NAME_MAX))).is_err());
    }
}

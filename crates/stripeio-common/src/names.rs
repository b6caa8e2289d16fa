//! Bucket and object name handling

use crate::error::{Error, Result};

/// Maximum object name length in bytes
pub const MAX_OBJECT_NAME_LEN: usize = 1024;

/// Validate a bucket name against S3 naming rules
///
/// 3-63 characters, lowercase letters / digits / `-` / `.`, starting and
/// ending with a letter or digit, no consecutive periods, and not shaped
/// like an IPv4 address.
pub fn validate_bucket_name(name: &str) -> Result<()> {
    if name.len() < 3 {
        return Err(Error::InvalidBucketName(format!(
            "{name:?}: must be at least 3 characters"
        )));
    }
    if name.len() > 63 {
        return Err(Error::InvalidBucketName(format!(
            "{name:?}: must be at most 63 characters"
        )));
    }

    let first = name.chars().next().unwrap_or('-');
    if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
        return Err(Error::InvalidBucketName(format!(
            "{name:?}: must start with a lowercase letter or digit"
        )));
    }
    let last = name.chars().last().unwrap_or('-');
    if !last.is_ascii_lowercase() && !last.is_ascii_digit() {
        return Err(Error::InvalidBucketName(format!(
            "{name:?}: must end with a lowercase letter or digit"
        )));
    }

    for c in name.chars() {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '.' {
            return Err(Error::InvalidBucketName(format!(
                "{name:?}: invalid character {c:?}"
            )));
        }
    }

    if name.contains("..") {
        return Err(Error::InvalidBucketName(format!(
            "{name:?}: consecutive periods are not allowed"
        )));
    }

    if name.parse::<std::net::Ipv4Addr>().is_ok() {
        return Err(Error::InvalidBucketName(format!(
            "{name:?}: must not be formatted as an IP address"
        )));
    }

    Ok(())
}

/// Validate a user-supplied object name
pub fn validate_object_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_argument("object name must not be empty"));
    }
    if name.len() > MAX_OBJECT_NAME_LEN {
        return Err(Error::invalid_argument(format!(
            "object name exceeds {MAX_OBJECT_NAME_LEN} bytes"
        )));
    }
    Ok(())
}

/// Normalize an object name for on-disk use
///
/// Path separators collapse to `-`; the mapping is applied uniformly on
/// both the write and read paths, and the catalog stores the normalized
/// form. Two raw names that normalize identically resolve last-writer-wins.
#[must_use]
pub fn normalize_object_name(name: &str) -> String {
    name.replace('/', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_name_valid() {
        assert!(validate_bucket_name("my-bucket").is_ok());
        assert!(validate_bucket_name("bucket123").is_ok());
        assert!(validate_bucket_name("a.b.c").is_ok());
    }

    #[test]
    fn test_bucket_name_invalid() {
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name("-bucket").is_err());
        assert!(validate_bucket_name("bucket-").is_err());
        assert!(validate_bucket_name("Bucket").is_err());
        assert!(validate_bucket_name("bucket..name").is_err());
        assert!(validate_bucket_name("192.168.1.1").is_err());
    }

    #[test]
    fn test_object_name_validation() {
        assert!(validate_object_name("hello.txt").is_ok());
        assert!(validate_object_name("").is_err());
        assert!(validate_object_name(&"x".repeat(1025)).is_err());
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_object_name("a/b/c"), "a-b-c");
        assert_eq!(normalize_object_name("plain"), "plain");
        // Known collision of the lossy mapping
        assert_eq!(
            normalize_object_name("a/b"),
            normalize_object_name("a-b")
        );
    }
}

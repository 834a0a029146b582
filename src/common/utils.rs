//! Utility functions for minifs

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Percent-encoding set for filenames (includes /, %, and control chars)
const NAME_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'%')
    .add(b' ')
    .add(b'?')
    .add(b'#')
    .add(b'&')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`');

/// Longest filename accepted anywhere in the system
pub const MAX_NAME_LEN: usize = 1024;

/// Encode a filename as a single URL path segment
pub fn encode_name(name: &str) -> String {
    utf8_percent_encode(name, NAME_ENCODE_SET).to_string()
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

/// Validate a filename.
///
/// Names are relative, slash-separated paths. Absolute paths, `.`/`..` and
/// empty segments are rejected so a name can never escape a node's data
/// directory.
pub fn validate_filename(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(crate::Error::InvalidFilename(
            "filename cannot be empty".into(),
        ));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(crate::Error::InvalidFilename(format!(
            "filename too long (max {} bytes)",
            MAX_NAME_LEN
        )));
    }

    if name.chars().any(|c| c.is_control() || c == '\\') {
        return Err(crate::Error::InvalidFilename(
            "filename contains invalid characters".into(),
        ));
    }

    if name.starts_with('/') {
        return Err(crate::Error::InvalidFilename(
            "filename must be relative".into(),
        ));
    }

    if name
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(crate::Error::InvalidFilename(format!(
            "filename has an invalid path segment: {}",
            name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_name() {
        let name = "my dir/report #1.txt";
        let encoded = encode_name(name);
        assert!(encoded.contains("%2F"));
        assert!(encoded.contains("%23"));
        assert!(!encoded.contains(' '));

        let decoded = percent_encoding::percent_decode_str(&encoded).decode_utf8().unwrap();
        assert_eq!(decoded, name);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1023), "1023.00 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
    }

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("a.txt").is_ok());
        assert!(validate_filename("photos/2024/beach.jpg").is_ok());
        assert!(validate_filename("..hidden").is_ok());

        assert!(validate_filename("").is_err());
        assert!(validate_filename("/etc/passwd").is_err());
        assert!(validate_filename("../escape").is_err());
        assert!(validate_filename("a/./b").is_err());
        assert!(validate_filename("a//b").is_err());
        assert!(validate_filename("trailing/").is_err());
        assert!(validate_filename("tab\there").is_err());
        assert!(validate_filename("win\\path").is_err());
        assert!(validate_filename(&"x".repeat(2000)).is_err());
    }
}

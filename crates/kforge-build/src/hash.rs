//! SHA-256 verification of downloaded files.

use std::io::Read;
use std::path::Path;

use kforge_common::error::{KforgeError, Result};
use sha2::{Digest, Sha256};

/// Computes the lowercase hex SHA-256 of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn sha256_file(path: &Path) -> Result<String> {
    tracing::debug!(path = %path.display(), "computing SHA-256");
    let mut file = std::fs::File::open(path).map_err(|e| KforgeError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| KforgeError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Checks a file against its published SHA-256.
///
/// # Errors
///
/// Returns `KforgeError::HashMismatch` if the digests differ.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(KforgeError::HashMismatch {
            resource: path.display().to_string(),
            expected: expected.to_ascii_lowercase(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn digest_of_known_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello").expect("write");
        assert_eq!(sha256_file(&path).expect("hash"), HELLO_SHA256);
        verify_sha256(&path, &HELLO_SHA256.to_ascii_uppercase()).expect("case-insensitive match");
    }

    #[test]
    fn mismatch_reports_both_digests() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello!").expect("write");
        let err = verify_sha256(&path, HELLO_SHA256).unwrap_err();
        assert!(matches!(err, KforgeError::HashMismatch { ref expected, .. } if expected == HELLO_SHA256));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            sha256_file(&dir.path().join("missing")),
            Err(KforgeError::Io { .. })
        ));
    }
}

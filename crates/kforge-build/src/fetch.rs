//! Source and installer downloads.
//!
//! Archives are cached under the download cache, keyed by URL, verified
//! against their published SHA-256 when one is known, and unpacked with the
//! top-level directory optionally stripped.

use std::path::{Component, Path, PathBuf};

use kforge_common::error::{KforgeError, Result};
use sha2::{Digest, Sha256};

use crate::hash::{sha256_file, verify_sha256};

/// Blocking HTTP downloader.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::blocking::Client,
    cache_dir: PathBuf,
}

impl Downloader {
    /// Creates a downloader caching archives under `cache_dir`.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Network` if the HTTP client cannot be built.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("kforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KforgeError::Network {
                url: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            cache_dir: cache_dir.into(),
        })
    }

    /// Downloads `url` into `dest`.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Network` on a transport failure or non-success
    /// status, `KforgeError::Io` if `dest` cannot be written.
    pub fn download(&self, url: &str, dest: &Path) -> Result<()> {
        tracing::info!(url, dest = %dest.display(), "downloading");
        let network = |message: String| KforgeError::Network {
            url: url.to_string(),
            message,
        };
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(network(format!("HTTP {}", response.status())));
        }
        let bytes = response
            .bytes()
            .map_err(|e| network(format!("failed to read response body: {e}")))?;

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KforgeError::io(parent, e))?;
        }
        std::fs::write(dest, &bytes).map_err(|e| KforgeError::io(dest, e))?;
        tracing::debug!(bytes = bytes.len(), "download complete");
        Ok(())
    }

    /// Downloads (or reuses) an archive, verifies it and unpacks it into
    /// `dest`, replacing whatever was there.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::HashMismatch` if the archive does not match
    /// `sha256`, and network or I/O errors from downloading and unpacking.
    pub fn fetch_archive(
        &self,
        url: &str,
        sha256: Option<&str>,
        dest: &Path,
        strip_root: bool,
    ) -> Result<()> {
        let archive = self.cached_path(url);
        let reusable = match (archive.is_file(), sha256) {
            (true, Some(expected)) => sha256_file(&archive)?.eq_ignore_ascii_case(expected),
            (cached, _) => cached,
        };
        if reusable {
            tracing::debug!(archive = %archive.display(), "using cached archive");
        } else {
            self.download(url, &archive)?;
        }

        match sha256 {
            Some(expected) => verify_sha256(&archive, expected).inspect_err(|_| {
                let _ = std::fs::remove_file(&archive);
            })?,
            None => tracing::warn!(url, "no published checksum, archive not verified"),
        }

        if dest.exists() {
            std::fs::remove_dir_all(dest).map_err(|e| KforgeError::io(dest, e))?;
        }
        extract_tar_gz(&archive, dest, strip_root)
    }

    /// Cache location of `url`: a short digest of the URL plus its last
    /// path segment.
    fn cached_path(&self, url: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(url.as_bytes()));
        let name = url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("archive");
        self.cache_dir.join(format!("{}-{name}", &digest[..16]))
    }
}

/// Unpacks a `.tar.gz` archive into `dest`.
///
/// With `strip_root`, the first path component of every entry is dropped,
/// so `zlib-1.3.1/CMakeLists.txt` lands at `dest/CMakeLists.txt`. Entries
/// escaping `dest` are skipped.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or an entry cannot be
/// written.
pub fn extract_tar_gz(archive: &Path, dest: &Path, strip_root: bool) -> Result<()> {
    tracing::info!(archive = %archive.display(), dest = %dest.display(), strip_root, "extracting");
    std::fs::create_dir_all(dest).map_err(|e| KforgeError::io(dest, e))?;
    let file = std::fs::File::open(archive).map_err(|e| KforgeError::io(archive, e))?;
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(file));

    let entries = tar.entries().map_err(|e| KforgeError::io(archive, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| KforgeError::io(archive, e))?;
        let path = entry.path().map_err(|e| KforgeError::io(archive, e))?.into_owned();
        let Some(relative) = entry_destination(&path, strip_root) else {
            continue;
        };
        let target = dest.join(&relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KforgeError::io(parent, e))?;
        }
        let _ = entry.unpack(&target).map_err(|e| KforgeError::io(&target, e))?;
    }
    Ok(())
}

fn entry_destination(path: &Path, strip_root: bool) -> Option<PathBuf> {
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        tracing::warn!(entry = %path.display(), "skipping archive entry outside the destination");
        return None;
    }
    let skip = usize::from(strip_root);
    let relative: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .skip(skip)
        .collect();
    (!relative.as_os_str().is_empty()).then_some(relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tar_gz(dir: &Path, entries: &[(&str, &str)]) -> PathBuf {
        let path = dir.join("src.tar.gz");
        let file = std::fs::File::create(&path).expect("create archive");
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, data.as_bytes())
                .expect("append entry");
        }
        let encoder = builder.into_inner().expect("finish tar");
        let _ = encoder.finish().expect("finish gzip");
        path
    }

    #[test]
    fn strip_root_drops_top_level_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = tar_gz(
            dir.path(),
            &[("zlib-1.3.1/CMakeLists.txt", "project(zlib)"), ("zlib-1.3.1/src/zlib.h", "")],
        );
        let dest = dir.path().join("src");
        extract_tar_gz(&archive, &dest, true).expect("extract");
        assert_eq!(
            std::fs::read_to_string(dest.join("CMakeLists.txt")).expect("read"),
            "project(zlib)"
        );
        assert!(dest.join("src/zlib.h").is_file());
    }

    #[test]
    fn without_strip_root_paths_are_kept() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = tar_gz(dir.path(), &[("pkg/a.txt", "a")]);
        let dest = dir.path().join("out");
        extract_tar_gz(&archive, &dest, false).expect("extract");
        assert!(dest.join("pkg/a.txt").is_file());
    }

    #[test]
    fn escaping_entries_are_skipped() {
        assert_eq!(entry_destination(Path::new("../evil"), false), None);
        assert_eq!(entry_destination(Path::new("root"), true), None);
        assert_eq!(
            entry_destination(Path::new("./root/a/b"), true),
            Some(PathBuf::from("a/b"))
        );
    }

    #[test]
    fn cache_path_is_keyed_by_url() {
        let downloader = Downloader::new("/cache").expect("client");
        let a = downloader.cached_path("https://example.com/a/v1.0.tar.gz");
        let b = downloader.cached_path("https://example.com/b/v1.0.tar.gz");
        assert_ne!(a, b);
        assert!(a.to_string_lossy().ends_with("-v1.0.tar.gz"));
    }

    #[test]
    fn fetch_verifies_and_unpacks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = tar_gz(dir.path(), &[("xxHash-0.8.2/xxhash.h", "#define XXH_VERSION")]);
        let bytes = std::fs::read(&archive).expect("read archive");
        let sha = hex::encode(Sha256::digest(&bytes));

        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/v0.8.2.tar.gz")
            .with_status(200)
            .with_body(bytes)
            .expect(1)
            .create();

        let downloader = Downloader::new(dir.path().join("cache")).expect("client");
        let url = format!("{}/v0.8.2.tar.gz", server.url());
        let dest = dir.path().join("src");
        downloader.fetch_archive(&url, Some(&sha), &dest, true).expect("fetch");
        assert!(dest.join("xxhash.h").is_file());

        // Second fetch is served from the cache.
        downloader.fetch_archive(&url, Some(&sha), &dest, true).expect("refetch");
        mock.assert();
    }

    #[test]
    fn fetch_rejects_wrong_checksum() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = tar_gz(dir.path(), &[("a/b.txt", "b")]);
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/a.tar.gz")
            .with_body(std::fs::read(&archive).expect("read"))
            .create();

        let downloader = Downloader::new(dir.path().join("cache")).expect("client");
        let err = downloader
            .fetch_archive(&format!("{}/a.tar.gz", server.url()), Some(&"0".repeat(64)), &dir.path().join("src"), true)
            .unwrap_err();
        assert!(matches!(err, KforgeError::HashMismatch { .. }), "got: {err}");
    }

    #[test]
    fn http_error_is_a_network_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/missing.tar.gz").with_status(404).create();
        let downloader = Downloader::new(dir.path()).expect("client");
        let err = downloader
            .download(&format!("{}/missing.tar.gz", server.url()), &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, KforgeError::Network { .. }));
        assert!(err.to_string().contains("404"), "got: {err}");
    }
}

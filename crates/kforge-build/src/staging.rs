//! Filesystem steps of a build plan: copy, rename, patch, remove.

use std::path::{Path, PathBuf};

use kforge_common::error::{KforgeError, Result};

/// Matches `text` against a glob where `*` stands for any run of
/// characters (including `/`). Everything else matches literally.
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return text.is_empty();
    };
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };
    let pieces: Vec<&str> = parts.collect();
    let Some((last, middle)) = pieces.split_last() else {
        return rest.is_empty();
    };
    for piece in middle {
        match rest.find(piece) {
            Some(idx) => rest = &rest[idx + piece.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

/// Every regular file under `root`, recursively, sorted.
fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|e| KforgeError::io(&dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| KforgeError::io(&dir, e))?.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Copies files under `from` whose relative path matches `pattern` into
/// `to`, preserving the relative path. Returns the number of files copied.
///
/// # Errors
///
/// Returns an error if `from` cannot be read or a file cannot be copied.
pub fn copy_matching(from: &Path, to: &Path, pattern: &str) -> Result<usize> {
    let mut copied = 0;
    for file in walk_files(from)? {
        let relative = relative_slash_path(from, &file);
        if !glob_match(pattern, &relative) {
            continue;
        }
        let target = to.join(&relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KforgeError::io(parent, e))?;
        }
        let _ = std::fs::copy(&file, &target).map_err(|e| KforgeError::io(&file, e))?;
        copied += 1;
    }
    if copied == 0 {
        tracing::warn!(from = %from.display(), pattern, "copy matched no files");
    } else {
        tracing::debug!(from = %from.display(), to = %to.display(), pattern, copied, "copied files");
    }
    Ok(copied)
}

/// Copies a directory tree, symlinks followed.
///
/// # Errors
///
/// Returns an error if any file cannot be copied.
pub fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    let _ = copy_matching(from, to, "*")?;
    Ok(())
}

/// Renames `from` to `to`. A missing `from` is an error only when
/// `required` is set.
///
/// # Errors
///
/// Returns `KforgeError::Validation` for a missing required file, or an
/// I/O error if the rename fails.
pub fn rename(from: &Path, to: &Path, required: bool) -> Result<()> {
    if !from.exists() {
        if required {
            return Err(KforgeError::Validation {
                kind: "file to rename",
                path: from.to_path_buf(),
            });
        }
        tracing::debug!(path = %from.display(), "optional rename skipped");
        return Ok(());
    }
    std::fs::rename(from, to).map_err(|e| KforgeError::io(from, e))
}

/// Replaces `search` with `replace` in every file named `file_name` under
/// `root`. Returns the number of files changed.
///
/// # Errors
///
/// Returns an error if a file cannot be read or written.
pub fn replace_in_files(root: &Path, file_name: &str, search: &str, replace: &str) -> Result<usize> {
    let mut changed = 0;
    for file in walk_files(root)? {
        if file.file_name().is_none_or(|n| n != file_name) {
            continue;
        }
        let text = std::fs::read_to_string(&file).map_err(|e| KforgeError::io(&file, e))?;
        if !text.contains(search) {
            continue;
        }
        std::fs::write(&file, text.replace(search, replace)).map_err(|e| KforgeError::io(&file, e))?;
        changed += 1;
    }
    if changed == 0 {
        tracing::warn!(root = %root.display(), file_name, search, "nothing to replace");
    }
    Ok(changed)
}

/// Removes a file or directory tree if it exists.
///
/// # Errors
///
/// Returns an error if removal fails.
pub fn remove_path(path: &Path) -> Result<()> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else if path.exists() {
        std::fs::remove_file(path)
    } else {
        return Ok(());
    };
    result.map_err(|e| KforgeError::io(path, e))
}

/// Writes `contents` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| KforgeError::io(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| KforgeError::io(path, e))
}

/// Sets mode `0o755` on Unix; a no-op elsewhere.
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed.
pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| KforgeError::io(path, e))?;
    }
    #[cfg(not(unix))]
    {
        tracing::debug!(path = %path.display(), "executable bit not applicable");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, contents).expect("write");
    }

    #[test]
    fn glob_semantics() {
        assert!(glob_match("*", "a/b/c.h"));
        assert!(glob_match("*.h", "include/openssl/ssl.h"));
        assert!(!glob_match("*.h", "include/ssl.hpp"));
        assert!(glob_match("LICENSE", "LICENSE"));
        assert!(!glob_match("LICENSE", "doc/LICENSE"));
        assert!(glob_match("lib*.dylib", "libssl.3.dylib"));
        assert!(!glob_match("a*a", "a"));
    }

    #[test]
    fn copy_keeps_relative_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("src");
        touch(&src, "LICENSE", "MIT");
        touch(&src, "third_party/LICENSE", "BSD");
        touch(&src, "include/a/a.h", "");
        touch(&src, "include/b.c", "");

        let out = dir.path().join("out");
        assert_eq!(copy_matching(&src, &out.join("licenses"), "LICENSE").expect("copy"), 1);
        assert_eq!(copy_matching(&src, &out, "*.h").expect("copy"), 1);
        assert!(out.join("include/a/a.h").is_file());
        assert!(!out.join("licenses/third_party").exists());
    }

    #[test]
    fn optional_rename_of_missing_file_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("cppunit-1.15.1.dll");
        rename(&missing, &dir.path().join("cppunit.dll"), false).expect("skipped");
        let err = rename(&missing, &dir.path().join("cppunit.dll"), true).unwrap_err();
        assert!(matches!(err, KforgeError::Validation { .. }));
    }

    #[test]
    fn replace_only_touches_named_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "Makefile", "CFLAGS = -O2 -Werror");
        touch(dir.path(), "src/Makefile", "CXXFLAGS = -Werror -g");
        touch(dir.path(), "src/Makefile.am", "-Werror");
        let changed = replace_in_files(dir.path(), "Makefile", "-Werror", "").expect("replace");
        assert_eq!(changed, 2);
        let am = std::fs::read_to_string(dir.path().join("src/Makefile.am")).expect("read");
        assert_eq!(am, "-Werror");
    }

    #[test]
    fn remove_handles_files_dirs_and_absence() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "share/doc/x", "");
        touch(dir.path(), "lib/libz.a", "");
        remove_path(&dir.path().join("share")).expect("dir");
        remove_path(&dir.path().join("lib/libz.a")).expect("file");
        remove_path(&dir.path().join("nothing")).expect("absent");
        assert!(!dir.path().join("share").exists());
        assert!(dir.path().join("lib").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn make_executable_sets_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("installer.run");
        write_file(&path, "#!/bin/sh\n").expect("write");
        make_executable(&path).expect("chmod");
        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}

//! Build plans: the ordered, side-effect-free description of what a driver
//! must execute to produce a package.
//!
//! Recipes never touch the filesystem or spawn processes themselves. They
//! return a [`BuildPlan`] and the build driver executes it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Folders one package build works in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildLayout {
    /// Unpacked upstream sources.
    pub source_dir: PathBuf,
    /// Out-of-tree build folder; the toolchain file is written here.
    pub build_dir: PathBuf,
    /// Install prefix consumers read from.
    pub package_dir: PathBuf,
}

impl BuildLayout {
    /// Standard layout under `root/<name>/<version>/<package_id>`.
    #[must_use]
    pub fn under(root: &Path, name: &str, version: &str, package_id: &str) -> Self {
        let base = root.join(name).join(version);
        Self {
            source_dir: base.join("src"),
            build_dir: base.join("build").join(package_id),
            package_dir: base.join("package").join(package_id),
        }
    }

    /// Path of the generated toolchain file.
    #[must_use]
    pub fn toolchain_file(&self) -> PathBuf {
        self.build_dir
            .join(kforge_common::constants::TOOLCHAIN_FILE_NAME)
    }
}

/// A single external program invocation with explicit arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInvocation {
    /// Program name or path.
    pub program: String,
    /// Arguments, passed without shell interpretation.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: BTreeMap<String, String>,
    /// Working directory, if different from the driver's.
    pub cwd: Option<PathBuf>,
}

impl ToolInvocation {
    /// Starts an invocation of `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Container format of a vendor installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InstallerFormat {
    /// macOS disk image holding an `.app` bundle.
    Dmg,
    /// Linux self-extracting `.run` binary.
    Run,
    /// Windows `.exe`.
    Exe,
}

impl InstallerFormat {
    /// File extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Dmg => "dmg",
            Self::Run => "run",
            Self::Exe => "exe",
        }
    }
}

/// Running a downloaded vendor installer unattended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallerRun {
    /// Downloaded installer file.
    pub installer: PathBuf,
    /// Container format.
    pub format: InstallerFormat,
    /// Arguments passed to the installer executable.
    pub args: Vec<String>,
    /// Extra environment for the installer process.
    pub env: BTreeMap<String, String>,
}

/// One step of a build plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Download a source archive, verify it and unpack it.
    Fetch {
        /// Archive URL.
        url: String,
        /// Published SHA-256 of the archive; unverified when absent.
        sha256: Option<String>,
        /// Extraction directory.
        dest: PathBuf,
        /// Drop the archive's top-level directory while extracting.
        strip_root: bool,
    },
    /// Download a single file without checksum (vendor installers).
    Download {
        /// File URL.
        url: String,
        /// Destination file.
        dest: PathBuf,
    },
    /// Run an external tool; a non-zero exit fails the build.
    Run(ToolInvocation),
    /// Copy files under `from` whose relative path matches `pattern`,
    /// keeping that relative path.
    Copy {
        /// Source directory.
        from: PathBuf,
        /// Destination directory.
        to: PathBuf,
        /// Glob over the `/`-separated relative path; `*` matches any run of
        /// characters, so `LICENSE` only matches at the top level and `*.h`
        /// matches at any depth.
        pattern: String,
    },
    /// Rename a file; skipped when `from` is absent and `required` is false.
    Rename {
        /// Existing path.
        from: PathBuf,
        /// New path.
        to: PathBuf,
        /// Fail if `from` does not exist.
        required: bool,
    },
    /// Replace text in every file named `file_name` under `root`.
    ReplaceInFiles {
        /// Directory searched recursively.
        root: PathBuf,
        /// Exact file name to patch (`Makefile`, `Makefile.in`).
        file_name: String,
        /// Text to replace.
        search: String,
        /// Replacement.
        replace: String,
    },
    /// Remove a file or directory tree, if present.
    Remove {
        /// Path to remove.
        path: PathBuf,
    },
    /// Mark a file executable.
    MakeExecutable {
        /// File to change.
        path: PathBuf,
    },
    /// Write a generated file.
    WriteFile {
        /// Destination file.
        path: PathBuf,
        /// Contents.
        contents: String,
    },
    /// Run a vendor installer.
    Install(InstallerRun),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch { url, dest, .. } => write!(f, "fetch {url} -> {}", dest.display()),
            Self::Download { url, dest } => write!(f, "download {url} -> {}", dest.display()),
            Self::Run(inv) => write!(f, "run {inv}"),
            Self::Copy { from, to, pattern } => write!(
                f,
                "copy {}/{pattern} -> {}",
                from.display(),
                to.display()
            ),
            Self::Rename { from, to, .. } => {
                write!(f, "rename {} -> {}", from.display(), to.display())
            }
            Self::ReplaceInFiles {
                root, file_name, ..
            } => write!(f, "patch {}/**/{file_name}", root.display()),
            Self::Remove { path } => write!(f, "remove {}", path.display()),
            Self::MakeExecutable { path } => write!(f, "chmod +x {}", path.display()),
            Self::WriteFile { path, .. } => write!(f, "write {}", path.display()),
            Self::Install(run) => write!(
                f,
                "install {} {}",
                run.installer.display(),
                run.args.join(" ")
            ),
        }
    }
}

/// Ordered steps producing one package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    /// Steps, executed in order.
    pub steps: Vec<Step>,
}

impl BuildPlan {
    /// Appends a step.
    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Appends a tool invocation.
    pub fn run(&mut self, invocation: ToolInvocation) {
        self.steps.push(Step::Run(invocation));
    }

    /// All tool invocations, in order.
    pub fn invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.steps.iter().filter_map(|step| match step {
            Step::Run(inv) => Some(inv),
            _ => None,
        })
    }
}

/// Kind of artifact checked after installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArtifactKind {
    /// A directory that must exist.
    Directory,
    /// A regular file that must exist.
    File,
}

/// An artifact the install step must have produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpectedArtifact {
    /// Short human description ("library directory").
    pub description: &'static str,
    /// Directory or file.
    pub kind: ArtifactKind,
    /// Absolute path.
    pub path: PathBuf,
}

impl ExpectedArtifact {
    /// An expected directory.
    #[must_use]
    pub fn dir(description: &'static str, path: impl Into<PathBuf>) -> Self {
        Self {
            description,
            kind: ArtifactKind::Directory,
            path: path.into(),
        }
    }

    /// An expected file.
    #[must_use]
    pub fn file(description: &'static str, path: impl Into<PathBuf>) -> Self {
        Self {
            description,
            kind: ArtifactKind::File,
            path: path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_keys_build_and_package_by_id() {
        let layout = BuildLayout::under(Path::new("/ws"), "zlib", "1.3.1", "abc");
        assert_eq!(layout.source_dir, Path::new("/ws/zlib/1.3.1/src"));
        assert_eq!(layout.build_dir, Path::new("/ws/zlib/1.3.1/build/abc"));
        assert_eq!(layout.package_dir, Path::new("/ws/zlib/1.3.1/package/abc"));
        assert!(layout.toolchain_file().ends_with("kforge_toolchain.cmake"));
    }

    #[test]
    fn invocation_display_quotes_spaced_args() {
        let inv = ToolInvocation::new("cmake").args(["-G", "Unix Makefiles"]);
        assert_eq!(inv.to_string(), "cmake -G \"Unix Makefiles\"");
    }

    #[test]
    fn invocations_skip_non_run_steps() {
        let mut plan = BuildPlan::default();
        plan.push(Step::Remove {
            path: PathBuf::from("/tmp/x"),
        });
        plan.run(ToolInvocation::new("make"));
        assert_eq!(plan.invocations().count(), 1);
    }
}

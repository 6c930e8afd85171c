//! Running downloaded vendor installers unattended.
//!
//! `.run` and `.exe` installers are executed directly. A `.dmg` is attached
//! read-only, its application bundle copied next to the image, the volume
//! detached, and the bundled executable started from the copy.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use kforge_common::error::{KforgeError, Result};
use kforge_recipe::plan::{InstallerFormat, InstallerRun, ToolInvocation};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::runner::ToolRunner;
use crate::staging;

/// Name of the bundle copied out of the disk image.
const APP_COPY_NAME: &str = "qt-online-installer-macOS.app";
/// Prefix of the executable inside `Contents/MacOS`.
const APP_EXECUTABLE_PREFIX: &str = "qt-online-installer-macOS";

fn xml_error(e: impl std::fmt::Display) -> KforgeError {
    KforgeError::Parse {
        what: "hdiutil plist",
        message: e.to_string(),
    }
}

/// Reads the first `mount-point` value from `hdiutil attach -plist` output.
///
/// # Errors
///
/// Returns `KforgeError::Parse` if the plist is malformed or mounts
/// nothing.
pub fn parse_mount_point(plist: &str) -> Result<PathBuf> {
    let mut reader = Reader::from_str(plist);
    reader.config_mut().trim_text(true);
    let mut after_mount_key = false;
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) if e.name().as_ref() == b"key" => {
                let key = reader.read_text(e.name()).map_err(xml_error)?;
                after_mount_key = key == "mount-point";
            }
            Event::Start(e) if e.name().as_ref() == b"string" && after_mount_key => {
                let value: Cow<'_, str> = reader.read_text(e.name()).map_err(xml_error)?;
                if !value.is_empty() {
                    return Ok(PathBuf::from(value.as_ref()));
                }
                after_mount_key = false;
            }
            Event::Start(_) | Event::Empty(_) => after_mount_key = false,
            Event::Eof => break,
            _ => {}
        }
    }
    Err(xml_error("no mount-point in hdiutil output"))
}

fn find_entry(dir: &Path, matches: impl Fn(&str) -> bool, what: &'static str) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|e| KforgeError::io(dir, e))?;
    let mut found: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(&matches))
        .collect();
    found.sort();
    found.into_iter().next().ok_or_else(|| KforgeError::Validation {
        kind: what,
        path: dir.to_path_buf(),
    })
}

fn direct_invocation(installer: &Path, run: &InstallerRun) -> ToolInvocation {
    let mut invocation = ToolInvocation::new(installer.display().to_string()).args(run.args.iter().cloned());
    for (key, value) in &run.env {
        invocation = invocation.env(key.as_str(), value.as_str());
    }
    invocation
}

/// Runs `run` with `runner`. `work_dir` receives the copied application
/// bundle for disk images.
///
/// # Errors
///
/// Returns an error if attaching, copying or the installer itself fails.
pub fn run_installer(run: &InstallerRun, runner: &dyn ToolRunner, work_dir: &Path) -> Result<()> {
    tracing::info!(installer = %run.installer.display(), format = ?run.format, "running installer");
    match run.format {
        InstallerFormat::Run | InstallerFormat::Exe => {
            let _ = runner.run(&direct_invocation(&run.installer, run))?;
        }
        InstallerFormat::Dmg => {
            let attach = runner.run(
                &ToolInvocation::new("hdiutil")
                    .args(["attach", "-nobrowse", "-readonly", "-noautoopen", "-plist"])
                    .arg(run.installer.display().to_string()),
            )?;
            let mount = parse_mount_point(&attach.stdout)?;
            tracing::debug!(mount = %mount.display(), "disk image attached");

            let app = work_dir.join(APP_COPY_NAME);
            let copied = find_entry(&mount, |n| n.ends_with(".app"), "application bundle in disk image")
                .and_then(|bundle| {
                    staging::remove_path(&app)?;
                    staging::copy_tree(&bundle, &app)
                });
            let detached = runner.run(
                &ToolInvocation::new("hdiutil")
                    .arg("detach")
                    .arg(mount.display().to_string()),
            );
            copied?;
            let _ = detached?;

            let executable = find_entry(
                &app.join("Contents/MacOS"),
                |n| n.starts_with(APP_EXECUTABLE_PREFIX),
                "installer executable",
            )?;
            staging::make_executable(&executable)?;
            let _ = runner.run(&direct_invocation(&executable, run))?;
        }
    }
    Ok(())
}

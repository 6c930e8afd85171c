//! External tool execution.
//!
//! Every tool call goes through a [`ToolRunner`] with an explicit argument
//! list; nothing is ever passed through a shell.

use std::collections::BTreeMap;
use std::process::Command;
use std::sync::Mutex;

use kforge_common::error::{KforgeError, Result};
use kforge_recipe::plan::ToolInvocation;

/// Captured output of a finished tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code (`-1` when terminated by a signal).
    pub exit_code: i32,
}

/// Executes tool invocations.
pub trait ToolRunner: Send + Sync {
    /// Runs `invocation` to completion.
    ///
    /// # Errors
    ///
    /// Returns `KforgeError::Build` on a non-zero exit and
    /// `KforgeError::Io` if the program cannot be started.
    fn run(&self, invocation: &ToolInvocation) -> Result<ExecOutput>;
}

/// Number of trailing stderr lines kept in a build error.
const STDERR_TAIL: usize = 20;

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    lines[lines.len().saturating_sub(STDERR_TAIL)..].join("\n")
}

/// Runs tools as child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ExecOutput> {
        tracing::info!(command = %invocation, "running");
        let mut command = Command::new(&invocation.program);
        let _ = command.args(&invocation.args).envs(&invocation.env);
        if let Some(dir) = &invocation.cwd {
            let _ = command.current_dir(dir);
        }

        let output = command
            .output()
            .map_err(|e| KforgeError::io(&invocation.program, e))?;
        let result = ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        };
        tracing::debug!(program = %invocation.program, exit_code = result.exit_code, stdout = %result.stdout);

        if output.status.success() {
            Ok(result)
        } else {
            Err(KforgeError::Build {
                program: invocation.program.clone(),
                status: result.exit_code,
                stderr: stderr_tail(&result.stderr),
            })
        }
    }
}

/// Records invocations instead of executing them.
///
/// Every call succeeds with empty output unless a canned output was
/// registered for the program, or the program was marked as failing.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<ToolInvocation>>,
    outputs: BTreeMap<String, String>,
    failing: BTreeMap<String, i32>,
}

impl RecordingRunner {
    /// A runner with no canned outputs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `stdout` whenever `program` runs.
    #[must_use]
    pub fn with_output(mut self, program: impl Into<String>, stdout: impl Into<String>) -> Self {
        let _ = self.outputs.insert(program.into(), stdout.into());
        self
    }

    /// Makes `program` exit with `status`.
    #[must_use]
    pub fn failing(mut self, program: impl Into<String>, status: i32) -> Self {
        let _ = self.failing.insert(program.into(), status);
        self
    }

    /// Invocations seen so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl ToolRunner for RecordingRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ExecOutput> {
        tracing::debug!(command = %invocation, "recording");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }
        if let Some(&status) = self.failing.get(&invocation.program) {
            return Err(KforgeError::Build {
                program: invocation.program.clone(),
                status,
                stderr: String::new(),
            });
        }
        Ok(ExecOutput {
            stdout: self
                .outputs
                .get(&invocation.program)
                .cloned()
                .unwrap_or_default(),
            ..ExecOutput::default()
        })
    }
}

//! The build invoker boundary and its process-backed implementation.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

/// Result of one build attempt. Never retried by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The build produced a complete artifact directory.
    Success {
        /// Directory holding the fresh artifacts.
        output_dir: PathBuf,
        /// The build was skipped because artifacts were already compiled.
        precompiled: bool,
    },
    /// The build failed; its output must not be used.
    Failure {
        /// Human-readable cause.
        reason: String,
    },
}

/// Runs the artifact-producing tool.
///
/// Implementations block until the build has definitively succeeded or
/// failed. On success the reported output directory must be complete.
pub trait BuildInvoker {
    /// Runs one build attempt.
    fn run_build(&mut self) -> BuildOutcome;
}

/// Runs an external command as the build step.
#[derive(Debug, Clone)]
pub struct CommandInvoker {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
    output_dir: PathBuf,
    env_defaults: BTreeMap<String, String>,
    precompiled_marker: Option<PathBuf>,
}

impl CommandInvoker {
    /// Creates an invoker running `command` (program then arguments) in
    /// `working_dir`, expecting artifacts in `output_dir`.
    ///
    /// Returns `None` when `command` is empty.
    pub fn new(command: &[String], working_dir: &Path, output_dir: &Path) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            working_dir: working_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            env_defaults: BTreeMap::new(),
            precompiled_marker: None,
        })
    }

    /// Sets a variable for the build unless the invoking environment already
    /// defines it.
    pub fn env_default(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_defaults.insert(key.into(), value.into());
        self
    }

    /// Treats the build as already done when `marker` exists.
    pub fn precompiled_marker(mut self, marker: impl Into<PathBuf>) -> Self {
        self.precompiled_marker = Some(marker.into());
        self
    }

    /// Returns the environment entries the command will receive, given the
    /// variables the invoking environment already defines.
    fn effective_env(&self, existing: impl Fn(&str) -> Option<OsString>) -> Vec<(&str, &str)> {
        self.env_defaults
            .iter()
            .filter(|(key, _)| existing(key.as_str()).is_none())
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect()
    }

    fn run_command(&self) -> Result<(), String> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).current_dir(&self.working_dir);
        for (key, value) in self.effective_env(|key| std::env::var_os(key)) {
            command.env(key, value);
        }

        debug!(
            program = %self.program,
            args = ?self.args,
            working_dir = %self.working_dir.display(),
            "spawning build"
        );

        let status = command
            .status()
            .map_err(|e| format!("failed to run '{}': {e}", self.program))?;

        match status.code() {
            _ if status.success() => Ok(()),
            Some(code) => Err(format!("'{}' exited with status {code}", self.program)),
            None => Err(format!("'{}' was terminated by a signal", self.program)),
        }
    }
}

impl BuildInvoker for CommandInvoker {
    fn run_build(&mut self) -> BuildOutcome {
        let precompiled = self
            .precompiled_marker
            .as_ref()
            .is_some_and(|marker| marker.exists());
        if precompiled {
            info!("detected precompiled artifacts, assuming they were compiled locally");
        } else if let Err(reason) = self.run_command() {
            return BuildOutcome::Failure { reason };
        }

        if !self.output_dir.is_dir() {
            warn!(
                output = %self.output_dir.display(),
                "build succeeded but produced no output directory"
            );
            return BuildOutcome::Failure {
                reason: format!(
                    "build produced no output at '{}'",
                    self.output_dir.display()
                ),
            };
        }

        BuildOutcome::Success {
            output_dir: self.output_dir.clone(),
            precompiled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandInvoker::new(&[], Path::new("."), Path::new("out")).is_none());
    }

    #[test]
    fn env_defaults_do_not_override() {
        let invoker = CommandInvoker::new(&argv(&["true"]), Path::new("."), Path::new("out"))
            .unwrap()
            .env_default("RAILS_ENV", "production")
            .env_default("RAILS_GROUPS", "assets");
        let existing = |key: &str| (key == "RAILS_ENV").then(|| OsString::from("staging"));
        assert_eq!(invoker.effective_env(existing), vec![("RAILS_GROUPS", "assets")]);
    }

    #[test]
    fn precompiled_marker_skips_command() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("manifest.yml");
        std::fs::write(&marker, "").unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        let mut invoker = CommandInvoker::new(
            &argv(&["definitely-not-a-real-program-xyz"]),
            dir.path(),
            &out,
        )
        .unwrap()
        .precompiled_marker(&marker);
        assert_eq!(
            invoker.run_build(),
            BuildOutcome::Success {
                output_dir: out,
                precompiled: true
            }
        );
    }

    #[test]
    fn spawn_failure_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut invoker = CommandInvoker::new(
            &argv(&["definitely-not-a-real-program-xyz"]),
            dir.path(),
            &dir.path().join("out"),
        )
        .unwrap();
        assert!(matches!(invoker.run_build(), BuildOutcome::Failure { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn command_writing_output_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("public/dist");
        let mut invoker = CommandInvoker::new(
            &argv(&["sh", "-c", "mkdir -p public/dist && echo $STAGE > public/dist/app.js"]),
            dir.path(),
            &out,
        )
        .unwrap()
        .env_default("STAGE", "compiled");
        assert!(matches!(invoker.run_build(), BuildOutcome::Success { precompiled: false, .. }));
        assert!(out.join("app.js").exists());
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut invoker =
            CommandInvoker::new(&argv(&["sh", "-c", "exit 3"]), dir.path(), dir.path()).unwrap();
        match invoker.run_build() {
            BuildOutcome::Failure { reason } => assert!(reason.contains("status 3")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn success_without_output_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut invoker =
            CommandInvoker::new(&argv(&["true"]), dir.path(), &dir.path().join("missing")).unwrap();
        assert!(matches!(invoker.run_build(), BuildOutcome::Failure { .. }));
    }
}

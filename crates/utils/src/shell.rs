//! A small primitive for "run a sequence of commands against one working
//! directory, sharing a single combined stdout/stderr buffer, abort on the
//! first non-zero exit" — every worker operation in `vcs` is built from this
//! instead of ad-hoc `std::process::Command` glue at each call site.

use std::{
    ffi::OsStr,
    path::Path,
    process::{Command, Output},
};

use thiserror::Error;

/// One step in a [`CommandPipeline`] failed.
#[derive(Debug, Error)]
#[error("`{program} {args}` failed (exit {code:?}): {combined}")]
pub struct StepError {
    pub program: String,
    pub args: String,
    pub code: Option<i32>,
    pub combined: String,
}

/// The full, concatenated stdout+stderr of every step that ran before a
/// pipeline either completed or aborted. Order matches execution order.
#[derive(Debug, Default, Clone)]
pub struct CombinedOutput {
    pub text: String,
}

impl CombinedOutput {
    /// Interpret the substring as a success marker — e.g. git's
    /// "is up to date" rebase message.
    pub fn contains(&self, marker: &str) -> bool {
        self.text.contains(marker)
    }
}

/// Resolve an executable on `PATH`, so callers fail fast with a clear error
/// instead of letting `std::process::Command` report a generic ENOENT.
pub fn resolve_executable_path(name: &str) -> Option<std::path::PathBuf> {
    which_on_path(name)
}

fn which_on_path(name: &str) -> Option<std::path::PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Runs a sequence of subprocess invocations in `cwd`, stopping at the first
/// failure. Every invocation's stdout+stderr is appended to one running
/// buffer so later steps (or the caller) can grep earlier output, mirroring
/// a shell pipeline's combined stream.
pub struct CommandPipeline<'a> {
    cwd: &'a Path,
    program: String,
    combined: String,
}

impl<'a> CommandPipeline<'a> {
    pub fn new(cwd: &'a Path, program: impl Into<String>) -> Self {
        Self {
            cwd,
            program: program.into(),
            combined: String::new(),
        }
    }

    /// Run one step; on success the step's stdout is returned and also
    /// folded into the running combined buffer.
    pub fn step<I, S>(&mut self, args: I) -> Result<String, StepError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.step_with_envs(args, &[])
    }

    pub fn step_with_envs<I, S>(
        &mut self,
        args: I,
        envs: &[(&str, &str)],
    ) -> Result<String, StepError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.as_ref().to_string_lossy().to_string())
            .collect();

        let program_path =
            resolve_executable_path(&self.program).unwrap_or_else(|| self.program.clone().into());
        let mut cmd = Command::new(program_path);
        cmd.current_dir(self.cwd);
        for (k, v) in envs {
            cmd.env(k, v);
        }
        for a in &args {
            cmd.arg(a);
        }

        let output: Output = cmd.output().map_err(|e| StepError {
            program: self.program.clone(),
            args: args.join(" "),
            code: None,
            combined: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        self.combined.push_str(&stdout);
        self.combined.push_str(&stderr);

        if !output.status.success() {
            return Err(StepError {
                program: self.program.clone(),
                args: args.join(" "),
                code: output.status.code(),
                combined: format!("{stdout}{stderr}"),
            });
        }

        Ok(stdout)
    }

    /// Consume the pipeline, returning everything captured so far.
    pub fn into_combined(self) -> CombinedOutput {
        CombinedOutput { text: self.combined }
    }

    pub fn combined(&self) -> CombinedOutput {
        CombinedOutput { text: self.combined.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_steps_accumulate_combined_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = CommandPipeline::new(dir.path(), "git");
        pipeline.step(["init", "--quiet"]).unwrap();
        pipeline
            .step(["config", "user.email", "test@example.com"])
            .unwrap();
        pipeline.step(["config", "user.name", "Test"]).unwrap();
        let out = pipeline.into_combined();
        assert!(!out.text.contains("fatal"));
    }

    #[test]
    fn failing_step_surfaces_combined_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = CommandPipeline::new(dir.path(), "git");
        let err = pipeline.step(["not-a-real-subcommand"]).unwrap_err();
        assert!(err.code != Some(0));
    }
}

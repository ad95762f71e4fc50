//! Git operations used by the repository publisher

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

use crate::error::{BackupError, Result};

/// The version-control steps the repository publisher relies on
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Clone `remote` into `path` unless `path` already is a working copy
    async fn ensure_working_copy(&self, path: &Path, remote: &str) -> Result<()>;

    /// Set the commit identity in the working copy's local config
    async fn configure_user(
        &self,
        path: &Path,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<()>;

    async fn stage_all(&self, path: &Path) -> Result<()>;

    async fn has_staged_changes(&self, path: &Path) -> Result<bool>;

    async fn commit(&self, path: &Path, message: &str) -> Result<()>;

    /// Push to `origin`; `None` pushes the current branch
    async fn push(&self, path: &Path, branch: Option<&str>) -> Result<()>;
}

/// Runs the external `git` binary.
///
/// Child processes are killed when their future is dropped, so cancelling a publish
/// does not leave a clone or push running in the background.
pub struct GitCli {
    binary_path: PathBuf,
}

impl GitCli {
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Locate `git` in PATH
    pub fn from_path() -> Result<Self> {
        which::which("git")
            .map(Self::new)
            .map_err(|_| BackupError::ToolMissing("git"))
    }

    fn command(&self, dir: Option<&Path>) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.stdin(Stdio::null())
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    async fn output(&self, step: &'static str, dir: Option<&Path>, args: &[&str]) -> Result<Output> {
        tracing::debug!(step, args = ?args, "Running git");
        self.command(dir)
            .args(args)
            .output()
            .await
            .map_err(|e| BackupError::vcs(step, format!("failed to execute git: {e}")))
    }

    async fn run(&self, step: &'static str, dir: Option<&Path>, args: &[&str]) -> Result<Output> {
        let output = self.output(step, dir, args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackupError::vcs(
                step,
                format!("{} ({})", stderr.trim(), output.status),
            ));
        }
        Ok(output)
    }

    /// True only when `path` is the top level of a working copy, not merely somewhere
    /// inside another repository
    async fn is_working_copy(&self, path: &Path) -> bool {
        if !path.is_dir() {
            return false;
        }
        let Ok(output) = self
            .output("rev-parse", Some(path), &["rev-parse", "--show-toplevel"])
            .await
        else {
            return false;
        };
        if !output.status.success() {
            return false;
        }

        let toplevel = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        match (toplevel.canonicalize(), path.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn ensure_working_copy(&self, path: &Path, remote: &str) -> Result<()> {
        if self.is_working_copy(path).await {
            tracing::debug!(path = %path.display(), "Working copy already present");
            return Ok(());
        }

        tracing::info!(path = %path.display(), remote, "Cloning repository");
        let target = path.to_string_lossy();
        self.run("clone", None, &["clone", "--", remote, target.as_ref()])
            .await?;
        Ok(())
    }

    async fn configure_user(
        &self,
        path: &Path,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<()> {
        if let Some(name) = name {
            self.run("config", Some(path), &["config", "user.name", name])
                .await?;
        }
        if let Some(email) = email {
            self.run("config", Some(path), &["config", "user.email", email])
                .await?;
        }
        Ok(())
    }

    async fn stage_all(&self, path: &Path) -> Result<()> {
        self.run("add", Some(path), &["add", "--all"]).await?;
        Ok(())
    }

    async fn has_staged_changes(&self, path: &Path) -> Result<bool> {
        let output = self
            .output("diff", Some(path), &["diff", "--cached", "--quiet"])
            .await?;
        // --quiet exits 1 when there are differences
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(BackupError::vcs(
                "diff",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )),
        }
    }

    async fn commit(&self, path: &Path, message: &str) -> Result<()> {
        self.run("commit", Some(path), &["commit", "--quiet", "-m", message])
            .await?;
        Ok(())
    }

    async fn push(&self, path: &Path, branch: Option<&str>) -> Result<()> {
        let refspec = branch.unwrap_or("HEAD");
        self.run("push", Some(path), &["push", "origin", refspec])
            .await?;
        Ok(())
    }
}

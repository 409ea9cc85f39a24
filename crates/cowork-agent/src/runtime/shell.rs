//! Shell command execution for dynamic skill context and hooks.
//!
//! `LocalShell` applies a textual denylist before spawning. It filters obviously dangerous
//! commands; it is not an isolation boundary.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::safe_truncate;

/// Commands containing any of these fragments are refused.
const DANGEROUS_COMMANDS: &[&str] = &[
    "rm -rf /",
    "dd if=",
    "mkfs",
    "format",
    ":(){:|:&};:",
    "chmod 777",
    "chown",
    "sudo",
    "su ",
];

/// Commands touching these paths are refused.
const SENSITIVE_PATHS: &[&str] = &["~/.ssh", "~/.aws", "/etc/passwd", "/etc/shadow", ".env"];

const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait ShellRunner: Send + Sync {
    async fn run(&self, command: &str) -> Result<CommandOutput>;
}

/// Reason a command is refused, if any.
pub fn check_command(command: &str) -> Option<String> {
    if let Some(d) = DANGEROUS_COMMANDS.iter().find(|d| command.contains(*d)) {
        return Some(format!("命令包含危险操作: {}", d));
    }
    SENSITIVE_PATHS
        .iter()
        .find(|p| command.contains(*p))
        .map(|p| format!("命令尝试访问敏感路径: {}", p))
}

/// Runs `sh -c <command>` in the workspace with a timeout.
#[derive(Debug, Clone)]
pub struct LocalShell {
    cwd: PathBuf,
    timeout: Duration,
}

impl LocalShell {
    pub fn new(cwd: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            cwd: cwd.into(),
            timeout,
        }
    }
}

fn capped(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    safe_truncate(&text, MAX_OUTPUT_BYTES).to_string()
}

#[async_trait]
impl ShellRunner for LocalShell {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        if let Some(reason) = check_command(command) {
            tracing::warn!(command, %reason, "command refused");
            anyhow::bail!(reason);
        }
        tracing::debug!(command, cwd = %self.cwd.display(), "running shell command");

        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.cwd)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn command: {}", command))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.context("Error waiting for command")?,
            Err(_) => anyhow::bail!(
                "Command execution timeout ({}s)",
                self.timeout.as_secs()
            ),
        };

        Ok(CommandOutput {
            stdout: capped(&output.stdout),
            stderr: capped(&output.stderr),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denylist() {
        assert!(check_command("sudo ls").is_some());
        assert!(check_command("cat ~/.ssh/id_rsa").unwrap().contains("~/.ssh"));
        assert!(check_command("cat .env").is_some());
        assert!(check_command("git status").is_none());
    }

    #[tokio::test]
    async fn test_runs_in_cwd_and_reports_exit_code() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("marker.txt"), "x").unwrap();
        let shell = LocalShell::new(tmp.path(), Duration::from_secs(10));

        let out = shell.run("ls").await.unwrap();
        assert!(out.success());
        assert!(out.stdout.contains("marker.txt"));

        let failed = shell.run("echo oops >&2; exit 3").await.unwrap();
        assert_eq!(failed.exit_code, 3);
        assert_eq!(failed.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_timeout() {
        let tmp = tempfile::tempdir().unwrap();
        let shell = LocalShell::new(tmp.path(), Duration::from_millis(100));
        let err = shell.run("sleep 5").await.unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }
}

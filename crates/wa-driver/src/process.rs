//! Bridge process management
//!
//! Spawns the Node.js bridge with piped stdio and owns its lifetime.
//! The protocol layer writes command lines through this handle; stdout
//! is handed to the caller's reader task at spawn time.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::{DriverError, Result};
use crate::protocol::BridgeCommand;

/// Handle to a running bridge process
pub struct BridgeProcess {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
}

impl BridgeProcess {
    /// Spawn the bridge and hand back its stdout for the reader task.
    ///
    /// Fails when the process cannot be spawned or exits within the
    /// first grace period, which catches bad script paths early.
    pub async fn spawn(config: &BridgeConfig) -> Result<(Self, ChildStdout)> {
        info!(
            script = %config.script_path.display(),
            headless = config.headless,
            "Starting bridge process"
        );

        let mut command = Command::new(&config.node_binary);
        command
            .arg(&config.script_path)
            .env("WA_SESSION_PATH", &config.storage_path)
            .env("WA_HEADLESS", if config.headless { "true" } else { "false" })
            .env("WA_BROWSER_ARGS", config.browser_args.join(","))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            DriverError::Spawn(format!(
                "{} {}: {}",
                config.node_binary,
                config.script_path.display(),
                e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DriverError::Spawn("Bridge stdin not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DriverError::Spawn("Bridge stdout not piped".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(target: "wa_bridge", "{}", line);
                }
            });
        }

        // Let a broken launch fail fast instead of timing out later.
        tokio::time::sleep(Duration::from_millis(500)).await;
        match child.try_wait() {
            Ok(Some(status)) => {
                return Err(DriverError::Exited(format!(
                    "exited immediately with {}",
                    status
                )));
            }
            Ok(None) => {}
            Err(e) => {
                return Err(DriverError::Spawn(format!(
                    "Failed to check bridge status: {}",
                    e
                )));
            }
        }

        info!(pid = child.id(), "Bridge process started");
        Ok((
            Self {
                child: Mutex::new(child),
                stdin: Mutex::new(stdin),
            },
            stdout,
        ))
    }

    /// Write one command as a JSON line
    pub async fn write_command(&self, command: &BridgeCommand) -> Result<()> {
        let mut line = serde_json::to_vec(command)?;
        line.push(b'\n');

        let mut stdin = self.stdin.lock().await;
        stdin.write_all(&line).await?;
        stdin.flush().await?;
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        matches!(self.child.lock().await.try_wait(), Ok(None))
    }

    /// Give the child `grace` to exit on its own, then kill it
    pub async fn wait_or_kill(&self, grace: Duration) {
        {
            let mut child = self.child.lock().await;
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => {
                    info!(%status, "Bridge process exited");
                    return;
                }
                Ok(Err(e)) => warn!(error = %e, "Error waiting for bridge process"),
                Err(_) => debug!("Bridge still running after grace period"),
            }
        }
        self.shutdown().await;
    }

    /// Kill the child and reap it, bounded
    pub async fn shutdown(&self) {
        let mut child = self.child.lock().await;
        if matches!(child.try_wait(), Ok(Some(_))) {
            debug!("Bridge process already exited");
            return;
        }

        if let Err(e) = child.start_kill() {
            warn!(error = %e, "Failed to kill bridge process");
        }
        match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
            Ok(Ok(status)) => info!(%status, "Bridge process exited"),
            Ok(Err(e)) => warn!(error = %e, "Error waiting for bridge process"),
            Err(_) => warn!("Bridge process did not exit after kill"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_running_forever() -> BridgeConfig {
        // `sleep 600` stands in for the bridge: spawnable everywhere
        // tests run, stays alive until killed.
        BridgeConfig {
            node_binary: "sleep".to_string(),
            script_path: "600".into(),
            ..BridgeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_spawn_and_shutdown() {
        let (process, _stdout) = BridgeProcess::spawn(&config_running_forever())
            .await
            .unwrap();

        assert!(process.is_running().await);
        process.shutdown().await;
        assert!(!process.is_running().await);
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let config = BridgeConfig {
            node_binary: "wa-driver-no-such-binary".to_string(),
            ..BridgeConfig::default()
        };

        let result = BridgeProcess::spawn(&config).await;
        assert!(matches!(result, Err(DriverError::Spawn(_))));
    }

    #[tokio::test]
    async fn test_spawn_detects_immediate_exit() {
        let config = BridgeConfig {
            node_binary: "true".to_string(),
            script_path: "ignored".into(),
            ..BridgeConfig::default()
        };

        let result = BridgeProcess::spawn(&config).await;
        assert!(matches!(result, Err(DriverError::Exited(_))));
    }

    #[tokio::test]
    async fn test_wait_or_kill_falls_back_to_kill() {
        let (process, _stdout) = BridgeProcess::spawn(&config_running_forever())
            .await
            .unwrap();

        process.wait_or_kill(Duration::from_millis(50)).await;
        assert!(!process.is_running().await);
    }
}

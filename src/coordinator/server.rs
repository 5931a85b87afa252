//! Shared automation server process
//!
//! One server process brokers every driver session. It is launched by the
//! first job that needs it and stopped when the last job releases it. The
//! process handle and the reference count live behind one mutex, which is
//! held only while counting, launching or stopping.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::config::ServerConfig;
use crate::common::{is_ready_line, Error, Result};

/// How to launch the server
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub program: PathBuf,
    /// Extra arguments after `-a <host> -p <port>`
    pub args: Vec<String>,
    pub ready_banner: String,
    pub ready_timeout: Duration,
}

impl ServerSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            program: config.resolve_program(),
            args: config.args.clone(),
            ready_banner: config.ready_banner.clone(),
            ready_timeout: config.ready_timeout(),
        }
    }
}

/// How the launch wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Banner seen
    Ready,
    /// No banner within the timeout; continuing anyway
    TimedOut,
    /// Waiting was cut short by cancellation
    Interrupted,
}

struct ServerProcess {
    child: Child,
    forwarders: Vec<JoinHandle<()>>,
}

#[derive(Default)]
struct Inner {
    process: Option<ServerProcess>,
    ref_count: usize,
}

/// Reference-counted handle to the shared server
pub struct SharedServer {
    settings: ServerSettings,
    inner: Mutex<Inner>,
}

impl SharedServer {
    pub fn new(settings: ServerSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Take a reference, launching the server if none is running
    ///
    /// A failed launch leaves the count untouched.
    pub async fn acquire(&self, host: &str, port: u16, cancel: &CancellationToken) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if inner.process.is_none() {
            let (process, readiness) = self.launch(host, port, cancel).await?;
            match readiness {
                Readiness::Ready => tracing::info!(host, port, "Automation server ready"),
                Readiness::TimedOut => tracing::warn!(
                    timeout_secs = self.settings.ready_timeout.as_secs(),
                    "Automation server did not report ready in time, continuing"
                ),
                Readiness::Interrupted => {
                    tracing::debug!("Stopped waiting for automation server readiness")
                }
            }
            inner.process = Some(process);
        }

        inner.ref_count += 1;
        tracing::debug!(ref_count = inner.ref_count, "Automation server acquired");
        Ok(())
    }

    /// Drop a reference, stopping the server when none remain
    pub async fn release(&self) {
        let mut inner = self.inner.lock().await;
        inner.ref_count = inner.ref_count.saturating_sub(1);
        tracing::debug!(ref_count = inner.ref_count, "Automation server released");

        if inner.ref_count == 0 {
            if let Some(process) = inner.process.take() {
                stop(process).await;
            }
        }
    }

    pub async fn ref_count(&self) -> usize {
        self.inner.lock().await.ref_count
    }

    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.process.is_some()
    }

    /// Process id of the running server
    pub async fn pid(&self) -> Option<u32> {
        self.inner
            .lock()
            .await
            .process
            .as_ref()
            .and_then(|p| p.child.id())
    }

    async fn launch(&self, host: &str, port: u16, cancel: &CancellationToken) -> Result<(ServerProcess, Readiness)> {
        let program = &self.settings.program;
        tracing::info!(program = %program.display(), host, port, "Launching automation server");

        let mut cmd = Command::new(program);
        cmd.arg("-a")
            .arg(host)
            .arg("-p")
            .arg(port.to_string())
            .args(&self.settings.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            Error::ServerLaunch(format!("Failed to start {}: {}", program.display(), e))
        })?;

        let (line_tx, mut line_rx) = mpsc::unbounded_channel();
        let mut forwarders = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(tokio::spawn(forward_lines(stdout, line_tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(tokio::spawn(forward_lines(stderr, line_tx)));
        }

        let banner = self.settings.ready_banner.as_str();
        let wait = async {
            while let Some(line) = line_rx.recv().await {
                if is_ready_line(&line, banner) {
                    return true;
                }
            }
            // Both streams closed: the process is gone
            false
        };

        let readiness = tokio::select! {
            seen = wait => {
                if seen {
                    Readiness::Ready
                } else {
                    let status = child.wait().await.ok();
                    return Err(Error::ServerLaunch(format!(
                        "{} exited before becoming ready{}",
                        program.display(),
                        status.map(|s| format!(" ({})", s)).unwrap_or_default()
                    )));
                }
            }
            _ = tokio::time::sleep(self.settings.ready_timeout) => Readiness::TimedOut,
            _ = cancel.cancelled() => Readiness::Interrupted,
        };

        tracing::debug!(pid = ?child.id(), "Automation server started");
        Ok((ServerProcess { child, forwarders }, readiness))
    }
}

/// Log every output line and hand it to the readiness watcher
async fn forward_lines<R: AsyncRead + Unpin>(stream: R, tx: mpsc::UnboundedSender<String>) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(target: "automation_server", "{}", line);
        // Nobody listens once the server is ready
        let _ = tx.send(line);
    }
}

async fn stop(mut process: ServerProcess) {
    let pid = process.child.id();
    tracing::info!(pid = ?pid, "Stopping automation server");

    if let Err(e) = process.child.start_kill() {
        tracing::warn!(pid = ?pid, error = %e, "Failed to signal automation server");
    }
    match process.child.wait().await {
        Ok(status) => tracing::debug!(pid = ?pid, %status, "Automation server exited"),
        Err(e) => tracing::warn!(pid = ?pid, error = %e, "Failed waiting for automation server"),
    }
    for forwarder in process.forwarders {
        forwarder.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(program: &str) -> ServerSettings {
        ServerSettings {
            program: PathBuf::from(program),
            args: Vec::new(),
            ready_banner: "ready".to_string(),
            ready_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_launch_failure_leaves_count_untouched() {
        let server = SharedServer::new(settings("/nonexistent/automation-server"));
        let err = server
            .acquire("127.0.0.1", 4723, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServerLaunch(_)));
        assert_eq!(server.ref_count().await, 0);
        assert!(!server.is_running().await);
    }

    #[tokio::test]
    async fn test_release_without_acquire_stays_at_zero() {
        let server = SharedServer::new(settings("/nonexistent/automation-server"));
        server.release().await;
        assert_eq!(server.ref_count().await, 0);
    }
}

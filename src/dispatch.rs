//! Hands composed documents to the external print command, one at a time.

use crate::{config::PrinterCfg, error::DispatchError, jobs::PrintJob};
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{process::Command, sync::Mutex};

/// Starts the print action for a document and waits for it to return.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, document: &Path) -> Result<(), DispatchError>;
}

/// Runs `<program> <args...> <document>` and waits for it to exit.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandLauncher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: None,
        }
    }

    /// Kill the command if it outlives `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_cfg(cfg: &PrinterCfg) -> Self {
        Self::new(cfg.command.clone(), cfg.args.clone()).with_timeout(cfg.timeout())
    }
}

#[async_trait]
impl Launcher for CommandLauncher {
    async fn launch(&self, document: &Path) -> Result<(), DispatchError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(document)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DispatchError::Launch {
                command: self.program.clone(),
                source,
            })?;
        tracing::info!("launched {} for {}", self.program, document.display());

        let waited = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait())
                .await
                .map_err(|_| limit),
            None => Ok(child.wait().await),
        };
        let status = match waited {
            Ok(status) => status.map_err(|source| DispatchError::Launch {
                command: self.program.clone(),
                source,
            })?,
            Err(limit) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("failed to kill print command: {e}");
                }
                return Err(DispatchError::TimedOut(limit));
            }
        };

        if status.success() {
            Ok(())
        } else {
            Err(DispatchError::ExitStatus(status))
        }
    }
}

/// What happened to one document.
#[derive(Debug)]
pub struct DispatchResult {
    pub document: PathBuf,
    pub started: Instant,
    /// When the command returned, before the cooldown.
    pub finished: Instant,
    pub outcome: Result<(), DispatchError>,
}

/// Serializes print commands and enforces the cooldown between them.
pub struct Dispatcher {
    launcher: Arc<dyn Launcher>,
    cooldown: Duration,
    slot: Mutex<()>,
}

impl Dispatcher {
    pub fn new(launcher: Arc<dyn Launcher>, cooldown: Duration) -> Self {
        Self {
            launcher,
            cooldown,
            slot: Mutex::new(()),
        }
    }

    pub fn from_cfg(cfg: &PrinterCfg) -> Self {
        Self::new(Arc::new(CommandLauncher::from_cfg(cfg)), cfg.cooldown())
    }

    /// Print one document, then hold the slot for the cooldown.
    ///
    /// Command failures are logged and returned in the result; they never
    /// stop the caller from moving on to the next document.
    pub async fn dispatch(&self, job: &PrintJob) -> DispatchResult {
        let _slot = self.slot.lock().await;
        let document =
            std::path::absolute(&job.pdf_path).unwrap_or_else(|_| job.pdf_path.clone());

        tracing::info!(
            "dispatch start: {} ({} page(s), request {})",
            job.name,
            job.document.pages().len(),
            job.request_id
        );
        let started = Instant::now();
        let outcome = self.launcher.launch(&document).await;
        let finished = Instant::now();
        match &outcome {
            Ok(()) => tracing::info!("dispatch done: {}", job.name),
            Err(e) => tracing::warn!("dispatch failed (continuing): {}: {e}", job.name),
        }
        tracing::debug!("{} generated file(s) kept for {}", job.artifacts.len(), job.name);

        tokio::time::sleep(self.cooldown).await;
        DispatchResult {
            document,
            started,
            finished,
            outcome,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::compose::Document;
    use std::sync::Mutex as StdMutex;
    use uuid::Uuid;

    /// Records each launch and takes `busy` to "print".
    #[derive(Default)]
    pub(crate) struct RecordingLauncher {
        pub busy: Duration,
        pub fail: bool,
        pub calls: StdMutex<Vec<(PathBuf, Instant, Instant)>>,
    }

    #[async_trait]
    impl Launcher for RecordingLauncher {
        async fn launch(&self, document: &Path) -> Result<(), DispatchError> {
            let start = Instant::now();
            tokio::time::sleep(self.busy).await;
            self.calls
                .lock()
                .unwrap()
                .push((document.to_path_buf(), start, Instant::now()));
            if self.fail {
                Err(DispatchError::Launch {
                    command: "recording".into(),
                    source: std::io::Error::other("printer unplugged"),
                })
            } else {
                Ok(())
            }
        }
    }

    pub(crate) fn job(name: &str) -> PrintJob {
        PrintJob {
            request_id: Uuid::new_v4(),
            name: name.into(),
            document: Document::new(name),
            pdf_path: PathBuf::from(format!("{name}.pdf")),
            artifacts: vec![],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_follows_command() {
        let launcher = Arc::new(RecordingLauncher::default());
        let dispatcher = Dispatcher::new(launcher.clone(), Duration::from_secs(5));
        let t0 = tokio::time::Instant::now();
        let res = dispatcher.dispatch(&job("a")).await;
        assert!(res.outcome.is_ok());
        assert!(t0.elapsed() >= Duration::from_secs(5));
        assert!(res.document.is_absolute());
        assert!(res.document.ends_with("a.pdf"));
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_raised() {
        let launcher = Arc::new(RecordingLauncher {
            fail: true,
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(launcher.clone(), Duration::ZERO);
        let res = dispatcher.dispatch(&job("a")).await;
        assert!(matches!(res.outcome, Err(DispatchError::Launch { .. })));
        let second = dispatcher.dispatch(&job("b")).await;
        assert!(second.outcome.is_err());
        assert_eq!(launcher.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_dispatches_do_not_overlap() {
        let launcher = Arc::new(RecordingLauncher {
            busy: Duration::from_millis(30),
            ..Default::default()
        });
        let dispatcher = Arc::new(Dispatcher::new(launcher.clone(), Duration::from_millis(5)));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let d = dispatcher.clone();
                tokio::spawn(async move { d.dispatch(&job(&format!("j{i}"))).await })
            })
            .collect();
        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap());
        }
        results.sort_by_key(|r| r.started);
        for w in results.windows(2) {
            assert!(w[0].finished <= w[1].started);
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_exit_status_recorded() {
        let launcher = CommandLauncher::new("false", vec![]);
        let err = launcher.launch(Path::new("/tmp/x.pdf")).await.unwrap_err();
        assert!(matches!(err, DispatchError::ExitStatus(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_success_gets_document_path() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("printed");
        // `sh -c <script> sh <doc>`: the document lands in $1.
        let launcher = CommandLauncher::new(
            "sh",
            vec![
                "-c".into(),
                format!("echo \"$1\" > {}", marker.display()),
                "sh".into(),
            ],
        );
        launcher.launch(Path::new("/tmp/doc.pdf")).await.unwrap();
        let printed = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(printed.trim(), "/tmp/doc.pdf");
    }

    #[tokio::test]
    async fn test_missing_command_is_launch_error() {
        let launcher = CommandLauncher::new("definitely-not-a-print-command", vec![]);
        let err = launcher.launch(Path::new("x.pdf")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Launch { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_timeout_kills_child() {
        let launcher = CommandLauncher::new(
            "sh",
            vec!["-c".into(), "sleep 5".into(), "sh".into()],
        )
        .with_timeout(Some(Duration::from_millis(50)));
        let err = launcher.launch(Path::new("x.pdf")).await.unwrap_err();
        assert!(matches!(err, DispatchError::TimedOut(_)));
    }
}

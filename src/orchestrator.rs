//! Request intake: validate, render, then queue for printing.

use crate::{
    compose::{self, FontMode, FontResource, Rendered},
    config::Config,
    dispatch::{DispatchResult, Dispatcher, Launcher},
    error::{CompositionError, PipelineError},
    events::PipelineEvent,
    jobs::{JobStatus, PrintJob, PrintRequest, Sheet},
    normalize,
    worker::{self, WorkerCmd},
};
use std::{
    path::PathBuf,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use uuid::Uuid;

/// Settings snapshot handed to each request.
#[derive(Clone)]
struct Snapshot {
    cfg: Arc<Config>,
    font: Option<FontResource>,
}

/// Entry point for print requests.
///
/// Requests validate and render independently; printing goes through a
/// single worker so documents never reach the printer concurrently.
pub struct Orchestrator {
    snapshot: RwLock<Snapshot>,
    /// Fixed launcher kept across `reload`.
    launcher: Option<Arc<dyn Launcher>>,
    worker_tx: mpsc::Sender<WorkerCmd>,
    events: mpsc::UnboundedSender<PipelineEvent>,
}

/// Outcome of a finished request.
#[derive(Debug)]
pub struct JobReport {
    pub id: Uuid,
    /// PDFs written, in print order.
    pub documents: Vec<PathBuf>,
    /// One entry per document.
    pub dispatches: Vec<DispatchResult>,
}

impl JobReport {
    pub fn failed_dispatches(&self) -> usize {
        self.dispatches
            .iter()
            .filter(|d| d.outcome.is_err())
            .count()
    }
}

/// Handle to a submitted request.
pub struct JobHandle {
    pub id: Uuid,
    canceller: Canceller,
    task: JoinHandle<Result<JobReport, PipelineError>>,
}

/// Cancels a request from another task.
#[derive(Clone, Default)]
pub struct Canceller(Arc<AtomicBool>);

impl Canceller {
    /// Stop the request if it has not started rendering yet.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl JobHandle {
    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// Wait for the request to finish.
    pub async fn wait(self) -> Result<JobReport, PipelineError> {
        self.task
            .await
            .map_err(|e| CompositionError::Aborted(e.to_string()))?
    }
}

impl Orchestrator {
    /// Start with the configured print command.
    pub fn start(cfg: Config) -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let dispatcher = Dispatcher::from_cfg(&cfg.printer);
        Self::spawn(cfg, None, dispatcher)
    }

    /// Start with a custom launcher; the cooldown still comes from `cfg`.
    pub fn with_launcher(
        cfg: Config,
        launcher: Arc<dyn Launcher>,
    ) -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let dispatcher = Dispatcher::new(launcher.clone(), cfg.printer.cooldown());
        Self::spawn(cfg, Some(launcher), dispatcher)
    }

    fn spawn(
        cfg: Config,
        launcher: Option<Arc<dyn Launcher>>,
        dispatcher: Dispatcher,
    ) -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx_cmd, rx_cmd) = mpsc::channel::<WorkerCmd>(64);
        let (tx_ev, rx_ev) = mpsc::unbounded_channel::<PipelineEvent>();
        tokio::spawn(worker::run(rx_cmd, tx_ev.clone(), dispatcher));

        let snapshot = snapshot_of(cfg, &tx_ev);
        let orchestrator = Self {
            snapshot: RwLock::new(snapshot),
            launcher,
            worker_tx: tx_cmd,
            events: tx_ev,
        };
        (orchestrator, rx_ev)
    }

    /// Accept a request and process it in the background.
    pub fn submit(&self, request: PrintRequest) -> JobHandle {
        let id = Uuid::new_v4();
        let canceller = Canceller::default();
        tracing::info!("request {id} received: {}", request.kind());
        let _ = self.events.send(PipelineEvent::JobUpdated {
            job_id: id,
            status: JobStatus::Received,
        });

        let ctx = RequestCtx {
            id,
            snapshot: self.current(),
            worker_tx: self.worker_tx.clone(),
            events: self.events.clone(),
            canceller: canceller.clone(),
        };
        let task = tokio::spawn(async move {
            let result = ctx.process(request).await;
            match &result {
                Ok(report) => {
                    tracing::info!(
                        "request {id} done: {} document(s), {} print failure(s)",
                        report.documents.len(),
                        report.failed_dispatches()
                    );
                    ctx.status(JobStatus::Done);
                }
                Err(e) => {
                    tracing::error!("request {id} failed: {e}");
                    ctx.status(JobStatus::Failed(e.to_string()));
                }
            }
            result
        });

        JobHandle {
            id,
            canceller,
            task,
        }
    }

    /// Submit and wait.
    pub async fn run(&self, request: PrintRequest) -> Result<JobReport, PipelineError> {
        self.submit(request).wait().await
    }

    /// Apply new settings to requests submitted from now on.
    pub async fn reload(&self, cfg: Config) -> Result<(), PipelineError> {
        let dispatcher = match &self.launcher {
            Some(launcher) => Dispatcher::new(launcher.clone(), cfg.printer.cooldown()),
            None => Dispatcher::from_cfg(&cfg.printer),
        };
        let snapshot = snapshot_of(cfg, &self.events);
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
        self.worker_tx
            .send(WorkerCmd::Reconfigure(dispatcher))
            .await
            .map_err(|_| PipelineError::QueueClosed)
    }

    fn current(&self) -> Snapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn snapshot_of(cfg: Config, events: &mpsc::UnboundedSender<PipelineEvent>) -> Snapshot {
    let font = FontResource::discover(&cfg.fonts.candidates);
    if font.is_none() {
        tracing::warn!("no usable font; label text falls back to the built-in font");
        let _ = events.send(PipelineEvent::Log(
            "no usable font found; labels use Latin captions".into(),
        ));
    }
    Snapshot {
        cfg: Arc::new(cfg),
        font,
    }
}

/// Everything one request's task needs.
struct RequestCtx {
    id: Uuid,
    snapshot: Snapshot,
    worker_tx: mpsc::Sender<WorkerCmd>,
    events: mpsc::UnboundedSender<PipelineEvent>,
    canceller: Canceller,
}

impl RequestCtx {
    fn status(&self, status: JobStatus) {
        let _ = self.events.send(PipelineEvent::JobUpdated {
            job_id: self.id,
            status,
        });
    }

    async fn process(&self, request: PrintRequest) -> Result<JobReport, PipelineError> {
        self.status(JobStatus::Validating);
        let sheets = normalize::plan_request(&request)?;

        if self.canceller.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        self.status(JobStatus::Rendering);
        let names: Vec<String> = sheets.iter().map(Sheet::describe).collect();
        let Snapshot { cfg, font } = self.snapshot.clone();
        let rendered = tokio::task::spawn_blocking(move || render_all(&sheets, &cfg, font.as_ref()))
            .await
            .map_err(|e| CompositionError::Aborted(e.to_string()))??;

        if matches!(request, PrintRequest::Label(_))
            && rendered.iter().any(|r| r.font_mode == FontMode::Builtin)
        {
            tracing::warn!("request {} printed in degraded font mode", self.id);
            let _ = self.events.send(PipelineEvent::Log(
                "label text rendered without the CJK font".into(),
            ));
        }

        let documents: Vec<PathBuf> = rendered.iter().map(|r| r.pdf_path.clone()).collect();
        let jobs: Vec<PrintJob> = rendered
            .into_iter()
            .zip(names)
            .map(|(r, name)| PrintJob {
                request_id: self.id,
                name,
                document: r.document,
                pdf_path: r.pdf_path,
                artifacts: r.artifacts,
            })
            .collect();

        let (reply, done) = oneshot::channel();
        self.worker_tx
            .send(WorkerCmd::Dispatch {
                job_id: self.id,
                jobs,
                reply,
            })
            .await
            .map_err(|_| PipelineError::QueueClosed)?;
        let dispatches = done.await.map_err(|_| PipelineError::QueueClosed)?;

        Ok(JobReport {
            id: self.id,
            documents,
            dispatches,
        })
    }
}

/// Render every sheet; on failure remove the files earlier sheets created.
fn render_all(
    sheets: &[Sheet],
    cfg: &Config,
    font: Option<&FontResource>,
) -> Result<Vec<Rendered>, PipelineError> {
    let mut done: Vec<Rendered> = Vec::with_capacity(sheets.len());
    for sheet in sheets {
        match compose::render_sheet(sheet, cfg, font) {
            Ok(r) => done.push(r),
            Err(e) => {
                for r in &done {
                    compose::discard(&r.created);
                }
                return Err(e);
            }
        }
    }
    Ok(done)
}

//! Background worker that owns the print queue.

use crate::{
    dispatch::{DispatchResult, Dispatcher},
    events::PipelineEvent,
    jobs::{JobStatus, PrintJob},
};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Commands sent from the orchestrator to the worker.
pub enum WorkerCmd {
    /// Print a request's documents in order and report back.
    Dispatch {
        job_id: Uuid,
        jobs: Vec<PrintJob>,
        reply: oneshot::Sender<Vec<DispatchResult>>,
    },
    /// Swap in a dispatcher built from new settings.
    Reconfigure(Dispatcher),
}

/// Main worker loop: one request at a time, documents in order.
pub async fn run(
    mut rx: mpsc::Receiver<WorkerCmd>,
    tx: mpsc::UnboundedSender<PipelineEvent>,
    mut dispatcher: Dispatcher,
) {
    tracing::info!("worker started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            WorkerCmd::Reconfigure(next) => {
                tracing::info!("dispatcher reconfigured");
                dispatcher = next;
                let _ = tx.send(PipelineEvent::Log("settings updated".into()));
            }

            WorkerCmd::Dispatch {
                job_id,
                jobs,
                reply,
            } => {
                tracing::info!("dispatch request {job_id}: {} document(s)", jobs.len());
                let _ = tx.send(PipelineEvent::JobUpdated {
                    job_id,
                    status: JobStatus::Dispatching,
                });

                let mut results = Vec::with_capacity(jobs.len());
                for job in &jobs {
                    let result = dispatcher.dispatch(job).await;
                    let line = match &result.outcome {
                        Ok(()) => PipelineEvent::Log(format!("printed {}", job.name)),
                        Err(e) => PipelineEvent::Error(format!("print failed for {}: {e}", job.name)),
                    };
                    let _ = tx.send(line);
                    results.push(result);
                }

                // The submitter may have dropped its handle; printing still happened.
                if reply.send(results).is_err() {
                    tracing::debug!("request {job_id} no longer awaited");
                }
            }
        }
    }

    tracing::info!("worker stopped");
}

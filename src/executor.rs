use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::command::Command;
use crate::error::{Error, Result};
use crate::fragment::Fragment;
use crate::responder::{Pending, QueryResult, Request};
use crate::storage::Storage;

enum Envelope {
    Execute(Request),
    /// Query boundary: the fragment may drop its handles.
    EndQuery,
}

/// Runs one fragment on a dedicated task, answering commands strictly in
/// submission order.
pub struct FragmentExecutor;

impl FragmentExecutor {
    /// Move `fragment` onto a new task and return the handle used to feed it.
    ///
    /// The task exits once every [`FragmentHandle`] clone has been dropped and
    /// the queue is drained. Must be called inside a tokio runtime.
    pub fn spawn<S: Storage>(name: impl Into<String>, mut fragment: Fragment<S>) -> FragmentHandle {
        let name = name.into();
        let depth = fragment.config().queue_depth.max(1);
        let (tx, mut rx) = mpsc::channel::<Envelope>(depth);
        let task_name = name.clone();
        let task = tokio::spawn(async move {
            info!(fragment = %task_name, "fragment executor started");
            while let Some(envelope) = rx.recv().await {
                match envelope {
                    Envelope::Execute(Request { command, responder }) => {
                        let start = Instant::now();
                        let answer = fragment.execute(command);
                        let exec_time = start.elapsed();
                        debug!(
                            fragment = %task_name,
                            query = responder.query_type(),
                            ?exec_time,
                            failed = answer.is_error(),
                            "command executed"
                        );
                        responder.send(QueryResult { answer, exec_time });
                    }
                    Envelope::EndQuery => fragment.end_query(),
                }
            }
            info!(fragment = %task_name, "fragment executor stopped");
        });
        FragmentHandle {
            name,
            tx,
            task: Arc::new(task),
        }
    }
}

/// Submission side of a running [`FragmentExecutor`]. Cheap to clone.
#[derive(Clone)]
pub struct FragmentHandle {
    name: String,
    tx: mpsc::Sender<Envelope>,
    task: Arc<JoinHandle<()>>,
}

impl FragmentHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `command`, waiting for capacity if the queue is full.
    pub async fn submit(&self, command: Command) -> Result<Pending> {
        let (request, pending) = command.into_request();
        self.tx
            .send(Envelope::Execute(request))
            .await
            .map_err(|_| Error::ExecutorClosed)?;
        Ok(pending)
    }

    /// Submit and wait for the result.
    pub async fn execute(&self, command: Command) -> Result<QueryResult> {
        Ok(self.submit(command).await?.response().await)
    }

    /// Mark the end of the current query. Commands queued before this still see their handles.
    pub async fn end_query(&self) -> Result<()> {
        self.tx
            .send(Envelope::EndQuery)
            .await
            .map_err(|_| Error::ExecutorClosed)
    }

    /// Stop accepting work and wait for queued commands to finish.
    ///
    /// Waits only when this is the last clone; otherwise the executor keeps
    /// serving the remaining clones.
    pub async fn shutdown(self) {
        let FragmentHandle { tx, task, .. } = self;
        drop(tx);
        if let Ok(task) = Arc::try_unwrap(task) {
            let _ = task.await;
        }
    }
}

use std::time::Duration;

use tokio::sync::oneshot;

use crate::command::{Calculation, Command};
use crate::error::Error;

/// The answer to one command plus how long the executor spent on it.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult {
    pub answer: Calculation,
    pub exec_time: Duration,
}

/// Executor side of a command's single-slot result channel.
pub struct Responder {
    query_type: &'static str,
    tx: oneshot::Sender<QueryResult>,
}

impl Responder {
    pub fn query_type(&self) -> &'static str {
        self.query_type
    }

    /// Post the result. A caller that stopped waiting simply never sees it.
    pub fn send(self, result: QueryResult) {
        let _ = self.tx.send(result);
    }
}

/// Caller side of a command's result channel. Consumed on read.
pub struct Pending {
    query_type: &'static str,
    rx: oneshot::Receiver<QueryResult>,
}

impl Pending {
    pub fn query_type(&self) -> &'static str {
        self.query_type
    }

    /// Wait for the executor to answer.
    ///
    /// Resolves to [`Error::ExecutorClosed`] if the executor dropped the command.
    pub async fn response(self) -> QueryResult {
        self.rx.await.unwrap_or_else(|_| closed())
    }

    /// Blocking variant of [`Pending::response`] for callers outside a runtime.
    pub fn blocking_response(self) -> QueryResult {
        self.rx.blocking_recv().unwrap_or_else(|_| closed())
    }
}

fn closed() -> QueryResult {
    QueryResult {
        answer: Calculation::Error(Error::ExecutorClosed),
        exec_time: Duration::ZERO,
    }
}

/// A command bound to its responder, ready for an executor queue.
pub struct Request {
    pub command: Command,
    pub responder: Responder,
}

impl Command {
    /// Attach a fresh result channel to this command.
    pub fn into_request(self) -> (Request, Pending) {
        let (tx, rx) = oneshot::channel();
        let query_type = self.query_type();
        (
            Request {
                command: self,
                responder: Responder { query_type, tx },
            },
            Pending { query_type, rx },
        )
    }
}

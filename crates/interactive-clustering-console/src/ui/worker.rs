use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
#[cfg(test)]
use std::time::Duration;

use crate::client::{CommandClient, CommandReply, StatusClient};
use crate::commands::PipelineCommand;
use crate::error::{Error, Result};
use crate::scheduler::FetchRequest;
use crate::status::StatusSnapshot;

pub(crate) enum Request {
    Fetch(FetchRequest),
    Command {
        project_id: String,
        command: PipelineCommand,
    },
}

pub(crate) enum Reply {
    Status {
        request: FetchRequest,
        outcome: Result<StatusSnapshot>,
    },
    Command {
        command: PipelineCommand,
        outcome: Result<CommandReply>,
    },
}

/// Owns the backend on its own thread so no request holds up drawing or input.
/// Requests run one at a time, in submission order.
pub(crate) struct BackendWorker {
    requests: Sender<Request>,
    replies: Receiver<Reply>,
}

impl BackendWorker {
    pub(crate) fn spawn<B>(backend: B) -> Result<Self>
    where
        B: StatusClient + CommandClient + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<Request>();
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();
        thread::Builder::new()
            .name("icc-backend".into())
            .spawn(move || serve(backend, req_rx, reply_tx))?;
        Ok(Self {
            requests: req_tx,
            replies: reply_rx,
        })
    }

    pub(crate) fn submit(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| Error::msg("backend worker has stopped"))
    }

    /// Replies that arrived since the last call, without waiting.
    pub(crate) fn drain(&self) -> Vec<Reply> {
        self.replies.try_iter().collect()
    }

    #[cfg(test)]
    pub(crate) fn wait(&self, timeout: Duration) -> Option<Reply> {
        self.replies.recv_timeout(timeout).ok()
    }
}

// Exits once the dashboard drops its sender; a request already on the wire
// finishes first and its reply is discarded.
fn serve<B>(mut backend: B, requests: Receiver<Request>, replies: Sender<Reply>)
where
    B: StatusClient + CommandClient,
{
    for request in requests {
        let reply = match request {
            Request::Fetch(request) => {
                let outcome = backend.fetch(&request.project_id);
                Reply::Status { request, outcome }
            }
            Request::Command {
                project_id,
                command,
            } => {
                let outcome = backend.post_command(&project_id, command);
                Reply::Command { command, outcome }
            }
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
    tracing::debug!("backend worker exiting");
}

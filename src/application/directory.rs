use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};

/// A pending "pick a destination" question, answered by the interactive side.
#[derive(Debug)]
pub struct DirectoryRequest {
    reply: oneshot::Sender<Option<PathBuf>>,
}

impl DirectoryRequest {
    /// `None` means the user cancelled.
    pub fn respond(self, choice: Option<PathBuf>) {
        let _ = self.reply.send(choice);
    }
}

/// Background-side handle. Asking blocks the calling task until the
/// interactive side answers or goes away.
#[derive(Debug, Clone)]
pub struct DirectorySelector {
    tx: mpsc::Sender<DirectoryRequest>,
}

/// Interactive-side handle that receives the questions.
#[derive(Debug)]
pub struct DirectoryRequests {
    rx: mpsc::Receiver<DirectoryRequest>,
}

pub fn rendezvous() -> (DirectorySelector, DirectoryRequests) {
    let (tx, rx) = mpsc::channel(1);
    (DirectorySelector { tx }, DirectoryRequests { rx })
}

impl DirectorySelector {
    pub async fn request_directory(&self) -> Option<PathBuf> {
        let (reply, answer) = oneshot::channel();
        if self.tx.send(DirectoryRequest { reply }).await.is_err() {
            tracing::warn!("directory requested but nobody is listening");
            return None;
        }
        // A dropped request reads as a cancellation.
        answer.await.ok().flatten()
    }
}

impl DirectoryRequests {
    pub fn try_next(&mut self) -> Option<DirectoryRequest> {
        self.rx.try_recv().ok()
    }
}

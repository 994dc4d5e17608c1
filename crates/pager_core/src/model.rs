//! Paging model backed by a command-queue worker.
//!
//! Every command (`begin`/`next`/`reset`), every fetch completion and every
//! cursor query goes through one unbounded mpsc queue drained by a single
//! worker task, so no command is lost while the worker is running.
//! That worker is the only owner of the [`PageCursor`] and the only publisher
//! of state, so a cursor advance can never interleave with issuing a fetch.
//!
//! Each fetch is stamped with a [`RequestId`]. Only the most recently issued
//! request may publish its result or move the cursor; anything older is
//! dropped when it resolves.

use std::sync::Arc;

use shared::{
    domain::{Identifiable, PageCursor, PageRequest, RequestId, RequestKind},
    protocol::{ModelAction, ModelActionResult, ModelState},
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    ActionCompletion, DataProvider, FetchResult, Model, ModelConfig, ModelError,
    StatePublisher,
};

enum ModelCommand<T> {
    Begin,
    Next,
    Reset,
    Cursor {
        reply: oneshot::Sender<PageCursor>,
    },
    Fetched {
        request: PageRequest,
        result: FetchResult<T>,
    },
}

impl<T> ModelCommand<T> {
    fn name(&self) -> &'static str {
        match self {
            ModelCommand::Begin => "begin",
            ModelCommand::Next => "next",
            ModelCommand::Reset => "reset",
            ModelCommand::Cursor { .. } => "cursor",
            ModelCommand::Fetched { .. } => "fetched",
        }
    }
}

pub struct PagedModel<P: DataProvider> {
    commands: mpsc::UnboundedSender<ModelCommand<P::Item>>,
    publisher: StatePublisher<P::Item>,
    worker: JoinHandle<()>,
}

impl<P> PagedModel<P>
where
    P: DataProvider,
    P::Item: Identifiable + Send + Sync,
{
    /// Starts the model's worker on the current tokio runtime.
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, ModelConfig::default())
    }

    pub fn with_config(provider: P, config: ModelConfig) -> Self {
        let (commands, queue) = mpsc::unbounded_channel();
        let publisher = StatePublisher::new(ModelState::Empty);
        let worker = ModelWorker {
            provider: Arc::new(provider),
            cursor: PageCursor::new(config.page_size),
            latest: RequestId(0),
            publisher: publisher.clone(),
            commands: commands.downgrade(),
        };
        info!(page_size = config.page_size.get(), "starting paging model");
        let worker = tokio::spawn(worker.run(queue));
        Self {
            commands,
            publisher,
            worker,
        }
    }

    /// Snapshot of the cursor after every previously queued command and
    /// already-delivered fetch result has been applied.
    pub async fn cursor(&self) -> Result<PageCursor, ModelError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(ModelCommand::Cursor { reply })
            .map_err(|_| ModelError::WorkerStopped)?;
        response.await.map_err(|_| ModelError::WorkerStopped)
    }

    fn enqueue(&self, command: ModelCommand<P::Item>) {
        let name = command.name();
        match self.commands.send(command) {
            Ok(()) => debug!(command = name, "queued model command"),
            Err(_) => warn!(command = name, "model worker stopped; dropping command"),
        }
    }
}

impl<P> Model for PagedModel<P>
where
    P: DataProvider,
    P::Item: Identifiable + Send + Sync,
{
    type Item = P::Item;

    fn state(&self) -> &StatePublisher<Self::Item> {
        &self.publisher
    }

    fn begin(&self) {
        self.enqueue(ModelCommand::Begin);
    }

    fn next(&self) {
        self.enqueue(ModelCommand::Next);
    }

    fn reset(&self) {
        self.enqueue(ModelCommand::Reset);
    }

    fn handle(&self, action: ModelAction<Self::Item>, completion: ActionCompletion) {
        let kind = action.kind();
        warn!(
            action = kind,
            item = ?action.item().id(),
            "model action not supported"
        );
        completion(ModelActionResult::unsupported(kind));
    }
}

impl<P: DataProvider> Drop for PagedModel<P> {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

struct ModelWorker<P: DataProvider> {
    provider: Arc<P>,
    cursor: PageCursor,
    latest: RequestId,
    publisher: StatePublisher<P::Item>,
    // Weak so the queue closes once the model handle and in-flight fetches
    // are gone.
    commands: mpsc::WeakUnboundedSender<ModelCommand<P::Item>>,
}

impl<P> ModelWorker<P>
where
    P: DataProvider,
    P::Item: Send + Sync,
{
    async fn run(mut self, mut queue: mpsc::UnboundedReceiver<ModelCommand<P::Item>>) {
        while let Some(command) = queue.recv().await {
            match command {
                ModelCommand::Begin => self.issue(RequestKind::Refresh),
                ModelCommand::Next => self.issue(RequestKind::Advance),
                ModelCommand::Reset => {
                    debug!(from_page = self.cursor.page(), "resetting cursor");
                    self.cursor.reset();
                    self.issue(RequestKind::Refresh);
                }
                ModelCommand::Cursor { reply } => {
                    let _ = reply.send(self.cursor);
                }
                ModelCommand::Fetched { request, result } => self.complete(request, result),
            }
        }
        debug!("paging model worker stopped");
    }

    fn issue(&mut self, kind: RequestKind) {
        self.latest = self.latest.next();
        let request = self.cursor.request(self.latest, kind);
        self.publisher.publish(ModelState::Loading);
        debug!(
            request_id = %request.id,
            kind = ?request.kind,
            page = request.page,
            offset = request.offset,
            count = request.count,
            "issuing page fetch"
        );

        let Some(commands) = self.commands.upgrade() else {
            return;
        };
        let provider = Arc::clone(&self.provider);
        tokio::spawn(async move {
            let result = provider.retrieve(request.count, request.offset).await;
            if commands
                .send(ModelCommand::Fetched { request, result })
                .is_err()
            {
                debug!(request_id = %request.id, "model dropped before page fetch resolved");
            }
        });
    }

    fn complete(&mut self, request: PageRequest, result: FetchResult<P::Item>) {
        if request.id != self.latest {
            debug!(
                request_id = %request.id,
                latest = %self.latest,
                offset = request.offset,
                "discarding superseded page result"
            );
            return;
        }

        match result {
            Ok(items) => {
                debug!(
                    request_id = %request.id,
                    page = request.page,
                    items = items.len(),
                    "page fetch succeeded"
                );
                self.publisher.publish(ModelState::Ready(items));
                self.cursor.settle(&request);
            }
            Err(err) => {
                warn!(
                    request_id = %request.id,
                    offset = request.offset,
                    cause = %err,
                    "page fetch failed"
                );
                self.publisher.publish(ModelState::Error(err));
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/model_tests.rs"]
mod tests;

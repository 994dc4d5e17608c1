//! Reactive pagination: a [`Model`] that pages through a [`DataProvider`] and
//! publishes its lifecycle as a latest-value stream of [`ModelState`]s, and a
//! [`Controller`] that maps those states onto a [`Renderer`].

use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::Identifiable,
    error::FetchError,
    protocol::{ModelAction, ModelActionResult},
};
use tokio::task::JoinHandle;
use tracing::error;

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod state_stream;

pub use config::ModelConfig;
pub use controller::Controller;
pub use error::ModelError;
pub use model::PagedModel;
pub use shared::{
    domain::{PageCursor, PageRequest, RequestKind},
    protocol::ModelState,
};
pub use state_stream::{StatePublisher, StateUpdates, Subscription};

pub type FetchResult<T> = Result<Vec<T>, FetchError>;
pub type FetchCompletion<T> = Box<dyn FnOnce(FetchResult<T>) + Send>;
pub type ActionCompletion = Box<dyn FnOnce(ModelActionResult) + Send>;

/// Source of pages. Both entry points must yield the same result for the
/// same `count` and `offset`.
#[async_trait]
pub trait DataProvider: Send + Sync + 'static {
    type Item: Send + 'static;

    async fn retrieve(&self, count: usize, offset: usize) -> FetchResult<Self::Item>;

    /// Callback-style entry point. Runs [`retrieve`](Self::retrieve) on a new
    /// task and hands the result to `completion`.
    fn retrieve_with(
        self: Arc<Self>,
        count: usize,
        offset: usize,
        completion: FetchCompletion<Self::Item>,
    ) -> JoinHandle<()>
    where
        Self: Sized,
    {
        tokio::spawn(async move {
            completion(self.retrieve(count, offset).await);
        })
    }
}

#[async_trait]
impl<P: DataProvider> DataProvider for Arc<P> {
    type Item = P::Item;

    async fn retrieve(&self, count: usize, offset: usize) -> FetchResult<Self::Item> {
        P::retrieve(self, count, offset).await
    }
}

pub trait Renderer: Send + Sync + 'static {
    type Item;

    fn render(&self, item: &Self::Item);

    fn display_loading(&self) {}

    fn display_empty(&self) {}
}

/// Observability sink for fetch failures delivered to a controller.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &FetchError);
}

pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, err: &FetchError) {
        error!(cause = %err, "page fetch failed");
    }
}

pub trait Model: Send + Sync + 'static {
    type Item: Identifiable + Send + Sync + 'static;

    fn state(&self) -> &StatePublisher<Self::Item>;

    /// Fetches the page the cursor points at without moving it.
    fn begin(&self);

    /// Fetches the following page and moves the cursor there on success.
    fn next(&self);

    /// Rewinds the cursor to the first page and fetches it.
    fn reset(&self);

    /// Applies an item action. `completion` is invoked exactly once.
    fn handle(&self, action: ModelAction<Self::Item>, completion: ActionCompletion);
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

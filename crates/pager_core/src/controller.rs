//! Display-side bridge from a model's state stream to a renderer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::protocol::ModelState;
use tracing::{debug, info};

use crate::{ErrorSink, Model, Renderer, Subscription, TracingErrorSink};

/// Owns the subscription between one model and one renderer.
///
/// Detached until [`on_display_start`](Self::on_display_start), attached
/// until [`on_display_end`](Self::on_display_end). At most one subscription
/// is live at any time.
pub struct Controller<M, R>
where
    M: Model,
    R: Renderer<Item = M::Item>,
{
    model: Arc<M>,
    renderer: Arc<R>,
    errors: Arc<dyn ErrorSink>,
    subscription: Mutex<Option<Subscription>>,
}

impl<M, R> Controller<M, R>
where
    M: Model,
    R: Renderer<Item = M::Item>,
{
    pub fn new(model: Arc<M>, renderer: Arc<R>) -> Self {
        Self::new_with_error_sink(model, renderer, Arc::new(TracingErrorSink))
    }

    pub fn new_with_error_sink(
        model: Arc<M>,
        renderer: Arc<R>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            model,
            renderer,
            errors,
            subscription: Mutex::new(None),
        }
    }

    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    pub fn is_attached(&self) -> bool {
        self.slot().is_some()
    }

    /// Starts loading and attaches to the model's state stream. The current
    /// state is dispatched right away. Calling this while attached replaces
    /// the existing subscription.
    pub fn on_display_start(&self) {
        let previous = self.slot().take();
        if let Some(previous) = previous {
            debug!("controller already attached; replacing subscription");
            previous.cancel();
        }

        self.model.begin();

        let renderer = Arc::clone(&self.renderer);
        let errors = Arc::clone(&self.errors);
        let subscription = self.model.state().subscribe(move |state| {
            dispatch(renderer.as_ref(), errors.as_ref(), state)
        });
        let raced = self.slot().replace(subscription);
        if let Some(raced) = raced {
            raced.cancel();
        }
        info!("controller attached");
    }

    /// Detaches from the model. In-flight fetches keep running but their
    /// results are no longer rendered. Safe to call while detached.
    pub fn on_display_end(&self) {
        // Taken out first so the slot lock is not held while cancel waits on
        // an in-flight delivery.
        let subscription = self.slot().take();
        if let Some(subscription) = subscription {
            subscription.cancel();
            info!("controller detached");
        }
    }

    pub fn refresh(&self) {
        self.model.reset();
    }

    pub fn load_next_page(&self) {
        self.model.next();
    }

    fn slot(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<M, R> Drop for Controller<M, R>
where
    M: Model,
    R: Renderer<Item = M::Item>,
{
    fn drop(&mut self) {
        self.on_display_end();
    }
}

fn dispatch<R: Renderer>(renderer: &R, errors: &dyn ErrorSink, state: &ModelState<R::Item>) {
    match state {
        ModelState::Empty => renderer.display_empty(),
        ModelState::Loading => renderer.display_loading(),
        ModelState::Ready(items) => {
            debug!(items = items.len(), "rendering page");
            for item in items {
                renderer.render(item);
            }
        }
        ModelState::Error(err) => errors.report(err),
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;

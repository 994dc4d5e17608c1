use super::*;

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use shared::{domain::Identifiable, error::FetchError};
use tokio::{
    sync::oneshot,
    time::{sleep, timeout},
};

use crate::{DataProvider, FetchResult, PagedModel, StateUpdates};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Row(usize);

impl Identifiable for Row {
    type Id = usize;

    fn id(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Shown {
    Empty,
    Loading,
    Item(usize),
}

#[derive(Default)]
struct RecordingRenderer {
    shown: Mutex<Vec<Shown>>,
}

impl RecordingRenderer {
    fn shown(&self) -> Vec<Shown> {
        self.shown.lock().expect("shown").clone()
    }

    fn rendered(&self) -> Vec<usize> {
        self.shown()
            .into_iter()
            .filter_map(|shown| match shown {
                Shown::Item(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}

impl Renderer for RecordingRenderer {
    type Item = Row;

    fn render(&self, item: &Row) {
        self.shown.lock().expect("shown").push(Shown::Item(item.0));
    }

    fn display_loading(&self) {
        self.shown.lock().expect("shown").push(Shown::Loading);
    }

    fn display_empty(&self) {
        self.shown.lock().expect("shown").push(Shown::Empty);
    }
}

#[derive(Default)]
struct RecordingSink {
    causes: Mutex<Vec<String>>,
}

impl ErrorSink for RecordingSink {
    fn report(&self, err: &FetchError) {
        self.causes
            .lock()
            .expect("causes")
            .push(err.cause().to_string());
    }
}

/// Serves `[offset, offset + count)` unless told to fail the next fetch.
#[derive(Default)]
struct RangeProvider {
    fail_next: Mutex<Option<String>>,
}

#[async_trait]
impl DataProvider for RangeProvider {
    type Item = Row;

    async fn retrieve(&self, count: usize, offset: usize) -> FetchResult<Row> {
        if let Some(cause) = self.fail_next.lock().expect("fail_next").take() {
            return Err(FetchError::new(cause));
        }
        Ok((offset..offset + count).map(Row).collect())
    }
}

#[derive(Default)]
struct GatedProvider {
    pending: Mutex<Vec<oneshot::Sender<FetchResult<Row>>>>,
}

impl GatedProvider {
    async fn take_one(&self) -> oneshot::Sender<FetchResult<Row>> {
        timeout(Duration::from_secs(2), async {
            loop {
                if let Some(respond) = self.pending.lock().expect("pending").pop() {
                    return respond;
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("fetch issued in time")
    }
}

#[async_trait]
impl DataProvider for GatedProvider {
    type Item = Row;

    async fn retrieve(&self, _count: usize, _offset: usize) -> FetchResult<Row> {
        let (respond, response) = oneshot::channel();
        self.pending.lock().expect("pending").push(respond);
        response
            .await
            .unwrap_or_else(|_| Err(FetchError::new("gate dropped")))
    }
}

async fn wait_for(updates: &mut StateUpdates<Row>, kind: &str) -> ModelState<Row> {
    timeout(Duration::from_secs(2), async {
        loop {
            let state = updates.next().await.expect("state stream open");
            if state.kind() == kind {
                return state;
            }
        }
    })
    .await
    .expect("state published in time")
}

fn ids(range: std::ops::Range<usize>) -> Vec<usize> {
    range.collect()
}

#[tokio::test]
async fn display_start_dispatches_replayed_state_then_first_page() {
    let model = Arc::new(PagedModel::new(RangeProvider::default()));
    let renderer = Arc::new(RecordingRenderer::default());
    let controller = Controller::new(Arc::clone(&model), Arc::clone(&renderer));
    let mut updates = model.state().updates();

    controller.on_display_start();
    assert!(controller.is_attached());
    wait_for(&mut updates, "ready").await;

    let mut expected = vec![Shown::Empty, Shown::Loading];
    expected.extend((0..10).map(Shown::Item));
    assert_eq!(renderer.shown(), expected);
}

#[tokio::test]
async fn each_ready_delivery_renders_the_whole_page_once() {
    let model = Arc::new(PagedModel::new(RangeProvider::default()));
    let renderer = Arc::new(RecordingRenderer::default());
    let controller = Controller::new(Arc::clone(&model), Arc::clone(&renderer));
    let mut updates = model.state().updates();

    controller.on_display_start();
    wait_for(&mut updates, "ready").await;
    controller.load_next_page();
    wait_for(&mut updates, "ready").await;

    assert_eq!(renderer.rendered(), ids(0..20));
}

#[tokio::test]
async fn starting_twice_keeps_a_single_subscription() {
    let model = Arc::new(PagedModel::new(RangeProvider::default()));
    let renderer = Arc::new(RecordingRenderer::default());
    let controller = Controller::new(Arc::clone(&model), Arc::clone(&renderer));
    let mut updates = model.state().updates();

    controller.on_display_start();
    controller.on_display_start();
    // One for the controller, one for `updates`.
    assert_eq!(model.state().subscriber_count(), 2);

    wait_for(&mut updates, "ready").await;
    sleep(Duration::from_millis(20)).await;
    assert_eq!(renderer.rendered(), ids(0..10));

    controller.load_next_page();
    wait_for(&mut updates, "ready").await;
    assert_eq!(renderer.rendered(), ids(0..20));
}

#[tokio::test]
async fn nothing_renders_after_display_end() {
    let provider = Arc::new(GatedProvider::default());
    let model = Arc::new(PagedModel::new(Arc::clone(&provider)));
    let renderer = Arc::new(RecordingRenderer::default());
    let controller = Controller::new(Arc::clone(&model), Arc::clone(&renderer));
    let mut updates = model.state().updates();

    controller.on_display_start();
    let respond = provider.take_one().await;
    controller.on_display_end();
    assert!(!controller.is_attached());
    let shown_at_detach = renderer.shown();

    let _ = respond.send(Ok(vec![Row(1), Row(2)]));
    wait_for(&mut updates, "ready").await;

    assert_eq!(renderer.shown(), shown_at_detach);
    assert!(renderer.rendered().is_empty());
}

#[tokio::test]
async fn display_end_without_start_is_a_no_op() {
    let model = Arc::new(PagedModel::new(RangeProvider::default()));
    let renderer = Arc::new(RecordingRenderer::default());
    let controller = Controller::new(Arc::clone(&model), Arc::clone(&renderer));

    controller.on_display_end();
    controller.on_display_end();

    assert!(!controller.is_attached());
    assert!(renderer.shown().is_empty());
    assert_eq!(*model.state().current(), ModelState::Empty);
}

#[tokio::test]
async fn fetch_errors_go_to_the_sink_and_paging_continues() {
    let provider = Arc::new(RangeProvider::default());
    *provider.fail_next.lock().expect("fail_next") = Some("network down".into());
    let model = Arc::new(PagedModel::new(Arc::clone(&provider)));
    let renderer = Arc::new(RecordingRenderer::default());
    let sink = Arc::new(RecordingSink::default());
    let controller =
        Controller::new_with_error_sink(Arc::clone(&model), Arc::clone(&renderer), sink.clone());
    let mut updates = model.state().updates();

    controller.on_display_start();
    wait_for(&mut updates, "error").await;
    assert_eq!(*sink.causes.lock().expect("causes"), vec!["network down"]);
    assert!(renderer.rendered().is_empty());

    controller.refresh();
    wait_for(&mut updates, "ready").await;
    assert_eq!(renderer.rendered(), ids(0..10));
    assert!(controller.is_attached());
}

#[tokio::test]
async fn refresh_restarts_from_the_first_page() {
    let model = Arc::new(PagedModel::new(RangeProvider::default()));
    let renderer = Arc::new(RecordingRenderer::default());
    let controller = Controller::new(Arc::clone(&model), Arc::clone(&renderer));
    let mut updates = model.state().updates();

    controller.on_display_start();
    wait_for(&mut updates, "ready").await;
    controller.load_next_page();
    wait_for(&mut updates, "ready").await;
    controller.refresh();
    wait_for(&mut updates, "ready").await;

    let mut expected = ids(0..20);
    expected.extend(0..10);
    assert_eq!(renderer.rendered(), expected);
    assert!(Arc::ptr_eq(controller.model(), &model));
    assert_eq!(controller.model().cursor().await.expect("cursor").page(), 0);
}

#[tokio::test]
async fn dropping_controller_releases_subscription() {
    let model = Arc::new(PagedModel::new(RangeProvider::default()));
    let renderer = Arc::new(RecordingRenderer::default());
    let controller = Controller::new(Arc::clone(&model), renderer);

    controller.on_display_start();
    assert_eq!(model.state().subscriber_count(), 1);
    drop(controller);

    assert_eq!(model.state().subscriber_count(), 0);
}

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::domain::entities::query::FilterSpec;
use crate::domain::entities::record::Record;
use crate::domain::entities::view::DerivedView;
use crate::platform::debounce::Debouncer;
use crate::usecase::error::ListError;
use crate::usecase::ports::remote::{ListParams, RemoteError, RemoteFetchAdapter};
use crate::usecase::services::mutation_coordinator::MutationCoordinator;
use crate::usecase::services::query_service::QueryService;
use crate::usecase::services::request_token::{RequestToken, RequestTokens};
use crate::usecase::services::view_pipeline::ViewPipeline;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub page_size: usize,
    pub fetch_batch_size: i64,
    pub search_debounce: Duration,
}

impl ListOptions {
    pub fn from_config<R: Record>(config: &AppConfig) -> Self {
        ListOptions {
            page_size: config.page_size_for(R::KIND),
            fetch_batch_size: config.fetch_batch_size,
            search_debounce: config.search_debounce(),
        }
    }
}

/// UI input for a list screen driven by [`ListController::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum ListEvent {
    SearchInput(String),
    Sort(String),
    Filter(String, Option<FilterSpec>),
    Page(i64),
    PageSize(i64),
    Delete(i64),
    Refresh,
}

/// A fetch that has been issued but not yet applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    token: RequestToken,
    params: ListParams,
}

impl FetchTicket {
    pub fn token(&self) -> RequestToken {
        self.token
    }

    pub fn params(&self) -> &ListParams {
        &self.params
    }
}

type FetchOutcome<R> = (FetchTicket, Result<Vec<R>, RemoteError>);

/// Wires one list screen together: raw search text filters locally right away
/// and reaches the remote side only after the debounce settles; every fetch
/// is token-guarded so a slow, superseded response never lands.
pub struct ListController<R: Record> {
    pipeline: ViewPipeline<R>,
    queries: QueryService,
    mutations: MutationCoordinator,
    search: Debouncer<String>,
    tokens: RequestTokens,
    fetch_batch_size: i64,
    loading: bool,
    last_error: Option<ListError>,
}

impl<R: Record> ListController<R> {
    pub fn new(remote: Arc<dyn RemoteFetchAdapter>, options: ListOptions) -> Self {
        ListController {
            pipeline: ViewPipeline::new(options.page_size),
            queries: QueryService::new(Arc::clone(&remote)),
            mutations: MutationCoordinator::new(remote),
            search: Debouncer::new(String::new(), options.search_debounce),
            tokens: RequestTokens::new(),
            fetch_batch_size: options.fetch_batch_size.max(1),
            loading: false,
            last_error: None,
        }
    }

    pub fn pipeline(&self) -> &ViewPipeline<R> {
        &self.pipeline
    }

    pub fn get_derived_view(&self) -> DerivedView<R> {
        self.pipeline.get_derived_view()
    }

    pub fn subscribe(&self) -> watch::Receiver<DerivedView<R>> {
        self.pipeline.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&ListError> {
        self.last_error.as_ref()
    }

    /// Query that produces the current source set: one big first page.
    pub fn source_params(&self) -> ListParams {
        let state = self.pipeline.query_state();
        ListParams {
            page: 1,
            page_size: self.fetch_batch_size,
            search: state.remote_search_term().to_string(),
            ordering: Some(state.ordering()),
        }
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.loading = true;
        FetchTicket {
            token: self.tokens.issue(),
            params: self.source_params(),
        }
    }

    /// Applies a fetch result if its ticket is still the newest one.
    /// Returns `Ok(false)` for responses that were discarded.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        outcome: Result<Vec<R>, RemoteError>,
    ) -> Result<bool, ListError> {
        if !self.tokens.is_current(ticket.token) {
            debug!(kind = %R::KIND, token = ticket.token.value(), "discarding stale response");
            return Ok(false);
        }
        self.loading = false;
        match outcome {
            Ok(records) => {
                self.pipeline.set_source_set(records);
                self.last_error = None;
                Ok(true)
            }
            Err(err) => {
                warn!(kind = %R::KIND, status = err.status, "fetch failed: {err}");
                let err = ListError::fetch(R::KIND, err);
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Re-runs the current source query and waits for it.
    pub async fn refresh(&mut self) -> Result<(), ListError> {
        let ticket = self.begin_fetch();
        let outcome = self.queries.fetch_source_set::<R>(&ticket.params).await;
        self.complete_fetch(ticket, outcome).map(|_| ())
    }

    /// Raw keystrokes: local filtering now, remote search once typing stops.
    pub fn on_search_input(&mut self, text: &str) {
        self.pipeline.set_local_search_term(text);
        self.search.push(text.to_string());
    }

    /// Resolves with the search text once it has been stable for the quiet period.
    pub async fn search_settled(&mut self) -> String {
        self.search.settled().await
    }

    /// Changes the remote search term without fetching. Returns whether the
    /// source query changed; `refresh` picks it up.
    pub fn set_remote_search(&mut self, text: &str) -> bool {
        self.pipeline.set_remote_search_term(text)
    }

    /// Sort toggle without fetching, see [`Self::set_remote_search`].
    pub fn set_sort(&mut self, field: &str) -> bool {
        self.pipeline.set_sort(field)
    }

    /// Sends settled search text to the remote side, skipping unchanged terms.
    pub async fn apply_settled_search(&mut self, text: &str) -> Result<(), ListError> {
        if self.set_remote_search(text) {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Sorting also re-fetches, since the source set is keyed by ordering.
    pub async fn sort_by(&mut self, field: &str) -> Result<(), ListError> {
        if self.set_sort(field) {
            self.refresh().await?;
        }
        Ok(())
    }

    pub fn set_filter(&mut self, field: &str, spec: Option<FilterSpec>) {
        self.pipeline.set_filter(field, spec);
    }

    pub fn set_page(&mut self, page: i64) {
        self.pipeline.set_page(page);
    }

    pub fn set_page_size(&mut self, page_size: i64) {
        self.pipeline.set_page_size(page_size);
    }

    /// Deletes remotely, then refreshes. Nothing changes locally on failure.
    pub async fn delete_record(&mut self, id: i64) -> Result<(), ListError> {
        let mutations = self.mutations.clone();
        mutations.delete_record(self, id).await
    }

    /// Stops the debounce timer and retires in-flight fetches.
    pub fn close(&mut self) {
        self.search.cancel();
        self.tokens.close();
        self.loading = false;
    }

    /// Event loop for one list screen. Runs until `events` closes, then tears
    /// down: pending search text is dropped and late responses are ignored.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ListEvent>) {
        let mut inflight: JoinSet<FetchOutcome<R>> = JoinSet::new();
        self.spawn_fetch(&mut inflight);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event, &mut inflight).await,
                    None => break,
                },
                settled = self.search.settled() => {
                    if self.set_remote_search(&settled) {
                        self.spawn_fetch(&mut inflight);
                    }
                },
                Some(joined) = inflight.join_next(), if !inflight.is_empty() => match joined {
                    Ok((ticket, outcome)) => {
                        let _ = self.complete_fetch(ticket, outcome);
                    }
                    Err(err) => warn!(kind = %R::KIND, "fetch task failed: {err}"),
                },
            }
        }

        self.close();
        inflight.abort_all();
        info!(kind = %R::KIND, "list view closed");
    }

    fn spawn_fetch(&mut self, inflight: &mut JoinSet<FetchOutcome<R>>) {
        let ticket = self.begin_fetch();
        let queries = self.queries.clone();
        inflight.spawn(async move {
            let outcome = queries.fetch_source_set::<R>(&ticket.params).await;
            (ticket, outcome)
        });
    }

    async fn handle_event(&mut self, event: ListEvent, inflight: &mut JoinSet<FetchOutcome<R>>) {
        match event {
            ListEvent::SearchInput(text) => self.on_search_input(&text),
            ListEvent::Sort(field) => {
                if self.set_sort(&field) {
                    self.spawn_fetch(inflight);
                }
            }
            ListEvent::Filter(field, spec) => self.set_filter(&field, spec),
            ListEvent::Page(page) => self.set_page(page),
            ListEvent::PageSize(size) => self.set_page_size(size),
            ListEvent::Delete(id) => {
                // Errors are kept in `last_error` for the screen to show.
                if let Err(err) = self.delete_record(id).await {
                    self.last_error = Some(err);
                }
            }
            ListEvent::Refresh => self.spawn_fetch(inflight),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::employee::Employee;
    use crate::domain::entities::record::ResourceKind;
    use crate::usecase::ports::mock_remote::MockRemote;
    use serde_json::{json, Value};

    fn row(id: i64, first: &str, department: &str) -> Value {
        json!({
            "id": id,
            "first_name": first,
            "last_name": "Tester",
            "email": format!("{first}@example.com"),
            "hire_date": "2021-06-15",
            "position": "Analyst",
            "department": department,
        })
    }

    fn options() -> ListOptions {
        ListOptions {
            page_size: 5,
            fetch_batch_size: 1000,
            search_debounce: Duration::from_millis(500),
        }
    }

    fn employees(rows: &[(i64, &str)]) -> Vec<Employee> {
        rows.iter()
            .map(|(id, first)| serde_json::from_value(row(*id, first, "Eng")).expect("row should decode"))
            .collect()
    }

    fn seeded() -> (MockRemote, ListController<Employee>) {
        let mock = MockRemote::with_rows(
            ResourceKind::Employees,
            vec![row(1, "alice", "Eng"), row(2, "bob", "Sales"), row(3, "carol", "Eng")],
        );
        let controller = ListController::new(Arc::new(mock.clone()), options());
        (mock, controller)
    }

    #[tokio::test]
    async fn refresh_requests_one_large_page_with_ordering() {
        let (mock, mut controller) = seeded();

        controller.refresh().await.expect("refresh should succeed");

        let calls = mock.list_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].page, 1);
        assert_eq!(calls[0].page_size, 1000);
        assert_eq!(calls[0].ordering.as_deref(), Some("id"));
        assert_eq!(controller.get_derived_view().total_count(), 3);
        assert!(!controller.is_loading());
    }

    #[tokio::test]
    async fn sort_toggle_refetches_with_descending_ordering() {
        let (mock, mut controller) = seeded();
        controller.refresh().await.expect("refresh should succeed");

        controller.sort_by("first_name").await.expect("sort should succeed");
        controller.sort_by("first_name").await.expect("sort should succeed");
        controller.sort_by("salary").await.expect("unknown sort is a no-op");

        let orderings: Vec<_> = mock
            .list_calls()
            .into_iter()
            .map(|call| call.ordering.unwrap_or_default())
            .collect();
        assert_eq!(orderings, vec!["id", "first_name", "-first_name"]);
        let names: Vec<_> = controller
            .get_derived_view()
            .page_window()
            .iter()
            .map(|e| e.first_name.clone())
            .collect();
        assert_eq!(names, vec!["carol", "bob", "alice"]);
    }

    #[tokio::test]
    async fn staged_search_and_sort_fetch_once() {
        let (mock, mut controller) = seeded();

        assert!(controller.set_remote_search("eng"));
        assert!(controller.set_sort("first_name"));
        assert!(controller.set_sort("first_name"));
        assert!(mock.list_calls().is_empty());

        controller.refresh().await.expect("refresh should succeed");

        let calls = mock.list_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].search, "eng");
        assert_eq!(calls[0].ordering.as_deref(), Some("-first_name"));
    }

    #[test]
    fn stale_response_is_discarded() {
        let (_mock, mut controller) = seeded();

        let older = controller.begin_fetch();
        let newer = controller.begin_fetch();

        let applied = controller.complete_fetch(newer, Ok(employees(&[(2, "bob")])));
        assert_eq!(applied, Ok(true));
        let applied = controller.complete_fetch(older, Ok(employees(&[(1, "alice"), (3, "carol")])));
        assert_eq!(applied, Ok(false));

        let ids: Vec<i64> = controller.pipeline().source_set().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn stale_failure_does_not_clear_loading_or_set_error() {
        let (_mock, mut controller) = seeded();

        let older = controller.begin_fetch();
        let _newer = controller.begin_fetch();
        let applied = controller.complete_fetch(older, Err(RemoteError::internal("late")));

        assert_eq!(applied, Ok(false));
        assert!(controller.is_loading());
        assert!(controller.last_error().is_none());
    }

    #[tokio::test]
    async fn failed_fetch_keeps_last_good_source_set() {
        let (mock, mut controller) = seeded();
        controller.refresh().await.expect("refresh should succeed");

        mock.set_fail_lists(true);
        let err = controller.refresh().await.expect_err("refresh should fail");

        assert_eq!(err.to_string(), "Failed to fetch employees. Please try again.");
        assert_eq!(controller.pipeline().source_set().len(), 3);
        assert!(!controller.is_loading());
        assert_eq!(controller.last_error(), Some(&err));
    }

    #[test]
    fn responses_after_close_are_ignored() {
        let (_mock, mut controller) = seeded();
        let ticket = controller.begin_fetch();

        controller.close();

        let applied = controller.complete_fetch(ticket, Ok(employees(&[(9, "zed")])));
        assert_eq!(applied, Ok(false));
        assert!(controller.pipeline().source_set().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn search_filters_locally_before_the_remote_call() {
        let (mock, mut controller) = seeded();
        controller.refresh().await.expect("refresh should succeed");

        controller.on_search_input("car");
        assert_eq!(controller.get_derived_view().total_count(), 1);
        assert_eq!(mock.list_calls().len(), 1);

        let settled = controller.search_settled().await;
        controller
            .apply_settled_search(&settled)
            .await
            .expect("search should apply");
        controller
            .apply_settled_search(&settled)
            .await
            .expect("search should apply");

        let calls = mock.list_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].search, "car");
        assert_eq!(controller.get_derived_view().total_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_debounces_typing_into_one_fetch() {
        let (mock, controller) = seeded();
        let mut views = controller.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(controller.run(rx));

        for text in ["a", "al", "ali"] {
            tx.send(ListEvent::SearchInput(text.to_string()))
                .expect("loop should accept events");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(600)).await;

        let searches: Vec<String> = mock.list_calls().into_iter().map(|c| c.search).collect();
        assert_eq!(searches, vec!["".to_string(), "ali".to_string()]);
        assert_eq!(views.borrow_and_update().total_count(), 1);

        tx.send(ListEvent::PageSize(1)).expect("loop should accept events");
        tx.send(ListEvent::SearchInput("zzz".to_string()))
            .expect("loop should accept events");
        drop(tx);
        handle.await.expect("loop should finish");

        assert_eq!(mock.list_calls().len(), 2, "pending search must not fire after teardown");
    }
}

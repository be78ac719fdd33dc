use std::cmp::Ordering;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::domain::entities::query::{FilterSpec, QueryState, SortDirection};
use crate::domain::entities::record::{FieldValue, Record};
use crate::domain::entities::view::DerivedView;

/// In-memory list view over the last fetched source set.
///
/// All state changes go through the mutators below; each one produces the
/// next `QueryState` and recomputes the `DerivedView` from scratch, then
/// publishes it to subscribers.
pub struct ViewPipeline<R: Record> {
    search_fields: Vec<String>,
    source: Arc<[R]>,
    state: QueryState,
    view: DerivedView<R>,
    publisher: watch::Sender<DerivedView<R>>,
}

impl<R: Record> ViewPipeline<R> {
    /// Pipeline with the record kind's default sort and search fields.
    pub fn new(page_size: usize) -> Self {
        Self::with_search_fields(page_size, R::SEARCH_FIELDS.iter().copied())
    }

    pub fn with_search_fields<'a>(
        page_size: usize,
        search_fields: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let search_fields = search_fields
            .into_iter()
            .filter(|field| {
                let known = R::has_field(field);
                if !known {
                    warn!(kind = %R::KIND, field, "ignoring unknown search field");
                }
                known
            })
            .map(str::to_string)
            .collect();
        let (publisher, _) = watch::channel(DerivedView::empty());
        let mut pipeline = ViewPipeline {
            search_fields,
            source: Arc::from(Vec::new()),
            state: QueryState::new(R::DEFAULT_SORT, page_size),
            view: DerivedView::empty(),
            publisher,
        };
        pipeline.recompute();
        pipeline
    }

    pub fn query_state(&self) -> &QueryState {
        &self.state
    }

    /// Full fetched population, unfiltered. Charts and exports read this.
    pub fn source_set(&self) -> &[R] {
        &self.source
    }

    pub fn get_derived_view(&self) -> DerivedView<R> {
        self.view.clone()
    }

    /// Receives a fresh snapshot after every recompute.
    pub fn subscribe(&self) -> watch::Receiver<DerivedView<R>> {
        self.publisher.subscribe()
    }

    /// Replaces the source set. Keeps the page unless it would now be past the
    /// end, in which case it moves to the last page that has rows.
    pub fn set_source_set(&mut self, records: Vec<R>) {
        self.source = Arc::from(records);
        let order = order_records(&self.source, &self.state, &self.search_fields);
        let page = clamp_page(self.state.page(), order.len(), self.state.page_size());
        if page != self.state.page() {
            debug!(kind = %R::KIND, from = self.state.page(), to = page, "clamped page after refresh");
            self.state = self.state.with_page(page);
        }
        self.publish(DerivedView::new(
            Arc::clone(&self.source),
            order,
            self.state.page(),
            self.state.page_size(),
        ));
    }

    /// Installs or clears one field filter. Unknown fields are ignored.
    pub fn set_filter(&mut self, field: &str, spec: Option<FilterSpec>) {
        if !R::has_field(field) {
            warn!(kind = %R::KIND, field, "ignoring filter on unknown field");
            return;
        }
        self.state = self.state.with_filter(field, spec);
        self.recompute();
    }

    pub fn set_local_search_term(&mut self, text: &str) {
        self.state = self.state.with_local_search_term(text);
        self.recompute();
    }

    /// Returns false when the term is unchanged; the caller uses that to skip
    /// a re-fetch.
    pub fn set_remote_search_term(&mut self, text: &str) -> bool {
        if self.state.remote_search_term() == text {
            return false;
        }
        self.state = self.state.with_remote_search_term(text);
        self.recompute();
        true
    }

    /// Same field flips direction, another field sorts ascending by it.
    /// Returns false for unknown fields, which leave the view untouched.
    pub fn set_sort(&mut self, field: &str) -> bool {
        if !R::has_field(field) {
            warn!(kind = %R::KIND, field, "ignoring sort on unknown field");
            return false;
        }
        self.state = self.state.with_sort(field);
        self.recompute();
        true
    }

    /// Negative pages clamp to the first page.
    pub fn set_page(&mut self, page: i64) {
        self.state = self.state.with_page(page.max(0) as usize);
        self.recompute();
    }

    pub fn set_page_size(&mut self, page_size: i64) {
        self.state = self.state.with_page_size(page_size.max(1) as usize);
        self.recompute();
    }

    fn recompute(&mut self) {
        let order = order_records(&self.source, &self.state, &self.search_fields);
        self.publish(DerivedView::new(
            Arc::clone(&self.source),
            order,
            self.state.page(),
            self.state.page_size(),
        ));
    }

    fn publish(&mut self, view: DerivedView<R>) {
        self.view = view;
        self.publisher.send_replace(self.view.clone());
    }
}

/// Filters and sorts `source`, returning positions in display order.
pub fn order_records<R: Record>(
    source: &[R],
    state: &QueryState,
    search_fields: &[String],
) -> Vec<usize> {
    let needle = state.local_search_term().to_lowercase();
    let mut order: Vec<usize> = source
        .iter()
        .enumerate()
        .filter(|(_, record)| matches_search(*record, &needle, search_fields))
        .filter(|(_, record)| {
            state
                .field_filters()
                .iter()
                .all(|(field, spec)| spec.matches(&record.field(field)))
        })
        .map(|(idx, _)| idx)
        .collect();

    let keys: Vec<SortKey> = source
        .iter()
        .map(|record| SortKey::project(&record.field(state.sort_key())))
        .collect();
    let direction = state.sort_direction();
    // Vec::sort_by is stable, so equal keys keep source order in both directions.
    order.sort_by(|&a, &b| {
        let ord = keys[a].compare(&keys[b]);
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
    order
}

fn matches_search<R: Record>(record: &R, needle: &str, search_fields: &[String]) -> bool {
    if needle.is_empty() {
        return true;
    }
    search_fields.iter().any(|field| {
        record
            .field(field)
            .display()
            .to_lowercase()
            .contains(needle)
    })
}

/// Last page index that still has rows, or the current one if it does.
pub fn clamp_page(page: usize, total: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    if page.saturating_mul(page_size) < total {
        return page;
    }
    total.saturating_sub(1) / page_size
}

#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Number(f64),
    Text(String),
}

impl SortKey {
    /// Numbers stay numeric, null becomes the empty string, everything else
    /// compares as lowercase text.
    fn project(value: &FieldValue) -> Self {
        match value {
            FieldValue::Number(number) => SortKey::Number(*number),
            FieldValue::Null => SortKey::Text(String::new()),
            other => SortKey::Text(other.display().to_lowercase()),
        }
    }

    fn text(&self) -> String {
        match self {
            SortKey::Number(number) => FieldValue::Number(*number).display(),
            SortKey::Text(text) => text.clone(),
        }
    }

    fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            _ => self.text().cmp(&other.text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::employee::Employee;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn employee(id: i64, department: &str, position: &str, hire_date: &str) -> Employee {
        Employee {
            id,
            first_name: format!("First{id}"),
            last_name: format!("Last{id}"),
            email: format!("e{id}@example.com"),
            phone_number: None,
            hire_date: NaiveDate::parse_from_str(hire_date, "%Y-%m-%d")
                .expect("should parse hire date"),
            position: position.to_string(),
            department: department.to_string(),
            task_count: None,
            task_counts: None,
        }
    }

    fn numbered(count: i64) -> Vec<Employee> {
        (1..=count)
            .map(|id| employee(id, "Eng", "Engineer", "2021-01-01"))
            .collect()
    }

    fn window_ids(pipeline: &ViewPipeline<Employee>) -> Vec<i64> {
        pipeline
            .get_derived_view()
            .page_window()
            .iter()
            .map(|e| e.id)
            .collect()
    }

    #[test]
    fn last_partial_page_holds_remaining_rows() {
        let mut pipeline = ViewPipeline::<Employee>::new(5);
        pipeline.set_source_set(numbered(12));
        pipeline.set_page(2);

        assert_eq!(window_ids(&pipeline), vec![11, 12]);
        assert_eq!(pipeline.get_derived_view().window_range(), 10..12);
        assert_eq!(pipeline.get_derived_view().total_count(), 12);
    }

    #[test]
    fn refresh_after_delete_keeps_page_when_still_populated() {
        let mut pipeline = ViewPipeline::<Employee>::new(5);
        pipeline.set_source_set(numbered(12));
        pipeline.set_page(2);

        let mut remaining = numbered(12);
        remaining.remove(3);
        pipeline.set_source_set(remaining);

        assert_eq!(pipeline.query_state().page(), 2);
        assert_eq!(pipeline.get_derived_view().total_count(), 11);
        assert_eq!(window_ids(&pipeline), vec![12]);
    }

    #[test]
    fn refresh_clamps_page_past_the_end() {
        let mut pipeline = ViewPipeline::<Employee>::new(5);
        pipeline.set_source_set(numbered(11));
        pipeline.set_page(2);

        pipeline.set_source_set(numbered(10));
        assert_eq!(pipeline.query_state().page(), 1);
        assert_eq!(window_ids(&pipeline), vec![6, 7, 8, 9, 10]);

        pipeline.set_source_set(Vec::new());
        assert_eq!(pipeline.query_state().page(), 0);
        assert!(window_ids(&pipeline).is_empty());
    }

    #[test]
    fn local_search_matches_any_configured_field() {
        let mut pipeline = ViewPipeline::<Employee>::with_search_fields(10, ["position", "department"]);
        pipeline.set_source_set(vec![
            employee(1, "Engineering", "Manager", "2021-01-01"),
            employee(2, "Sales", "Analyst", "2021-01-01"),
        ]);

        pipeline.set_local_search_term("ENG");

        assert_eq!(window_ids(&pipeline), vec![1]);
        assert_eq!(pipeline.get_derived_view().total_count(), 1);
    }

    #[test]
    fn hire_date_range_excludes_next_year() {
        let mut pipeline = ViewPipeline::<Employee>::new(10);
        pipeline.set_source_set(vec![
            employee(1, "Eng", "Engineer", "2022-01-01"),
            employee(2, "Eng", "Engineer", "2021-06-15"),
        ]);

        pipeline.set_filter(
            "hire_date",
            Some(FilterSpec::range(Some("2021-01-01"), Some("2021-12-31"))),
        );

        assert_eq!(window_ids(&pipeline), vec![2]);
    }

    #[test]
    fn filters_and_search_combine_with_and() {
        let mut pipeline = ViewPipeline::<Employee>::new(10);
        pipeline.set_source_set(vec![
            employee(1, "Eng", "Engineer", "2021-03-01"),
            employee(2, "Eng", "Analyst", "2021-03-01"),
            employee(3, "Sales", "Analyst", "2021-03-01"),
        ]);

        pipeline.set_filter("department", Some(FilterSpec::exact(" eng ")));
        pipeline.set_local_search_term("analyst");

        assert_eq!(window_ids(&pipeline), vec![2]);
        assert_eq!(pipeline.get_derived_view().total_count(), 1);
        assert_eq!(pipeline.source_set().len(), 3);
    }

    #[test]
    fn mutators_reset_page_to_zero() {
        let mut pipeline = ViewPipeline::<Employee>::new(5);
        pipeline.set_source_set(numbered(20));

        pipeline.set_page(2);
        pipeline.set_filter("department", Some(FilterSpec::exact("eng")));
        assert_eq!(pipeline.query_state().page(), 0);

        pipeline.set_page(2);
        pipeline.set_local_search_term("first");
        assert_eq!(pipeline.query_state().page(), 0);

        pipeline.set_page(2);
        pipeline.set_sort("hire_date");
        assert_eq!(pipeline.query_state().page(), 0);

        pipeline.set_page(2);
        pipeline.set_page_size(10);
        assert_eq!(pipeline.query_state().page(), 0);

        pipeline.set_page(2);
        assert!(pipeline.set_remote_search_term("x"));
        assert_eq!(pipeline.query_state().page(), 0);
    }

    #[test]
    fn invalid_inputs_are_normalized() {
        let mut pipeline = ViewPipeline::<Employee>::new(5);
        pipeline.set_source_set(numbered(8));
        pipeline.set_page(1);

        assert!(!pipeline.set_sort("salary"));
        assert_eq!(pipeline.query_state().sort_key(), "id");
        assert_eq!(pipeline.query_state().page(), 1);

        pipeline.set_page(-3);
        assert_eq!(pipeline.query_state().page(), 0);

        pipeline.set_filter("salary", Some(FilterSpec::exact("1")));
        assert!(pipeline.query_state().field_filters().is_empty());
    }

    #[test]
    fn repeated_filter_is_idempotent_and_repeated_sort_alternates() {
        let mut pipeline = ViewPipeline::<Employee>::new(5);
        pipeline.set_source_set(vec![
            employee(1, "Sales", "A", "2021-01-01"),
            employee(2, "Eng", "B", "2021-01-01"),
            employee(3, "Eng", "C", "2021-01-01"),
        ]);

        pipeline.set_filter("department", Some(FilterSpec::exact("eng")));
        let once = pipeline.query_state().clone();
        let first_ids = window_ids(&pipeline);
        pipeline.set_filter("department", Some(FilterSpec::exact("eng")));
        assert_eq!(pipeline.query_state(), &once);
        assert_eq!(window_ids(&pipeline), first_ids);

        pipeline.set_sort("position");
        assert_eq!(pipeline.query_state().sort_direction(), SortDirection::Asc);
        assert_eq!(window_ids(&pipeline), vec![2, 3]);
        pipeline.set_sort("position");
        assert_eq!(pipeline.query_state().sort_direction(), SortDirection::Desc);
        assert_eq!(window_ids(&pipeline), vec![3, 2]);
        pipeline.set_sort("position");
        assert_eq!(pipeline.query_state().sort_direction(), SortDirection::Asc);
    }

    #[test]
    fn numeric_fields_sort_numerically_and_nulls_first() {
        let mut rows = numbered(3);
        rows[0].task_count = Some(10);
        rows[1].task_count = None;
        rows[2].task_count = Some(9);
        let mut pipeline = ViewPipeline::<Employee>::new(5);
        pipeline.set_source_set(rows);

        pipeline.set_sort("task_count");

        assert_eq!(window_ids(&pipeline), vec![2, 3, 1]);
    }

    #[test]
    fn subscribers_see_every_recompute() {
        let mut pipeline = ViewPipeline::<Employee>::new(5);
        let mut updates = pipeline.subscribe();

        pipeline.set_source_set(numbered(7));
        assert!(updates.has_changed().expect("publisher should be alive"));
        assert_eq!(updates.borrow_and_update().total_count(), 7);

        pipeline.set_local_search_term("first7");
        assert_eq!(updates.borrow_and_update().total_count(), 1);
    }

    #[test]
    fn clamp_page_handles_edges() {
        assert_eq!(clamp_page(0, 0, 5), 0);
        assert_eq!(clamp_page(3, 0, 5), 0);
        assert_eq!(clamp_page(2, 11, 5), 2);
        assert_eq!(clamp_page(2, 10, 5), 1);
        assert_eq!(clamp_page(9, 1, 5), 0);
    }

    fn arb_employee() -> impl Strategy<Value = (String, String, u32, Option<i64>)> {
        (
            prop::sample::select(vec!["Eng", "eng ", "Sales", "Support", ""]),
            prop::sample::select(vec!["Analyst", "Engineer", "Manager"]),
            0u32..730,
            prop::option::of(0i64..4),
        )
            .prop_map(|(dept, pos, offset, tasks)| {
                (dept.to_string(), pos.to_string(), offset, tasks)
            })
    }

    fn build(rows: &[(String, String, u32, Option<i64>)]) -> Vec<Employee> {
        let base = NaiveDate::from_ymd_opt(2020, 1, 1).expect("should build date");
        rows.iter()
            .enumerate()
            .map(|(idx, (dept, pos, offset, tasks))| Employee {
                id: idx as i64 + 1,
                first_name: format!("F{idx}"),
                last_name: "L".to_string(),
                email: format!("f{idx}@example.com"),
                phone_number: None,
                hire_date: base + chrono::Duration::days(*offset as i64),
                position: pos.clone(),
                department: dept.clone(),
                task_count: *tasks,
                task_counts: None,
            })
            .collect()
    }

    proptest! {
        #[test]
        fn window_and_filters_hold_for_any_state(
            rows in prop::collection::vec(arb_employee(), 0..40),
            page in 0i64..10,
            page_size in 1i64..8,
            dept in prop::option::of(prop::sample::select(vec!["eng", "sales"])),
            from_offset in prop::option::of(0i64..730),
            search in prop::sample::select(vec!["", "an", "eng", "zzz"]),
            sort in prop::sample::select(vec!["department", "hire_date", "task_count", "position"]),
            descending in any::<bool>(),
        ) {
            let records = build(&rows);
            let mut pipeline = ViewPipeline::<Employee>::new(5);
            pipeline.set_source_set(records.clone());
            pipeline.set_sort(sort);
            if descending {
                pipeline.set_sort(sort);
            }
            pipeline.set_filter("department", dept.map(|d| FilterSpec::exact(d)));
            let from = from_offset.map(|days| {
                NaiveDate::from_ymd_opt(2020, 1, 1).expect("should build date")
                    + chrono::Duration::days(days)
            });
            pipeline.set_filter("hire_date", from.map(|d| FilterSpec::range(Some(d), None::<NaiveDate>)));
            pipeline.set_local_search_term(search);
            pipeline.set_page_size(page_size);
            pipeline.set_page(page);

            let view = pipeline.get_derived_view();
            let window = view.page_window();
            let total = view.total_count();
            let size = page_size as usize;

            prop_assert!(window.len() <= size);
            prop_assert_eq!(window.is_empty(), (page as usize) * size >= total);
            let expected_window: Vec<i64> = view
                .filtered_sorted()
                .skip(page as usize * size)
                .take(size)
                .map(|e| e.id)
                .collect();
            prop_assert_eq!(window.iter().map(|e| e.id).collect::<Vec<_>>(), expected_window);

            for record in view.filtered_sorted() {
                if let Some(dept) = dept {
                    prop_assert_eq!(record.department.trim().to_lowercase(), dept);
                }
                if let Some(from) = from {
                    prop_assert!(record.hire_date >= from);
                }
                if !search.is_empty() {
                    let haystack = [
                        &record.first_name,
                        &record.last_name,
                        &record.email,
                        &record.position,
                        &record.department,
                    ];
                    prop_assert!(haystack.iter().any(|f| f.to_lowercase().contains(search)));
                }
            }
        }

        #[test]
        fn equal_sort_keys_keep_source_order(
            rows in prop::collection::vec(arb_employee(), 0..40),
            descending in any::<bool>(),
        ) {
            let mut pipeline = ViewPipeline::<Employee>::new(100);
            pipeline.set_source_set(build(&rows));
            pipeline.set_sort("department");
            if descending {
                pipeline.set_sort("department");
            }

            let view = pipeline.get_derived_view();
            let ordered: Vec<&Employee> = view.filtered_sorted().collect();
            for pair in ordered.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                if a.department.to_lowercase() == b.department.to_lowercase() {
                    prop_assert!(a.id < b.id, "tie between {} and {} lost source order", a.id, b.id);
                }
            }
        }
    }
}

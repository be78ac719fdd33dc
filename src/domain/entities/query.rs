use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::domain::entities::record::FieldValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Per-field predicate installed on a list view.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSpec {
    /// Trimmed, case-insensitive equality.
    Exact(FieldValue),
    /// Inclusive bounds over dates or numbers; a missing bound is open.
    Range {
        from: Option<FieldValue>,
        to: Option<FieldValue>,
    },
}

impl FilterSpec {
    pub fn exact(value: impl Into<FieldValue>) -> Self {
        FilterSpec::Exact(value.into())
    }

    pub fn range(from: Option<impl Into<FieldValue>>, to: Option<impl Into<FieldValue>>) -> Self {
        FilterSpec::Range {
            from: from.map(Into::into),
            to: to.map(Into::into),
        }
    }

    /// A range with neither bound constrains nothing.
    pub fn is_unbounded(&self) -> bool {
        match self {
            FilterSpec::Exact(_) => false,
            FilterSpec::Range { from, to } => {
                from.as_ref().map_or(true, FieldValue::is_null)
                    && to.as_ref().map_or(true, FieldValue::is_null)
            }
        }
    }

    pub fn matches(&self, value: &FieldValue) -> bool {
        match self {
            FilterSpec::Exact(expected) => value.exact_key() == expected.exact_key(),
            FilterSpec::Range { from, to } => {
                if value.is_null() {
                    return false;
                }
                let above = bound_holds(value, from.as_ref(), |ord| ord != Ordering::Less);
                let below = bound_holds(value, to.as_ref(), |ord| ord != Ordering::Greater);
                above && below
            }
        }
    }
}

fn bound_holds(
    value: &FieldValue,
    bound: Option<&FieldValue>,
    accept: impl Fn(Ordering) -> bool,
) -> bool {
    match bound {
        None | Some(FieldValue::Null) => true,
        Some(bound) => compare_scalars(value, bound).is_some_and(accept),
    }
}

/// Dates first, then numbers; anything else is incomparable.
fn compare_scalars(left: &FieldValue, right: &FieldValue) -> Option<Ordering> {
    if let (Some(l), Some(r)) = (left.as_date(), right.as_date()) {
        return Some(l.cmp(&r));
    }
    if let (Some(l), Some(r)) = (left.as_number(), right.as_number()) {
        return l.partial_cmp(&r);
    }
    None
}

/// Everything a list view is configured with. Values are replaced, never
/// patched: each transition returns the next state.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    remote_search_term: String,
    local_search_term: String,
    field_filters: BTreeMap<String, FilterSpec>,
    sort_key: String,
    sort_direction: SortDirection,
    page: usize,
    page_size: usize,
}

impl QueryState {
    pub fn new(sort_key: impl Into<String>, page_size: usize) -> Self {
        QueryState {
            remote_search_term: String::new(),
            local_search_term: String::new(),
            field_filters: BTreeMap::new(),
            sort_key: sort_key.into(),
            sort_direction: SortDirection::Asc,
            page: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn remote_search_term(&self) -> &str {
        &self.remote_search_term
    }

    pub fn local_search_term(&self) -> &str {
        &self.local_search_term
    }

    pub fn field_filters(&self) -> &BTreeMap<String, FilterSpec> {
        &self.field_filters
    }

    pub fn sort_key(&self) -> &str {
        &self.sort_key
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Ordering parameter for the remote list call, `-field` when descending.
    pub fn ordering(&self) -> String {
        match self.sort_direction {
            SortDirection::Asc => self.sort_key.clone(),
            SortDirection::Desc => format!("-{}", self.sort_key),
        }
    }

    pub(crate) fn with_remote_search_term(&self, text: &str) -> Self {
        QueryState {
            remote_search_term: text.to_string(),
            page: 0,
            ..self.clone()
        }
    }

    pub(crate) fn with_local_search_term(&self, text: &str) -> Self {
        QueryState {
            local_search_term: text.to_string(),
            page: 0,
            ..self.clone()
        }
    }

    pub(crate) fn with_filter(&self, field: &str, spec: Option<FilterSpec>) -> Self {
        let mut field_filters = self.field_filters.clone();
        match spec.filter(|spec| !spec.is_unbounded()) {
            Some(spec) => {
                field_filters.insert(field.to_string(), spec);
            }
            None => {
                field_filters.remove(field);
            }
        }
        QueryState {
            field_filters,
            page: 0,
            ..self.clone()
        }
    }

    pub(crate) fn with_sort(&self, field: &str) -> Self {
        let sort_direction = if self.sort_key == field {
            self.sort_direction.toggled()
        } else {
            SortDirection::Asc
        };
        QueryState {
            sort_key: field.to_string(),
            sort_direction,
            page: 0,
            ..self.clone()
        }
    }

    pub(crate) fn with_page(&self, page: usize) -> Self {
        QueryState {
            page,
            ..self.clone()
        }
    }

    pub(crate) fn with_page_size(&self, page_size: usize) -> Self {
        QueryState {
            page_size: page_size.max(1),
            page: 0,
            ..self.clone()
        }
    }
}

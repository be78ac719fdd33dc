use std::ops::Range;
use std::sync::Arc;

/// Snapshot of what a list view shows. It shares the source rows and stores
/// the filtered, sorted order as indices, so cloning it is cheap.
#[derive(Debug)]
pub struct DerivedView<R> {
    source: Arc<[R]>,
    order: Arc<[usize]>,
    window: Range<usize>,
}

impl<R> Clone for DerivedView<R> {
    fn clone(&self) -> Self {
        DerivedView {
            source: Arc::clone(&self.source),
            order: Arc::clone(&self.order),
            window: self.window.clone(),
        }
    }
}

impl<R> DerivedView<R> {
    /// `order` must index into `source`.
    pub(crate) fn new(source: Arc<[R]>, order: Vec<usize>, page: usize, page_size: usize) -> Self {
        let total = order.len();
        let start = page.saturating_mul(page_size).min(total);
        let end = start.saturating_add(page_size).min(total);
        DerivedView {
            source,
            order: order.into(),
            window: start..end,
        }
    }

    pub fn empty() -> Self {
        DerivedView {
            source: Arc::from(Vec::new()),
            order: Arc::from(Vec::new()),
            window: 0..0,
        }
    }

    /// Rows left after filtering, not the size of the fetched set.
    pub fn total_count(&self) -> usize {
        self.order.len()
    }

    pub fn page_window(&self) -> Vec<&R> {
        self.order[self.window.clone()]
            .iter()
            .map(|&idx| &self.source[idx])
            .collect()
    }

    /// Position of the page window inside `filtered_sorted`.
    pub fn window_range(&self) -> Range<usize> {
        self.window.clone()
    }

    pub fn filtered_sorted(&self) -> impl Iterator<Item = &R> + '_ {
        self.order.iter().map(|&idx| &self.source[idx])
    }
}

//! Live search over the current view
//!
//! [`SearchIndex`] caches the normalized text of every cell for the
//! current view generation, so keystroke-by-keystroke substring search
//! never re-normalizes the table. [`Debouncer`] coalesces rapid
//! triggers (typing) into one deferred action.

use std::time::Duration;

use mw_core::Table;

/// Substring search across all columns of the current view.
///
/// Match positions are row indices into the view the index was built
/// from; they go stale when the view changes, so the owner rebuilds the
/// index with [`SearchIndex::set_view`] on every snapshot or filter
/// change.
#[derive(Debug, Default)]
pub struct SearchIndex {
    /// Row-major normalized, lowercased cell text.
    cells: Vec<Vec<String>>,
    matches: Vec<usize>,
    cursor: Option<usize>,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the cache from a new view generation. Drops any match
    /// state from the previous generation.
    pub fn set_view(&mut self, view: &Table) {
        self.cells = view
            .rows()
            .iter()
            .map(|row| {
                row.cells()
                    .map(|cell| cell.normalized().to_lowercase())
                    .collect()
            })
            .collect();
        self.matches.clear();
        self.cursor = None;
    }

    /// Run a search. An empty term clears the match set. Matches are
    /// returned in view order.
    pub fn search(&mut self, term: &str) -> &[usize] {
        self.matches.clear();
        self.cursor = None;
        let needle = mw_core::normalize(term).to_lowercase();
        if needle.is_empty() {
            return &self.matches;
        }
        for (row, cells) in self.cells.iter().enumerate() {
            if cells.iter().any(|cell| cell.contains(&needle)) {
                self.matches.push(row);
            }
        }
        &self.matches
    }

    pub fn matches(&self) -> &[usize] {
        &self.matches
    }

    /// Step to the next match, wrapping to the first after the last.
    pub fn next_match(&mut self) -> Option<usize> {
        if self.matches.is_empty() {
            return None;
        }
        let next = match self.cursor {
            Some(i) => (i + 1) % self.matches.len(),
            None => 0,
        };
        self.cursor = Some(next);
        Some(self.matches[next])
    }

    pub fn clear(&mut self) {
        self.matches.clear();
        self.cursor = None;
    }
}

/// Defers an action until triggers have gone quiet for `delay`.
/// Retriggering before the delay elapses aborts the pending run.
pub struct Debouncer {
    delay: Duration,
    pending: Option<tokio::task::JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn trigger<F>(&mut self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mw_core::{Column, Row};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn view() -> Table {
        let mut t = Table::new();
        t.add_column(Column::base("نماد")).unwrap();
        t.add_column(Column::base("نام")).unwrap();
        t.push_row(Row::from_iter(["فولاد".into(), "فولاد مبارکه".into()]))
            .unwrap();
        t.push_row(Row::from_iter(["زفجر".into(), "فجر انرژی".into()]))
            .unwrap();
        t.push_row(Row::from_iter(["خودرو".into(), "ایران خودرو".into()]))
            .unwrap();
        t.renumber();
        t
    }

    #[test]
    fn search_matches_across_all_columns_in_view_order() {
        let mut index = SearchIndex::new();
        index.set_view(&view());
        assert_eq!(index.search("فجر"), &[1]);
        assert_eq!(index.search("خودرو"), &[2]);
        assert_eq!(index.search("فولاد"), &[0]);
    }

    #[test]
    fn search_only_hits_the_containing_row() {
        let mut index = SearchIndex::new();
        index.set_view(&view());
        assert_eq!(index.search("زفجر"), &[1]);
    }

    #[test]
    fn search_term_is_normalized() {
        let mut t = Table::new();
        t.add_column(Column::base("نماد")).unwrap();
        t.push_row(Row::from_iter(["كلر".into()])).unwrap();
        let mut index = SearchIndex::new();
        index.set_view(&t);
        // Arabic kaf in the cell, Persian kaf in the query.
        assert_eq!(index.search("کلر"), &[0]);
    }

    #[test]
    fn empty_term_clears_matches() {
        let mut index = SearchIndex::new();
        index.set_view(&view());
        index.search("فولاد");
        assert_eq!(index.search(""), &[] as &[usize]);
        assert!(index.next_match().is_none());
    }

    #[test]
    fn next_match_wraps() {
        let mut t = Table::new();
        t.add_column(Column::base("x")).unwrap();
        for s in ["ab", "cd", "ab"] {
            t.push_row(Row::from_iter([s.into()])).unwrap();
        }
        let mut index = SearchIndex::new();
        index.set_view(&t);
        index.search("ab");
        assert_eq!(index.next_match(), Some(0));
        assert_eq!(index.next_match(), Some(2));
        assert_eq!(index.next_match(), Some(0));
    }

    #[test]
    fn set_view_invalidates_previous_matches() {
        let mut index = SearchIndex::new();
        index.set_view(&view());
        index.search("فولاد");
        index.set_view(&Table::new());
        assert!(index.matches().is_empty());
        assert_eq!(index.search("فولاد"), &[] as &[usize]);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_coalesces_rapid_triggers() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(300));
        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            debouncer.trigger(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_pending_action() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(300));
        {
            let hits = Arc::clone(&hits);
            debouncer.trigger(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}

//! Fixed-size paging over the in-memory snapshot.

use std::ops::Range;
use std::time::{Duration, Instant};

pub const PAGE_SIZE: usize = 50;

/// How long a page change is drawn as "in transition"
pub const PAGE_TRANSITION: Duration = Duration::from_millis(200);

/// `max(1, ceil(len / page_size))`
pub fn total_pages(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1)).max(1)
}

/// Current page over a sequence whose length may change between fetches.
/// `current_page` is 1-based and always within `1..=total_pages`.
#[derive(Clone, Debug)]
pub struct Pagination {
    page_size: usize,
    len: usize,
    current_page: usize,
    transition_until: Option<Instant>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(PAGE_SIZE)
    }
}

impl Pagination {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            len: 0,
            current_page: 1,
            transition_until: None,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.len, self.page_size)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Track a new sequence length, clamping the current page down if needed
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        self.current_page = self.current_page.min(self.total_pages());
    }

    /// Back to page 1 without a transition
    pub fn reset(&mut self) {
        self.current_page = 1;
        self.transition_until = None;
    }

    pub fn first(&mut self, now: Instant) {
        self.go_to(1, now);
    }

    pub fn previous(&mut self, now: Instant) {
        self.go_to(self.current_page.saturating_sub(1), now);
    }

    pub fn next(&mut self, now: Instant) {
        self.go_to(self.current_page + 1, now);
    }

    pub fn last(&mut self, now: Instant) {
        self.go_to(self.total_pages(), now);
    }

    /// Jump to `page`, silently clamped into range
    pub fn go_to(&mut self, page: usize, now: Instant) {
        let target = page.clamp(1, self.total_pages());
        if target != self.current_page {
            self.current_page = target;
            self.transition_until = Some(now + PAGE_TRANSITION);
        }
    }

    pub fn is_transitioning(&self, now: Instant) -> bool {
        self.transition_until.is_some_and(|until| now < until)
    }

    /// Index range of the current page within a sequence of `len`
    pub fn visible_range(&self) -> Range<usize> {
        let start = ((self.current_page - 1) * self.page_size).min(self.len);
        let end = (start + self.page_size).min(self.len);
        start..end
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let range = self.visible_range();
        let end = range.end.min(items.len());
        let start = range.start.min(end);
        &items[start..end]
    }
}

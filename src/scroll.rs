//! Decides whether newly arrived entries should pull the log pane to its anchor.

/// Rows above the bottom still considered "at the bottom". The pane scrolls
/// in whole rows, so only the last scroll position counts.
pub const NEAR_BOTTOM_THRESHOLD: f64 = 0.0;

/// Viewport geometry of the log pane, in rows
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn distance_from_bottom(&self) -> f64 {
        (self.scroll_height - self.scroll_top - self.client_height).max(0.0)
    }
}

#[derive(Clone, Debug)]
pub struct ScrollTracker {
    threshold: f64,
    near_bottom: bool,
    pending_scroll: bool,
}

impl Default for ScrollTracker {
    fn default() -> Self {
        Self::new(NEAR_BOTTOM_THRESHOLD)
    }
}

impl ScrollTracker {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.max(0.0),
            // An untouched pane sits at its anchor
            near_bottom: true,
            pending_scroll: false,
        }
    }

    pub fn on_scroll(&mut self, metrics: ScrollMetrics) {
        self.near_bottom = metrics.distance_from_bottom() < self.threshold + 1.0;
    }

    pub fn is_near_bottom(&self) -> bool {
        self.near_bottom
    }

    /// Called when a batch of new entries lands. Scrolls only if the pane was
    /// at the bottom when the fetch went out and the user hasn't left since.
    pub fn on_new_entries(&mut self, near_bottom_at_issue: bool) -> bool {
        let scroll = near_bottom_at_issue && self.near_bottom;
        if scroll {
            self.pending_scroll = true;
        }
        scroll
    }

    /// Consume the pending scroll request; the front-end honours it on its next draw
    pub fn take_pending_scroll(&mut self) -> bool {
        std::mem::take(&mut self.pending_scroll)
    }

    pub fn reset(&mut self) {
        self.near_bottom = true;
        self.pending_scroll = false;
    }
}

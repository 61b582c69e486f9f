use std::time::Duration;

/// Height between two stacked items.
pub const ITEM_GAP_PX: f64 = 16.0;

/// Item height assumed when no rendered item could be measured.
pub const ESTIMATED_ITEM_HEIGHT_PX: f64 = 80.0;

/// One layout measurement, taken by whatever renders the card.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub viewport_width: u32,
    pub container_height: f64,
    pub content_height: f64,
    /// Height of one rendered item, when there is one to measure.
    pub item_height: Option<f64>,
}

/// Source of measurements. `None` while nothing is laid out yet.
pub trait Measure {
    fn measure(&self) -> Option<Measurement>;
}

impl Measure for Measurement {
    fn measure(&self) -> Option<Measurement> {
        Some(*self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Paging {
    /// A fixed list of named sections, one per page.
    Sections,
    /// A list of items, one or two per page depending on the space.
    Items,
}

#[derive(Debug, Clone)]
pub struct Carousel<T> {
    parts: Vec<T>,
    paging: Paging,
    breakpoint_px: u32,
    active: bool,
    index: usize,
    page_size: usize,
}

impl<T> Carousel<T> {
    fn new(parts: Vec<T>, paging: Paging, breakpoint_px: u32) -> Self {
        Self {
            parts,
            paging,
            breakpoint_px,
            active: false,
            index: 0,
            page_size: 1,
        }
    }

    pub fn sections(sections: Vec<T>, breakpoint_px: u32) -> Self {
        Self::new(sections, Paging::Sections, breakpoint_px)
    }

    pub fn items(items: Vec<T>, breakpoint_px: u32) -> Self {
        Self::new(items, Paging::Items, breakpoint_px)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn parts(&self) -> &[T] {
        &self.parts
    }

    /// Swap in new items, e.g. after a reload. Paging restarts and waits
    /// for the next measurement.
    pub fn replace(&mut self, parts: Vec<T>) {
        self.parts = parts;
        self.reset();
    }

    fn reset(&mut self) {
        self.active = false;
        self.index = 0;
        self.page_size = 1;
    }

    fn last_page_start(&self) -> usize {
        self.parts.len().saturating_sub(self.page_size)
    }

    fn fitting_page_size(&self, m: &Measurement) -> usize {
        if self.paging == Paging::Sections || self.parts.len() < 2 {
            return 1;
        }
        let item = m
            .item_height
            .filter(|h| *h > 0.0)
            .unwrap_or(ESTIMATED_ITEM_HEIGHT_PX);
        if item * 2.0 + ITEM_GAP_PX <= m.container_height {
            2
        } else {
            1
        }
    }

    /// Recompute the mode from a fresh measurement. Called after the first
    /// layout and on every resize.
    pub fn measure(&mut self, measurement: Option<Measurement>) {
        let Some(m) = measurement else {
            self.reset();
            return;
        };
        if m.viewport_width < self.breakpoint_px || self.parts.is_empty() {
            self.reset();
            return;
        }

        self.page_size = self.fitting_page_size(&m);
        self.active = m.content_height > m.container_height;
        if !self.active {
            self.index = 0;
        } else if self.index > self.last_page_start() {
            self.index = self.last_page_start();
        }
        tracing::trace!(
            active = self.active,
            page_size = self.page_size,
            "Carousel measured"
        );
    }

    /// Wait for layout to settle, then measure.
    pub async fn settle_and_measure<M: Measure>(&mut self, source: &M, delay: Duration) {
        tokio::time::sleep(delay).await;
        self.measure(source.measure());
    }

    /// Advance one page, wrapping to the start past the last page.
    pub fn next(&mut self) {
        if !self.active || self.parts.is_empty() {
            return;
        }
        let next = self.index + self.page_size;
        self.index = if next > self.last_page_start() { 0 } else { next };
    }

    /// Go back one page, wrapping to the last page before the start.
    pub fn prev(&mut self) {
        if !self.active || self.parts.is_empty() {
            return;
        }
        self.index = match self.index.checked_sub(self.page_size) {
            Some(prev) => prev,
            None => self.last_page_start(),
        };
    }

    /// What to render: the current page when active, everything otherwise.
    pub fn visible(&self) -> &[T] {
        if !self.active {
            return &self.parts;
        }
        let end = (self.index + self.page_size).min(self.parts.len());
        &self.parts[self.index..end]
    }

    /// Navigation controls only make sense with something to page through.
    pub fn shows_controls(&self) -> bool {
        self.active && self.parts.len() > self.page_size
    }
}

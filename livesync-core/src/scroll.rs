//! Load-more trigger driven by scroll position

/// Scroll geometry of the list container, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        Self {
            scroll_top,
            scroll_height,
            client_height,
        }
    }

    /// Within `threshold` px of the bottom edge
    pub fn near_bottom(&self, threshold: f64) -> bool {
        self.scroll_height - self.scroll_top - threshold <= self.client_height
    }
}

/// Fires once each time the viewport crosses into the bottom band.
///
/// Staying inside the band does not fire again until the trigger is re-armed,
/// either by scrolling back out or by `rearm` after a page has loaded.
#[derive(Debug, Clone)]
pub struct ScrollTrigger {
    threshold: f64,
    inside: bool,
}

impl ScrollTrigger {
    pub fn new(threshold_px: u32) -> Self {
        Self {
            threshold: f64::from(threshold_px),
            inside: false,
        }
    }

    pub fn observe(&mut self, metrics: ScrollMetrics) -> bool {
        let near = metrics.near_bottom(self.threshold);
        let fire = near && !self.inside;
        self.inside = near;
        fire
    }

    pub fn rearm(&mut self) {
        self.inside = false;
    }
}

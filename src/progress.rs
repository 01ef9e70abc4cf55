use serde::{Deserialize, Serialize};

pub const MOBILE_BREAKPOINT_PX: f64 = 768.0;
pub const TABLET_BREAKPOINT_PX: f64 = 1024.0;
pub const DESKTOP_BAND_FACTOR: f64 = 0.4;
pub const MOBILE_BAND_FACTOR: f64 = 0.3;
pub const VISIBILITY_LEAD: f64 = 0.5;
pub const VISIBILITY_TRAIL: f64 = 2.0;
pub const VISIBILITY_HYSTERESIS: f64 = 0.1;

/// Delays after mount or resize at which the container is measured again.
/// Images finishing late shift layout and there is no layout-complete event.
pub const REMEASURE_SCHEDULE_MS: [u32; 4] = [0, 100, 500, 1000];

const MIN_BAND_HEIGHT: f64 = 1.0;
const CARD_EXIT_SCALE: f64 = 0.92;

pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }

    value.clamp(0.0, 1.0)
}

pub fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

/// Index of the equal-width segment of `[0, 1]` that `progress` falls in.
/// `progress == 1.0` lands one past the last segment.
pub fn segment_index(progress: f64, segments: usize) -> usize {
    if segments == 0 {
        return 0;
    }

    (clamp01(progress) * segments as f64).floor() as usize
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceClass {
    Desktop,
    Tablet,
    Mobile,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Breakpoints {
    pub mobile: f64,
    pub tablet: f64,
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self {
            mobile: MOBILE_BREAKPOINT_PX,
            tablet: TABLET_BREAKPOINT_PX,
        }
    }
}

impl Breakpoints {
    pub fn classify(&self, viewport_width: f64) -> DeviceClass {
        if viewport_width < self.mobile {
            DeviceClass::Mobile
        } else if viewport_width < self.tablet {
            DeviceClass::Tablet
        } else {
            DeviceClass::Desktop
        }
    }
}

/// How tall each card's band is and when a card counts as visible.
/// Bands are measured in viewport heights; mobile bands are shorter so a
/// stack does not demand excessive scrolling on small screens.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BandPolicy {
    pub desktop_factor: f64,
    pub mobile_factor: f64,
    pub visibility_lead: f64,
    pub visibility_trail: f64,
    pub hysteresis: f64,
    pub breakpoints: Breakpoints,
}

impl Default for BandPolicy {
    fn default() -> Self {
        Self {
            desktop_factor: DESKTOP_BAND_FACTOR,
            mobile_factor: MOBILE_BAND_FACTOR,
            visibility_lead: VISIBILITY_LEAD,
            visibility_trail: VISIBILITY_TRAIL,
            hysteresis: VISIBILITY_HYSTERESIS,
            breakpoints: Breakpoints::default(),
        }
    }
}

impl BandPolicy {
    pub fn factor_for(&self, class: DeviceClass) -> f64 {
        match class {
            DeviceClass::Desktop | DeviceClass::Tablet => self.desktop_factor,
            DeviceClass::Mobile => self.mobile_factor,
        }
    }

    /// Scroll offsets `[enter, exit)` from `lead` bands before the band
    /// starts until `trail` bands after it.
    pub fn visibility_window(&self, band: &ScrollBand) -> (f64, f64) {
        (
            band.start - self.visibility_lead * band.height,
            band.start + self.visibility_trail * band.height,
        )
    }

    /// While already visible both edges widen by `hysteresis`, so a scroll
    /// position resting on an edge does not flicker.
    fn within_window(
        &self,
        (enter, exit): (f64, f64),
        band_height: f64,
        scroll_y: f64,
        was_visible: bool,
    ) -> bool {
        let margin = if was_visible {
            self.hysteresis * band_height
        } else {
            0.0
        };

        scroll_y >= enter - margin && scroll_y < exit + margin
    }
}

/// The scroll offsets `[start, start + height)` owned by one card or phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollBand {
    pub start: f64,
    pub height: f64,
}

impl ScrollBand {
    pub fn new(start: f64, height: f64) -> Self {
        Self {
            start,
            height: height.max(MIN_BAND_HEIGHT),
        }
    }

    pub fn for_item(container_top: f64, item_height: f64, index: usize) -> Self {
        let band = Self::new(container_top, item_height);
        Self::new(band.start + index as f64 * band.height, band.height)
    }

    pub fn end(&self) -> f64 {
        self.start + self.height
    }

    pub fn next(&self) -> Self {
        Self::new(self.end(), self.height)
    }

    pub fn progress(&self, scroll_y: f64) -> f64 {
        clamp01((scroll_y - self.start) / self.height)
    }
}

/// One snapshot of everything the calculators read from the page.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    pub scroll_y: f64,
    pub container_top: f64,
    pub container_height: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
}

impl Measurement {
    pub fn device_class(&self, breakpoints: &Breakpoints) -> DeviceClass {
        breakpoints.classify(self.viewport_width)
    }

    /// Progress through the container while it is pinned: zero when its top
    /// reaches the top of the viewport, one when its bottom reaches the
    /// bottom of the viewport.
    pub fn pinned_progress(&self) -> f64 {
        ScrollBand::new(self.container_top, self.container_height - self.viewport_height)
            .progress(self.scroll_y)
    }

    /// True while any part of the container intersects the viewport.
    pub fn container_in_view(&self) -> bool {
        let bottom = self.container_top + self.container_height;
        bottom > self.scroll_y && self.container_top < self.scroll_y + self.viewport_height
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CardProgress {
    pub progress: f64,
    pub next_progress: f64,
    pub is_visible: bool,
}

impl CardProgress {
    pub const NOT_INITIALIZED: Self = Self {
        progress: 0.0,
        next_progress: 0.0,
        is_visible: false,
    };
}

impl Default for CardProgress {
    fn default() -> Self {
        Self::NOT_INITIALIZED
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProgressCalculator {
    item_count: usize,
    policy: BandPolicy,
}

impl ProgressCalculator {
    pub fn new(item_count: usize, policy: BandPolicy) -> Self {
        Self { item_count, policy }
    }

    pub fn band_height(&self, measurement: &Measurement) -> f64 {
        let class = measurement.device_class(&self.policy.breakpoints);
        measurement.viewport_height * self.policy.factor_for(class)
    }

    pub fn band(&self, measurement: &Measurement, index: usize) -> ScrollBand {
        ScrollBand::for_item(
            measurement.container_top,
            self.band_height(measurement),
            index,
        )
    }

    /// Container height that gives every card its full band plus one
    /// viewport for the last card to rest in.
    pub fn scroll_length(&self, measurement: &Measurement) -> f64 {
        self.band_height(measurement) * self.item_count as f64 + measurement.viewport_height
    }

    pub fn compute(
        &self,
        measurement: Option<&Measurement>,
        index: usize,
        was_visible: bool,
    ) -> CardProgress {
        let Some(measurement) = measurement else {
            return CardProgress::NOT_INITIALIZED;
        };

        if index >= self.item_count {
            return CardProgress::NOT_INITIALIZED;
        }

        let band = self.band(measurement, index);

        // the ends of the stack stay up for as long as the section is on screen
        let (mut enter, mut exit) = self.policy.visibility_window(&band);
        if index == 0 {
            enter = enter.min(measurement.container_top - measurement.viewport_height);
        }
        if index + 1 == self.item_count {
            exit = exit.max(measurement.container_top + self.scroll_length(measurement));
        }

        CardProgress {
            progress: band.progress(measurement.scroll_y),
            next_progress: band.next().progress(measurement.scroll_y),
            is_visible: self.policy.within_window(
                (enter, exit),
                band.height,
                measurement.scroll_y,
                was_visible,
            ),
        }
    }

    pub fn compute_all(
        &self,
        measurement: Option<&Measurement>,
        previous: &[CardProgress],
    ) -> Vec<CardProgress> {
        (0..self.item_count)
            .map(|index| {
                let was_visible = previous.get(index).is_some_and(|card| card.is_visible);
                self.compute(measurement, index, was_visible)
            })
            .collect()
    }
}

/// Inline transform for one sticky card in a stack.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CardVisual {
    pub translate_y: f64,
    pub scale: f64,
    pub opacity: f64,
}

impl CardVisual {
    pub fn hidden(lift_px: f64) -> Self {
        Self {
            translate_y: lift_px,
            scale: 1.0,
            opacity: 0.0,
        }
    }

    /// The first card starts fully entered and the last card never fades
    /// out, so the stack has no empty frame at either end.
    pub fn from_progress(card: &CardProgress, is_first: bool, is_last: bool, lift_px: f64) -> Self {
        if !card.is_visible {
            return Self::hidden(lift_px);
        }

        let entered = if is_first { 1.0 } else { card.progress };
        let exited = if is_last { 0.0 } else { card.next_progress };

        Self {
            translate_y: lerp(lift_px, 0.0, entered),
            scale: lerp(1.0, CARD_EXIT_SCALE, exited),
            opacity: clamp01(entered * 2.0) * (1.0 - exited),
        }
    }

    pub fn style(&self) -> String {
        format!(
            "transform: translateY({:.2}px) scale({:.4}); opacity: {:.3};",
            self.translate_y, self.scale, self.opacity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desktop_at(scroll_y: f64) -> Measurement {
        Measurement {
            scroll_y,
            container_top: 0.0,
            container_height: 3_000.0,
            viewport_width: 1_280.0,
            viewport_height: 1_000.0,
        }
    }

    fn close(actual: f64, expected: f64) -> bool {
        (actual - expected).abs() < 1e-9
    }

    #[test]
    fn desktop_band_is_four_tenths_of_viewport() {
        let calculator = ProgressCalculator::new(3, BandPolicy::default());

        assert!(close(calculator.band_height(&desktop_at(0.0)), 400.0));
        assert!(close(calculator.compute(Some(&desktop_at(0.0)), 0, false).progress, 0.0));
        assert!(close(calculator.compute(Some(&desktop_at(200.0)), 0, false).progress, 0.5));
        assert!(close(calculator.compute(Some(&desktop_at(400.0)), 0, false).progress, 1.0));
    }

    #[test]
    fn progress_hits_band_edges_for_every_index() {
        let calculator = ProgressCalculator::new(3, BandPolicy::default());

        for index in 0..3 {
            let start = index as f64 * 400.0;
            let at_start = calculator.compute(Some(&desktop_at(start)), index, false);
            let at_end = calculator.compute(Some(&desktop_at(start + 400.0)), index, false);

            assert!(close(at_start.progress, 0.0), "index {index} at start");
            assert!(close(at_end.progress, 1.0), "index {index} at end");
            assert!(close(at_end.next_progress, 0.0), "next band starts where this one ends");
        }
    }

    #[test]
    fn progress_stays_in_unit_range_and_never_decreases() {
        let calculator = ProgressCalculator::new(3, BandPolicy::default());
        let mut last = (0.0, 0.0);

        for step in -20..=80 {
            let scroll_y = f64::from(step) * 37.5;
            let card = calculator.compute(Some(&desktop_at(scroll_y)), 1, false);

            assert!((0.0..=1.0).contains(&card.progress));
            assert!((0.0..=1.0).contains(&card.next_progress));
            assert!(card.progress >= last.0);
            assert!(card.next_progress >= last.1);
            last = (card.progress, card.next_progress);
        }
    }

    #[test]
    fn mobile_viewport_uses_shorter_band() {
        let calculator = ProgressCalculator::new(2, BandPolicy::default());
        let mobile = Measurement {
            viewport_width: 390.0,
            ..desktop_at(150.0)
        };

        assert!(close(calculator.band_height(&mobile), 300.0));
        assert!(close(calculator.compute(Some(&mobile), 0, false).progress, 0.5));
    }

    #[test]
    fn tablet_shares_the_desktop_factor() {
        let policy = BandPolicy::default();
        assert_eq!(policy.breakpoints.classify(900.0), DeviceClass::Tablet);
        assert!(close(policy.factor_for(DeviceClass::Tablet), DESKTOP_BAND_FACTOR));
    }

    #[test]
    fn missing_measurement_degrades_to_not_initialized() {
        let calculator = ProgressCalculator::new(3, BandPolicy::default());

        assert_eq!(calculator.compute(None, 0, true), CardProgress::NOT_INITIALIZED);
        assert_eq!(
            calculator.compute(Some(&desktop_at(100.0)), 7, false),
            CardProgress::NOT_INITIALIZED
        );
        assert!(calculator
            .compute_all(None, &[])
            .iter()
            .all(|card| *card == CardProgress::NOT_INITIALIZED));
    }

    #[test]
    fn zero_height_viewport_does_not_divide_by_zero() {
        let calculator = ProgressCalculator::new(1, BandPolicy::default());
        let collapsed = Measurement {
            viewport_height: 0.0,
            ..desktop_at(10.0)
        };

        let card = calculator.compute(Some(&collapsed), 0, false);
        assert!(card.progress.is_finite());
        assert!(close(card.progress, 1.0));
    }

    #[test]
    fn card_enters_half_a_band_early() {
        let calculator = ProgressCalculator::new(3, BandPolicy::default());

        assert!(!calculator.compute(Some(&desktop_at(199.0)), 1, false).is_visible);
        assert!(calculator.compute(Some(&desktop_at(200.0)), 1, false).is_visible);
    }

    #[test]
    fn visibility_window_is_bounded_with_hysteresis() {
        let calculator = ProgressCalculator::new(3, BandPolicy::default());
        // band 0 is [0, 400); it leaves view at 800, or 840 once visible
        assert!(!calculator.compute(Some(&desktop_at(820.0)), 0, false).is_visible);
        assert!(calculator.compute(Some(&desktop_at(820.0)), 0, true).is_visible);
        assert!(!calculator.compute(Some(&desktop_at(840.0)), 0, true).is_visible);
    }

    #[test]
    fn stack_never_shows_an_empty_frame_while_on_screen() {
        let calculator = ProgressCalculator::new(3, BandPolicy::default());
        let at = |scroll_y: f64| Measurement {
            scroll_y,
            container_top: 1_000.0,
            container_height: 2_200.0,
            ..desktop_at(scroll_y)
        };
        assert!(close(calculator.scroll_length(&at(0.0)), 2_200.0));

        let mut previous = Vec::new();
        let mut checked = 0;
        for step in 0..=70 {
            let measurement = at(f64::from(step) * 50.0);
            let cards = calculator.compute_all(Some(&measurement), &previous);

            if measurement.container_in_view() {
                let shown = cards.iter().enumerate().any(|(index, card)| {
                    CardVisual::from_progress(card, index == 0, index == 2, 64.0).opacity > 0.0
                });
                assert!(shown, "blank stack at scroll {}", measurement.scroll_y);
                checked += 1;
            }
            previous = cards;
        }
        assert!(checked > 60);
    }

    #[test]
    fn every_band_plays_out_while_the_frame_is_pinned() {
        for viewport_width in [1_280.0, 390.0] {
            let calculator = ProgressCalculator::new(3, BandPolicy::default());
            let measurement = Measurement {
                container_top: 1_000.0,
                viewport_width,
                ..desktop_at(0.0)
            };
            // a sticky 100vh frame stays pinned until the section bottom meets the viewport bottom
            let pinned_until = measurement.container_top + calculator.scroll_length(&measurement)
                - measurement.viewport_height;

            for index in 0..3 {
                let band = calculator.band(&measurement, index);
                assert!(band.start >= measurement.container_top);
                assert!(band.end() <= pinned_until + 1e-9, "band {index} outlives the frame");
            }
        }
    }

    #[test]
    fn end_cards_hide_once_the_section_is_off_screen() {
        let calculator = ProgressCalculator::new(3, BandPolicy::default());
        let at = |scroll_y: f64| Measurement {
            scroll_y,
            container_top: 1_000.0,
            container_height: 2_200.0,
            ..desktop_at(scroll_y)
        };

        assert!(!calculator.compute(Some(&at(-10.0)), 0, false).is_visible);
        assert!(calculator.compute(Some(&at(0.0)), 0, false).is_visible);
        assert!(calculator.compute(Some(&at(3_150.0)), 2, false).is_visible);
        assert!(!calculator.compute(Some(&at(3_200.0)), 2, false).is_visible);
    }

    #[test]
    fn compute_all_carries_previous_visibility() {
        let calculator = ProgressCalculator::new(2, BandPolicy::default());
        let previous = vec![
            CardProgress {
                is_visible: true,
                ..CardProgress::NOT_INITIALIZED
            },
            CardProgress::NOT_INITIALIZED,
        ];

        let cards = calculator.compute_all(Some(&desktop_at(820.0)), &previous);
        assert_eq!(cards.len(), 2);
        assert!(cards[0].is_visible);
        assert!(cards[1].is_visible);
    }

    #[test]
    fn segment_index_splits_unit_range() {
        assert_eq!(segment_index(0.0, 3), 0);
        assert_eq!(segment_index(0.34, 3), 1);
        assert_eq!(segment_index(0.99, 3), 2);
        assert_eq!(segment_index(1.0, 3), 3);
        assert_eq!(segment_index(0.5, 0), 0);
        assert_eq!(segment_index(f64::NAN, 4), 0);
    }

    #[test]
    fn pinned_progress_spans_container_minus_viewport() {
        let measurement = Measurement {
            container_top: 500.0,
            container_height: 3_000.0,
            ..desktop_at(1_500.0)
        };

        assert!(close(measurement.pinned_progress(), 0.5));
        assert!(measurement.container_in_view());
        assert!(!Measurement {
            scroll_y: 3_600.0,
            ..measurement
        }
        .container_in_view());
    }

    #[test]
    fn middle_card_fades_while_next_card_enters() {
        let card = CardProgress {
            progress: 1.0,
            next_progress: 0.5,
            is_visible: true,
        };

        let middle = CardVisual::from_progress(&card, false, false, 80.0);
        assert!(close(middle.translate_y, 0.0));
        assert!(close(middle.opacity, 0.5));
        assert!(close(middle.scale, 0.96));

        let last = CardVisual::from_progress(&card, false, true, 80.0);
        assert!(close(last.opacity, 1.0));
        assert!(close(last.scale, 1.0));
    }

    #[test]
    fn hidden_card_has_zero_opacity() {
        let visual = CardVisual::from_progress(&CardProgress::NOT_INITIALIZED, true, false, 60.0);

        assert_eq!(visual, CardVisual::hidden(60.0));
        assert_eq!(
            visual.style(),
            "transform: translateY(60.00px) scale(1.0000); opacity: 0.000;"
        );
    }
}

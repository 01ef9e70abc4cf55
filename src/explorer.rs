use serde::{Deserialize, Serialize};

use crate::catalog::{Hotspot, IndustryData, XRayComponent};
use crate::progress::{clamp01, segment_index, Breakpoints, DeviceClass, Measurement};
use crate::svg::{map_hotspots, HotspotMap, LoadError, SvgDiagram};

const MIN_SUB_RANGE: f64 = 1e-6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevealStyle {
    #[default]
    Fade,
    Wipe,
}

/// Sub-ranges of the explorer's scroll progress. The wipe finishes earlier
/// than the fade; both finish before hotspots start cycling.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RevealSchedule {
    pub reveal_start: f64,
    pub fade_end: f64,
    pub wipe_end: f64,
    pub cycle_start: f64,
    pub settle_at: f64,
}

impl Default for RevealSchedule {
    fn default() -> Self {
        Self {
            reveal_start: 0.05,
            fade_end: 0.35,
            wipe_end: 0.25,
            cycle_start: 0.35,
            settle_at: 0.95,
        }
    }
}

impl RevealSchedule {
    /// Ranges are ordered and the reveal finishes before cycling starts.
    pub fn is_consistent(&self) -> bool {
        let in_unit = [
            self.reveal_start,
            self.fade_end,
            self.wipe_end,
            self.cycle_start,
            self.settle_at,
        ]
        .iter()
        .all(|value| (0.0..=1.0).contains(value));

        in_unit
            && self.reveal_start < self.fade_end
            && self.reveal_start < self.wipe_end
            && self.fade_end <= self.cycle_start
            && self.wipe_end <= self.cycle_start
            && self.cycle_start < self.settle_at
    }

    fn cycle_progress(&self, progress: f64) -> f64 {
        sub_progress(progress, self.cycle_start, self.settle_at)
    }
}

fn sub_progress(progress: f64, start: f64, end: f64) -> f64 {
    clamp01((progress - start) / (end - start).max(MIN_SUB_RANGE))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScrollPhase {
    PreReveal,
    Revealing,
    ActiveCycling,
    Settled,
}

impl ScrollPhase {
    pub fn at(progress: f64, schedule: &RevealSchedule) -> Self {
        let progress = clamp01(progress);

        if progress < schedule.reveal_start {
            Self::PreReveal
        } else if progress < schedule.cycle_start {
            Self::Revealing
        } else if progress < schedule.settle_at {
            Self::ActiveCycling
        } else {
            Self::Settled
        }
    }
}

/// Scroll-driven hotspot for a sweep through `count` hotspots.
///
/// The range is split into `count + 1` segments: the first shows nothing,
/// each following one shows the next hotspot, and the end of the range
/// holds on the last hotspot instead of running past it.
pub fn active_index(progress: f64, count: usize) -> Option<usize> {
    if count == 0 {
        return None;
    }

    match segment_index(progress, count + 1) {
        0 => None,
        segment => Some((segment - 1).min(count - 1)),
    }
}

/// How the x-ray layer sits over the normal image. Both layers are stacked
/// in the same box, so neither style moves layout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RevealVisual {
    pub post_opacity: f64,
    /// Percent of the x-ray layer clipped away from the top.
    pub wipe_inset_top: f64,
}

impl RevealVisual {
    pub fn compute(style: RevealStyle, progress: f64, schedule: &RevealSchedule) -> Self {
        match style {
            RevealStyle::Fade => Self {
                post_opacity: sub_progress(progress, schedule.reveal_start, schedule.fade_end),
                wipe_inset_top: 0.0,
            },
            RevealStyle::Wipe => Self {
                post_opacity: 1.0,
                wipe_inset_top: 100.0
                    * (1.0 - sub_progress(progress, schedule.reveal_start, schedule.wipe_end)),
            },
        }
    }

    pub fn post_layer_style(&self) -> String {
        format!(
            "opacity: {:.3}; clip-path: inset({:.2}% 0 0 0);",
            self.post_opacity, self.wipe_inset_top
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TooltipLayout {
    FixedDesktop,
    InlineDesktop,
    MobileFixed,
}

impl TooltipLayout {
    pub fn choose(viewport_width: f64, breakpoints: &Breakpoints, pinned: bool) -> Self {
        match breakpoints.classify(viewport_width) {
            DeviceClass::Mobile => Self::MobileFixed,
            DeviceClass::Desktop | DeviceClass::Tablet if pinned => Self::FixedDesktop,
            DeviceClass::Desktop | DeviceClass::Tablet => Self::InlineDesktop,
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Self::FixedDesktop => "tooltip--fixed",
            Self::InlineDesktop => "tooltip--inline",
            Self::MobileFixed => "tooltip--mobile",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionEvent {
    PointerEnter { id: String, touch: bool },
    PointerLeave { id: String },
    Click { id: String },
    OutsideClick,
    Escape,
    ScrolledAway,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HotspotState {
    Idle,
    Hovered,
    Selected,
}

/// Hover and click state for one explorer. At most one hotspot is selected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Interaction {
    hovered: Option<String>,
    selected: Option<String>,
}

impl Interaction {
    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn state(&self, id: &str) -> HotspotState {
        if self.selected() == Some(id) {
            HotspotState::Selected
        } else if self.hovered() == Some(id) {
            HotspotState::Hovered
        } else {
            HotspotState::Idle
        }
    }

    /// Returns whether anything changed.
    pub fn apply(&mut self, event: InteractionEvent) -> bool {
        let before = self.clone();

        match event {
            // touch pointers emit enter on tap; selection handles those
            InteractionEvent::PointerEnter { id, touch } => {
                if !touch {
                    self.hovered = Some(id);
                }
            }
            InteractionEvent::PointerLeave { id } => {
                if self.hovered.as_deref() == Some(id.as_str()) {
                    self.hovered = None;
                }
            }
            InteractionEvent::Click { id } => {
                if self.selected.as_deref() == Some(id.as_str()) {
                    self.selected = None;
                    if self.hovered.as_deref() == Some(id.as_str()) {
                        self.hovered = None;
                    }
                } else {
                    self.selected = Some(id);
                }
            }
            InteractionEvent::OutsideClick
            | InteractionEvent::Escape
            | InteractionEvent::ScrolledAway => {
                self.selected = None;
                self.hovered = None;
            }
        }

        *self != before
    }

    /// Selected beats hovered beats scroll-active.
    pub fn displayed<'a>(&'a self, scroll_active: Option<&'a str>) -> Option<&'a str> {
        self.selected().or(self.hovered()).or(scroll_active)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExplorerConfig {
    pub reveal_style: RevealStyle,
    pub layout_override: Option<TooltipLayout>,
    pub schedule: RevealSchedule,
    pub breakpoints: Breakpoints,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DiagramState {
    Loading,
    Ready { diagram: SvgDiagram, map: HotspotMap },
    Failed(LoadError),
}

impl DiagramState {
    pub fn from_result(result: Result<SvgDiagram, LoadError>, hotspots: &[Hotspot]) -> Self {
        match result {
            Ok(diagram) => {
                let map = map_hotspots(&diagram, hotspots);
                Self::Ready { diagram, map }
            }
            Err(error) => Self::Failed(error),
        }
    }

    pub fn for_component(component: &XRayComponent) -> Self {
        match component.svg_overlay {
            Some(_) => Self::Loading,
            None => Self::from_result(Ok(SvgDiagram::from_hotspots(component)), &component.hotspots),
        }
    }

    /// Shape ids that get pointer handlers. Empty unless loaded.
    pub fn interactive_shape_ids(&self) -> Vec<&str> {
        match self {
            Self::Ready { diagram, map } => diagram
                .shapes
                .iter()
                .filter(|shape| map.is_bound(&shape.id))
                .map(|shape| shape.id.as_str())
                .collect(),
            Self::Loading | Self::Failed(_) => Vec::new(),
        }
    }

    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            Self::Failed(error) => Some(error.user_message()),
            Self::Loading | Self::Ready { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DisplayedHotspot {
    pub index: usize,
    pub id: String,
    /// Tooltip anchor in percent of the diagram box.
    pub anchor: (f64, f64),
    pub pinned: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExplorerView {
    pub component_index: usize,
    pub phase: ScrollPhase,
    pub active_index: Option<usize>,
    pub displayed: Option<DisplayedHotspot>,
    pub reveal: RevealVisual,
    pub layout: TooltipLayout,
}

/// Scroll and pointer state for one industry's exploded diagrams.
#[derive(Clone, Debug, PartialEq)]
pub struct Explorer {
    industry: IndustryData,
    config: ExplorerConfig,
    component_index: usize,
    interaction: Interaction,
    progress: f64,
}

impl Explorer {
    pub fn new(industry: IndustryData, config: ExplorerConfig) -> Self {
        Self {
            industry,
            config,
            component_index: 0,
            interaction: Interaction::default(),
            progress: 0.0,
        }
    }

    pub fn industry(&self) -> &IndustryData {
        &self.industry
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn component_index(&self) -> usize {
        self.component_index
    }

    pub fn component(&self) -> Option<&XRayComponent> {
        self.industry.components.get(self.component_index)
    }

    /// Section height in viewport heights: one per hotspot, plus one for the
    /// reveal and one for the settled dwell.
    pub fn section_height_vh(&self) -> usize {
        let hotspots = self.component().map_or(0, |component| component.hotspots.len());
        (hotspots + 2) * 100
    }

    /// Switching diagrams drops hover and selection; their ids belong to the
    /// previous diagram.
    pub fn select_component(&mut self, index: usize) -> bool {
        if index == self.component_index || index >= self.industry.components.len() {
            return false;
        }

        self.component_index = index;
        self.interaction = Interaction::default();
        true
    }

    pub fn handle(&mut self, event: InteractionEvent) -> bool {
        self.interaction.apply(event)
    }

    pub fn set_progress(&mut self, progress: f64) -> bool {
        let progress = clamp01(progress);
        let changed = (progress - self.progress).abs() > f64::EPSILON;
        self.progress = progress;
        changed
    }

    /// Applies a page measurement. A section scrolled out of view releases
    /// any hover or selection.
    pub fn sync_scroll(&mut self, measurement: Option<&Measurement>) -> bool {
        let Some(measurement) = measurement else {
            return false;
        };

        let mut changed = self.set_progress(measurement.pinned_progress());
        if !measurement.container_in_view() {
            changed |= self.handle(InteractionEvent::ScrolledAway);
        }
        changed
    }

    pub fn phase(&self) -> ScrollPhase {
        ScrollPhase::at(self.progress, &self.config.schedule)
    }

    pub fn active_index(&self) -> Option<usize> {
        let count = self.component()?.hotspots.len();

        match self.phase() {
            ScrollPhase::PreReveal | ScrollPhase::Revealing => None,
            ScrollPhase::ActiveCycling | ScrollPhase::Settled => active_index(
                self.config.schedule.cycle_progress(self.progress),
                count,
            ),
        }
    }

    pub fn displayed_hotspot(&self) -> Option<(usize, &Hotspot)> {
        let component = self.component()?;
        let scroll_active = self
            .active_index()
            .and_then(|index| component.hotspots.get(index))
            .map(|hotspot| hotspot.id.as_str());
        let id = self.interaction.displayed(scroll_active)?;
        let index = component.hotspot_index(id)?;

        Some((index, &component.hotspots[index]))
    }

    pub fn reveal(&self) -> RevealVisual {
        RevealVisual::compute(self.config.reveal_style, self.progress, &self.config.schedule)
    }

    pub fn view(&self, viewport_width: f64) -> ExplorerView {
        let pinned = self.interaction.selected().is_some();
        let displayed = self.component().and_then(|component| {
            let (index, hotspot) = self.displayed_hotspot()?;
            Some(DisplayedHotspot {
                index,
                id: hotspot.id.clone(),
                anchor: component.normalize(hotspot.centroid()),
                pinned: self.interaction.selected() == Some(hotspot.id.as_str()),
            })
        });

        ExplorerView {
            component_index: self.component_index,
            phase: self.phase(),
            active_index: self.active_index(),
            displayed,
            reveal: self.reveal(),
            layout: self.config.layout_override.unwrap_or_else(|| {
                TooltipLayout::choose(viewport_width, &self.config.breakpoints, pinned)
            }),
        }
    }
}

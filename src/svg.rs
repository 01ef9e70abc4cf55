use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::catalog::{Hotspot, XRayComponent};

const GENERATED_ID_PREFIX: &str = "shape";

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("diagram request returned status {0}")]
    Status(u16),
    #[error("diagram request failed: {0}")]
    Network(String),
    #[error("response does not contain an <svg> element")]
    MissingSvgRoot,
    #[error("diagram request was cancelled")]
    Aborted,
}

impl LoadError {
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::Status(_) | Self::Network(_))
    }

    pub fn is_parse_failure(&self) -> bool {
        matches!(self, Self::MissingSvgRoot)
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Status(_) | Self::Network(_) => "The diagram could not be loaded.",
            Self::MissingSvgRoot => "The diagram file is not a valid SVG.",
            Self::Aborted => "Diagram loading was cancelled.",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ShapeKind {
    Path { d: String },
    Polygon { points: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SvgShape {
    pub id: String,
    pub kind: ShapeKind,
    /// Set when the source element had no id and one was assigned.
    pub generated_id: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SvgDiagram {
    pub view_box: String,
    pub shapes: Vec<SvgShape>,
}

impl SvgDiagram {
    /// Overlay drawn straight from hotspot geometry, for components that
    /// ship no SVG file.
    pub fn from_hotspots(component: &XRayComponent) -> Self {
        let shapes = component
            .hotspots
            .iter()
            .map(|hotspot| SvgShape {
                id: hotspot.id.clone(),
                kind: ShapeKind::Polygon {
                    points: hotspot
                        .points
                        .iter()
                        .map(|point| format!("{},{}", point.x, point.y))
                        .collect::<Vec<_>>()
                        .join(" "),
                },
                generated_id: false,
            })
            .collect();

        Self {
            view_box: format!("0 0 {} {}", component.width, component.height),
            shapes,
        }
    }

    pub fn shape(&self, id: &str) -> Option<&SvgShape> {
        self.shapes.iter().find(|shape| shape.id == id)
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn svg_attr<'a>(element: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    let value = element.value();
    value
        .attr(name)
        .or_else(|| value.attr(&name.to_ascii_lowercase()))
        .map(str::trim)
        .filter(|attr| !attr.is_empty())
}

fn root_view_box(root: &ElementRef<'_>) -> String {
    if let Some(view_box) = svg_attr(root, "viewBox") {
        return view_box.split_whitespace().collect::<Vec<_>>().join(" ");
    }

    let dimension = |name: &str| {
        svg_attr(root, name)
            .map(|value| value.trim_end_matches("px"))
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| *value > 0.0)
    };

    match (dimension("width"), dimension("height")) {
        (Some(width), Some(height)) => format!("0 0 {width} {height}"),
        _ => "0 0 100 100".to_string(),
    }
}

fn shape_kind(element: &ElementRef<'_>) -> Option<ShapeKind> {
    match element.value().name() {
        "path" => svg_attr(element, "d").map(|d| ShapeKind::Path { d: d.to_string() }),
        "polygon" => svg_attr(element, "points").map(|points| ShapeKind::Polygon {
            points: points.to_string(),
        }),
        _ => None,
    }
}

/// Parses an SVG body and collects its path and polygon shapes in document
/// order. Shapes without an id get `shape-{n}`, unique within the diagram.
pub fn parse_diagram(body: &str) -> Result<SvgDiagram, LoadError> {
    let document = Html::parse_document(body);
    let root_selector = selector("svg").ok_or(LoadError::MissingSvgRoot)?;
    let root = document
        .select(&root_selector)
        .next()
        .ok_or(LoadError::MissingSvgRoot)?;
    let shape_selector = selector("path, polygon").ok_or(LoadError::MissingSvgRoot)?;

    let authored: HashSet<&str> = root
        .select(&shape_selector)
        .filter_map(|element| element.value().id())
        .collect();

    let mut shapes = Vec::new();
    let mut next_generated = 0usize;

    for element in root.select(&shape_selector) {
        let Some(kind) = shape_kind(&element) else {
            continue;
        };

        let (id, generated_id) = match element.value().id().map(str::trim) {
            Some(id) if !id.is_empty() => (id.to_string(), false),
            _ => {
                let mut candidate = format!("{GENERATED_ID_PREFIX}-{next_generated}");
                while authored.contains(candidate.as_str()) {
                    next_generated += 1;
                    candidate = format!("{GENERATED_ID_PREFIX}-{next_generated}");
                }
                next_generated += 1;
                (candidate, true)
            }
        };

        shapes.push(SvgShape {
            id,
            kind,
            generated_id,
        });
    }

    Ok(SvgDiagram {
        view_box: root_view_box(&root),
        shapes,
    })
}

/// Which overlay shapes answer to which hotspot. Only bound shapes get
/// pointer handlers; everything else is drawn inert.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HotspotMap {
    bound: HashMap<String, usize>,
    /// Authored shape ids with no hotspot behind them.
    pub unmapped: Vec<String>,
    /// Hotspot ids with no shape in the diagram.
    pub missing: Vec<String>,
}

impl HotspotMap {
    pub fn hotspot_index(&self, shape_id: &str) -> Option<usize> {
        self.bound.get(shape_id).copied()
    }

    pub fn is_bound(&self, shape_id: &str) -> bool {
        self.bound.contains_key(shape_id)
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}

/// Binds shapes to hotspots by id. Ids are the only mapping; a shape is
/// never given a hotspot it was not authored for.
pub fn map_hotspots(diagram: &SvgDiagram, hotspots: &[Hotspot]) -> HotspotMap {
    let by_id: HashMap<&str, usize> = hotspots
        .iter()
        .enumerate()
        .map(|(index, hotspot)| (hotspot.id.as_str(), index))
        .collect();

    let mut map = HotspotMap::default();

    for shape in &diagram.shapes {
        match by_id.get(shape.id.as_str()) {
            Some(index) => {
                map.bound.insert(shape.id.clone(), *index);
            }
            None if !shape.generated_id => {
                log::warn!("svg shape `{}` has no hotspot mapping; leaving it inert", shape.id);
                map.unmapped.push(shape.id.clone());
            }
            None => {}
        }
    }

    for hotspot in hotspots {
        if !map.bound.contains_key(&hotspot.id) {
            log::warn!("hotspot `{}` has no shape in the diagram", hotspot.id);
            map.missing.push(hotspot.id.clone());
        }
    }

    map
}

#[cfg(target_arch = "wasm32")]
pub async fn fetch_diagram(
    url: &str,
    signal: Option<&web_sys::AbortSignal>,
) -> Result<SvgDiagram, LoadError> {
    let aborted = || signal.is_some_and(web_sys::AbortSignal::aborted);

    let response = gloo_net::http::Request::get(url)
        .abort_signal(signal)
        .send()
        .await
        .map_err(|error| {
            if aborted() {
                LoadError::Aborted
            } else {
                LoadError::Network(error.to_string())
            }
        })?;

    if !response.ok() {
        return Err(LoadError::Status(response.status()));
    }

    let body = response.text().await.map_err(|error| {
        if aborted() {
            LoadError::Aborted
        } else {
            LoadError::Network(error.to_string())
        }
    })?;

    parse_diagram(&body)
}

use gloo_events::EventListener;
use gloo_render::{request_animation_frame, AnimationFrame};
use gloo_timers::callback::Timeout;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{window, AbortController, Element, KeyboardEvent, MouseEvent, Node, PointerEvent};
use yew::prelude::*;

use crate::catalog::{
    industry_url, CardData, Hotspot, HotspotTarget, IndustryData, ProductSource, StaticCatalog,
};
use crate::config::EngineConfig;
use crate::explorer::{
    DiagramState, Explorer, ExplorerConfig, HotspotState, InteractionEvent, TooltipLayout,
};
use crate::progress::{
    BandPolicy, CardProgress, CardVisual, Measurement, ProgressCalculator, REMEASURE_SCHEDULE_MS,
};
use crate::svg::{fetch_diagram, LoadError, ShapeKind, SvgDiagram, SvgShape};
use crate::viewport::{measure, FrameGate, WindowViewport};

const MOUNT_ID: &str = "app";
const CONFIG_ATTRIBUTE: &str = "data-engine-config";
const CARD_LIFT_PX: f64 = 64.0;
const FALLBACK_VIEWPORT_WIDTH: f64 = 1280.0;

fn read_engine_config() -> EngineConfig {
    let raw = window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(MOUNT_ID))
        .and_then(|mount| mount.get_attribute(CONFIG_ATTRIBUTE));

    EngineConfig::load_or_default(raw.as_deref())
}

/// Page geometry for the element behind `container`, recomputed at most once
/// per animation frame while scrolling. The re-measure schedule runs after
/// mount, after every resize and whenever `layout_key` changes.
#[hook]
fn use_scroll_measurement(container: NodeRef, layout_key: usize) -> Option<Measurement> {
    let measurement = use_state_eq(|| None::<Measurement>);

    {
        let measurement = measurement.clone();
        use_effect_with((container, layout_key), move |(container, _)| {
            let container = container.clone();
            let remeasure: Rc<dyn Fn()> = Rc::new(move || {
                let Some(win) = window() else {
                    return;
                };
                let source = WindowViewport::new(win, container.cast::<Element>());
                measurement.set(measure(&source));
            });

            let gate = Rc::new(FrameGate::new());
            let frame: Rc<RefCell<Option<AnimationFrame>>> = Rc::default();
            let on_scroll = {
                let remeasure = remeasure.clone();
                let frame = frame.clone();
                move || {
                    if !gate.request() {
                        return;
                    }
                    let gate = gate.clone();
                    let remeasure = remeasure.clone();
                    let handle = request_animation_frame(move |_| {
                        gate.frame_fired();
                        remeasure();
                    });
                    *frame.borrow_mut() = Some(handle);
                }
            };

            let timeouts: Rc<RefCell<Vec<Timeout>>> = Rc::default();
            let settle: Rc<dyn Fn()> = {
                let timeouts = timeouts.clone();
                Rc::new(move || {
                    let mut pending = timeouts.borrow_mut();
                    pending.clear();
                    for delay in REMEASURE_SCHEDULE_MS {
                        let remeasure = remeasure.clone();
                        pending.push(Timeout::new(delay, move || remeasure()));
                    }
                })
            };

            let listeners = match window() {
                Some(win) => {
                    let on_resize = settle.clone();
                    vec![
                        EventListener::new(&win, "scroll", move |_| on_scroll()),
                        EventListener::new(&win, "resize", move |_| on_resize()),
                    ]
                }
                None => Vec::new(),
            };
            settle();

            move || {
                drop(listeners);
                frame.borrow_mut().take();
                timeouts.borrow_mut().clear();
            }
        });
    }

    *measurement
}

#[derive(Properties, PartialEq)]
pub struct StackingCardsProps {
    pub cards: Vec<CardData>,
    pub policy: BandPolicy,
}

#[function_component(StackingCards)]
pub fn stacking_cards(props: &StackingCardsProps) -> Html {
    let container = use_node_ref();
    let measurement = use_scroll_measurement(container.clone(), props.cards.len());
    let previous = use_mut_ref(Vec::<CardProgress>::new);

    let calculator = ProgressCalculator::new(props.cards.len(), props.policy);
    let progress = calculator.compute_all(measurement.as_ref(), &previous.borrow());
    *previous.borrow_mut() = progress.clone();

    let section_style = measurement
        .map(|measurement| format!("height: {:.0}px;", calculator.scroll_length(&measurement)))
        .unwrap_or_default();
    let last = props.cards.len().saturating_sub(1);

    html! {
        <section ref={container} class="card-stack" style={section_style} aria-label="Capabilities">
            <div class="card-stack-frame">
                { for props.cards.iter().zip(progress.iter()).enumerate().map(|(index, (card, card_progress))| {
                    let visual = CardVisual::from_progress(card_progress, index == 0, index == last, CARD_LIFT_PX);
                    let style = format!("z-index: {}; {}", index + 1, visual.style());

                    html! {
                        <article
                            key={card.id.clone()}
                            class={classes!("stack-card", format!("theme-{}", card.theme))}
                            style={style}
                            aria-hidden={(!card_progress.is_visible).to_string()}
                        >
                            <img class="stack-card-media" src={card.image.clone()} alt="" loading="lazy" />
                            <div class="stack-card-copy">
                                <h3>{ card.title.clone() }</h3>
                                <p>{ card.description.clone() }</p>
                                <ul class="stack-card-features">
                                    { for card.features.iter().map(|feature| html! { <li>{ feature.clone() }</li> }) }
                                </ul>
                            </div>
                        </article>
                    }
                }) }
            </div>
        </section>
    }
}

#[derive(Clone, PartialEq)]
struct ExplorerState {
    explorer: Explorer,
    diagram: DiagramState,
}

impl ExplorerState {
    fn new(industry: IndustryData, config: ExplorerConfig) -> Self {
        let explorer = Explorer::new(industry, config);
        let diagram = explorer
            .component()
            .map(DiagramState::for_component)
            .unwrap_or(DiagramState::Loading);

        Self { explorer, diagram }
    }
}

enum ExplorerAction {
    Interact(InteractionEvent),
    Scroll(Option<Measurement>),
    SelectComponent(usize),
    DiagramLoaded {
        component: usize,
        result: Result<SvgDiagram, LoadError>,
    },
}

impl Reducible for ExplorerState {
    type Action = ExplorerAction;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        let mut next = (*self).clone();

        let changed = match action {
            ExplorerAction::Interact(event) => next.explorer.handle(event),
            ExplorerAction::Scroll(measurement) => next.explorer.sync_scroll(measurement.as_ref()),
            ExplorerAction::SelectComponent(index) => {
                let switched = next.explorer.select_component(index);
                if switched {
                    if let Some(component) = next.explorer.component() {
                        next.diagram = DiagramState::for_component(component);
                    }
                }
                switched
            }
            ExplorerAction::DiagramLoaded { component, result } => {
                // a late response for a diagram that is no longer shown
                if component != next.explorer.component_index() {
                    return self;
                }
                let hotspots = next
                    .explorer
                    .component()
                    .map(|component| component.hotspots.clone())
                    .unwrap_or_default();
                next.diagram = DiagramState::from_result(result, &hotspots);
                true
            }
        };

        if changed {
            Rc::new(next)
        } else {
            self
        }
    }
}

#[derive(Properties, PartialEq)]
pub struct HotspotExplorerProps {
    pub industry: IndustryData,
    pub config: ExplorerConfig,
}

#[function_component(HotspotExplorer)]
pub fn hotspot_explorer(props: &HotspotExplorerProps) -> Html {
    let state = {
        let industry = props.industry.clone();
        let config = props.config;
        use_reducer(move || ExplorerState::new(industry, config))
    };
    let section = use_node_ref();
    let measurement =
        use_scroll_measurement(section.clone(), state.explorer.section_height_vh());

    {
        let dispatcher = state.dispatcher();
        use_effect_with(measurement, move |measurement| {
            dispatcher.dispatch(ExplorerAction::Scroll(*measurement));
            || ()
        });
    }

    {
        let dispatcher = state.dispatcher();
        let overlay = state
            .explorer
            .component()
            .and_then(|component| component.svg_overlay.clone());
        use_effect_with(
            (state.explorer.component_index(), overlay),
            move |(component, overlay)| {
                let controller = AbortController::new().ok();

                if let Some(url) = overlay.clone() {
                    let component = *component;
                    let signal = controller.as_ref().map(AbortController::signal);
                    spawn_local(async move {
                        let result = fetch_diagram(&url, signal.as_ref()).await;
                        match &result {
                            Err(LoadError::Aborted) => return,
                            Err(error) => log::error!("diagram {url} failed to load: {error}"),
                            Ok(diagram) => log::debug!(
                                "diagram {url} loaded with {} shapes",
                                diagram.shapes.len()
                            ),
                        }
                        dispatcher.dispatch(ExplorerAction::DiagramLoaded { component, result });
                    });
                }

                move || {
                    if let Some(controller) = controller {
                        controller.abort();
                    }
                }
            },
        );
    }

    {
        let dispatcher = state.dispatcher();
        let section = section.clone();
        use_effect_with((), move |_| {
            let mut listeners = Vec::new();

            if let Some(win) = window() {
                let on_key = dispatcher.clone();
                listeners.push(EventListener::new(&win, "keydown", move |event| {
                    let is_escape = event
                        .dyn_ref::<KeyboardEvent>()
                        .is_some_and(|event| event.key() == "Escape");
                    if is_escape {
                        on_key.dispatch(ExplorerAction::Interact(InteractionEvent::Escape));
                    }
                }));

                if let Some(document) = win.document() {
                    listeners.push(EventListener::new(&document, "click", move |event| {
                        let Some(root) = section.cast::<Node>() else {
                            return;
                        };
                        let target = event.target().and_then(|target| target.dyn_into::<Node>().ok());
                        if !root.contains(target.as_ref()) {
                            dispatcher.dispatch(ExplorerAction::Interact(InteractionEvent::OutsideClick));
                        }
                    }));
                }
            }

            move || drop(listeners)
        });
    }

    let explorer = &state.explorer;
    let Some(component) = explorer.component() else {
        return html! {};
    };

    let viewport_width = measurement
        .map(|measurement| measurement.viewport_width)
        .unwrap_or(FALLBACK_VIEWPORT_WIDTH);
    let view = explorer.view(viewport_width);
    let active_id = view
        .active_index
        .and_then(|index| component.hotspots.get(index))
        .map(|hotspot| hotspot.id.clone());

    let interact = {
        let dispatcher = state.dispatcher();
        Callback::from(move |event: InteractionEvent| {
            dispatcher.dispatch(ExplorerAction::Interact(event))
        })
    };

    let on_select_component = {
        let dispatcher = state.dispatcher();
        Callback::from(move |index: usize| {
            dispatcher.dispatch(ExplorerAction::SelectComponent(index))
        })
    };

    let overlay = match &state.diagram {
        DiagramState::Ready { diagram, map } => html! {
            <svg
                class="xray-overlay"
                viewBox={diagram.view_box.clone()}
                preserveAspectRatio="none"
                role="group"
                aria-label={format!("{} hotspots", component.label)}
            >
                { for diagram.shapes.iter().map(|shape| {
                    if map.is_bound(&shape.id) {
                        let shape_state = explorer.interaction().state(&shape.id);
                        let is_active = active_id.as_deref() == Some(shape.id.as_str());
                        interactive_shape(shape, shape_state, is_active, &interact)
                    } else {
                        inert_shape(shape)
                    }
                }) }
            </svg>
        },
        DiagramState::Loading => html! {
            <div class="xray-overlay xray-overlay--loading" aria-hidden="true" />
        },
        DiagramState::Failed(_) => html! {},
    };

    let error = state.diagram.error_message().map(|message| {
        html! { <p class="xray-error" role="alert">{ message }</p> }
    });

    let tooltip = view.displayed.as_ref().and_then(|displayed| {
        let hotspot = component.hotspots.get(displayed.index)?;
        let on_close = {
            let interact = interact.clone();
            Callback::from(move |_: ()| interact.emit(InteractionEvent::Escape))
        };
        Some(html! {
            <HotspotTooltip
                hotspot={hotspot.clone()}
                layout={view.layout}
                anchor={displayed.anchor}
                pinned={displayed.pinned}
                on_close={on_close}
            />
        })
    });

    let section_style = format!("height: {}vh;", explorer.section_height_vh());
    let stage_style = format!("aspect-ratio: {} / {};", component.width, component.height);

    html! {
        <section ref={section} class="xray-explorer" style={section_style}>
            <div class="xray-sticky">
                <header class="xray-header">
                    <h2>{ explorer.industry().name.clone() }</h2>
                    <p class="muted">{ explorer.industry().tagline.clone() }</p>
                </header>
                <ComponentSelector
                    labels={explorer.industry().components.iter().map(|component| AttrValue::from(component.label.clone())).collect::<Vec<_>>()}
                    active={view.component_index}
                    on_select={on_select_component}
                />
                <div class="xray-stage" style={stage_style}>
                    <img class="xray-layer" src={component.pre_src.clone()} alt={component.label.clone()} />
                    <img
                        class="xray-layer xray-layer--post"
                        src={component.post_src.clone()}
                        alt=""
                        aria-hidden="true"
                        style={view.reveal.post_layer_style()}
                    />
                    { overlay }
                    { for tooltip }
                </div>
                { for error }
            </div>
        </section>
    }
}

fn shape_classes(state: HotspotState, is_active: bool) -> Classes {
    classes!(
        "hotspot",
        (state == HotspotState::Hovered).then_some("hotspot--hovered"),
        (state == HotspotState::Selected).then_some("hotspot--selected"),
        is_active.then_some("hotspot--active"),
    )
}

fn interactive_shape(
    shape: &SvgShape,
    state: HotspotState,
    is_active: bool,
    interact: &Callback<InteractionEvent>,
) -> Html {
    let onpointerenter = {
        let interact = interact.clone();
        let id = shape.id.clone();
        Callback::from(move |event: PointerEvent| {
            interact.emit(InteractionEvent::PointerEnter {
                id: id.clone(),
                touch: event.pointer_type() == "touch",
            })
        })
    };
    let onpointerleave = {
        let interact = interact.clone();
        let id = shape.id.clone();
        Callback::from(move |_: PointerEvent| {
            interact.emit(InteractionEvent::PointerLeave { id: id.clone() })
        })
    };
    let onclick = {
        let interact = interact.clone();
        let id = shape.id.clone();
        Callback::from(move |_: MouseEvent| interact.emit(InteractionEvent::Click { id: id.clone() }))
    };
    let onkeydown = {
        let interact = interact.clone();
        let id = shape.id.clone();
        Callback::from(move |event: KeyboardEvent| {
            if event.key() == "Enter" || event.key() == " " {
                event.prevent_default();
                interact.emit(InteractionEvent::Click { id: id.clone() });
            }
        })
    };
    let class = shape_classes(state, is_active);
    let pressed = (state == HotspotState::Selected).to_string();

    match &shape.kind {
        ShapeKind::Path { d } => html! {
            <path
                key={shape.id.clone()}
                id={shape.id.clone()}
                d={d.clone()}
                class={class}
                tabindex="0"
                role="button"
                aria-pressed={pressed}
                {onpointerenter}
                {onpointerleave}
                {onclick}
                {onkeydown}
            />
        },
        ShapeKind::Polygon { points } => html! {
            <polygon
                key={shape.id.clone()}
                id={shape.id.clone()}
                points={points.clone()}
                class={class}
                tabindex="0"
                role="button"
                aria-pressed={pressed}
                {onpointerenter}
                {onpointerleave}
                {onclick}
                {onkeydown}
            />
        },
    }
}

fn inert_shape(shape: &SvgShape) -> Html {
    match &shape.kind {
        ShapeKind::Path { d } => html! {
            <path key={shape.id.clone()} d={d.clone()} class="hotspot-inert" />
        },
        ShapeKind::Polygon { points } => html! {
            <polygon key={shape.id.clone()} points={points.clone()} class="hotspot-inert" />
        },
    }
}

#[derive(Properties, PartialEq)]
struct ComponentSelectorProps {
    labels: Vec<AttrValue>,
    active: usize,
    on_select: Callback<usize>,
}

#[function_component(ComponentSelector)]
fn component_selector(props: &ComponentSelectorProps) -> Html {
    if props.labels.len() < 2 {
        return html! {};
    }

    html! {
        <div class="xray-selector" role="tablist">
            { for props.labels.iter().enumerate().map(|(index, label)| {
                let on_select = props.on_select.clone();
                let selected = index == props.active;
                html! {
                    <button
                        type="button"
                        role="tab"
                        class={classes!("xray-tab", selected.then_some("is-active"))}
                        aria-selected={selected.to_string()}
                        onclick={Callback::from(move |_| on_select.emit(index))}
                    >
                        { label.clone() }
                    </button>
                }
            }) }
        </div>
    }
}

#[derive(Properties, PartialEq)]
struct HotspotTooltipProps {
    hotspot: Hotspot,
    layout: TooltipLayout,
    anchor: (f64, f64),
    pinned: bool,
    on_close: Callback<()>,
}

#[function_component(HotspotTooltip)]
fn hotspot_tooltip(props: &HotspotTooltipProps) -> Html {
    let style = match props.layout {
        TooltipLayout::InlineDesktop => {
            format!("--tooltip-x: {:.2}%; --tooltip-y: {:.2}%;", props.anchor.0, props.anchor.1)
        }
        TooltipLayout::FixedDesktop | TooltipLayout::MobileFixed => String::new(),
    };

    let body = match &props.hotspot.target {
        HotspotTarget::Product(product) => html! {
            <>
                <img class="tooltip-media" src={product.thumbnail_url.clone()} alt="" loading="lazy" />
                <div class="tooltip-copy">
                    <p class="tooltip-title">{ product.name.clone() }</p>
                    <p class="tooltip-description">{ product.blurb.clone() }</p>
                    <a class="tooltip-cta" href={product.detail_url.clone()}>{ "View Details" }</a>
                </div>
            </>
        },
        HotspotTarget::Experience(experience) => html! {
            <>
                <span class={classes!("tooltip-icon", format!("icon-{}", experience.icon))} aria-hidden="true" />
                <div class="tooltip-copy">
                    <p class="tooltip-title">{ experience.title.clone() }</p>
                    <p class="tooltip-description">{ experience.description.clone() }</p>
                </div>
            </>
        },
    };

    let on_close = {
        let on_close = props.on_close.clone();
        Callback::from(move |_: MouseEvent| on_close.emit(()))
    };

    html! {
        <aside
            class={classes!("tooltip", props.layout.css_class(), props.pinned.then_some("is-pinned"))}
            style={style}
            aria-live="polite"
        >
            { body }
            if props.pinned {
                <button type="button" class="tooltip-close" aria-label="Close" onclick={on_close}>
                    { "×" }
                </button>
            }
        </aside>
    }
}

#[derive(Clone, PartialEq)]
enum Page {
    Home,
    Industry(String),
}

fn current_page() -> Page {
    let path = window()
        .and_then(|w| w.location().pathname().ok())
        .unwrap_or_default();

    match path.trim_end_matches('/').strip_prefix("/industries/") {
        Some(slug) if !slug.is_empty() && !slug.contains('/') => Page::Industry(slug.to_string()),
        _ => Page::Home,
    }
}

#[function_component(App)]
fn app() -> Html {
    let catalog = use_memo((), |_| StaticCatalog::embedded());
    let config = use_memo((), |_| read_engine_config());
    let page = use_memo((), |_| current_page());

    let catalog = match &*catalog {
        Ok(catalog) => catalog,
        Err(error) => {
            log::error!("{error}");
            return html! {
                <main class="page-shell">
                    <p class="xray-error" role="alert">{ "Site content failed to load." }</p>
                </main>
            };
        }
    };

    let content = match &*page {
        Page::Home => html! {
            <>
                <section class="section-block" aria-labelledby="industries-heading">
                    <h2 id="industries-heading">{ "Industries" }</h2>
                    <ul class="row-list">
                        { for catalog.industries().iter().map(|industry| html! {
                            <li key={industry.slug.clone()}>
                                <a class="link" href={industry_url(&industry.slug)}>{ industry.name.clone() }</a>
                                <span class="muted">{ format!(": {}", industry.tagline) }</span>
                            </li>
                        }) }
                    </ul>
                </section>
                <StackingCards cards={catalog.service_cards().to_vec()} policy={config.band} />
            </>
        },
        Page::Industry(slug) => match catalog.industry(slug) {
            Some(industry) => html! {
                <>
                    <HotspotExplorer
                        key={industry.slug.clone()}
                        industry={industry.clone()}
                        config={config.explorer}
                    />
                    <section class="section-block" aria-labelledby="products-heading">
                        <h2 id="products-heading">{ format!("{} products", industry.name) }</h2>
                        <ul class="product-grid">
                            { for catalog.products_for_industry(&industry.slug).into_iter().map(|product| html! {
                                <li key={product.id.clone()} class="product-card">
                                    <img src={product.image_url.clone()} alt="" loading="lazy" />
                                    <a class="link" href={product.detail_url()}>{ product.short_name.clone() }</a>
                                    <span class="muted">{ product.chemistry.clone() }</span>
                                </li>
                            }) }
                        </ul>
                    </section>
                </>
            },
            None => html! {
                <section class="section-block">
                    <h2>{ "Industry not found" }</h2>
                    <a class="link" href="/">{ "Back to home" }</a>
                </section>
            },
        },
    };

    html! {
        <>
            <a class="skip-link" href="#content">{ "Skip to main content" }</a>
            <div class="page-shell">
                <header class="site-header">
                    <a class="brand" href="/">{ "X-Ray Showcase" }</a>
                </header>
                <main id="content">{ content }</main>
            </div>
        </>
    }
}

pub fn run() {
    wasm_logger::init(wasm_logger::Config::default());

    yew::Renderer::<App>::with_root(
        window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(MOUNT_ID))
            .expect("missing #app mount point"),
    )
    .render();
}

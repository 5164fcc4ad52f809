//! Browser glue: canvas lookup, the `requestAnimationFrame` loop, DOM input
//! listeners and the page navigation entry points exported to JavaScript.

use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use gloo_timers::future::TimeoutFuture;
use wasm_bindgen::{JsCast, prelude::*};
use wasm_bindgen_futures::future_to_promise;
use web_sys::{EventTarget, HtmlCanvasElement, HtmlElement, PointerEvent, WheelEvent};

use crate::{
    gpu::{self, BoundSurface, DeviceProvider, GpuContext},
    resources,
    shaders::ShaderRepository,
    sim::{
        BuildContext, FrameOutcome, Simulation, SimulationConfig, SimulationKind, build_program,
        clamp_particle_count,
    },
    util::FrameClock,
};

/// Delay between tearing one page down and building the next.
const NAVIGATION_SETTLE_MS: u32 = 100;
const STATUS_ELEMENT_ID: &str = "webgpu-support";

fn js_error(e: JsValue) -> anyhow::Error {
    anyhow::anyhow!("{e:?}")
}

fn window() -> anyhow::Result<web_sys::Window> {
    web_sys::window().ok_or_else(|| anyhow::anyhow!("no global `window`"))
}

/// Owns the self-rescheduling animation frame closure.
struct FrameLoop {
    handle: Rc<Cell<Option<i32>>>,
    callback: Rc<RefCell<Option<Closure<dyn FnMut()>>>>,
}

impl FrameLoop {
    fn start(mut tick: impl FnMut() -> FrameOutcome + 'static) -> anyhow::Result<Self> {
        let handle = Rc::new(Cell::new(None));
        let callback: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));

        let next = Rc::clone(&callback);
        let scheduled = Rc::clone(&handle);
        *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            scheduled.set(None);
            if tick() == FrameOutcome::Stop {
                return;
            }
            if let Some(cb) = next.borrow().as_ref() {
                match request_frame(cb) {
                    Ok(id) => scheduled.set(Some(id)),
                    Err(e) => log::error!("failed to schedule frame: {e}"),
                }
            }
        }) as Box<dyn FnMut()>));

        if let Some(cb) = callback.borrow().as_ref() {
            handle.set(Some(request_frame(cb)?));
        }
        Ok(Self { handle, callback })
    }

    /// Cancel the pending frame and drop the closure. No frame runs afterwards.
    fn cancel(&self) {
        if let Some(id) = self.handle.take()
            && let Some(window) = web_sys::window()
            && let Err(e) = window.cancel_animation_frame(id)
        {
            log::warn!("failed to cancel animation frame: {e:?}");
        }
        self.callback.borrow_mut().take();
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn request_frame(cb: &Closure<dyn FnMut()>) -> anyhow::Result<i32> {
    window()?
        .request_animation_frame(cb.as_ref().unchecked_ref())
        .map_err(js_error)
}

type EventClosure = Closure<dyn FnMut(web_sys::Event)>;

/// DOM listeners that unregister themselves when dropped.
#[derive(Default)]
struct Listeners {
    entries: Vec<(EventTarget, &'static str, EventClosure)>,
}

impl Listeners {
    fn add<E, F>(&mut self, target: &EventTarget, event: &'static str, mut handler: F) -> anyhow::Result<()>
    where
        E: JsCast + 'static,
        F: FnMut(E) + 'static,
    {
        let closure = Closure::wrap(Box::new(move |event: web_sys::Event| {
            if let Ok(event) = event.dyn_into::<E>() {
                handler(event);
            }
        }) as Box<dyn FnMut(web_sys::Event)>);
        target
            .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
            .map_err(js_error)?;
        self.entries.push((target.clone(), event, closure));
        Ok(())
    }
}

impl Drop for Listeners {
    fn drop(&mut self) {
        for (target, event, closure) in self.entries.drain(..) {
            let _ = target.remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
        }
    }
}

fn install_listeners(
    canvas: &HtmlCanvasElement,
    simulation: &Rc<RefCell<Simulation>>,
) -> anyhow::Result<Listeners> {
    let document: EventTarget = window()?
        .document()
        .ok_or_else(|| anyhow::anyhow!("no document"))?
        .into();
    let mut listeners = Listeners::default();

    let sim = Rc::clone(simulation);
    listeners.add(canvas, "pointerdown", move |_: PointerEvent| {
        if let Ok(mut sim) = sim.try_borrow_mut() {
            sim.pointer_down();
        }
    })?;

    let sim = Rc::clone(simulation);
    let target = canvas.clone();
    listeners.add(&document, "pointermove", move |e: PointerEvent| {
        let rect = target.get_bounding_client_rect();
        let x = e.client_x() as f64 - rect.left();
        let y = e.client_y() as f64 - rect.top();
        if let Ok(mut sim) = sim.try_borrow_mut() {
            sim.pointer_move(x as f32, y as f32);
        }
    })?;

    let sim = Rc::clone(simulation);
    listeners.add(&document, "wheel", move |e: WheelEvent| {
        if let Ok(mut sim) = sim.try_borrow_mut() {
            sim.wheel(e.delta_x() as f32, e.delta_y() as f32, e.delta_z() as f32);
        }
    })?;

    Ok(listeners)
}

fn find_canvas(id: &str) -> Option<HtmlCanvasElement> {
    web_sys::window()?
        .document()?
        .get_element_by_id(id)?
        .dyn_into()
        .ok()
}

/// Size the canvas backing store to the viewport and return that size.
fn fit_canvas_to_viewport(canvas: &HtmlCanvasElement) -> anyhow::Result<(u32, u32)> {
    let window = window()?;
    let dimension = |value: Result<JsValue, JsValue>| {
        value
            .map_err(js_error)
            .map(|v| v.as_f64().unwrap_or(0.0).max(0.0) as u32)
    };
    let width = dimension(window.inner_width())?;
    let height = dimension(window.inner_height())?;
    canvas.set_width(width);
    canvas.set_height(height);
    Ok((width, height))
}

fn show_status(message: &str) {
    let Some(element) = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(STATUS_ELEMENT_ID))
    else {
        return;
    };
    element.set_text_content(Some(message));
    if let Ok(element) = element.dyn_into::<HtmlElement>() {
        let _ = element.style().set_property("display", "block");
    }
}

struct ActiveSimulation {
    simulation: Rc<RefCell<Simulation>>,
    frame_loop: FrameLoop,
    listeners: Listeners,
}

impl ActiveSimulation {
    fn destroy(self) {
        let ActiveSimulation {
            simulation,
            frame_loop,
            listeners,
        } = self;
        frame_loop.cancel();
        drop(listeners);
        simulation.borrow_mut().destroy();
    }
}

struct Shared {
    provider: DeviceProvider,
    shaders: ShaderRepository,
    config: RefCell<SimulationConfig>,
    active: RefCell<Option<ActiveSimulation>>,
    last_kind: Cell<Option<SimulationKind>>,
    generation: Cell<u64>,
}

impl Shared {
    fn stop_active(&self) {
        let active = self.active.borrow_mut().take();
        if let Some(active) = active {
            active.destroy();
            resources::log_memory_report();
        }
    }
}

async fn switch_to(shared: Rc<Shared>, kind: SimulationKind) {
    let generation = shared.generation.get() + 1;
    shared.generation.set(generation);
    shared.last_kind.set(Some(kind));

    shared.stop_active();
    TimeoutFuture::new(NAVIGATION_SETTLE_MS).await;
    if shared.generation.get() != generation {
        return;
    }

    if let Err(e) = start(&shared, kind, generation).await {
        log::error!("Failed to initialize {kind} simulation: {e:#}");
    }
}

async fn start(shared: &Rc<Shared>, kind: SimulationKind, generation: u64) -> anyhow::Result<()> {
    let Some(canvas) = find_canvas(kind.canvas_id()) else {
        log::debug!("no `{}` element, skipping {kind}", kind.canvas_id());
        return Ok(());
    };
    let (width, height) = fit_canvas_to_viewport(&canvas)?;
    let surface = shared
        .provider
        .instance()
        .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))?;

    let ctx = match shared.provider.acquire(Some(&surface)).await {
        Ok(ctx) => ctx,
        Err(e) => {
            if shared.provider.take_first_failure() {
                show_status(&e.to_string());
            }
            return Err(e.into());
        }
    };
    if shared.generation.get() != generation {
        log::debug!("{kind} initialisation superseded by a later navigation");
        return Ok(());
    }
    let Some(surface) = gpu::bind_surface(&ctx, surface, width, height) else {
        log::warn!("canvas for {kind} could not be configured");
        return Ok(());
    };

    let config = shared.config.borrow().clone();
    let mut simulation = Simulation::new(kind, width, height, &config);
    let build = BuildContext {
        device: &ctx.device,
        shaders: &shared.shaders,
        config: &config,
        format: surface.format(),
        width,
        height,
    };
    simulation.start(|tracker| build_program(kind, &build, tracker))?;

    let simulation = Rc::new(RefCell::new(simulation));
    let listeners = if kind.is_interactive() {
        install_listeners(&canvas, &simulation)?
    } else {
        Listeners::default()
    };
    let tick = frame_tick(
        Rc::downgrade(shared),
        generation,
        Rc::clone(&simulation),
        ctx,
        surface,
    );
    let frame_loop = FrameLoop::start(tick)?;

    log::info!("{kind} simulation running");
    *shared.active.borrow_mut() = Some(ActiveSimulation {
        simulation,
        frame_loop,
        listeners,
    });
    Ok(())
}

fn frame_tick(
    shared: Weak<Shared>,
    generation: u64,
    simulation: Rc<RefCell<Simulation>>,
    ctx: Rc<GpuContext>,
    surface: BoundSurface,
) -> impl FnMut() -> FrameOutcome + 'static {
    let clock = FrameClock::start();
    move || {
        let outcome = match simulation.try_borrow_mut() {
            Ok(mut sim) if sim.is_running() => {
                sim.render_frame(&ctx, &surface, clock.elapsed_secs())
            }
            Ok(_) => FrameOutcome::Stop,
            Err(_) => FrameOutcome::Continue,
        };
        if outcome == FrameOutcome::Stop {
            release_stopped(shared.clone(), generation);
        }
        outcome
    }
}

/// Drop the stopped simulation's loop and listeners once the current frame
/// callback has returned.
fn release_stopped(shared: Weak<Shared>, generation: u64) {
    wasm_bindgen_futures::spawn_local(async move {
        if let Some(shared) = shared.upgrade()
            && shared.generation.get() == generation
        {
            log::info!("simulation stopped, releasing its frame loop and listeners");
            shared.stop_active();
        }
    });
}

/// The page-facing controller. Exactly one simulation runs at a time.
#[wasm_bindgen]
pub struct Portfolio {
    shared: Rc<Shared>,
}

impl Default for Portfolio {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl Portfolio {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Portfolio {
        Portfolio {
            shared: Rc::new(Shared {
                provider: DeviceProvider::new(),
                shaders: ShaderRepository::new(),
                config: RefCell::new(SimulationConfig::default()),
                active: RefCell::new(None),
                last_kind: Cell::new(None),
                generation: Cell::new(0),
            }),
        }
    }

    /// Tear down the running simulation and start the one for `page`.
    pub fn navigate(&self, page: String) -> js_sys::Promise {
        let shared = Rc::clone(&self.shared);
        future_to_promise(async move {
            match SimulationKind::from_page(&page) {
                Some(kind) => switch_to(shared, kind).await,
                None => log::warn!("unknown page `{page}`"),
            }
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Re-initialise the current page at the new viewport size.
    pub fn resize(&self) -> js_sys::Promise {
        let shared = Rc::clone(&self.shared);
        future_to_promise(async move {
            if let Some(kind) = shared.last_kind.get() {
                switch_to(shared, kind).await;
            }
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn destroy(&self) {
        self.shared.generation.set(self.shared.generation.get() + 1);
        self.shared.last_kind.set(None);
        self.shared.stop_active();
    }

    /// Takes effect on the next navigation.
    pub fn set_particle_count(&self, count: u32) {
        let clamped = clamp_particle_count(count);
        if clamped != count {
            log::warn!("particle count {count} clamped to {clamped}");
        }
        self.shared.config.borrow_mut().particle_count = clamped;
    }

    pub fn set_seed(&self, seed: Option<u64>) {
        self.shared.config.borrow_mut().seed = seed;
    }

    pub fn active_page(&self) -> Option<String> {
        let active = self.shared.active.borrow();
        active
            .as_ref()
            .map(|a| a.simulation.borrow().kind().page().to_owned())
    }

    pub fn live_gpu_bytes(&self) -> f64 {
        resources::live_bytes() as f64
    }
}

//! Windowed host and application event loop.
//!
//! [`run`] opens a window, drives the [`NavigationController`](crate::camera::NavigationController)
//! once per redraw and hands decoded geometry to a user supplied [`SceneSurface`]. Asset loads run
//! in the background; their results travel back through the winit event loop proxy and are only
//! applied if no newer load was started in the meantime.
//!
//! # Lifecycle
//!
//! 1. `resumed` creates the window and starts the initial load
//! 2. window/device events feed the controller (keys, mouse look, pointer lock)
//! 3. every `RedrawRequested` ticks the controller with the wall-clock delta and calls
//!    [`SceneSurface::on_pose`]
//! 4. finished loads arrive as user events and are passed to `on_meshes` / `on_points`
//! 5. files dropped onto the window replace the current asset

use std::{fmt::Debug, sync::Arc};

use instant::{Duration, Instant};

use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    camera::{CameraPose, InputResponse, NavigationConfig},
    context::Context,
    data_structures::mesh::DecodedMesh,
    loading::{AssetRequest, LoadSlot, LoadStage, LoadToken, LoadedAsset, load_asset},
    resources::sampling::SampledPoints,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// The drawing side of the application.
///
/// The host owns navigation and loading; a `SceneSurface` only receives finished geometry and
/// the current pose once per frame.
pub trait SceneSurface {
    /// A mesh asset finished loading and replaces whatever was shown before.
    fn on_meshes(&mut self, meshes: Vec<DecodedMesh>);

    /// A point cloud finished loading. `points` is the sampled, colorized subset to draw.
    fn on_points(&mut self, cloud: DecodedMesh, points: SampledPoints);

    /// Called every frame after the controller moved.
    fn on_pose(&mut self, ctx: &Context, pose: &CameraPose, dt: Duration);

    fn on_load_stage(&mut self, _request: &AssetRequest, _stage: LoadStage) {}

    /// The active load failed. Stale loads never get here.
    fn on_load_failed(&mut self, request: &AssetRequest, error: &anyhow::Error);
}

pub(crate) enum FlowEvent {
    Progress {
        token: LoadToken,
        request: AssetRequest,
        stage: LoadStage,
    },
    Loaded {
        token: LoadToken,
        request: AssetRequest,
        result: anyhow::Result<Option<LoadedAsset>>,
    },
}

impl Debug for FlowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Progress { token, stage, .. } => f
                .debug_struct("Progress")
                .field("generation", &token.generation())
                .field("stage", stage)
                .finish(),
            Self::Loaded { token, request, .. } => f
                .debug_struct("Loaded")
                .field("generation", &token.generation())
                .field("path", &request.path)
                .finish(),
        }
    }
}

pub(crate) struct App<S: SceneSurface> {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<FlowEvent>,
    ctx: Option<Context>,
    surface: S,
    slot: LoadSlot,
    // Taken on the first `resumed`.
    initial_request: Option<AssetRequest>,
    initial_pose: CameraPose,
    config: NavigationConfig,
    last_time: Instant,
}

impl<S: SceneSurface> App<S> {
    fn new(
        event_loop: &EventLoop<FlowEvent>,
        surface: S,
        initial_request: Option<AssetRequest>,
        config: NavigationConfig,
    ) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            ctx: None,
            surface,
            slot: LoadSlot::new(),
            initial_request,
            initial_pose: CameraPose::default(),
            config,
            last_time: Instant::now(),
        })
    }

    /// Starts loading `request`, superseding any load still in flight.
    fn start_load(&mut self, request: AssetRequest) {
        let token = self.slot.begin();
        log::info!("loading {} (#{})", request.path, token.generation());
        let proxy = self.proxy.clone();
        let progress_proxy = self.proxy.clone();
        let progress_token = token.clone();
        let progress_request = request.clone();
        let fut = async move {
            let result = load_asset(&request, &token, move |stage| {
                // a closed loop has nobody left to show progress to
                let _ = progress_proxy.send_event(FlowEvent::Progress {
                    token: progress_token.clone(),
                    request: progress_request.clone(),
                    stage,
                });
            })
            .await;
            if proxy
                .send_event(FlowEvent::Loaded {
                    token,
                    request,
                    result,
                })
                .is_err()
            {
                log::warn!("Event loop was closed before the load finished");
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        self.async_runtime.spawn(fut);

        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(fut);
    }

    fn apply(&mut self, request: AssetRequest, asset: LoadedAsset) {
        match asset {
            LoadedAsset::Meshes(meshes) => {
                log::info!("{}: showing {} mesh(es)", request.path, meshes.len());
                self.surface.on_meshes(meshes);
            }
            LoadedAsset::PointCloud { cloud, points } => {
                log::info!(
                    "{}: showing {} of {} points",
                    request.path,
                    points.stats.sampled_points,
                    points.stats.total_points
                );
                self.surface.on_points(cloud, points);
            }
        }
        if let Some(ctx) = &self.ctx {
            ctx.window.request_redraw();
        }
    }
}

impl<S: SceneSurface> ApplicationHandler<FlowEvent> for App<S> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.ctx.is_some() {
            return;
        }
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("splat-roam");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Cannot create the main window: {}", e);
                event_loop.exit();
                return;
            }
        };
        self.ctx = Some(Context::new(window, self.initial_pose, self.config));
        self.last_time = Instant::now();

        if let Some(request) = self.initial_request.take() {
            self.start_load(request);
        }
        if let Some(ctx) = &self.ctx {
            ctx.window.request_redraw();
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            FlowEvent::Progress {
                token,
                request,
                stage,
            } => {
                if token.is_current() {
                    self.surface.on_load_stage(&request, stage);
                }
            }
            FlowEvent::Loaded {
                token,
                request,
                result,
            } => match self.slot.accept(&token, result) {
                Some(Ok(Some(asset))) => self.apply(request, asset),
                Some(Ok(None)) => log::debug!("{}: load was superseded", request.path),
                Some(Err(e)) => {
                    log::error!("Could not load {}: {:#}", request.path, e);
                    self.surface.on_load_failed(&request, &e);
                }
                None => {}
            },
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let Some(ctx) = &mut self.ctx {
            ctx.controller.handle_device_event(&event);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(ctx) = &mut self.ctx else {
            return;
        };

        if ctx.controller.handle_window_event(&event) == InputResponse::ReleasePointer {
            ctx.release_pointer();
        }

        let mut dropped = None;
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => ctx.resize(size.width, size.height),
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } if !ctx.controller.pointer_locked() => ctx.lock_pointer(),
            WindowEvent::DroppedFile(path) => {
                let path = path.to_string_lossy().into_owned();
                match AssetRequest::new(path) {
                    Ok(request) => dropped = Some(request),
                    Err(e) => log::warn!("{}", e),
                }
            }
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                let pose = *ctx.controller.tick(dt);
                self.surface.on_pose(ctx, &pose, dt);
                ctx.window.request_redraw();
            }
            _ => {}
        }
        if let Some(request) = dropped {
            self.start_load(request);
        }
    }
}

/// Opens the viewer window and blocks until it is closed.
///
/// `initial_request` is loaded as soon as the window exists; more assets can be dropped onto the
/// window at runtime.
pub fn run<S: SceneSurface + 'static>(
    surface: S,
    initial_request: Option<AssetRequest>,
    config: NavigationConfig,
) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;

    let mut app = App::new(&event_loop, surface, initial_request, config)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}

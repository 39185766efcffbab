use std::{fmt::Display, time::Instant};

use wgpu::SurfaceError;
use winit::{
    dpi::PhysicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    window::{Window, WindowBuilder},
};

use crate::config::{AppConfig, WindowConfig};
use crate::error::{Error, FrameError};

#[derive(Debug)]
pub struct AppState {
    previous_time: Instant,
    elapsed_time: f32,
    frame: u64,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            previous_time: Instant::now(),
            elapsed_time: 0.0,
            frame: 0,
        }
    }

    pub fn update(&mut self) {
        let current_time = Instant::now();
        self.elapsed_time = current_time
            .duration_since(self.previous_time)
            .as_secs_f32();
        self.previous_time = current_time;
        self.frame += 1;
    }

    /// Seconds since the previous update.
    pub fn elapsed_time(&self) -> f32 {
        self.elapsed_time
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// What the application loop should do after a layer saw an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerControl {
    Continue,
    Exit,
}

pub struct Application<L: Layer + 'static> {
    layer: Option<L>,
    screen: Screen,
    state: AppState,
    config: AppConfig,
}

impl<L: Layer + 'static> Application<L> {
    pub fn new(screen: Screen, config: AppConfig) -> Self {
        Self {
            screen,
            layer: None,
            state: AppState::new(),
            config,
        }
    }

    fn exit(&mut self, control_flow: &mut ControlFlow) {
        control_flow.set_exit_with_code(0);
        if let Some(mut layer) = self.layer.take() {
            if let Err(err) = layer.shutdown(&self.state, &mut self.screen) {
                tracing::error!("shutdown failed: {}", err);
                control_flow.set_exit_with_code(1);
            }
        }
    }

    fn run(
        &mut self,
        event: Event<()>,
        _event_loop: &EventLoopWindowTarget<()>,
        control_flow: &mut ControlFlow,
    ) {
        if let Event::NewEvents(StartCause::Init) = event {
            control_flow.set_poll();
            match L::start(&mut self.screen, &self.state, &self.config) {
                Ok(layer) => self.layer = Some(layer),
                Err(err) => {
                    tracing::error!("startup failed: {}", err);
                    control_flow.set_exit_with_code(1);
                }
            }
            return;
        }

        let Some(layer) = self.layer.as_mut() else {
            return;
        };

        if layer.process_event(&event, &mut self.screen) == LayerControl::Exit {
            self.exit(control_flow);
            return;
        }

        match event {
            Event::WindowEvent {
                window_id,
                ref event,
            } if self.screen.window().id() == window_id => match event {
                WindowEvent::CloseRequested => self.exit(control_flow),
                WindowEvent::Resized(physical_size) => {
                    self.screen.resize(*physical_size);
                    layer.resize(*physical_size, &self.state, &mut self.screen);
                }
                WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                    self.screen.resize(**new_inner_size);
                    layer.resize(**new_inner_size, &self.state, &mut self.screen);
                }
                _ => {}
            },
            Event::MainEventsCleared => {
                self.state.update();
                self.screen.window().request_redraw();
            }
            Event::RedrawRequested(window_id) if self.screen.window().id() == window_id => {
                layer.update(&self.state, &mut self.screen);

                match layer.render(&self.state, &mut self.screen) {
                    Ok(_) => {}
                    Err(FrameError::Backend(SurfaceError::Lost)) => self.screen.resize_to_current(),
                    Err(FrameError::Backend(SurfaceError::OutOfMemory)) => {
                        tracing::error!("out of GPU memory");
                        control_flow.set_exit_with_code(137);
                    }
                    Err(FrameError::Backend(e)) => tracing::error!("{:?}", e),
                    Err(e) => {
                        tracing::error!("frame failed: {}", e);
                        self.exit(control_flow);
                        control_flow.set_exit_with_code(1);
                    }
                }
            }
            _ => {}
        }
    }

    pub fn init(config: AppConfig) -> Result<(), Error> {
        let event_loop = EventLoop::new();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let screen = pollster::block_on(Screen::new(&event_loop, &instance, &config.window))?;
        let mut application = Self::new(screen, config);
        event_loop.run(move |event, event_loop, control_flow| {
            application.run(event, event_loop, control_flow);
        });
    }
}

pub struct Screen {
    pub surface: wgpu::Surface,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    window: Window,
}

impl Screen {
    pub async fn new(
        event_loop: &EventLoopWindowTarget<()>,
        instance: &wgpu::Instance,
        window_config: &WindowConfig,
    ) -> Result<Self, Error> {
        let window = WindowBuilder::new()
            .with_title(window_config.title.clone())
            .with_inner_size(PhysicalSize::new(window_config.width, window_config.height))
            .build(event_loop)?;

        // SAFETY:
        // The surface needs to live as long as the window that created it.
        // Screen owns the window so this should be safe.
        let surface = unsafe { instance.create_surface(&window) }?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(Error::NoAdapter)?;
        let info = adapter.get_info();
        tracing::info!(adapter = %info.name, backend = ?info.backend, "selected adapter");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default(),
                    label: None,
                },
                None,
            )
            .await?;
        let size = window.inner_size();
        let config = surface
            .get_default_config(&adapter, size.width.max(1), size.height.max(1))
            .ok_or(Error::UnsupportedSurface)?;
        surface.configure(&device, &config);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.config.width, self.config.height)
    }

    /// Resize the screen to new window size.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Resize the screen to current window inner size.
    pub fn resize_to_current(&mut self) {
        self.resize(self.window.inner_size());
    }
}

pub trait Layer: Sized {
    type LayerErr: Display + 'static;

    fn start(screen: &mut Screen, app: &AppState, config: &AppConfig)
        -> Result<Self, Self::LayerErr>;
    fn process_event(&mut self, event: &Event<()>, screen: &mut Screen) -> LayerControl;
    fn resize(&mut self, new_size: PhysicalSize<u32>, app: &AppState, screen: &mut Screen);
    fn update(&mut self, app: &AppState, screen: &mut Screen);
    fn render(
        &mut self,
        app: &AppState,
        screen: &mut Screen,
    ) -> Result<(), FrameError<SurfaceError>>;
    fn shutdown(&mut self, app: &AppState, screen: &mut Screen) -> Result<(), Self::LayerErr>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_state_counts_frames() {
        let mut state = AppState::new();
        assert_eq!(state.frame(), 0);
        state.update();
        state.update();
        assert_eq!(state.frame(), 2);
        assert!(state.elapsed_time() >= 0.0);
    }
}

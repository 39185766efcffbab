use std::path::PathBuf;

use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use sphere_tracer_lib::{
    application::{AppState, Application, Layer, LayerControl, Screen},
    backend::{RenderTarget, TracerGpu, WgpuBackend},
    camera::{Camera, CameraController},
    config::{load_config, AppConfig},
    error::{Error, FrameError},
    frustum::Projection,
    orchestrator::FrameOrchestrator,
    scene::Scene,
    surface::{Extent, OutputSurface},
};
use tracing_subscriber::EnvFilter;
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
};

#[derive(Parser)]
#[command(name = "sphere_tracer")]
#[command(about = "Real-time GPU sphere ray tracer")]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter (e.g. "info", "sphere_tracer_lib=debug"). Overrides RUST_LOG.
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

struct SphereTracer {
    orchestrator: FrameOrchestrator<RenderTarget>,
    gpu: TracerGpu,
}

impl Layer for SphereTracer {
    type LayerErr = Error;

    fn start(screen: &mut Screen, _app: &AppState, config: &AppConfig) -> Result<Self, Error> {
        let (gpu, scheduler) = TracerGpu::new(screen, &config.shader_dir)?;

        let mut rng = match config.scene.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let scene = Scene::populate(&config.scene, &mut rng);
        tracing::info!(
            spheres = scene.spheres.len(),
            lights = scene.lights.len(),
            "scene populated"
        );

        let extent = Extent::from(screen.size());
        let camera = Camera::from_config(&config.camera);
        let controller = CameraController::new(config.camera.movement_speed);
        let projection = Projection::from_config(&config.camera, extent.width, extent.height);
        let surface = OutputSurface::new(gpu.create_target(&screen.device, extent), extent);

        Ok(Self {
            orchestrator: FrameOrchestrator::new(
                scene, camera, controller, projection, surface, scheduler,
            ),
            gpu,
        })
    }

    fn process_event(&mut self, event: &Event<()>, _screen: &mut Screen) -> LayerControl {
        if let Event::WindowEvent { event, .. } = event {
            if let WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state: ElementState::Released,
                        virtual_keycode: Some(VirtualKeyCode::Escape),
                        ..
                    },
                ..
            } = event
            {
                return LayerControl::Exit;
            }
            self.orchestrator.handle_window_event(event);
        }
        LayerControl::Continue
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>, _app: &AppState, _screen: &mut Screen) {
        self.orchestrator.handle_resize(new_size.into());
    }

    fn update(&mut self, app: &AppState, _screen: &mut Screen) {
        if app.frame() % 600 == 0 && app.elapsed_time() > 0.0 {
            tracing::debug!(fps = 1.0 / app.elapsed_time(), "frame rate");
        }
    }

    fn render(
        &mut self,
        _app: &AppState,
        screen: &mut Screen,
    ) -> Result<(), FrameError<wgpu::SurfaceError>> {
        let mut backend = WgpuBackend::new(screen, &mut self.gpu);
        let report = self.orchestrator.frame(&mut backend)?;
        if let Some(extent) = report.resized {
            tracing::debug!(
                width = extent.width,
                height = extent.height,
                groups = ?report.groups,
                "render target resized"
            );
        }
        Ok(())
    }

    fn shutdown(&mut self, _app: &AppState, screen: &mut Screen) -> Result<(), Error> {
        self.gpu.shutdown(&screen.device);
        tracing::info!(frames = self.orchestrator.frames(), "exiting");
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match cli.config {
        Some(path) => load_config(&path)?,
        None => {
            let config = AppConfig::default();
            config.validate()?;
            config
        }
    };

    Application::<SphereTracer>::init(config)?;
    Ok(())
}

use crate::config::ConfigError;
use crate::kernel::KernelError;
use crate::uniforms::UniformError;

/// Startup failures. None of these are recoverable.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error("no compatible graphics adapter found")]
    NoAdapter,
    #[error("failed to open graphics device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("surface is not supported by the adapter")]
    UnsupportedSurface,
}

/// Failures inside one frame of the render loop.
#[derive(Debug, thiserror::Error)]
pub enum FrameError<E> {
    #[error("render backend: {0}")]
    Backend(E),
    #[error(transparent)]
    Uniform(#[from] UniformError),
    #[error("render target missing after a failed reallocation")]
    MissingTarget,
}

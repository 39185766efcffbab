//! wgpu implementation of [`RenderBackend`].

use std::path::Path;

use crate::application::Screen;
use crate::dispatch::{self, binding, DispatchScheduler, GroupCounts, OUTPUT_FORMAT};
use crate::error::Error;
use crate::kernel::{self, ComputeProgram, ShaderSource, ShaderStage};
use crate::orchestrator::RenderBackend;
use crate::presentation::PresentationStage;
use crate::renderer::UniformBuffer;
use crate::surface::Extent;
use crate::uniforms::{UniformBlock, MAX_LIGHTS, MAX_SPHERES};

pub const TRACE_SHADER: &str = "trace.wgsl";
pub const PRESENT_SHADER: &str = "present.wgsl";

/// Floating point image the kernel writes and the presentation stage reads,
/// with the bind groups referencing it.
pub struct RenderTarget {
    pub extent: Extent,
    _texture: wgpu::Texture,
    trace_bind_group: wgpu::BindGroup,
    present_bind_group: wgpu::BindGroup,
}

/// Long-lived GPU objects: both programs and the uniform buffers.
pub struct TracerGpu {
    trace: ComputeProgram,
    presentation: PresentationStage,
    frame_buffer: UniformBuffer,
    sphere_buffer: UniformBuffer,
    light_buffer: UniformBuffer,
    encoder: Option<wgpu::CommandEncoder>,
}

impl TracerGpu {
    /// Compile and link both programs. Returns the scheduler sized from the
    /// kernel's work-group size.
    pub fn new(screen: &Screen, shader_dir: &Path) -> Result<(Self, DispatchScheduler), Error> {
        let trace_source = ShaderSource::load(shader_dir, TRACE_SHADER)?;
        let present_source = ShaderSource::load(shader_dir, PRESENT_SHADER)?;

        let trace_unit = kernel::compile(&trace_source, ShaderStage::Compute, "main")?;
        let vertex_unit = kernel::compile(&present_source, ShaderStage::Vertex, "vs_main")?;
        let fragment_unit = kernel::compile(&present_source, ShaderStage::Fragment, "fs_main")?;

        let trace = dispatch::setup_compute(&screen.device, &trace_unit)?;
        let scheduler = DispatchScheduler::for_program(&trace);
        let presentation = PresentationStage::new(
            &screen.device,
            &vertex_unit,
            &fragment_unit,
            screen.config.format,
        )?;

        let block = UniformBlock::new();
        let frame_buffer = UniformBuffer::init_immediate(
            &screen.device,
            block.frame_bytes(),
            Some("Frame Uniform Buffer"),
        );
        let sphere_buffer = UniformBuffer::init_immediate(
            &screen.device,
            block.sphere_bytes(),
            Some("Sphere Uniform Buffer"),
        );
        let light_buffer = UniformBuffer::init_immediate(
            &screen.device,
            block.light_bytes(),
            Some("Light Uniform Buffer"),
        );

        tracing::info!(
            workgroup = ?scheduler.workgroup_size(),
            max_spheres = MAX_SPHERES,
            max_lights = MAX_LIGHTS,
            "trace kernel ready"
        );

        Ok((
            Self {
                trace,
                presentation,
                frame_buffer,
                sphere_buffer,
                light_buffer,
                encoder: None,
            },
            scheduler,
        ))
    }

    pub fn create_target(&self, device: &wgpu::Device, extent: Extent) -> RenderTarget {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Trace Output"),
            size: wgpu::Extent3d {
                width: extent.width,
                height: extent.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OUTPUT_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let trace_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("trace_bind_group"),
            layout: &self.trace.bind_group_layouts[0],
            entries: &[
                wgpu::BindGroupEntry {
                    binding: binding::OUTPUT,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: binding::FRAME,
                    resource: self.frame_buffer.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: binding::SPHERES,
                    resource: self.sphere_buffer.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: binding::LIGHTS,
                    resource: self.light_buffer.buffer().as_entire_binding(),
                },
            ],
        });
        let present_bind_group = self.presentation.bind_group(device, &view);

        RenderTarget {
            extent,
            _texture: texture,
            trace_bind_group,
            present_bind_group,
        }
    }

    /// Wait for submitted work to finish before resources are released.
    pub fn shutdown(&mut self, device: &wgpu::Device) {
        self.encoder = None;
        device.poll(wgpu::Maintain::Wait);
        tracing::info!("gpu idle");
    }
}

/// Borrowed view of the screen and GPU objects for one frame.
pub struct WgpuBackend<'a> {
    pub screen: &'a Screen,
    pub gpu: &'a mut TracerGpu,
}

impl<'a> WgpuBackend<'a> {
    pub fn new(screen: &'a Screen, gpu: &'a mut TracerGpu) -> Self {
        Self { screen, gpu }
    }

    /// The frame's command encoder, shared by the trace and present passes.
    fn take_encoder(&mut self) -> wgpu::CommandEncoder {
        let device = &self.screen.device;
        self.gpu.encoder.take().unwrap_or_else(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            })
        })
    }
}

impl RenderBackend for WgpuBackend<'_> {
    type Target = RenderTarget;
    type Error = wgpu::SurfaceError;

    fn allocate_target(&mut self, extent: Extent) -> Result<RenderTarget, Self::Error> {
        Ok(self.gpu.create_target(&self.screen.device, extent))
    }

    fn upload(&mut self, uniforms: &UniformBlock) -> Result<(), Self::Error> {
        let queue = &self.screen.queue;
        self.gpu.frame_buffer.write(queue, uniforms.frame_bytes());
        self.gpu.sphere_buffer.write(queue, uniforms.sphere_bytes());
        self.gpu.light_buffer.write(queue, uniforms.light_bytes());
        Ok(())
    }

    fn dispatch(&mut self, target: &RenderTarget, groups: GroupCounts) -> Result<(), Self::Error> {
        let mut encoder = self.take_encoder();
        dispatch::record(
            &mut encoder,
            &self.gpu.trace.pipeline,
            &target.trace_bind_group,
            groups,
        );
        self.gpu.encoder = Some(encoder);
        Ok(())
    }

    fn present(&mut self, target: &RenderTarget) -> Result<(), Self::Error> {
        let mut encoder = self.take_encoder();
        let output = match self.screen.surface.get_current_texture() {
            Ok(output) => output,
            Err(err) => {
                // Still run the traced frame so the dispatch is not lost.
                self.screen.queue.submit(std::iter::once(encoder.finish()));
                return Err(err);
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.gpu
            .presentation
            .record(&mut encoder, &view, &target.present_bind_group);

        self.screen.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

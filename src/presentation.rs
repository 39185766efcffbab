use crate::kernel::{self, CompiledUnit, KernelError, RenderProgram, RenderStages};
use crate::renderer::{IndexBuffer, Vertex, VertexBuffer, QUAD_INDICES, QUAD_VERTICES};

/// Draws the traced image onto the swapchain with a full-screen quad.
pub struct PresentationStage {
    program: RenderProgram,
    vertex_buffer: VertexBuffer,
    index_buffer: IndexBuffer,
    sampler: wgpu::Sampler,
}

impl PresentationStage {
    pub fn new(
        device: &wgpu::Device,
        vertex: &CompiledUnit,
        fragment: &CompiledUnit,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, KernelError> {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("present_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        // rgba32float is not filterable without an extra feature.
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        let program = kernel::link_render(
            device,
            "present",
            RenderStages {
                vertex,
                fragment,
                vertex_buffers: &[Vertex::layout()],
                target_format,
            },
            vec![layout],
        )?;

        let vertex_buffer = VertexBuffer::init_immediate(
            device,
            bytemuck::cast_slice(QUAD_VERTICES),
            Some("Quad Vertex Buffer"),
        );
        let index_buffer =
            IndexBuffer::init_immediate_u16(device, QUAD_INDICES, Some("Quad Index Buffer"));

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("present_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            program,
            vertex_buffer,
            index_buffer,
            sampler,
        })
    }

    /// Bind group sampling `view`. Rebuilt whenever the render target is.
    pub fn bind_group(&self, device: &wgpu::Device, view: &wgpu::TextureView) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("present_bind_group"),
            layout: &self.program.bind_group_layouts[0],
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        frame: &wgpu::TextureView,
        bind_group: &wgpu::BindGroup,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Present Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: frame,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: true,
                },
            })],
            depth_stencil_attachment: None,
        });

        render_pass.set_pipeline(&self.program.pipeline);
        render_pass.set_bind_group(0, bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.buffer().slice(..));
        render_pass.set_index_buffer(
            self.index_buffer.buffer().slice(..),
            self.index_buffer.format(),
        );
        render_pass.draw_indexed(0..self.index_buffer.count(), 0, 0..1);
    }
}

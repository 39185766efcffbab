use crate::kernel::{self, CompiledUnit, ComputeProgram, KernelError};
use crate::surface::Extent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl WorkgroupSize {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupCounts {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

/// Work groups needed to cover every pixel of `extent`.
pub fn group_counts(local: WorkgroupSize, extent: Extent) -> GroupCounts {
    GroupCounts {
        x: div_ceil(extent.width, local.x.max(1)),
        y: div_ceil(extent.height, local.y.max(1)),
        z: 1,
    }
}

fn div_ceil(value: u32, divisor: u32) -> u32 {
    (value + divisor - 1) / divisor
}

/// Binding slots of the trace kernel, all in group 0.
pub mod binding {
    pub const OUTPUT: u32 = 0;
    pub const FRAME: u32 = 1;
    pub const SPHERES: u32 = 2;
    pub const LIGHTS: u32 = 3;
}

pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Link the trace kernel with its output image and uniform bindings.
pub fn setup_compute(
    device: &wgpu::Device,
    unit: &CompiledUnit,
) -> Result<ComputeProgram, KernelError> {
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("trace_bind_group_layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: binding::OUTPUT,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: OUTPUT_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
            uniform_entry(binding::FRAME),
            uniform_entry(binding::SPHERES),
            uniform_entry(binding::LIGHTS),
        ],
    });

    kernel::link_compute(device, "trace", unit, vec![layout])
}

/// Sizes the trace dispatch for the current output.
pub struct DispatchScheduler {
    workgroup_size: WorkgroupSize,
}

impl DispatchScheduler {
    /// The work-group size is fixed for the lifetime of the kernel.
    pub fn new(workgroup_size: WorkgroupSize) -> Self {
        Self { workgroup_size }
    }

    pub fn for_program(program: &ComputeProgram) -> Self {
        Self::new(program.workgroup_size)
    }

    pub fn workgroup_size(&self) -> WorkgroupSize {
        self.workgroup_size
    }

    pub fn group_counts(&self, extent: Extent) -> GroupCounts {
        group_counts(self.workgroup_size, extent)
    }
}

/// Record the compute pass writing the output image.
///
/// The pass ends before this returns. Any later pass in the same encoder
/// that samples the image is ordered after these writes by wgpu's resource
/// tracking, which inserts the storage-write to sampled-read barrier between
/// the two passes.
pub fn record(
    encoder: &mut wgpu::CommandEncoder,
    pipeline: &wgpu::ComputePipeline,
    bind_group: &wgpu::BindGroup,
    groups: GroupCounts,
) {
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some("Trace Pass"),
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.dispatch_workgroups(groups.x, groups.y, groups.z);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_multiple() {
        let groups = group_counts(WorkgroupSize::new(16, 16, 1), Extent::new(1280, 720));
        assert_eq!(groups, GroupCounts { x: 80, y: 45, z: 1 });
    }

    #[test]
    fn partial_group_rounds_up() {
        let groups = group_counts(WorkgroupSize::new(16, 16, 1), Extent::new(1281, 720));
        assert_eq!(groups, GroupCounts { x: 81, y: 45, z: 1 });

        let groups = group_counts(WorkgroupSize::new(8, 4, 1), Extent::new(1, 1));
        assert_eq!(groups, GroupCounts { x: 1, y: 1, z: 1 });
    }

    #[test]
    fn groups_cover_every_pixel() {
        let local = WorkgroupSize::new(16, 8, 1);
        for (w, h) in [(17, 9), (640, 480), (1023, 767), (3, 2000)] {
            let groups = group_counts(local, Extent::new(w, h));
            assert!(groups.x * local.x >= w && (groups.x - 1) * local.x < w);
            assert!(groups.y * local.y >= h && (groups.y - 1) * local.y < h);
        }
    }

    #[test]
    fn scheduler_keeps_kernel_size() {
        let scheduler = DispatchScheduler::new(WorkgroupSize::new(16, 16, 1));
        assert_eq!(
            scheduler.group_counts(Extent::new(1280, 720)),
            GroupCounts { x: 80, y: 45, z: 1 }
        );
    }
}

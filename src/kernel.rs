//! Shader compilation and linking.
//!
//! Sources are WGSL files read at startup. [`compile`] parses and validates
//! a source with naga so diagnostics surface before any device call, and
//! records the entry points it exposes. [`link_compute`] and [`link_render`]
//! turn compiled units into a [`Program`] holding the concrete pipeline,
//! catching device-side validation failures through a wgpu error scope.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::dispatch::WorkgroupSize;

#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("failed to read shader source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to compile {name}:\n{diagnostic}")]
    Compile { name: String, diagnostic: String },
    #[error("{name} has no {stage} entry point `{entry_point}`")]
    MissingEntryPoint {
        name: String,
        stage: ShaderStage,
        entry_point: String,
    },
    #[error("failed to link {label}: {diagnostic}")]
    Link { label: String, diagnostic: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Compute,
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn matches(&self, stage: naga::ShaderStage) -> bool {
        matches!(
            (self, stage),
            (ShaderStage::Compute, naga::ShaderStage::Compute)
                | (ShaderStage::Vertex, naga::ShaderStage::Vertex)
                | (ShaderStage::Fragment, naga::ShaderStage::Fragment)
        )
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Compute => write!(f, "compute"),
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShaderSource {
    pub name: String,
    pub text: String,
}

impl ShaderSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn load(dir: &Path, name: &str) -> Result<Self, KernelError> {
        let path = dir.join(name);
        let text = std::fs::read_to_string(&path).map_err(|source| KernelError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self::new(name, text))
    }
}

/// A validated shader stage ready to be linked.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    source: ShaderSource,
    stage: ShaderStage,
    entry_point: String,
    workgroup_size: [u32; 3],
}

impl CompiledUnit {
    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Local work-group size of a compute unit.
    pub fn workgroup_size(&self) -> Option<WorkgroupSize> {
        match self.stage {
            ShaderStage::Compute => {
                let [x, y, z] = self.workgroup_size;
                Some(WorkgroupSize::new(x, y, z))
            }
            _ => None,
        }
    }
}

/// Parse and validate `source`, keeping the `entry_point` of `stage`.
pub fn compile(
    source: &ShaderSource,
    stage: ShaderStage,
    entry_point: &str,
) -> Result<CompiledUnit, KernelError> {
    let module = naga::front::wgsl::parse_str(&source.text).map_err(|err| {
        KernelError::Compile {
            name: source.name.clone(),
            diagnostic: err.emit_to_string(&source.text),
        }
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| KernelError::Compile {
        name: source.name.clone(),
        diagnostic: err.to_string(),
    })?;

    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.name == entry_point && stage.matches(ep.stage))
        .ok_or_else(|| KernelError::MissingEntryPoint {
            name: source.name.clone(),
            stage,
            entry_point: entry_point.to_owned(),
        })?;

    tracing::debug!(name = %source.name, %stage, entry_point, "compiled shader");

    Ok(CompiledUnit {
        source: source.clone(),
        stage,
        entry_point: entry.name.clone(),
        workgroup_size: entry.workgroup_size,
    })
}

/// Linked program: one pipeline plus the bind group layouts its resources
/// are bound through. Compute programs also carry their work-group size.
#[derive(Debug)]
pub struct Program<P, W = ()> {
    pub label: String,
    pub pipeline: P,
    pub bind_group_layouts: Vec<wgpu::BindGroupLayout>,
    pub workgroup_size: W,
}

pub type ComputeProgram = Program<wgpu::ComputePipeline, WorkgroupSize>;
pub type RenderProgram = Program<wgpu::RenderPipeline>;

/// Units and fixed state of a quad-drawing program.
pub struct RenderStages<'a> {
    pub vertex: &'a CompiledUnit,
    pub fragment: &'a CompiledUnit,
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub target_format: wgpu::TextureFormat,
}

/// Link a compute unit into a program on `device`.
pub fn link_compute(
    device: &wgpu::Device,
    label: &str,
    unit: &CompiledUnit,
    bind_group_layouts: Vec<wgpu::BindGroupLayout>,
) -> Result<ComputeProgram, KernelError> {
    let workgroup_size = compute_workgroup_size(label, unit)?;

    let pipeline = scoped(device, label, &bind_group_layouts, |layout| {
        let module = create_module(device, unit);
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            module: &module,
            entry_point: unit.entry_point(),
        })
    })?;

    tracing::info!(label, ?workgroup_size, "linked compute program");

    Ok(Program {
        label: label.to_owned(),
        pipeline,
        bind_group_layouts,
        workgroup_size,
    })
}

/// Work-group size of the unit a compute program is linked from.
fn compute_workgroup_size(label: &str, unit: &CompiledUnit) -> Result<WorkgroupSize, KernelError> {
    unit.workgroup_size().ok_or_else(|| KernelError::Link {
        label: label.to_owned(),
        diagnostic: format!("{} is a {} unit, not compute", unit.name(), unit.stage()),
    })
}

/// Link a vertex and a fragment unit into a program on `device`.
pub fn link_render(
    device: &wgpu::Device,
    label: &str,
    stages: RenderStages<'_>,
    bind_group_layouts: Vec<wgpu::BindGroupLayout>,
) -> Result<RenderProgram, KernelError> {
    let RenderStages {
        vertex,
        fragment,
        vertex_buffers,
        target_format,
    } = stages;

    let pipeline = scoped(device, label, &bind_group_layouts, |layout| {
        let vertex_module = create_module(device, vertex);
        let fragment_module = create_module(device, fragment);
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: vertex.entry_point(),
                buffers: vertex_buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: fragment.entry_point(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        })
    })?;

    tracing::info!(label, "linked render program");

    Ok(Program {
        label: label.to_owned(),
        pipeline,
        bind_group_layouts,
        workgroup_size: (),
    })
}

/// Build a pipeline inside a validation error scope, reporting failures as
/// [`KernelError::Link`].
fn scoped<P>(
    device: &wgpu::Device,
    label: &str,
    bind_group_layouts: &[wgpu::BindGroupLayout],
    build: impl FnOnce(&wgpu::PipelineLayout) -> P,
) -> Result<P, KernelError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let layout_refs: Vec<&wgpu::BindGroupLayout> = bind_group_layouts.iter().collect();
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &layout_refs,
        push_constant_ranges: &[],
    });
    let pipeline = build(&layout);

    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(KernelError::Link {
            label: label.to_owned(),
            diagnostic: err.to_string(),
        }),
        None => Ok(pipeline),
    }
}

fn create_module(device: &wgpu::Device, unit: &CompiledUnit) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(unit.name()),
        source: wgpu::ShaderSource::Wgsl(unit.source.text.as_str().into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KERNEL: &str = r#"
@group(0) @binding(0) var output: texture_storage_2d<rgba32float, write>;

@compute @workgroup_size(16, 8, 1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    textureStore(output, vec2<i32>(id.xy), vec4<f32>(1.0));
}
"#;

    #[test]
    fn compile_reads_workgroup_size() {
        let unit = compile(&ShaderSource::new("kernel.wgsl", KERNEL), ShaderStage::Compute, "main")
            .unwrap();
        assert_eq!(unit.entry_point(), "main");
        assert_eq!(unit.workgroup_size(), Some(WorkgroupSize::new(16, 8, 1)));
    }

    #[test]
    fn compile_reports_syntax_errors() {
        let source = ShaderSource::new("broken.wgsl", "fn main( {");
        match compile(&source, ShaderStage::Compute, "main") {
            Err(KernelError::Compile { name, diagnostic }) => {
                assert_eq!(name, "broken.wgsl");
                assert!(!diagnostic.is_empty());
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn compile_rejects_wrong_stage() {
        let source = ShaderSource::new("kernel.wgsl", KERNEL);
        assert!(matches!(
            compile(&source, ShaderStage::Vertex, "main"),
            Err(KernelError::MissingEntryPoint {
                stage: ShaderStage::Vertex,
                ..
            })
        ));
    }

    #[test]
    fn compute_program_needs_a_compute_unit() {
        let kernel = compile(&ShaderSource::new("kernel.wgsl", KERNEL), ShaderStage::Compute, "main")
            .unwrap();
        assert_eq!(
            compute_workgroup_size("trace", &kernel).unwrap(),
            WorkgroupSize::new(16, 8, 1)
        );

        let dir = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/asset/shader"));
        let present = ShaderSource::load(dir, "present.wgsl").unwrap();
        let vertex = compile(&present, ShaderStage::Vertex, "vs_main").unwrap();
        match compute_workgroup_size("trace", &vertex) {
            Err(KernelError::Link { label, diagnostic }) => {
                assert_eq!(label, "trace");
                assert!(diagnostic.contains("vertex"));
            }
            other => panic!("expected link error, got {other:?}"),
        }
    }

    #[test]
    fn load_missing_source_is_io_error() {
        let err = ShaderSource::load(Path::new("/nonexistent"), "trace.wgsl").unwrap_err();
        assert!(matches!(err, KernelError::Io { .. }));
    }

    #[test]
    fn bundled_shaders_compile() {
        let dir = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/asset/shader"));
        let trace = ShaderSource::load(dir, "trace.wgsl").unwrap();
        let unit = compile(&trace, ShaderStage::Compute, "main").unwrap();
        assert!(unit.workgroup_size().is_some());

        let present = ShaderSource::load(dir, "present.wgsl").unwrap();
        compile(&present, ShaderStage::Vertex, "vs_main").unwrap();
        compile(&present, ShaderStage::Fragment, "fs_main").unwrap();
    }
}

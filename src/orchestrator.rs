//! Per-frame sequencing of the trace pipeline.
//!
//! Each call to [`FrameOrchestrator::frame`] runs, in order:
//!
//! 1. queued camera movement is applied;
//! 2. a dirty output surface is rebuilt, after updating the projection;
//! 3. the frustum is computed from the camera and written to the uniforms;
//! 4. the scene is marshaled into the uniform arrays, then its animation
//!    advances by one frame;
//! 5. the uniforms are uploaded and the kernel is dispatched;
//! 6. the output is presented.

use winit::event::WindowEvent;

use crate::camera::{Camera, CameraController};
use crate::dispatch::{DispatchScheduler, GroupCounts};
use crate::error::FrameError;
use crate::frustum::{Frustum, Projection};
use crate::marshal::{MarshalReport, UniformMarshaler};
use crate::scene::Scene;
use crate::surface::{Extent, OutputSurface, SurfaceState};
use crate::uniforms::UniformBlock;

/// Device side of the pipeline.
pub trait RenderBackend {
    type Target;
    type Error;

    fn allocate_target(&mut self, extent: Extent) -> Result<Self::Target, Self::Error>;
    fn upload(&mut self, uniforms: &UniformBlock) -> Result<(), Self::Error>;
    fn dispatch(&mut self, target: &Self::Target, groups: GroupCounts) -> Result<(), Self::Error>;
    fn present(&mut self, target: &Self::Target) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub resized: Option<Extent>,
    pub groups: GroupCounts,
    pub marshal: MarshalReport,
}

pub struct FrameOrchestrator<T> {
    scene: Scene,
    camera: Camera,
    controller: CameraController,
    projection: Projection,
    surface: OutputSurface<T>,
    marshaler: UniformMarshaler,
    uniforms: UniformBlock,
    scheduler: DispatchScheduler,
    frame: u64,
    truncated: bool,
}

impl<T> FrameOrchestrator<T> {
    pub fn new(
        scene: Scene,
        camera: Camera,
        controller: CameraController,
        projection: Projection,
        surface: OutputSurface<T>,
        scheduler: DispatchScheduler,
    ) -> Self {
        Self {
            scene,
            camera,
            controller,
            projection,
            surface,
            marshaler: UniformMarshaler::new(),
            uniforms: UniformBlock::new(),
            scheduler,
            frame: 0,
            truncated: false,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn surface(&self) -> &OutputSurface<T> {
        &self.surface
    }

    pub fn uniforms(&self) -> &UniformBlock {
        &self.uniforms
    }

    pub fn frames(&self) -> u64 {
        self.frame
    }

    pub fn handle_resize(&mut self, extent: Extent) -> bool {
        self.surface.notify_resize(extent)
    }

    /// Queue camera movement for a key event. Returns true if consumed.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        self.controller.process_events(event)
    }

    pub fn controller_mut(&mut self) -> &mut CameraController {
        &mut self.controller
    }

    pub fn frame<B>(&mut self, backend: &mut B) -> Result<FrameReport, FrameError<B::Error>>
    where
        B: RenderBackend<Target = T>,
    {
        self.controller.apply(&mut self.camera);

        let projection = &mut self.projection;
        let resized = self
            .surface
            .prepare(
                |extent| projection.resize(extent.width, extent.height),
                |extent| backend.allocate_target(extent),
            )
            .map_err(FrameError::Backend)?;

        let frustum = Frustum::compute(&self.camera, &self.projection);
        frustum.upload(&mut self.uniforms)?;

        let marshal = self.marshaler.marshal(&self.scene, &mut self.uniforms)?;
        if marshal.truncated() != self.truncated {
            self.truncated = marshal.truncated();
            if self.truncated {
                tracing::warn!(
                    spheres = self.scene.spheres.len(),
                    lights = self.scene.lights.len(),
                    "scene exceeds uniform capacity, extra entries are not rendered"
                );
            }
        }
        self.scene.advance();

        backend
            .upload(&self.uniforms)
            .map_err(FrameError::Backend)?;

        debug_assert_eq!(self.surface.state(), SurfaceState::Clean);
        let target = self.surface.target().ok_or(FrameError::MissingTarget)?;
        let groups = self.scheduler.group_counts(self.surface.extent());
        backend
            .dispatch(target, groups)
            .map_err(FrameError::Backend)?;
        backend.present(target).map_err(FrameError::Backend)?;

        let report = FrameReport {
            frame: self.frame,
            resized,
            groups,
            marshal,
        };
        self.frame += 1;
        Ok(report)
    }
}

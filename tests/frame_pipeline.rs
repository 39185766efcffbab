// Frame sequencing against a recording backend.
// The backend never touches a GPU. It logs every call and keeps a copy of
// the last uploaded uniform block so tests can read values back by name.

use sphere_tracer_lib::camera::{Camera, CameraController};
use sphere_tracer_lib::config::CameraConfig;
use sphere_tracer_lib::dispatch::{DispatchScheduler, GroupCounts, WorkgroupSize};
use sphere_tracer_lib::error::FrameError;
use sphere_tracer_lib::frustum::Projection;
use sphere_tracer_lib::orchestrator::{FrameOrchestrator, RenderBackend};
use sphere_tracer_lib::scene::{Bob, Light, Material, Scene, Sphere};
use sphere_tracer_lib::surface::{Extent, OutputSurface, SurfaceState};
use sphere_tracer_lib::uniforms::{UniformBlock, UniformValue, MAX_LIGHTS, MAX_SPHERES};
use winit::event::VirtualKeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FakeTarget {
    id: u32,
    extent: Extent,
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Allocate(Extent),
    Upload,
    Dispatch(u32, GroupCounts),
    Present(u32),
}

#[derive(Default)]
struct RecordingBackend {
    calls: Vec<Call>,
    next_id: u32,
    last_upload: Option<UniformBlock>,
    fail_dispatch: bool,
}

impl RecordingBackend {
    fn new() -> Self {
        // Id 0 belongs to the target built before the first frame.
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    fn uniform(&self, name: &str) -> UniformValue {
        self.last_upload
            .as_ref()
            .expect("nothing uploaded")
            .get(name)
            .expect("unknown uniform")
    }
}

impl RenderBackend for RecordingBackend {
    type Target = FakeTarget;
    type Error = &'static str;

    fn allocate_target(&mut self, extent: Extent) -> Result<FakeTarget, Self::Error> {
        self.calls.push(Call::Allocate(extent));
        let id = self.next_id;
        self.next_id += 1;
        Ok(FakeTarget { id, extent })
    }

    fn upload(&mut self, uniforms: &UniformBlock) -> Result<(), Self::Error> {
        self.calls.push(Call::Upload);
        self.last_upload = Some(uniforms.clone());
        Ok(())
    }

    fn dispatch(&mut self, target: &FakeTarget, groups: GroupCounts) -> Result<(), Self::Error> {
        if self.fail_dispatch {
            return Err("dispatch rejected");
        }
        self.calls.push(Call::Dispatch(target.id, groups));
        Ok(())
    }

    fn present(&mut self, target: &FakeTarget) -> Result<(), Self::Error> {
        self.calls.push(Call::Present(target.id));
        Ok(())
    }
}

fn orchestrator(scene: Scene, width: u32, height: u32) -> FrameOrchestrator<FakeTarget> {
    let config = CameraConfig::default();
    let extent = Extent::new(width, height);
    FrameOrchestrator::new(
        scene,
        Camera::from_config(&config),
        CameraController::new(config.movement_speed),
        Projection::from_config(&config, width, height),
        OutputSurface::new(FakeTarget { id: 0, extent }, extent),
        DispatchScheduler::new(WorkgroupSize::new(16, 16, 1)),
    )
}

fn vec3(value: UniformValue) -> glam::Vec3 {
    match value {
        UniformValue::Vec3(v) => v,
        other => panic!("expected vec3, got {:?}", other),
    }
}

fn float(value: UniformValue) -> f32 {
    match value {
        UniformValue::Float(v) => v,
        other => panic!("expected float, got {:?}", other),
    }
}

#[test]
fn steady_frame_uploads_then_dispatches_then_presents() {
    let mut orchestrator = orchestrator(Scene::new(), 1280, 720);
    let mut backend = RecordingBackend::new();

    let report = orchestrator.frame(&mut backend).unwrap();

    assert_eq!(report.frame, 0);
    assert_eq!(report.resized, None);
    assert_eq!(report.groups, GroupCounts { x: 80, y: 45, z: 1 });
    assert_eq!(
        backend.calls,
        vec![
            Call::Upload,
            Call::Dispatch(0, GroupCounts { x: 80, y: 45, z: 1 }),
            Call::Present(0),
        ]
    );
    assert_eq!(orchestrator.frames(), 1);
}

#[test]
fn resize_reallocates_once_before_dispatch() {
    let mut orchestrator = orchestrator(Scene::new(), 800, 600);
    let mut backend = RecordingBackend::new();

    assert!(orchestrator.handle_resize(Extent::new(1024, 768)));
    assert!(!orchestrator.handle_resize(Extent::new(1024, 768)));
    assert_eq!(orchestrator.surface().state(), SurfaceState::Dirty);

    let report = orchestrator.frame(&mut backend).unwrap();
    assert_eq!(report.resized, Some(Extent::new(1024, 768)));
    assert_eq!(report.groups, GroupCounts { x: 64, y: 48, z: 1 });
    assert_eq!(
        backend.calls,
        vec![
            Call::Allocate(Extent::new(1024, 768)),
            Call::Upload,
            Call::Dispatch(1, GroupCounts { x: 64, y: 48, z: 1 }),
            Call::Present(1),
        ]
    );

    let surface = orchestrator.surface();
    assert_eq!(surface.state(), SurfaceState::Clean);
    assert_eq!(surface.reallocations(), 1);
    assert_eq!(surface.target().map(|t| t.extent), Some(Extent::new(1024, 768)));
    assert!((orchestrator.projection().aspect - 1024.0 / 768.0).abs() < 1e-6);

    backend.calls.clear();
    let report = orchestrator.frame(&mut backend).unwrap();
    assert_eq!(report.resized, None);
    assert!(!backend.calls.iter().any(|c| matches!(c, Call::Allocate(_))));
}

#[test]
fn first_frame_after_resize_uploads_rays_for_the_new_aspect() {
    let mut orchestrator = orchestrator(Scene::new(), 800, 800);
    let mut backend = RecordingBackend::new();

    orchestrator.frame(&mut backend).unwrap();
    let width = vec3(backend.uniform("ray10")) - vec3(backend.uniform("ray00"));
    let height = vec3(backend.uniform("ray01")) - vec3(backend.uniform("ray00"));
    assert!((width.length() / height.length() - 1.0).abs() < 1e-4);

    orchestrator.handle_resize(Extent::new(1600, 800));
    orchestrator.frame(&mut backend).unwrap();

    let width = vec3(backend.uniform("ray10")) - vec3(backend.uniform("ray00"));
    let height = vec3(backend.uniform("ray01")) - vec3(backend.uniform("ray00"));
    assert!(
        (width.length() / height.length() - 2.0).abs() < 1e-4,
        "far plane is {} by {}",
        width.length(),
        height.length()
    );
}

#[test]
fn several_resizes_between_frames_collapse_to_the_last() {
    let mut orchestrator = orchestrator(Scene::new(), 800, 600);
    let mut backend = RecordingBackend::new();

    orchestrator.handle_resize(Extent::new(900, 700));
    orchestrator.handle_resize(Extent::new(0, 700));
    orchestrator.handle_resize(Extent::new(1000, 500));
    orchestrator.frame(&mut backend).unwrap();

    assert_eq!(
        backend.calls.first(),
        Some(&Call::Allocate(Extent::new(1000, 500)))
    );
    assert_eq!(orchestrator.surface().reallocations(), 1);
}

#[test]
fn scene_is_packed_with_defaults_past_live_counts() {
    let mut scene = Scene::new();
    for i in 0..3 {
        scene.spheres.push(Sphere::new(
            glam::Vec3::new(i as f32, 1.0, -2.0),
            0.5 + i as f32,
            Material::new(glam::Vec3::new(0.2, 0.4, 0.6), 10.0),
        ));
    }
    for i in 0..2 {
        scene.lights.push(Light::new(
            glam::Vec3::new(0.0, 10.0 * (i + 1) as f32, 0.0),
            glam::Vec3::ONE,
            100.0,
        ));
    }
    let mut orchestrator = orchestrator(scene, 1280, 720);
    let mut backend = RecordingBackend::new();

    let report = orchestrator.frame(&mut backend).unwrap();
    assert!(!report.marshal.truncated());

    assert_eq!(backend.uniform("numberOfSpheres"), UniformValue::Int(3));
    assert_eq!(backend.uniform("numberOfLights"), UniformValue::Int(2));
    assert_eq!(
        vec3(backend.uniform("sceneSpheres[2].position")),
        glam::Vec3::new(2.0, 1.0, -2.0)
    );
    assert_eq!(float(backend.uniform("sceneSpheres[2].radius")), 2.5);
    assert_eq!(
        vec3(backend.uniform("sceneLights[1].position")),
        glam::Vec3::new(0.0, 20.0, 0.0)
    );

    let uploaded = backend.last_upload.as_ref().unwrap();
    assert_eq!(uploaded.spheres().len(), MAX_SPHERES);
    assert_eq!(uploaded.lights().len(), MAX_LIGHTS);
    for index in 3..MAX_SPHERES {
        let name = format!("sceneSpheres[{index}]");
        assert_eq!(vec3(backend.uniform(&format!("{name}.position"))), glam::Vec3::ZERO);
        assert_eq!(float(backend.uniform(&format!("{name}.radius"))), 0.0);
        assert_eq!(vec3(backend.uniform(&format!("{name}.mat.albedo"))), glam::Vec3::ONE);
        assert_eq!(float(backend.uniform(&format!("{name}.mat.specularN"))), 50.0);
    }
    for index in 2..MAX_LIGHTS {
        let name = format!("sceneLights[{index}]");
        assert_eq!(vec3(backend.uniform(&format!("{name}.position"))), glam::Vec3::ZERO);
        assert_eq!(vec3(backend.uniform(&format!("{name}.colour"))), glam::Vec3::ZERO);
        assert_eq!(float(backend.uniform(&format!("{name}.brightness"))), 0.0);
    }
}

#[test]
fn oversized_scene_is_truncated_not_rejected() {
    let mut scene = Scene::new();
    scene.spheres = vec![Sphere::default(); MAX_SPHERES + 5];
    let mut orchestrator = orchestrator(scene, 64, 64);
    let mut backend = RecordingBackend::new();

    let report = orchestrator.frame(&mut backend).unwrap();
    assert!(report.marshal.truncated());
    assert_eq!(report.marshal.spheres.written, MAX_SPHERES);
    assert_eq!(
        backend.uniform("numberOfSpheres"),
        UniformValue::Int(MAX_SPHERES as i32)
    );
}

#[test]
fn camera_movement_lands_before_the_frustum() {
    let mut orchestrator = orchestrator(Scene::new(), 1280, 720);
    let mut backend = RecordingBackend::new();

    orchestrator.controller_mut().push_key(VirtualKeyCode::W);
    orchestrator.controller_mut().push_key(VirtualKeyCode::Space);
    orchestrator.frame(&mut backend).unwrap();

    let expected = glam::Vec3::new(9.0, 1.0, 0.0);
    assert_eq!(orchestrator.camera().position, expected);
    assert_eq!(vec3(backend.uniform("eye")), expected);

    orchestrator.frame(&mut backend).unwrap();
    assert_eq!(orchestrator.camera().position, expected);
}

#[test]
fn animation_advances_once_per_frame() {
    let mut scene = Scene::new();
    scene.spheres.push(
        Sphere::new(glam::Vec3::new(3.0, 0.0, 4.0), 1.0, Material::DEFAULT)
            .with_bob(Bob::with_offset(0.0)),
    );
    let mut orchestrator = orchestrator(scene, 320, 240);
    let mut backend = RecordingBackend::new();

    let bob = Bob::with_offset(0.0);
    for frame in 0..4u64 {
        orchestrator.frame(&mut backend).unwrap();
        let position = vec3(backend.uniform("sceneSpheres[0].position"));
        assert_eq!(position.x, 3.0);
        assert_eq!(position.z, 4.0);
        assert!((position.y - bob.height(frame)).abs() < 1e-6);
        assert_eq!(orchestrator.scene().spheres[0].phase(), frame + 1);
    }
}

#[test]
fn backend_failure_is_reported() {
    let mut orchestrator = orchestrator(Scene::new(), 1280, 720);
    let mut backend = RecordingBackend::new();
    backend.fail_dispatch = true;

    match orchestrator.frame(&mut backend) {
        Err(FrameError::Backend(msg)) => assert_eq!(msg, "dispatch rejected"),
        other => panic!("unexpected result: {:?}", other.map(|r| r.frame)),
    }
    assert!(!backend.calls.iter().any(|c| matches!(c, Call::Present(_))));
}

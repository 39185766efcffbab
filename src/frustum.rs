use crate::camera::Camera;
use crate::config::CameraConfig;
use crate::uniforms::{UniformError, UniformSink, CORNER_RAYS, EYE};

/// Normalized device corners, in the order of `CORNER_RAYS`.
pub const NDC_CORNERS: [glam::Vec2; 4] = [
    glam::Vec2::new(-1.0, -1.0),
    glam::Vec2::new(-1.0, 1.0),
    glam::Vec2::new(1.0, -1.0),
    glam::Vec2::new(1.0, 1.0),
];

/// Far plane depth in wgpu's [0, 1] clip space.
const FAR_DEPTH: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Projection {
    pub fn new(fov_y: f32, aspect: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            fov_y,
            aspect,
            z_near,
            z_far,
        }
    }

    pub fn from_config(config: &CameraConfig, width: u32, height: u32) -> Self {
        Self::new(
            config.fov_y_degrees.to_radians(),
            aspect_ratio(width, height),
            config.z_near,
            config.z_far,
        )
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = aspect_ratio(width, height);
    }

    pub fn matrix(&self) -> glam::Mat4 {
        glam::Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far)
    }
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    width as f32 / height.max(1) as f32
}

/// Per-frame view data the kernel needs to build its primary rays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub eye: glam::Vec3,
    pub view: glam::Mat4,
    pub inverse_view_projection: glam::Mat4,
    /// World-space rays through the NDC corners, ordered as `NDC_CORNERS`.
    pub rays: [glam::Vec3; 4],
}

impl Frustum {
    pub fn compute(camera: &Camera, projection: &Projection) -> Self {
        let view = camera.view_matrix();
        let inverse_view_projection = (projection.matrix() * view).inverse();
        let eye = camera.position;
        let rays = NDC_CORNERS.map(|corner| {
            inverse_view_projection.project_point3(corner.extend(FAR_DEPTH)) - eye
        });

        Self {
            eye,
            view,
            inverse_view_projection,
            rays,
        }
    }

    /// Ray through any NDC point, by bilinear interpolation of the corners.
    pub fn interpolate(&self, ndc: glam::Vec2) -> glam::Vec3 {
        let t = (ndc + glam::Vec2::ONE) * 0.5;
        let [ray00, ray01, ray10, ray11] = self.rays;
        let left = ray00.lerp(ray01, t.y);
        let right = ray10.lerp(ray11, t.y);
        left.lerp(right, t.x)
    }

    pub fn upload(&self, sink: &mut dyn UniformSink) -> Result<(), UniformError> {
        sink.set_uniform(EYE, self.eye.into())?;
        for (name, ray) in CORNER_RAYS.iter().zip(self.rays) {
            sink.set_uniform(name, ray.into())?;
        }
        Ok(())
    }
}

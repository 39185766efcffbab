//! Name-addressed uniform state shared with the trace kernel.
//!
//! The kernel sees three uniform buffers: a per-frame block, a fixed-size
//! sphere array and a fixed-size light array. [`UniformBlock`] is the CPU
//! copy of all three. Values are written through [`UniformSink`] using
//! dotted names such as `sceneSpheres[4].mat.albedo`, and the block routes
//! each write to its byte location in the matching `#[repr(C)]` struct.

use std::fmt;

use bytemuck::{Pod, Zeroable};

pub const MAX_SPHERES: usize = 1000;
pub const MAX_LIGHTS: usize = 100;

pub const SPHERE_ARRAY: &str = "sceneSpheres";
pub const LIGHT_ARRAY: &str = "sceneLights";
pub const SPHERE_COUNT: &str = "numberOfSpheres";
pub const LIGHT_COUNT: &str = "numberOfLights";
pub const EYE: &str = "eye";
pub const CORNER_RAYS: [&str; 4] = ["ray00", "ray01", "ray10", "ray11"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(glam::Vec3),
}

impl UniformValue {
    fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec3(_) => UniformKind::Vec3,
        }
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<glam::Vec3> for UniformValue {
    fn from(value: glam::Vec3) -> Self {
        UniformValue::Vec3(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Int,
    Float,
    Vec3,
}

impl fmt::Display for UniformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformKind::Int => write!(f, "int"),
            UniformKind::Float => write!(f, "float"),
            UniformKind::Vec3 => write!(f, "vec3"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum UniformError {
    #[error("no uniform named `{0}`")]
    UnknownName(String),
    #[error("uniform `{name}` is {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: UniformKind,
        found: UniformKind,
    },
    #[error("uniform `{name}` index {index} is outside capacity {capacity}")]
    IndexOutOfRange {
        name: String,
        index: usize,
        capacity: usize,
    },
}

/// Key-value sink for kernel uniforms.
pub trait UniformSink {
    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), UniformError>;
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameBlock {
    pub eye: [f32; 4],
    pub rays: [[f32; 4]; 4],
    pub number_of_spheres: i32,
    pub number_of_lights: i32,
    pub _padding: [i32; 2],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SphereBlock {
    pub position: [f32; 3],
    pub radius: f32,
    pub albedo: [f32; 3],
    pub specular_n: f32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightBlock {
    pub position: [f32; 3],
    pub brightness: f32,
    pub colour: [f32; 3],
    pub _padding: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SphereField {
    Position,
    Radius,
    Albedo,
    SpecularN,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LightField {
    Position,
    Colour,
    Brightness,
}

/// Storage location a uniform name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Eye,
    Ray(usize),
    SphereCount,
    LightCount,
    Sphere(usize, SphereField),
    Light(usize, LightField),
}

impl Location {
    fn kind(&self) -> UniformKind {
        match self {
            Location::Eye | Location::Ray(_) => UniformKind::Vec3,
            Location::SphereCount | Location::LightCount => UniformKind::Int,
            Location::Sphere(_, SphereField::Radius | SphereField::SpecularN) => {
                UniformKind::Float
            }
            Location::Sphere(_, _) => UniformKind::Vec3,
            Location::Light(_, LightField::Brightness) => UniformKind::Float,
            Location::Light(_, _) => UniformKind::Vec3,
        }
    }

    fn parse(name: &str) -> Result<Self, UniformError> {
        let unknown = || UniformError::UnknownName(name.to_owned());

        if name == EYE {
            return Ok(Location::Eye);
        }
        if name == SPHERE_COUNT {
            return Ok(Location::SphereCount);
        }
        if name == LIGHT_COUNT {
            return Ok(Location::LightCount);
        }
        if let Some(corner) = CORNER_RAYS.iter().position(|ray| *ray == name) {
            return Ok(Location::Ray(corner));
        }

        let (array, rest) = name.split_once('[').ok_or_else(unknown)?;
        let (index, field) = rest.split_once("].").ok_or_else(unknown)?;
        let index: usize = index.parse().map_err(|_| unknown())?;

        match array {
            SPHERE_ARRAY => {
                let field = match field {
                    "position" => SphereField::Position,
                    "radius" => SphereField::Radius,
                    "mat.albedo" => SphereField::Albedo,
                    "mat.specularN" => SphereField::SpecularN,
                    _ => return Err(unknown()),
                };
                if index >= MAX_SPHERES {
                    return Err(UniformError::IndexOutOfRange {
                        name: name.to_owned(),
                        index,
                        capacity: MAX_SPHERES,
                    });
                }
                Ok(Location::Sphere(index, field))
            }
            LIGHT_ARRAY => {
                let field = match field {
                    "position" => LightField::Position,
                    "colour" => LightField::Colour,
                    "brightness" => LightField::Brightness,
                    _ => return Err(unknown()),
                };
                if index >= MAX_LIGHTS {
                    return Err(UniformError::IndexOutOfRange {
                        name: name.to_owned(),
                        index,
                        capacity: MAX_LIGHTS,
                    });
                }
                Ok(Location::Light(index, field))
            }
            _ => Err(unknown()),
        }
    }
}

/// CPU staging copy of every uniform the trace kernel reads.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBlock {
    frame: FrameBlock,
    spheres: Vec<SphereBlock>,
    lights: Vec<LightBlock>,
    writes: u64,
}

impl UniformBlock {
    pub fn new() -> Self {
        Self {
            frame: FrameBlock::zeroed(),
            spheres: vec![SphereBlock::zeroed(); MAX_SPHERES],
            lights: vec![LightBlock::zeroed(); MAX_LIGHTS],
            writes: 0,
        }
    }

    pub fn frame(&self) -> &FrameBlock {
        &self.frame
    }

    pub fn spheres(&self) -> &[SphereBlock] {
        &self.spheres
    }

    pub fn lights(&self) -> &[LightBlock] {
        &self.lights
    }

    pub fn frame_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.frame)
    }

    pub fn sphere_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.spheres)
    }

    pub fn light_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.lights)
    }

    /// Number of successful writes since creation.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Read a uniform back by name.
    pub fn get(&self, name: &str) -> Result<UniformValue, UniformError> {
        let value = match Location::parse(name)? {
            Location::Eye => vec3(&self.frame.eye).into(),
            Location::Ray(corner) => vec3(&self.frame.rays[corner]).into(),
            Location::SphereCount => self.frame.number_of_spheres.into(),
            Location::LightCount => self.frame.number_of_lights.into(),
            Location::Sphere(index, field) => {
                let sphere = &self.spheres[index];
                match field {
                    SphereField::Position => vec3(&sphere.position).into(),
                    SphereField::Radius => sphere.radius.into(),
                    SphereField::Albedo => vec3(&sphere.albedo).into(),
                    SphereField::SpecularN => sphere.specular_n.into(),
                }
            }
            Location::Light(index, field) => {
                let light = &self.lights[index];
                match field {
                    LightField::Position => vec3(&light.position).into(),
                    LightField::Colour => vec3(&light.colour).into(),
                    LightField::Brightness => light.brightness.into(),
                }
            }
        };
        Ok(value)
    }
}

impl Default for UniformBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl UniformSink for UniformBlock {
    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), UniformError> {
        let location = Location::parse(name)?;

        match (location, value) {
            (Location::Eye, UniformValue::Vec3(v)) => self.frame.eye = v.extend(1.0).to_array(),
            (Location::Ray(corner), UniformValue::Vec3(v)) => {
                self.frame.rays[corner] = v.extend(0.0).to_array()
            }
            (Location::SphereCount, UniformValue::Int(n)) => self.frame.number_of_spheres = n,
            (Location::LightCount, UniformValue::Int(n)) => self.frame.number_of_lights = n,
            (Location::Sphere(index, SphereField::Position), UniformValue::Vec3(v)) => {
                self.spheres[index].position = v.into()
            }
            (Location::Sphere(index, SphereField::Radius), UniformValue::Float(r)) => {
                self.spheres[index].radius = r
            }
            (Location::Sphere(index, SphereField::Albedo), UniformValue::Vec3(v)) => {
                self.spheres[index].albedo = v.into()
            }
            (Location::Sphere(index, SphereField::SpecularN), UniformValue::Float(s)) => {
                self.spheres[index].specular_n = s
            }
            (Location::Light(index, LightField::Position), UniformValue::Vec3(v)) => {
                self.lights[index].position = v.into()
            }
            (Location::Light(index, LightField::Colour), UniformValue::Vec3(v)) => {
                self.lights[index].colour = v.into()
            }
            (Location::Light(index, LightField::Brightness), UniformValue::Float(b)) => {
                self.lights[index].brightness = b
            }
            (location, value) => {
                return Err(UniformError::TypeMismatch {
                    name: name.to_owned(),
                    expected: location.kind(),
                    found: value.kind(),
                })
            }
        }

        self.writes += 1;
        Ok(())
    }
}

fn vec3(v: &[f32]) -> glam::Vec3 {
    glam::Vec3::new(v[0], v[1], v[2])
}

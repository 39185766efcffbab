//! Packs the scene into the kernel's fixed-capacity uniform arrays.
//!
//! Every frame writes all `MAX_SPHERES` sphere slots and all `MAX_LIGHTS`
//! light slots so the kernel can loop over static bounds. Slots past the
//! live count hold a deterministic default. Scene entries past capacity are
//! dropped without error.

use crate::scene::{Light, Material, Scene, Sphere};
use crate::uniforms::{
    UniformError, UniformSink, LIGHT_ARRAY, LIGHT_COUNT, MAX_LIGHTS, MAX_SPHERES, SPHERE_ARRAY,
    SPHERE_COUNT,
};

/// Outcome of packing one bounded array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackReport {
    /// Live entries written, never more than the capacity.
    pub written: usize,
    /// Whether entries past the capacity were dropped.
    pub truncated: bool,
}

/// A value stored in one slot of a fixed-capacity uniform array.
pub trait Slot: Copy {
    fn empty() -> Self;
    fn write(&self, array: &str, index: usize, sink: &mut dyn UniformSink)
        -> Result<(), UniformError>;
}

/// Fixed-capacity array mirrored into uniforms named `<name>[<i>].<field>`,
/// with its live length published under `count_name`.
#[derive(Debug, Clone)]
pub struct BoundedArray<T: Slot> {
    name: &'static str,
    count_name: &'static str,
    slots: Vec<T>,
    len: usize,
}

impl<T: Slot> BoundedArray<T> {
    pub fn new(name: &'static str, count_name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            count_name,
            slots: vec![T::empty(); capacity],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn slots(&self) -> &[T] {
        &self.slots
    }

    /// Copy live entries into the slots, in order, and reset the rest to
    /// the empty value.
    pub fn pack<I>(&mut self, live: I) -> PackReport
    where
        I: IntoIterator<Item = T>,
    {
        let mut live = live.into_iter();
        let mut written = 0;
        for (slot, value) in self.slots.iter_mut().zip(live.by_ref()) {
            *slot = value;
            written += 1;
        }
        for slot in &mut self.slots[written..] {
            *slot = T::empty();
        }
        self.len = written;

        PackReport {
            written,
            truncated: live.next().is_some(),
        }
    }

    /// Write every slot and the live count into the sink.
    pub fn upload(&self, sink: &mut dyn UniformSink) -> Result<(), UniformError> {
        for (index, slot) in self.slots.iter().enumerate() {
            slot.write(self.name, index, sink)?;
        }
        // Capacities are far below i32::MAX.
        sink.set_uniform(self.count_name, (self.len as i32).into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereSlot {
    pub position: glam::Vec3,
    pub radius: f32,
    pub material: Material,
}

impl SphereSlot {
    /// Snapshot the sphere's position for this frame. Negative radii are
    /// written as zero.
    pub fn of(sphere: &Sphere) -> Self {
        Self {
            position: sphere.position(),
            radius: sphere.radius.max(0.0),
            material: sphere.material,
        }
    }
}

impl Slot for SphereSlot {
    fn empty() -> Self {
        Self {
            position: glam::Vec3::ZERO,
            radius: 0.0,
            material: Material::DEFAULT,
        }
    }

    fn write(
        &self,
        array: &str,
        index: usize,
        sink: &mut dyn UniformSink,
    ) -> Result<(), UniformError> {
        sink.set_uniform(&format!("{array}[{index}].position"), self.position.into())?;
        sink.set_uniform(&format!("{array}[{index}].radius"), self.radius.into())?;
        sink.set_uniform(
            &format!("{array}[{index}].mat.albedo"),
            self.material.albedo.into(),
        )?;
        sink.set_uniform(
            &format!("{array}[{index}].mat.specularN"),
            self.material.specular_n.into(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSlot {
    pub position: glam::Vec3,
    pub colour: glam::Vec3,
    pub brightness: f32,
}

impl From<&Light> for LightSlot {
    fn from(light: &Light) -> Self {
        Self {
            position: light.position,
            colour: light.colour,
            brightness: light.brightness,
        }
    }
}

impl Slot for LightSlot {
    fn empty() -> Self {
        Self {
            position: glam::Vec3::ZERO,
            colour: glam::Vec3::ZERO,
            brightness: 0.0,
        }
    }

    fn write(
        &self,
        array: &str,
        index: usize,
        sink: &mut dyn UniformSink,
    ) -> Result<(), UniformError> {
        sink.set_uniform(&format!("{array}[{index}].position"), self.position.into())?;
        sink.set_uniform(&format!("{array}[{index}].colour"), self.colour.into())?;
        sink.set_uniform(
            &format!("{array}[{index}].brightness"),
            self.brightness.into(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarshalReport {
    pub spheres: PackReport,
    pub lights: PackReport,
}

impl MarshalReport {
    pub fn truncated(&self) -> bool {
        self.spheres.truncated || self.lights.truncated
    }
}

pub struct UniformMarshaler {
    spheres: BoundedArray<SphereSlot>,
    lights: BoundedArray<LightSlot>,
}

impl UniformMarshaler {
    pub fn new() -> Self {
        Self::with_capacity(MAX_SPHERES, MAX_LIGHTS)
    }

    /// Capacities must not exceed the kernel's `MAX_SPHERES`/`MAX_LIGHTS`.
    pub fn with_capacity(max_spheres: usize, max_lights: usize) -> Self {
        Self {
            spheres: BoundedArray::new(SPHERE_ARRAY, SPHERE_COUNT, max_spheres),
            lights: BoundedArray::new(LIGHT_ARRAY, LIGHT_COUNT, max_lights),
        }
    }

    pub fn spheres(&self) -> &BoundedArray<SphereSlot> {
        &self.spheres
    }

    pub fn lights(&self) -> &BoundedArray<LightSlot> {
        &self.lights
    }

    /// Snapshot the scene into the slot arrays and write them to `sink`.
    pub fn marshal(
        &mut self,
        scene: &Scene,
        sink: &mut dyn UniformSink,
    ) -> Result<MarshalReport, UniformError> {
        let report = MarshalReport {
            spheres: self.spheres.pack(scene.spheres.iter().map(SphereSlot::of)),
            lights: self.lights.pack(scene.lights.iter().map(LightSlot::from)),
        };

        self.lights.upload(sink)?;
        self.spheres.upload(sink)?;

        tracing::trace!(
            spheres = report.spheres.written,
            lights = report.lights.written,
            "marshaled scene"
        );
        Ok(report)
    }
}

impl Default for UniformMarshaler {
    fn default() -> Self {
        Self::new()
    }
}

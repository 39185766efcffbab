use rand::Rng;

use crate::config::SceneConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub albedo: glam::Vec3,
    pub specular_n: f32,
}

impl Material {
    pub const DEFAULT: Material = Material {
        albedo: glam::Vec3::ONE,
        specular_n: 50.0,
    };

    pub fn new(albedo: glam::Vec3, specular_n: f32) -> Self {
        Self { albedo, specular_n }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Vertical sine motion: `y = amplitude * sin(phase / rate + offset)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bob {
    pub amplitude: f32,
    pub rate: f32,
    pub offset: f32,
}

impl Bob {
    pub const AMPLITUDE: f32 = 2.0;
    pub const RATE: f32 = 40.0;

    pub fn with_offset(offset: f32) -> Self {
        Self {
            amplitude: Self::AMPLITUDE,
            rate: Self::RATE,
            offset,
        }
    }

    pub fn height(&self, phase: u64) -> f32 {
        self.amplitude * (phase as f32 / self.rate + self.offset).sin()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sphere {
    base_position: glam::Vec3,
    pub radius: f32,
    pub material: Material,
    bob: Option<Bob>,
    phase: u64,
}

impl Sphere {
    pub fn new(position: glam::Vec3, radius: f32, material: Material) -> Self {
        Self {
            base_position: position,
            radius,
            material,
            bob: None,
            phase: 0,
        }
    }

    pub fn with_bob(mut self, bob: Bob) -> Self {
        self.bob = Some(bob);
        self
    }

    /// Position at the current phase. Reading it has no side effects.
    pub fn position(&self) -> glam::Vec3 {
        match self.bob {
            Some(bob) => glam::Vec3::new(
                self.base_position.x,
                bob.height(self.phase),
                self.base_position.z,
            ),
            None => self.base_position,
        }
    }

    pub fn set_position(&mut self, position: glam::Vec3) {
        self.base_position = position;
    }

    pub fn phase(&self) -> u64 {
        self.phase
    }

    fn advance(&mut self) {
        self.phase = self.phase.wrapping_add(1);
    }
}

impl Default for Sphere {
    fn default() -> Self {
        Self::new(glam::Vec3::ZERO, 0.5, Material::DEFAULT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub position: glam::Vec3,
    pub colour: glam::Vec3,
    pub brightness: f32,
}

impl Light {
    pub fn new(position: glam::Vec3, colour: glam::Vec3, brightness: f32) -> Self {
        Self {
            position,
            colour,
            brightness,
        }
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    pub spheres: Vec<Sphere>,
    pub lights: Vec<Light>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step every sphere's animation by one frame.
    pub fn advance(&mut self) {
        for sphere in &mut self.spheres {
            sphere.advance();
        }
    }

    /// Fill a scene with randomly placed spheres and lights.
    pub fn populate<R: Rng>(config: &SceneConfig, rng: &mut R) -> Self {
        let mut scene = Self::new();

        for _ in 0..config.spheres {
            let position = random_in_cube(rng, config.sphere_spread);
            let radius = (rng.gen::<f32>() + 0.4) * 0.5;
            let offset = rng.gen_range(0..100) as f32;
            scene.spheres.push(
                Sphere::new(position, radius, Material::DEFAULT).with_bob(Bob::with_offset(offset)),
            );
        }

        for _ in 0..config.lights {
            let position = random_in_cube(rng, config.light_spread);
            let colour = glam::Vec3::new(rng.gen(), rng.gen(), rng.gen());
            let brightness = (rng.gen::<f32>() + 5.0) * 3.0;
            scene.lights.push(Light::new(position, colour, brightness));
        }

        if config.overhead_light {
            scene.lights.push(Light::new(
                glam::Vec3::new(0.0, 200.0, 0.0),
                glam::Vec3::ONE,
                2000.0,
            ));
        }

        scene
    }
}

fn random_in_cube<R: Rng>(rng: &mut R, spread: f32) -> glam::Vec3 {
    let half = spread / 2.0;
    glam::Vec3::new(
        rng.gen::<f32>() * spread - half,
        rng.gen::<f32>() * spread - half,
        rng.gen::<f32>() * spread - half,
    )
}

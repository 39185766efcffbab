use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top level configuration, usually loaded from a YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub scene: SceneConfig,
    #[serde(default = "default_shader_dir")]
    pub shader_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_title")]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_position")]
    pub position: [f32; 3],
    #[serde(default = "default_direction")]
    pub direction: [f32; 3],
    #[serde(default = "default_up")]
    pub up: [f32; 3],
    #[serde(default = "default_fov_y")]
    pub fov_y_degrees: f32,
    /// Near plane used for ray unprojection.
    #[serde(default = "default_z_near")]
    pub z_near: f32,
    /// Far plane used for ray unprojection.
    #[serde(default = "default_z_far")]
    pub z_far: f32,
    /// World units per movement key event.
    #[serde(default = "default_movement_speed")]
    pub movement_speed: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneConfig {
    #[serde(default = "default_spheres")]
    pub spheres: usize,
    #[serde(default = "default_lights")]
    pub lights: usize,
    #[serde(default = "default_sphere_spread")]
    pub sphere_spread: f32,
    #[serde(default = "default_light_spread")]
    pub light_spread: f32,
    /// Fixed seed for a reproducible scene. Random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_overhead_light")]
    pub overhead_light: bool,
}

fn default_shader_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/asset/shader"))
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_title() -> String {
    "sphere-tracer".to_owned()
}

fn default_position() -> [f32; 3] {
    [10.0, 0.0, 0.0]
}

fn default_direction() -> [f32; 3] {
    [-1.0, 0.0, 0.0]
}

fn default_up() -> [f32; 3] {
    [0.0, 1.0, 0.0]
}

fn default_fov_y() -> f32 {
    60.0
}

fn default_z_near() -> f32 {
    1.0
}

fn default_z_far() -> f32 {
    2.0
}

fn default_movement_speed() -> f32 {
    1.0
}

fn default_spheres() -> usize {
    3
}

fn default_lights() -> usize {
    1
}

fn default_sphere_spread() -> f32 {
    10.0
}

fn default_light_spread() -> f32 {
    5.0
}

fn default_overhead_light() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            camera: CameraConfig::default(),
            scene: SceneConfig::default(),
            shader_dir: default_shader_dir(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: default_position(),
            direction: default_direction(),
            up: default_up(),
            fov_y_degrees: default_fov_y(),
            z_near: default_z_near(),
            z_far: default_z_far(),
            movement_speed: default_movement_speed(),
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            spheres: default_spheres(),
            lights: default_lights(),
            sphere_spread: default_sphere_spread(),
            light_spread: default_light_spread(),
            seed: None,
            overhead_light: default_overhead_light(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be positive, got {}x{}",
                self.window.width, self.window.height
            )));
        }

        let camera = &self.camera;
        if !(camera.fov_y_degrees > 0.0 && camera.fov_y_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "fov_y_degrees must be in (0, 180), got {}",
                camera.fov_y_degrees
            )));
        }
        if !(camera.z_near > 0.0 && camera.z_near.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "z_near must be positive, got {}",
                camera.z_near
            )));
        }
        if !(camera.z_far > camera.z_near && camera.z_far.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "z_far ({}) must be greater than z_near ({})",
                camera.z_far, camera.z_near
            )));
        }

        let direction = glam::Vec3::from_array(camera.direction);
        let up = glam::Vec3::from_array(camera.up);
        if !direction.is_finite() || !up.is_finite() {
            return Err(ConfigError::Invalid(
                "camera direction and up must be finite".to_owned(),
            ));
        }
        if direction.length_squared() == 0.0 || up.length_squared() == 0.0 {
            return Err(ConfigError::Invalid(
                "camera direction and up must be non-zero".to_owned(),
            ));
        }
        if !glam::Vec3::from_array(camera.position).is_finite() {
            return Err(ConfigError::Invalid(
                "camera position must be finite".to_owned(),
            ));
        }
        if !camera.movement_speed.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "movement_speed must be finite, got {}",
                camera.movement_speed
            )));
        }
        if direction.normalize().cross(up.normalize()).length_squared() < 1e-8 {
            return Err(ConfigError::Invalid(
                "camera direction must not be parallel to up".to_owned(),
            ));
        }

        Ok(())
    }
}

/// Load and validate configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_yaml::from_str(&content)?;
    config.validate()?;

    Ok(config)
}

use winit::event::{ElementState, KeyboardInput, VirtualKeyCode, WindowEvent};

use crate::config::CameraConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: glam::Vec3,
    pub direction: glam::Vec3,
    pub up: glam::Vec3,
}

impl Camera {
    pub fn new(position: glam::Vec3, direction: glam::Vec3, up: glam::Vec3) -> Self {
        Self {
            position,
            direction,
            up,
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(
            glam::Vec3::from_array(config.position),
            glam::Vec3::from_array(config.direction),
            glam::Vec3::from_array(config.up),
        )
    }

    /// Point the camera looks at, one direction step ahead of the eye.
    pub fn target(&self) -> glam::Vec3 {
        self.position + self.direction
    }

    pub fn view_matrix(&self) -> glam::Mat4 {
        glam::Mat4::look_at_rh(self.position, self.target(), self.up)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}

/// Turns movement keys into position deltas.
///
/// Deltas are queued while events arrive and applied in one go by
/// [`CameraController::apply`], so movement always lands at the same
/// point of the frame.
#[derive(Debug, Default)]
pub struct CameraController {
    pub speed: f32,
    pending: Vec<glam::Vec3>,
}

impl CameraController {
    pub fn new(speed: f32) -> Self {
        Self {
            speed,
            pending: Vec::new(),
        }
    }

    /// Unit world-space direction bound to a movement key.
    pub fn movement_for(keycode: VirtualKeyCode) -> Option<glam::Vec3> {
        match keycode {
            VirtualKeyCode::W | VirtualKeyCode::Up => Some(glam::Vec3::NEG_X),
            VirtualKeyCode::S | VirtualKeyCode::Down => Some(glam::Vec3::X),
            VirtualKeyCode::A | VirtualKeyCode::Left => Some(glam::Vec3::Z),
            VirtualKeyCode::D | VirtualKeyCode::Right => Some(glam::Vec3::NEG_Z),
            VirtualKeyCode::Space | VirtualKeyCode::Z => Some(glam::Vec3::Y),
            VirtualKeyCode::LShift | VirtualKeyCode::X => Some(glam::Vec3::NEG_Y),
            _ => None,
        }
    }

    pub fn push_key(&mut self, keycode: VirtualKeyCode) -> bool {
        match Self::movement_for(keycode) {
            Some(direction) => {
                self.pending.push(direction * self.speed);
                true
            }
            None => false,
        }
    }

    pub fn process_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state: ElementState::Pressed,
                        virtual_keycode: Some(keycode),
                        ..
                    },
                ..
            } => {
                let moved = self.push_key(*keycode);
                if moved {
                    tracing::trace!(?keycode, "queued camera movement");
                }
                moved
            }
            _ => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Apply and clear every queued delta. Returns the total offset applied.
    pub fn apply(&mut self, camera: &mut Camera) -> glam::Vec3 {
        let offset = self
            .pending
            .drain(..)
            .fold(glam::Vec3::ZERO, |acc, delta| acc + delta);
        camera.position += offset;
        offset
    }
}

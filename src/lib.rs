pub mod application;
pub mod backend;
pub mod camera;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod frustum;
pub mod kernel;
pub mod marshal;
pub mod orchestrator;
pub mod presentation;
pub mod renderer;
pub mod scene;
pub mod surface;
pub mod uniforms;

pub mod camera;
pub mod cli;
pub mod config;
pub mod culling;
pub mod draw;
pub mod headless;
pub mod light;
pub mod renderer;
pub mod shader_params;

pub use renderer::{ForwardRenderer, MAX_VISIBLE_LIGHTS};

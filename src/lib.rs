//! Configurable multi-stage wgpu render pipeline: deferred shading, light
//! volumes, SSAO, bloom, point and directional shadows, and image-based
//! lighting from a precomputed environment.

pub mod assets;
pub mod bloom;
pub mod camera;
pub mod config;
pub mod deferred;
pub mod engine;
pub mod environment;
pub mod error;
pub mod geometry;
pub mod input;
pub mod logging;
pub mod pipeline;
pub mod renderer;
pub mod scene;
pub mod shadow;
pub mod ssao;
pub mod window;

pub use config::PipelineConfig;
pub use error::{RenderError, RenderResult};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use scene::{Scene, SceneAction};

/// Default environment map used by the IBL presets when no config is given.
pub const DEFAULT_HDR: &str = "assets/environment.hdr";

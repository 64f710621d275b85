//! Screen-space ambient occlusion over the G-Buffer.

pub mod kernel;
pub mod pass;

pub use kernel::{OcclusionQuery, generate_kernel, generate_noise, visibility};
pub use pass::SsaoPass;

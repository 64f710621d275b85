//! Central error type for the render pipeline.
//!
//! Every startup failure funnels into [`RenderError`] so the entry point can
//! log it once and exit with a failure code.

use std::path::PathBuf;

/// Categorized renderer failure.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("window error: {0}")]
    Window(String),

    #[error("no suitable GPU adapter: {0}")]
    Adapter(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("surface error: {0}")]
    Surface(String),

    /// Shader module or render pipeline failed validation.
    #[error("program `{label}` failed to link: {reason}")]
    Program { label: String, reason: String },

    /// A typed parameter block does not match the layout it is bound against.
    #[error("parameter block `{label}`: {reason}")]
    ParamLayout { label: String, reason: String },

    #[error("framebuffer `{label}` incomplete: {reason}")]
    FramebufferIncomplete { label: String, reason: String },

    /// Storage resize requested on a target that does not allow it.
    #[error("invalid storage operation on `{label}`: {reason}")]
    InvalidStorage { label: String, reason: String },

    #[error("failed to load asset {path:?}: {reason}")]
    Asset { path: PathBuf, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("pipeline stage order: {0}")]
    PipelineOrder(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub fn window<T: ToString>(msg: T) -> Self {
        RenderError::Window(msg.to_string())
    }

    pub fn adapter<T: ToString>(msg: T) -> Self {
        RenderError::Adapter(msg.to_string())
    }

    pub fn device<T: ToString>(msg: T) -> Self {
        RenderError::Device(msg.to_string())
    }

    pub fn surface<T: ToString>(msg: T) -> Self {
        RenderError::Surface(msg.to_string())
    }

    pub fn program<L: ToString, T: ToString>(label: L, reason: T) -> Self {
        RenderError::Program { label: label.to_string(), reason: reason.to_string() }
    }

    pub fn param_layout<L: ToString, T: ToString>(label: L, reason: T) -> Self {
        RenderError::ParamLayout { label: label.to_string(), reason: reason.to_string() }
    }

    pub fn incomplete<L: ToString, T: ToString>(label: L, reason: T) -> Self {
        RenderError::FramebufferIncomplete { label: label.to_string(), reason: reason.to_string() }
    }

    pub fn storage<L: ToString, T: ToString>(label: L, reason: T) -> Self {
        RenderError::InvalidStorage { label: label.to_string(), reason: reason.to_string() }
    }

    pub fn asset<P: Into<PathBuf>, T: ToString>(path: P, reason: T) -> Self {
        RenderError::Asset { path: path.into(), reason: reason.to_string() }
    }

    pub fn config<T: ToString>(msg: T) -> Self {
        RenderError::Config(msg.to_string())
    }

    pub fn order<T: ToString>(msg: T) -> Self {
        RenderError::PipelineOrder(msg.to_string())
    }

    /// Short category tag used in log lines.
    pub fn category(&self) -> &'static str {
        match self {
            RenderError::Window(_) => "Window",
            RenderError::Adapter(_) => "Adapter",
            RenderError::Device(_) => "Device",
            RenderError::Surface(_) => "Surface",
            RenderError::Program { .. } => "Program",
            RenderError::ParamLayout { .. } => "Params",
            RenderError::FramebufferIncomplete { .. } => "Framebuffer",
            RenderError::InvalidStorage { .. } => "Storage",
            RenderError::Asset { .. } => "Asset",
            RenderError::Config(_) => "Config",
            RenderError::PipelineOrder(_) => "Pipeline",
            RenderError::Io(_) => "IO",
        }
    }
}

/// Result type alias for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_message_names_the_framebuffer() {
        let e = RenderError::incomplete("gbuffer", "size mismatch");
        assert_eq!(e.to_string(), "framebuffer `gbuffer` incomplete: size mismatch");
        assert_eq!(e.category(), "Framebuffer");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: RenderError = io.into();
        assert_eq!(e.category(), "IO");
    }
}

//! Deferred shading: the G-Buffer geometry pass, the full-screen lighting
//! pass, point-light volumes and light markers.

pub mod gbuffer;
pub mod light;
pub mod light_volume;
pub mod lighting;

pub use gbuffer::{GBufferTargets, GeometryPass};
pub use light::{Light, MAX_LIGHTS};
pub use light_volume::{LightMarkers, LightVolumes};
pub use lighting::{HdrTargets, LightingPass};

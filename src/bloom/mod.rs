//! Bloom: a ping-pong Gaussian over the bright target, and the exposure
//! composite that puts the final image on the display.

pub mod pass;
pub mod pingpong;

pub use pass::{BloomPass, CompositePass};
pub use pingpong::{BlurSource, BlurStep, GAUSSIAN_WEIGHTS, PingPong};

//! Omnidirectional shadows from a moving point light inside a room.

use anyhow::Context;

use lightpass::engine::{self, EXIT_STARTUP_FAILURE};
use lightpass::logging::{LoggingConfig, init_logging};
use lightpass::scene::demos::ShadowRoom;
use lightpass::PipelineConfig;

fn try_main() -> anyhow::Result<i32> {
    let config = PipelineConfig::from_args_or(PipelineConfig::point_shadows()).context("loading point_shadows config")?;
    Ok(engine::run(config, Box::new(ShadowRoom::new())))
}

fn main() {
    init_logging(LoggingConfig::default());
    let code = try_main().unwrap_or_else(|e| {
        log::error!("{e:#}");
        EXIT_STARTUP_FAILURE
    });
    std::process::exit(code);
}

//! Deferred shading with 32 orbiting point lights accumulated through light volumes.

use anyhow::Context;

use lightpass::engine::{self, EXIT_STARTUP_FAILURE};
use lightpass::logging::{LoggingConfig, init_logging};
use lightpass::scene::demos::LightField;
use lightpass::PipelineConfig;

fn try_main() -> anyhow::Result<i32> {
    let config = PipelineConfig::from_args_or(PipelineConfig::deferred()).context("loading deferred config")?;
    Ok(engine::run(config, Box::new(LightField::new())))
}

fn main() {
    init_logging(LoggingConfig::default());
    let code = try_main().unwrap_or_else(|e| {
        log::error!("{e:#}");
        EXIT_STARTUP_FAILURE
    });
    std::process::exit(code);
}

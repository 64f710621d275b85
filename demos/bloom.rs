//! HDR bloom over four bright point lights.

use anyhow::Context;

use lightpass::engine::{self, EXIT_STARTUP_FAILURE};
use lightpass::logging::{LoggingConfig, init_logging};
use lightpass::scene::demos::BrightLights;
use lightpass::PipelineConfig;

fn try_main() -> anyhow::Result<i32> {
    let config = PipelineConfig::from_args_or(PipelineConfig::bloom()).context("loading bloom config")?;
    Ok(engine::run(config, Box::new(BrightLights::new())))
}

fn main() {
    init_logging(LoggingConfig::default());
    let code = try_main().unwrap_or_else(|e| {
        log::error!("{e:#}");
        EXIT_STARTUP_FAILURE
    });
    std::process::exit(code);
}

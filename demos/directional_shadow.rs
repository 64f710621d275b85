//! Orthographic shadow map from a single sun light.

use anyhow::Context;

use lightpass::engine::{self, EXIT_STARTUP_FAILURE};
use lightpass::logging::{LoggingConfig, init_logging};
use lightpass::scene::demos::SunlitFloor;
use lightpass::PipelineConfig;

fn try_main() -> anyhow::Result<i32> {
    let config = PipelineConfig::from_args_or(PipelineConfig::directional_shadow()).context("loading directional_shadow config")?;
    Ok(engine::run(config, Box::new(SunlitFloor::new())))
}

fn main() {
    init_logging(LoggingConfig::default());
    let code = try_main().unwrap_or_else(|e| {
        log::error!("{e:#}");
        EXIT_STARTUP_FAILURE
    });
    std::process::exit(code);
}

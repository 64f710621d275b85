use anyhow::Context;

use lightpass::engine::{self, EXIT_STARTUP_FAILURE};
use lightpass::logging::{LoggingConfig, init_logging};
use lightpass::scene::demos;
use lightpass::PipelineConfig;

fn try_main() -> anyhow::Result<i32> {
    let config = PipelineConfig::from_args_or(PipelineConfig::deferred()).context("loading pipeline config")?;
    let scene = demos::for_config(&config);
    Ok(engine::run(config, scene))
}

fn main() {
    init_logging(LoggingConfig::default());
    let code = match try_main() {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            EXIT_STARTUP_FAILURE
        }
    };
    std::process::exit(code);
}

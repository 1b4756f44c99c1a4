mod api;
mod models;

use log::info;
use models::config::Config;
use models::context::Context;
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use std::sync::Arc;

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    TermLogger::init(
        config.log_level_filter()?,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let context = Arc::new(Context::new(config));

    let sweep_interval = context.config().cache().sweep_interval();
    let _sweepers = context.movie_client().spawn_cache_sweeper(sweep_interval);
    info!("Sweeping expired cache entries every {:?}", sweep_interval);

    let _ = api::build_rocket(context).launch().await?;
    Ok(())
}

#![cfg(not(tarpaulin_include))]

use dotenv::dotenv;
use env_logger::Env;

use tracker::app;
use tracker::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    log::info!(
        "Starting tracker with {:?} store, {:?} ids",
        config.store,
        config.id_strategy
    );

    // Start the web application
    app::run(config).await?;

    Ok(())
}

mod api;
mod backup;
mod characters;
mod config;
mod entity;
mod errors;
mod items;
mod lockfile;
mod overlay;
mod records;
mod spawner;
mod tuning;
mod world;

use config::AppConfig;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env();
    log::info!(
        "starting nightswarm v{} (base config: {})",
        env!("CARGO_PKG_VERSION"),
        config.characters_base_path.display()
    );

    if let Err(err) = api::serve(config).await {
        log::error!("fatal: {}", err.message());
        std::process::exit(1);
    }
}

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use geocore::config::Config;
use geocore::core::GeoCore;
use geocore::generator::RandomGenerator;
use geocore::http::AppState;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "geocore-server", about = "Concurrent spatial index service")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    geocore::logging::init(config.geo_log.as_deref()).context("initializing logging")?;

    let bind_addr = config.bind_addr.clone();
    let port = config.port;

    let core = Arc::new(
        GeoCore::bootstrap(&config, Box::new(RandomGenerator::default()))
            .context("bootstrapping spatial index")?,
    );

    log::info!("geocore listening on {bind_addr}:{port}");

    let state = web::Data::new(AppState {
        core: Arc::clone(&core),
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .configure(geocore::http::configure)
    })
    .bind((bind_addr.as_str(), port))?
    .run()
    .await?;

    core.shutdown();
    Ok(())
}

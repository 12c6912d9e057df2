use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use splitledger::config::Config;
use splitledger::routes;
use splitledger::store::Store;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().map_err(std::io::Error::other)?;
    let store = Store::connect(&config)
        .await
        .map_err(std::io::Error::other)?;
    info!(database = %config.database, "connected to the document store");

    let bind_addr = config.bind_addr.clone();
    info!(%bind_addr, "starting server");
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(config.clone()))
            .configure(routes::configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}

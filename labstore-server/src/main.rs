//! Lab service entry point.
//!
//! Loads `.env`, starts the HTTP server and connects the data-access layer. The database is
//! connected after the listener is bound; requests that reach the data layer before then
//! fail with a connection error.

use std::io;

use actix_web::{App, HttpServer, middleware, web};
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};

use labstore::{config::DatabaseConfig, database::Database};
use labstore_server::{config::ServerConfig, routes};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let server_config = ServerConfig::from_env().map_err(to_io_error)?;
    let database_config = DatabaseConfig::from_env().map_err(to_io_error)?;
    let database = web::Data::new(Database::new());

    let app_data = database.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_data.clone())
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind(server_config.bind_address())?
    .run();

    info!("Server is running at {}", server_config.public_url());

    if let Err(err) = labstore::initialize(&database, &database_config, || {
        info!("Connected to database successfully");
    })
    .await
    {
        error!("Database connection failed: {err}");
        server.handle().stop(true).await;
        return Err(to_io_error(err));
    }

    let result = server.await;

    if let Err(err) = database.shutdown().await {
        error!("Database shutdown failed: {err}");
    }

    result
}

fn to_io_error(err: labstore::error::DbError) -> io::Error {
    io::Error::other(err.to_string())
}

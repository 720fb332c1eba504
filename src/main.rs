use std::process;

use blog::config::Config;
use blog::logging;

#[rocket::main]
async fn main() {
    logging::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("invalid configuration: {}", e);
            process::exit(1);
        }
    };

    tracing::info!(address = %config.address, port = config.port, "starting blog service");
    if let Err(e) = blog::rocket(config).launch().await {
        tracing::error!("server stopped: {}", e);
        process::exit(1);
    }
}

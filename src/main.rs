use dotenvy::dotenv;
use invoice_service::config::AppConfig;
use invoice_service::{build_server, create_pool, run_migrations, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;

    let pool = create_pool(&config.database_url, config.db_pool_size)
        .map_err(std::io::Error::other)?;
    run_migrations(&pool).map_err(std::io::Error::other)?;

    let state = AppState::from_config(&config, pool)?;

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(state, &config.host, config.port)?.await
}

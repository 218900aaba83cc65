use std::{error::Error, sync::Arc};

use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use tokio::{fs, net, task};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use event_ticketing::{auth, config, db, http, reservation, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = fs::read_to_string("config.toml").await?;
    let config = toml::from_str::<Config>(&config)?;

    let store: Arc<dyn db::Store> = match &config.db {
        config::Db::Postgres { url } => {
            let (db_client, db_connection) = db::connect(url).await?;

            task::spawn(async move {
                if let Err(e) = db_connection.await {
                    panic!("database connection failed: {e}");
                }
            });

            db_client.migrate().await?;
            info!("connected to postgres");
            Arc::new(db_client)
        }
        config::Db::Memory => {
            info!("using in-memory storage");
            Arc::new(db::Memory::new())
        }
    };

    let allowed_origins = config
        .http
        .cors
        .allowed_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_origin(allowed_origins);

    let app = http::router(Arc::new(http::AppState {
        coordinator: reservation::Coordinator::new(store),
        verifier: auth::Verifier::new(
            config.jwt.secret.as_bytes(),
            config.jwt.expiration_time,
        ),
    }))
    .layer(cors);

    let listener = net::TcpListener::bind(config.http.server.addr).await?;
    info!("listening on {}", config.http.server.addr);
    axum::serve(listener, app).await?;

    Ok(())
}

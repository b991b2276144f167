use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use taskbox::{create_app, db, token::TokenService, ApiKeys, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("TASKBOX_PORT")
        .expect("TASKBOX_PORT to be set")
        .parse()
        .expect("port number");

    let db_path = std::env::var("TASKBOX_DB_PATH").unwrap_or_else(|_| "tasks.db".to_string());

    let jwt_secret = std::env::var("TASKBOX_JWT_SECRET").expect("TASKBOX_JWT_SECRET to be set");

    let token_ttl_days: u64 = std::env::var("TASKBOX_TOKEN_TTL_DAYS")
        .ok()
        .map(|v| v.parse().expect("token TTL in days"))
        .unwrap_or(7);

    let client_id = std::env::var("TASKBOX_CLIENT_ID").expect("TASKBOX_CLIENT_ID to be set");
    let client_secret =
        std::env::var("TASKBOX_CLIENT_SECRET").expect("TASKBOX_CLIENT_SECRET to be set");

    let db = db::init_db(&db_path).expect("initializing database");

    let state = AppState {
        db,
        tokens: TokenService::new(
            &jwt_secret,
            Duration::from_secs(token_ttl_days * 24 * 60 * 60),
        ),
        api_keys: Arc::new(ApiKeys {
            client_id,
            client_secret,
        }),
    };

    let app = create_app(state);
    let addr = (Ipv4Addr::UNSPECIFIED, port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to port");

    info!("running on {addr:?}");

    axum::serve(listener, app).await.expect("failed serving");
}

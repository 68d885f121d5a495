//! HTTP server implementation

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use super::handlers::{
    create_tweet, delete_tweet, feed, follow, followers, following, get_tweet, like, login,
    profile, sign_up, stats, unfollow, unlike, update_email, update_name, update_password,
    AppState,
};

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/users", post(sign_up))
        .route("/users/login", post(login))
        .route("/profile", get(profile))
        .route("/password", put(update_password))
        .route("/email", put(update_email))
        .route("/name", put(update_name))
        .route("/followers", get(followers))
        .route("/following", get(following))
        .route("/follow", post(follow))
        .route("/unfollow", delete(unfollow))
        .route("/tweet", post(create_tweet))
        .route("/tweet/:id", get(get_tweet).delete(delete_tweet))
        .route("/like", post(like))
        .route("/unlike", delete(unlike))
        .route("/feed", get(feed))
        .route("/stats", get(stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until the state's shutdown token fires
pub async fn run_web_server(addr: &str, state: AppState) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP interface available at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("HTTP interface stopped");
    Ok(())
}

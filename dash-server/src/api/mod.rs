pub(crate) mod command_log;
pub(crate) mod guild_config;
pub(crate) mod guilds;
pub(crate) mod health;
pub(crate) mod oauth;
pub(crate) mod stats;

use crate::state::AppState;
use axum::Router;

/// Combines all API routes into a single router
pub(super) fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api", dashboard_routes())
}

fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .merge(oauth::router())
        .merge(guilds::router())
        .merge(guild_config::router())
        .merge(stats::router())
        .merge(command_log::router())
}

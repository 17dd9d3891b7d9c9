use utoipa::OpenApi;

pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const AUTH_TAG: &str = "Auth API";
pub(crate) const GUILD_TAG: &str = "Guild API";
pub(crate) const INGEST_TAG: &str = "Ingest API";

#[derive(OpenApi)]
#[openapi(
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = AUTH_TAG, description = "OAuth login flow and session endpoints"),
        (name = GUILD_TAG, description = "Guild listing, structure and settings endpoints"),
        (name = INGEST_TAG, description = "Stats and command-log endpoints"),
    ),
    info(
        title = "Guild Dashboard API",
        description = "Stateless dashboard backend for a Discord bot",
        version = "1.0.0"
    )
)]
pub(crate) struct ApiDoc;

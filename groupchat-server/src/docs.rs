use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{auth, playlists, schemas, serialized, sms};

#[derive(OpenApi)]
#[openapi(
    paths(
        sms::inbound_sms,
        auth::authorize,
        auth::login,
        auth::logout,
        auth::host,
        auth::link_phone,
        playlists::list_playlists,
        playlists::create_playlist,
        playlists::delete_playlist,
        playlists::activate_playlist,
    ),
    components(schemas(
        schemas::InboundSmsSchema,
        schemas::PhoneSchema,
        schemas::NewPlaylistSchema,
        serialized::Host,
        serialized::LoginResult,
        serialized::Playlist,
    )),
    modifiers(&Security),
    info(
        description = "groupchat-server exposes endpoints for hosts to manage their playlists, and a webhook for inbound text messages"
    ))
]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

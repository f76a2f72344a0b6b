use axum::{
    extract::Path,
    routing::{delete, get, post},
    Json,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{NewPlaylistSchema, ValidatedJson},
    serialized::{Playlist, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/playlists",
    tag = "playlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Playlist>)
    )
)]
async fn list_playlists(session: Session, context: ServerContext) -> ServerResult<Json<Vec<Playlist>>> {
    let playlists = context.collab.playlists.list(&session.host().id).await?;

    Ok(Json(playlists.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/playlists",
    tag = "playlists",
    request_body = NewPlaylistSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist),
        (status = 409, description = "The key is taken"),
        (status = 502, description = "The music provider refused to create the playlist")
    )
)]
async fn create_playlist(
    session: Session,
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<NewPlaylistSchema>,
) -> ServerResult<Json<Playlist>> {
    let mut host = session.host();
    let playlist = context
        .collab
        .playlists
        .create(&mut host, &body.title, &body.key)
        .await?;

    Ok(Json(playlist.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/playlists/{id}",
    tag = "playlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Playlist was deleted, it stays on the music provider"),
        (status = 403, description = "The playlist belongs to another host")
    )
)]
async fn delete_playlist(
    session: Session,
    context: ServerContext,
    Path(playlist_id): Path<String>,
) -> ServerResult<()> {
    context
        .collab
        .playlists
        .delete(&session.host().id, &playlist_id)
        .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/playlists/{id}/activate",
    tag = "playlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist)
    )
)]
async fn activate_playlist(
    session: Session,
    context: ServerContext,
    Path(playlist_id): Path<String>,
) -> ServerResult<Json<Playlist>> {
    let playlist = context
        .collab
        .playlists
        .activate(&session.host(), &playlist_id)
        .await?;

    Ok(Json(playlist.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_playlists))
        .route("/", post(create_playlist))
        .route("/:id", delete(delete_playlist))
        .route("/:id/activate", post(activate_playlist))
}

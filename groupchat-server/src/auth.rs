use axum::{
    async_trait, debug_handler,
    extract::{FromRequestParts, Query},
    http::{header, request::Parts, StatusCode},
    response::Redirect,
    routing::{get, post, put},
    Json,
};
use groupchat_collab::{HostData, SessionData};

use crate::{
    errors::ServerResult,
    schemas::{LoginQuery, PhoneSchema, ValidatedJson},
    serialized::{Host, LoginResult, ToSerialized},
    Router, ServerContext,
};

/// Wraps [SessionData] so [FromRequestParts] can be implemented for it
pub struct Session(SessionData);

impl Session {
    /// Returns the host of the session
    pub fn host(&self) -> HostData {
        self.0.host.clone()
    }

    pub fn token(&self) -> &str {
        &self.0.token
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))?;

        let parts: Vec<_> = token.split_ascii_whitespace().collect();

        if parts.first() != Some(&"Bearer") {
            return Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer"));
        }

        let token = parts.last().cloned().unwrap_or_default();

        let session = state
            .collab
            .auth
            .session(token)
            .await
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Session does not exist"))?;

        Ok(Self(session))
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/authorize",
    tag = "auth",
    responses(
        (status = 303, description = "Redirects to the music provider's consent page")
    )
)]
async fn authorize(context: ServerContext) -> Redirect {
    Redirect::to(&context.collab.auth.authorization_url())
}

#[utoipa::path(
    get,
    path = "/v1/auth/login",
    tag = "auth",
    params(LoginQuery),
    responses(
        (status = 200, body = LoginResult),
        (status = 401, description = "The provider refused the code")
    )
)]
async fn login(
    context: ServerContext,
    Query(query): Query<LoginQuery>,
) -> ServerResult<Json<LoginResult>> {
    let session = context.collab.auth.login(&query.code).await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Session was deleted")
    )
)]
async fn logout(session: Session, context: ServerContext) -> ServerResult<()> {
    context.collab.auth.logout(session.token()).await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/auth/host",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Host)
    )
)]
#[debug_handler(state = ServerContext)]
async fn host(session: Session) -> Json<Host> {
    Json(session.host().to_serialized())
}

#[utoipa::path(
    put,
    path = "/v1/auth/phone",
    tag = "auth",
    request_body = PhoneSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Host),
        (status = 400, description = "Not an E.164 phone number"),
        (status = 409, description = "Another host has this phone number")
    )
)]
async fn link_phone(
    session: Session,
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<PhoneSchema>,
) -> ServerResult<Json<Host>> {
    let host = context
        .collab
        .auth
        .link_phone(&session.host().id, &body.phone_number)
        .await?;

    Ok(Json(host.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/authorize", get(authorize))
        .route("/login", get(login))
        .route("/logout", post(logout))
        .route("/host", get(host))
        .route("/phone", put(link_phone))
}

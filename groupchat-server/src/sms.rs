use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Form,
};
use log::{debug, error};

use crate::{context::ServerContext, schemas::InboundSmsSchema, Router};

/// Replies are sent through the notifier, so the webhook always answers with nothing to say
const EMPTY_TWIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

#[utoipa::path(
    post,
    path = "/sms",
    tag = "sms",
    request_body(
        content = InboundSmsSchema,
        content_type = "application/x-www-form-urlencoded"
    ),
    responses(
        (status = 200, content_type = "text/xml", description = "Message was handled"),
        (status = 500, description = "Message could not be handled because of a database error")
    )
)]
async fn inbound_sms(
    context: ServerContext,
    Form(message): Form<InboundSmsSchema>,
) -> impl IntoResponse {
    debug!("Inbound message from {}", message.from);

    let result = context
        .collab
        .router
        .handle(message.from.trim(), &message.body)
        .await;

    match result {
        Ok(outcome) => {
            debug!("Routed message from {}: {:?}", message.from, outcome);
            (StatusCode::OK, [(header::CONTENT_TYPE, "text/xml")], EMPTY_TWIML).into_response()
        }
        Err(e) => {
            error!("Failed to handle message from {}: {}", message.from, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn router() -> Router {
    Router::new().route("/sms", post(inbound_sms))
}

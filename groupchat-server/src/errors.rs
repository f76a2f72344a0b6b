use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;
use thiserror::Error;
use groupchat_collab::{AuthError, DatabaseError, PlaylistError};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("{0}")]
    Invalid(String),
    #[error("Authorization failed")]
    AuthorizationFailed,
    #[error("You do not own this resource")]
    Forbidden,
    #[error("Music provider error: {0}")]
    Provider(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::AuthorizationFailed => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.as_status_code();

        if status.is_server_error() {
            error!("{}", self);
        }

        (status, self.to_string()).into_response()
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::Authorization(_) => Self::AuthorizationFailed,
            AuthError::InvalidPhoneNumber(_) => Self::Invalid(value.to_string()),
            AuthError::Db(e) => e.into(),
        }
    }
}

impl From<PlaylistError> for ServerError {
    fn from(value: PlaylistError) -> Self {
        match value {
            PlaylistError::InvalidKey(_) | PlaylistError::InvalidTitle => {
                Self::Invalid(value.to_string())
            }
            PlaylistError::KeyTaken(key) => Self::Conflict {
                resource: "playlist",
                field: "key",
                value: key,
            },
            PlaylistError::NotOwner => Self::Forbidden,
            PlaylistError::Gateway(e) => Self::Provider(e.to_string()),
            PlaylistError::Db(e) => e.into(),
        }
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

use rouille::Response;

use crate::{
    auth::AuthError, catalog::error::CatalogError, player::PlayerError,
    storage::error::StorageError,
};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Unprocessable(String),
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        log::error!("storage failure: {err}");
        ApiError::Internal("internal server error".into())
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::LoadFailure { .. } => {
                log::error!("{err}");
                ApiError::Internal("could not load the music library".into())
            }
            CatalogError::MediaUnreachable(_) => ApiError::NotFound(err.to_string()),
            CatalogError::InvalidUpload(msg) => ApiError::BadRequest(msg),
            CatalogError::Io(_) => {
                log::error!("{err}");
                ApiError::Internal("internal server error".into())
            }
        }
    }
}

impl From<PlayerError> for ApiError {
    fn from(err: PlayerError) -> Self {
        match err {
            PlayerError::UnknownTrack(_) => ApiError::NotFound(err.to_string()),
            PlayerError::Playback(_) | PlayerError::Session(_) => {
                ApiError::Unprocessable(err.to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Unprocessable(_) => 422,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status_code();
        let msg = match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Unprocessable(msg)
            | ApiError::Internal(msg) => msg,
        };
        Response::json(&serde_json::json!({ "error": msg })).with_status_code(status)
    }
}

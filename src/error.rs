use log::{debug, error};
use rocket::{http::Status, response::Responder, serde::json::Json, Request};
use thiserror::Error;

use crate::model::{
    admission::AdmissionError, api::error::ErrorBody, key::KeyError, store::StoreError,
};

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned from route handlers.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    #[error("Invalid key: {0}")]
    Key(#[from] KeyError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// HTTP status and machine-readable kind.
    fn classify(&self) -> (Status, &'static str) {
        match self {
            Self::Admission(err) => match err {
                AdmissionError::NoRegisteredKey(_) => (Status::BadRequest, "no_registered_key"),
                AdmissionError::InvalidKey(_) => (Status::BadRequest, "invalid_key"),
                AdmissionError::SignatureRejected { .. } => {
                    (Status::BadRequest, "signature_rejected")
                }
                AdmissionError::BatchTooLarge { .. } => (Status::BadRequest, "batch_too_large"),
                AdmissionError::EmptyBatch => (Status::BadRequest, "empty_batch"),
                AdmissionError::InlineKeyForbidden => (Status::BadRequest, "inline_key_forbidden"),
                AdmissionError::Store(_) => (Status::InternalServerError, "storage"),
            },
            Self::Key(_) => (Status::BadRequest, "invalid_key"),
            Self::Store(_) => (Status::InternalServerError, "storage"),
            Self::NotFound(_) => (Status::NotFound, "not_found"),
        }
    }

    fn body(&self) -> ErrorBody {
        let (_, kind) = self.classify();
        let body = ErrorBody::new(kind, self.to_string());
        match self {
            Self::Admission(AdmissionError::SignatureRejected { position }) => body.at(*position),
            _ => body,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let (status, _) = self.classify();
        if status.class().is_server_error() {
            error!("{self}");
        } else {
            debug!("{self}");
        }
        (status, Json(self.body())).respond_to(req)
    }
}

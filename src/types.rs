use std::collections::HashMap;

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::{json, Json, Value};
use serde::Serialize;

use crate::utils::try_respond;

pub trait Validate
where
    Self: Sized,
{
    fn validate(self) -> Result<Self, ValidationError>;
}

#[derive(Debug)]
pub enum ApiError {
    Diesel(DieselError),
    Validation(ValidationError),
    BadRequest(String),
    Unauthorized,
    InvalidCredentials,
    Forbidden,
    NotFound(String),
    Conflict(String),
    Unavailable,
    Internal(String),
}

impl ApiError {
    pub fn not_found<M: Into<String>>(message: M) -> ApiError {
        ApiError::NotFound(message.into())
    }

    pub fn status(&self) -> Status {
        match self {
            ApiError::Diesel(DieselError::NotFound) => Status::NotFound,
            ApiError::Diesel(DieselError::DatabaseError(kind, _)) => match kind {
                DatabaseErrorKind::UniqueViolation => Status::Conflict,
                DatabaseErrorKind::ForeignKeyViolation => Status::NotFound,
                _ => Status::InternalServerError,
            },
            ApiError::Diesel(_) => Status::InternalServerError,
            ApiError::Validation(_) | ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Unauthorized | ApiError::InvalidCredentials => Status::Unauthorized,
            ApiError::Forbidden => Status::Forbidden,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::Unavailable => Status::ServiceUnavailable,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }

    fn body(&self) -> Value {
        match self {
            ApiError::Validation(errors) => json!({
                "message": "Validation failed",
                "errors": errors,
            }),
            ApiError::BadRequest(message) | ApiError::NotFound(message) | ApiError::Conflict(message) => {
                json!({ "message": message })
            }
            ApiError::Unauthorized => json!({ "message": "Login required" }),
            ApiError::InvalidCredentials => json!({ "message": "Invalid credentials" }),
            ApiError::Forbidden => json!({ "message": "Access denied" }),
            ApiError::Unavailable => json!({ "message": "Service unavailable" }),
            ApiError::Diesel(DieselError::NotFound) => json!({ "message": "Not found" }),
            ApiError::Diesel(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                json!({ "message": "Already exists" })
            }
            ApiError::Diesel(DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)) => {
                json!({ "message": "Referenced entity not found" })
            }
            ApiError::Diesel(_) => json!({ "message": "Internal server error" }),
            ApiError::Internal(_) => json!({ "message": "Internal server error" }),
        }
    }
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> ApiError {
        ApiError::Diesel(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> ApiError {
        ApiError::Validation(err)
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Body of the plain `{"message": ...}` acknowledgements.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

impl Message {
    pub fn new(message: &'static str) -> Json<Message> {
        Json(Message { message })
    }
}

#[derive(Debug, Serialize, Default)]
pub struct ValidationError(HashMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        let entry = self.0.entry(key.into()).or_default();
        entry.push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            let entry = self.0.entry(key).or_default();
            entry.extend(errors);
        }
    }

    pub fn empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<&Vec<String>> {
        self.0.get(key)
    }

    /// `Ok(value)` when nothing was recorded, the accumulated errors otherwise.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationError> {
        if self.empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        match &self {
            ApiError::Diesel(DieselError::NotFound) => {}
            ApiError::Diesel(error) if status == Status::InternalServerError => {
                tracing::error!("database error on {} {}: {}", req.method(), req.uri(), error);
            }
            ApiError::Internal(reason) => {
                tracing::error!("internal error on {} {}: {}", req.method(), req.uri(), reason);
            }
            _ => {}
        }
        try_respond(req, &self.body(), status)
    }
}

impl<T> Validate for Json<T>
where
    T: Validate,
{
    fn validate(self) -> Result<Self, ValidationError> {
        let inner = self.into_inner();
        let validated = inner.validate()?;
        Ok(Json(validated))
    }
}

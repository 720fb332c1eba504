//! Cookie sessions and the request guards built on them.
//!
//! The session is a snapshot of the account taken at login and kept in an
//! encrypted cookie, so checking it never touches the database.

use std::ops::Deref;

use chrono::{DateTime, Utc};
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::outcome::{try_outcome, Outcome};
use rocket::request::{self, FromRequest, Request};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ApiError;
use crate::users::models::{Role, User};

pub const SESSION_COOKIE: &str = "blog_session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    /// Unix timestamp, seconds.
    pub expires_at: i64,
}

impl Session {
    pub fn start(user: &User, ttl: chrono::Duration) -> Session {
        Session {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            expires_at: (Utc::now() + ttl).timestamp(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.expires_at
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn store(&self, cookies: &CookieJar<'_>, secure: bool) -> Result<(), ApiError> {
        let value = serde_json::to_string(self)
            .map_err(|e| ApiError::Internal(format!("failed to encode session: {}", e)))?;
        let max_age = (self.expires_at - Utc::now().timestamp()).max(0);
        let cookie = Cookie::build((SESSION_COOKIE, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(secure)
            .max_age(rocket::time::Duration::seconds(max_age));
        cookies.add_private(cookie);
        Ok(())
    }

    pub fn clear(cookies: &CookieJar<'_>) {
        cookies.remove_private(SESSION_COOKIE);
    }

    pub fn from_cookies(cookies: &CookieJar<'_>) -> Option<Session> {
        let cookie = cookies.get_private(SESSION_COOKIE)?;
        serde_json::from_str::<Session>(cookie.value())
            .ok()
            .filter(|session| !session.is_expired(Utc::now()))
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Session {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match Session::from_cookies(request.cookies()) {
            Some(session) => Outcome::Success(session),
            None => Outcome::Error((Status::Unauthorized, ApiError::Unauthorized)),
        }
    }
}

/// A session whose role is `admin`.
#[derive(Debug)]
pub struct Admin(pub Session);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Admin {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let session = try_outcome!(request.guard::<Session>().await);
        if session.is_admin() {
            Outcome::Success(Admin(session))
        } else {
            tracing::warn!(user_id = %session.user_id, path = %request.uri(), "admin route refused");
            Outcome::Error((Status::Forbidden, ApiError::Forbidden))
        }
    }
}

impl Deref for Admin {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.0
    }
}

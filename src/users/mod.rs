use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{delete as diesel_delete, select, update as diesel_update};
use rocket::http::{CookieJar, Status};
use rocket::response::status;
use rocket::serde::json::{json, Json, Value};
use rocket::State;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::db::schema::users;
use crate::db::Db;
use crate::session::{Admin, Session};
use crate::types::*;

use self::models::{Role, User, UserSummary};
use self::utils::*;

pub mod models;
pub mod utils;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Validate for Credentials {
    fn validate(mut self) -> Result<Self, ValidationError> {
        let mut errors = ValidationError::default();
        self.email = normalize_email(&self.email);

        if let Err(e) = validate_email_re(&self.email) {
            errors.merge(e);
        }
        if let Err(e) = validate_password(&self.password) {
            errors.merge(e);
        }

        errors.into_result(self)
    }
}

#[post("/auth/register", format = "json", data = "<registration>")]
pub async fn register(db: Db, registration: Json<Credentials>) -> Result<(Status, Json<Value>), ApiError> {
    let registration = registration.validate()?.into_inner();

    let user = db
        .run(move |conn| {
            let email_taken = select(exists(users::table.filter(users::email.eq(&registration.email))))
                .get_result::<bool>(conn)?;
            if email_taken {
                return Err(ApiError::Conflict("Email already registered".to_string()));
            }
            User::create(&registration.email, &registration.password, Role::User, conn)
        })
        .await?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok((Status::Created, Json(json!({ "user": user }))))
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    message: &'static str,
    user: User,
}

#[post("/auth/login", format = "json", data = "<login>")]
pub async fn login(
    db: Db,
    cookies: &CookieJar<'_>,
    config: &State<Config>,
    login: Json<Credentials>,
) -> ApiResult<LoginResponse> {
    let login = login.validate()?.into_inner();

    let user = db
        .run(move |conn| match User::load_by_email(&login.email, conn)? {
            Some(user) if user.verify_password(&login.password) => Ok(user),
            _ => {
                tracing::info!(email = %login.email, "login rejected");
                Err(ApiError::InvalidCredentials)
            }
        })
        .await?;

    Session::start(&user, config.session_ttl).store(cookies, config.cookie_secure)?;
    tracing::info!(user_id = %user.id, role = %user.role, "user logged in");
    Ok(Json(LoginResponse {
        message: "Login successful",
        user,
    }))
}

#[post("/auth/logout")]
pub fn logout(cookies: &CookieJar<'_>) -> Json<Message> {
    Session::clear(cookies);
    Message::new("Logged out")
}

#[get("/auth/me")]
pub fn me(session: Result<Session, ApiError>) -> Result<Json<Value>, status::Custom<Json<Value>>> {
    match session {
        Ok(session) => Ok(Json(json!({
            "user": {
                "id": session.user_id,
                "email": session.email,
                "role": session.role,
            }
        }))),
        Err(_) => Err(status::Custom(Status::Unauthorized, Json(json!({ "user": null })))),
    }
}

#[get("/users")]
pub async fn list(_admin: Admin, db: Db) -> ApiResult<Vec<UserSummary>> {
    let users = db
        .run(|conn| {
            Ok(users::table
                .order(users::email.asc())
                .select(UserSummary::as_select())
                .load(conn)?)
        })
        .await?;
    Ok(Json(users))
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    role: Role,
}

#[derive(Debug, Serialize)]
pub struct RoleChangeResponse {
    message: &'static str,
    user: User,
}

#[put("/users/<id>/role", format = "json", data = "<change>")]
pub async fn update_role(admin: Admin, db: Db, id: Uuid, change: Json<RoleChange>) -> ApiResult<RoleChangeResponse> {
    if id == admin.user_id {
        return Err(ApiError::BadRequest("You cannot change your own role".to_string()));
    }

    let role = change.role;
    let user = db
        .run(move |conn| {
            diesel_update(users::table.find(id))
                .set(users::role.eq(role))
                .returning(User::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or_else(|| ApiError::not_found("User not found"))
        })
        .await?;

    tracing::info!(user_id = %user.id, role = %user.role, changed_by = %admin.user_id, "role changed");
    Ok(Json(RoleChangeResponse {
        message: "Role updated",
        user,
    }))
}

#[delete("/users/<id>")]
pub async fn delete(admin: Admin, db: Db, id: Uuid) -> ApiResult<Message> {
    if id == admin.user_id {
        return Err(ApiError::BadRequest("You cannot delete your own account".to_string()));
    }

    let deleted = db
        .run(move |conn| Ok(diesel_delete(users::table.find(id)).execute(conn)?))
        .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("User not found"));
    }
    tracing::info!(user_id = %id, deleted_by = %admin.user_id, "user deleted");
    Ok(Message::new("User deleted"))
}

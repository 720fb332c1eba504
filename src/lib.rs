#[macro_use]
extern crate rocket;
#[macro_use]
extern crate diesel;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate lazy_static;

pub mod comment;
pub mod config;
pub mod db;
pub mod errors;
pub mod health;
pub mod interaction;
pub mod logging;
pub mod post;
pub mod session;
pub mod sports;
pub mod types;
pub mod users;
pub mod utils;

use rocket::fairing::AdHoc;
use rocket::fs::{FileServer, Options};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::status;
use rocket::serde::json::{json, Json, Value};
use rocket::{Build, Rocket};

use crate::config::Config;
use crate::db::Pool;
use crate::errors::ErrorKind;
use crate::users::models::User;

fn error_body(message: &str) -> Json<Value> {
    Json(json!({ "message": message }))
}

#[catch(400)]
fn bad_request(_req: &Request) -> Json<Value> {
    error_body("Invalid request")
}

#[catch(401)]
fn unauthorized(_req: &Request) -> Json<Value> {
    error_body("Login required")
}

#[catch(403)]
fn forbidden(_req: &Request) -> Json<Value> {
    error_body("Access denied")
}

#[catch(404)]
fn not_found(_req: &Request) -> Json<Value> {
    error_body("Not found")
}

#[catch(422)]
fn unprocessable(_req: &Request) -> Json<Value> {
    error_body("Malformed request body")
}

#[catch(500)]
fn internal_error(_req: &Request) -> Json<Value> {
    error_body("Internal server error")
}

#[catch(503)]
fn unavailable(_req: &Request) -> Json<Value> {
    error_body("Service unavailable")
}

#[catch(default)]
fn fallback(status: Status, _req: &Request) -> status::Custom<Json<Value>> {
    status::Custom(status, error_body(status.reason().unwrap_or("Error")))
}

/// Applies pending migrations and makes sure the configured admin exists.
fn prepare_database(pool: &Pool, config: &Config) -> errors::Result<()> {
    let mut conn = pool.get()?;

    if config.run_migrations {
        let applied = db::run_migrations(&mut conn)?;
        tracing::info!(applied, "migrations applied");
    }

    if let Some(admin) = &config.admin {
        let user = User::ensure_admin(&admin.email, &admin.password, &mut conn)
            .map_err(|e| ErrorKind::AdminAccount(format!("{:?}", e)))?;
        tracing::info!(user_id = %user.id, email = %user.email, "admin account ready");
    }

    Ok(())
}

fn database_setup() -> AdHoc {
    AdHoc::try_on_ignite("Database Setup", |rocket| async move {
        let (pool, config) = match (rocket.state::<Pool>(), rocket.state::<Config>()) {
            (Some(pool), Some(config)) => (pool.clone(), config.clone()),
            _ => return Err(rocket),
        };
        if !config.run_migrations && config.admin.is_none() {
            return Ok(rocket);
        }

        match rocket::tokio::task::spawn_blocking(move || prepare_database(&pool, &config)).await {
            Ok(Ok(())) => Ok(rocket),
            Ok(Err(e)) => {
                tracing::error!("database setup failed: {}", e);
                Err(rocket)
            }
            Err(e) => {
                tracing::error!("database setup panicked: {}", e);
                Err(rocket)
            }
        }
    })
}

pub fn rocket(config: Config) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("address", config.address.clone()))
        .merge(("port", config.port))
        .merge(("secret_key", config.session_secret.clone()));

    let pool = db::init_pool(&config);
    let static_dir = config.static_dir.clone();

    let rocket = rocket::custom(figment)
        .manage(pool)
        .manage(config)
        .attach(logging::RequestLogger)
        .attach(database_setup())
        .mount(
            "/api",
            routes![
                users::register,
                users::login,
                users::logout,
                users::me,
                users::list,
                users::update_role,
                users::delete,
                post::list,
                post::by_category,
                post::get,
                post::list_admin,
                post::get_admin,
                post::create,
                post::update,
                post::delete,
                comment::list,
                comment::create,
                comment::delete,
                interaction::likes,
                interaction::like,
                interaction::bookmark_state,
                interaction::bookmark,
                sports::rankings,
                sports::events,
                health::check,
            ],
        )
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                forbidden,
                not_found,
                unprocessable,
                internal_error,
                unavailable,
                fallback
            ],
        );

    match static_dir {
        Some(dir) => rocket.mount("/", FileServer::new(dir, Options::Index | Options::Missing).rank(10)),
        None => rocket,
    }
}

use diesel::prelude::*;
use diesel::sql_query;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::{json, Json, Value};
use rocket::tokio::task::spawn_blocking;
use rocket::State;

use crate::db::Pool;

fn fail(message: String) -> status::Custom<Json<Value>> {
    tracing::warn!("health check failed: {}", message);
    status::Custom(
        Status::ServiceUnavailable,
        Json(json!({ "status": "fail", "message": message })),
    )
}

fn ping(pool: &Pool) -> Result<(), String> {
    let mut conn = pool.get().map_err(|e| format!("Database unavailable: {}", e))?;
    sql_query("SELECT 1")
        .execute(&mut *conn)
        .map_err(|e| format!("Database query failed: {}", e))?;
    Ok(())
}

#[get("/health")]
pub async fn check(pool: &State<Pool>) -> status::Custom<Json<Value>> {
    let pool = pool.inner().clone();
    match spawn_blocking(move || ping(&pool)).await {
        Ok(Ok(())) => status::Custom(Status::Ok, Json(json!({ "status": "ok" }))),
        Ok(Err(message)) => fail(message),
        Err(e) => fail(format!("Health check task failed: {}", e)),
    }
}

use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use rocket::http::Status;
use rocket::request::{self, FromRequest};
use rocket::tokio::task::spawn_blocking;
use rocket::{outcome::Outcome, Request, State};

use crate::config::Config;
use crate::errors::{ErrorKind, Result};
use crate::types::ApiError;

pub mod schema;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

// An alias to the type for a pool of Diesel Postgres connections.
pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Handle on the managed pool. Connections are checked out and used on the
/// blocking thread pool, never on the async workers.
pub struct Db(Pool);

impl Db {
    /// Runs `work` with one pooled connection on a blocking thread. Failing
    /// to check a connection out is `ApiError::Unavailable`.
    pub async fn run<F, T>(&self, work: F) -> std::result::Result<T, ApiError>
    where
        F: FnOnce(&mut PgConnection) -> std::result::Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.0.clone();
        spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| {
                tracing::warn!("database connection unavailable: {}", e);
                ApiError::Unavailable
            })?;
            work(&mut *conn)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("database task failed: {}", e)))?
    }
}

/// Hands out the managed pool. If no pool is currently managed, fails with an
/// `InternalServerError` status.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for Db {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Db, ()> {
        match request.guard::<&State<Pool>>().await {
            Outcome::Success(pool) => Outcome::Success(Db(pool.inner().clone())),
            _ => Outcome::Error((Status::InternalServerError, ())),
        }
    }
}

/// Builds the pool without opening a connection; the first checkout connects.
pub fn init_pool(config: &Config) -> Pool {
    let manager = ConnectionManager::<PgConnection>::new(config.database_url.as_str());
    r2d2::Pool::builder()
        .max_size(config.pool_size)
        .min_idle(Some(0))
        .connection_timeout(config.pool_timeout)
        .build_unchecked(manager)
}

pub fn run_migrations(connection: &mut PgConnection) -> Result<usize> {
    let applied = connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| ErrorKind::Migration(e.to_string()))?;
    Ok(applied.len())
}

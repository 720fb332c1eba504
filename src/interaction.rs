//! Likes and bookmarks. Both are `(user, post)` rows that exist at most once;
//! toggling removes the row when present and inserts it otherwise.

use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::{delete as diesel_delete, insert_into, select};
use rocket::serde::json::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::db::schema::{post_likes, posts, saved_posts};
use crate::db::Db;
use crate::session::Session;
use crate::types::*;

pub fn like_count(post_id: Uuid, connection: &mut PgConnection) -> QueryResult<i64> {
    post_likes::table
        .filter(post_likes::post_id.eq(post_id))
        .count()
        .get_result(connection)
}

pub fn has_liked(user_id: Uuid, post_id: Uuid, connection: &mut PgConnection) -> QueryResult<bool> {
    select(exists(
        post_likes::table
            .filter(post_likes::user_id.eq(user_id))
            .filter(post_likes::post_id.eq(post_id)),
    ))
    .get_result(connection)
}

/// Returns whether the post is liked after the toggle.
pub fn toggle_like(user_id: Uuid, post_id: Uuid, connection: &mut PgConnection) -> QueryResult<bool> {
    connection.transaction::<_, DieselError, _>(|conn| {
        let removed = diesel_delete(
            post_likes::table
                .filter(post_likes::user_id.eq(user_id))
                .filter(post_likes::post_id.eq(post_id)),
        )
        .execute(conn)?;
        if removed > 0 {
            return Ok(false);
        }

        insert_into(post_likes::table)
            .values((post_likes::user_id.eq(user_id), post_likes::post_id.eq(post_id)))
            .on_conflict((post_likes::user_id, post_likes::post_id))
            .do_nothing()
            .execute(conn)?;
        Ok(true)
    })
}

pub fn has_saved(user_id: Uuid, post_id: Uuid, connection: &mut PgConnection) -> QueryResult<bool> {
    select(exists(
        saved_posts::table
            .filter(saved_posts::user_id.eq(user_id))
            .filter(saved_posts::post_id.eq(post_id)),
    ))
    .get_result(connection)
}

/// Returns whether the post is bookmarked after the toggle.
pub fn toggle_bookmark(user_id: Uuid, post_id: Uuid, connection: &mut PgConnection) -> QueryResult<bool> {
    connection.transaction::<_, DieselError, _>(|conn| {
        let removed = diesel_delete(
            saved_posts::table
                .filter(saved_posts::user_id.eq(user_id))
                .filter(saved_posts::post_id.eq(post_id)),
        )
        .execute(conn)?;
        if removed > 0 {
            return Ok(false);
        }

        insert_into(saved_posts::table)
            .values((saved_posts::user_id.eq(user_id), saved_posts::post_id.eq(post_id)))
            .on_conflict((saved_posts::user_id, saved_posts::post_id))
            .do_nothing()
            .execute(conn)?;
        Ok(true)
    })
}

fn ensure_post(post_id: Uuid, connection: &mut PgConnection) -> Result<(), ApiError> {
    if select(exists(posts::table.find(post_id))).get_result::<bool>(connection)? {
        Ok(())
    } else {
        Err(ApiError::not_found("Post not found"))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeSummary {
    count: i64,
    user_liked: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    is_liked: bool,
    new_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkState {
    is_saved: bool,
}

/// An id that is not a UUID has no likes.
#[get("/posts/<id>/likes")]
pub async fn likes(session: Option<Session>, db: Db, id: &str) -> ApiResult<LikeSummary> {
    let id = match Uuid::parse_str(id) {
        Ok(id) => id,
        Err(_) => return Ok(Json(LikeSummary { count: 0, user_liked: false })),
    };
    let user_id = session.map(|session| session.user_id);
    let summary = db
        .run(move |conn| {
            let count = like_count(id, conn)?;
            let user_liked = match user_id {
                Some(user_id) => has_liked(user_id, id, conn)?,
                None => false,
            };
            Ok(LikeSummary { count, user_liked })
        })
        .await?;
    Ok(Json(summary))
}

#[post("/posts/<id>/like")]
pub async fn like(session: Session, db: Db, id: Uuid) -> ApiResult<LikeToggle> {
    let user_id = session.user_id;
    let toggle = db
        .run(move |conn| {
            ensure_post(id, conn)?;
            let is_liked = toggle_like(user_id, id, conn)?;
            let new_count = like_count(id, conn)?;
            Ok(LikeToggle { is_liked, new_count })
        })
        .await?;
    tracing::debug!(post_id = %id, user_id = %user_id, is_liked = toggle.is_liked, "like toggled");
    Ok(Json(toggle))
}

#[get("/posts/<id>/bookmark")]
pub async fn bookmark_state(session: Option<Session>, db: Db, id: &str) -> ApiResult<BookmarkState> {
    let (user_id, id) = match (session, Uuid::parse_str(id)) {
        (Some(session), Ok(id)) => (session.user_id, id),
        _ => return Ok(Json(BookmarkState { is_saved: false })),
    };
    let is_saved = db.run(move |conn| Ok(has_saved(user_id, id, conn)?)).await?;
    Ok(Json(BookmarkState { is_saved }))
}

#[post("/posts/<id>/bookmark")]
pub async fn bookmark(session: Session, db: Db, id: Uuid) -> ApiResult<BookmarkState> {
    let user_id = session.user_id;
    let is_saved = db
        .run(move |conn| {
            ensure_post(id, conn)?;
            Ok(toggle_bookmark(user_id, id, conn)?)
        })
        .await?;
    tracing::debug!(post_id = %id, user_id = %user_id, is_saved, "bookmark toggled");
    Ok(Json(BookmarkState { is_saved }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_payloads_use_camel_case() {
        let summary = serde_json::to_value(LikeSummary { count: 3, user_liked: true }).unwrap();
        assert_eq!(summary, serde_json::json!({"count": 3, "userLiked": true}));

        let toggle = serde_json::to_value(LikeToggle { is_liked: false, new_count: 0 }).unwrap();
        assert_eq!(toggle, serde_json::json!({"isLiked": false, "newCount": 0}));
    }

    #[test]
    fn bookmark_payload_uses_camel_case() {
        let state = serde_json::to_value(BookmarkState { is_saved: true }).unwrap();
        assert_eq!(state, serde_json::json!({"isSaved": true}));
    }
}

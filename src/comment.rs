use chrono::{DateTime, Utc};
use diesel::dsl::exists;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::{delete as diesel_delete, insert_into, select};
use rocket::http::Status;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::schema::{comments, posts, users};
use crate::db::Db;
use crate::post::Post;
use crate::session::{Admin, Session};
use crate::types::*;
use crate::utils::serialize_date;

pub const MAX_COMMENT_LENGTH: usize = 2000;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Associations)]
#[diesel(belongs_to(Post))]
#[diesel(table_name = comments)]
#[diesel(check_for_backend(Pg))]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    id: Uuid,
    content: String,
    #[serde(serialize_with = "serialize_date")]
    created_at: DateTime<Utc>,
    user_id: Uuid,
    post_id: Uuid,
    author: String,
}

impl From<(Comment, String)> for CommentView {
    fn from((comment, author): (Comment, String)) -> Self {
        CommentView {
            id: comment.id,
            content: comment.content,
            created_at: comment.created_at,
            user_id: comment.user_id,
            post_id: comment.post_id,
            author,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment {
    content: String,
    user_id: Uuid,
    post_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDetails {
    content: String,
    post_id: Uuid,
}

impl Validate for CommentDetails {
    fn validate(mut self) -> Result<Self, ValidationError> {
        let mut errors = ValidationError::default();
        self.content = self.content.trim().to_string();
        if self.content.is_empty() {
            errors.add_error("content", "Comment cannot be empty");
        } else if self.content.chars().count() > MAX_COMMENT_LENGTH {
            errors.add_error(
                "content",
                format!("Comment must be at most {} characters", MAX_COMMENT_LENGTH),
            );
        }
        errors.into_result(self)
    }
}

impl Comment {
    /// Comments of a post with their authors' emails, newest first.
    pub fn for_post(post_id: Uuid, connection: &mut PgConnection) -> QueryResult<Vec<CommentView>> {
        let rows = comments::table
            .inner_join(users::table)
            .filter(comments::post_id.eq(post_id))
            .order(comments::created_at.desc())
            .select((Comment::as_select(), users::email))
            .load::<(Comment, String)>(connection)?;
        Ok(rows.into_iter().map(CommentView::from).collect())
    }
}

/// An id that is not a UUID has no comments.
#[get("/comments/<post_id>")]
pub async fn list(db: Db, post_id: &str) -> ApiResult<Vec<CommentView>> {
    let post_id = match Uuid::parse_str(post_id) {
        Ok(post_id) => post_id,
        Err(_) => return Ok(Json(Vec::new())),
    };
    Ok(Json(db.run(move |conn| Ok(Comment::for_post(post_id, conn)?)).await?))
}

#[post("/comments", format = "json", data = "<details>")]
pub async fn create(
    session: Session,
    db: Db,
    details: Json<CommentDetails>,
) -> Result<(Status, Json<CommentView>), ApiError> {
    let details = details.validate()?.into_inner();
    let new_comment = NewComment {
        content: details.content,
        user_id: session.user_id,
        post_id: details.post_id,
    };

    let comment = db
        .run(move |conn| {
            let post_exists = select(exists(posts::table.find(new_comment.post_id))).get_result::<bool>(conn)?;
            if !post_exists {
                return Err(ApiError::not_found("Post not found"));
            }
            Ok(insert_into(comments::table)
                .values(&new_comment)
                .returning(Comment::as_returning())
                .get_result(conn)?)
        })
        .await?;

    tracing::info!(comment_id = %comment.id, post_id = %comment.post_id, user_id = %session.user_id, "comment added");
    Ok((Status::Created, Json((comment, session.email).into())))
}

#[delete("/comments/<id>")]
pub async fn delete(admin: Admin, db: Db, id: Uuid) -> ApiResult<Message> {
    let deleted = db
        .run(move |conn| Ok(diesel_delete(comments::table.find(id)).execute(conn)?))
        .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Comment not found"));
    }
    tracing::info!(comment_id = %id, deleted_by = %admin.user_id, "comment deleted");
    Ok(Message::new("Comment deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(content: &str) -> CommentDetails {
        CommentDetails {
            content: content.to_string(),
            post_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn comment_content_is_trimmed() {
        let checked = details("  Great climb on stage 9!  ").validate().unwrap();
        assert_eq!(checked.content, "Great climb on stage 9!");
    }

    #[test]
    fn blank_comments_are_rejected() {
        assert!(details("   ").validate().is_err());
    }

    #[test]
    fn comment_length_is_capped() {
        assert!(details(&"a".repeat(MAX_COMMENT_LENGTH)).validate().is_ok());
        assert!(details(&"a".repeat(MAX_COMMENT_LENGTH + 1)).validate().is_err());
    }

    #[test]
    fn view_carries_author_email() {
        let comment = Comment {
            id: Uuid::new_v4(),
            content: "Nice".to_string(),
            user_id: Uuid::new_v4(),
            post_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        let view: CommentView = (comment.clone(), "reader@example.com".to_string()).into();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["author"], "reader@example.com");
        assert_eq!(json["postId"], comment.post_id.to_string());
        assert!(json.get("userId").is_some());
    }
}

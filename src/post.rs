use std::fmt;
use std::io::Write;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::{delete as diesel_delete, insert_into, update as diesel_update};
use regex::Regex;
use rocket::http::Status;
use rocket::serde::json::Json;
use serde::{Deserialize, Deserializer, Serialize};
use slug::slugify;
use uuid::Uuid;

use crate::db::schema::posts;
use crate::db::schema::sql_types::PostCategory;
use crate::db::Db;
use crate::session::Admin;
use crate::types::*;
use crate::utils::{serialize_date, serialize_optional_date};

pub const MIN_TITLE_LENGTH: usize = 3;
pub const MIN_CONTENT_LENGTH: usize = 10;
const MAX_SLUG_ATTEMPTS: u32 = 50;

lazy_static! {
    static ref URL_RE: Regex = Regex::new(r"\Ahttps?://[^\s/$.?#][^\s]*\z").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow, Serialize, Deserialize)]
#[diesel(sql_type = PostCategory)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Engineering,
    Sports,
    Travel,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Engineering, Category::Sports, Category::Travel];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Engineering => "engineering",
            Category::Sports => "sports",
            Category::Travel => "travel",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct UnknownCategory(String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category: {}", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Category, UnknownCategory> {
        Category::ALL
            .iter()
            .find(|category| category.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

impl ToSql<PostCategory, Pg> for Category {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<PostCategory, Pg> for Category {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        Ok(std::str::from_utf8(bytes.as_bytes())?.parse()?)
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = posts)]
#[diesel(check_for_backend(Pg))]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub author_id: Uuid,
    pub image_url: Option<String>,
    pub country: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_published: bool,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_optional_date")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A published post together with its neighbours in the same category.
#[derive(Debug, Serialize)]
pub struct PostNavigation {
    pub current: Post,
    pub prev: Option<Post>,
    pub next: Option<Post>,
}

impl Post {
    pub fn load(post_id: Uuid, connection: &mut PgConnection) -> QueryResult<Option<Post>> {
        posts::table
            .find(post_id)
            .select(Post::as_select())
            .first(connection)
            .optional()
    }

    /// Looks a published post up by id, or by slug when `key` is not a UUID.
    pub fn load_published(key: &str, connection: &mut PgConnection) -> QueryResult<Option<Post>> {
        let query = posts::table
            .filter(posts::is_published.eq(true))
            .select(Post::as_select())
            .into_boxed();
        let query = match Uuid::parse_str(key) {
            Ok(post_id) => query.filter(posts::id.eq(post_id)),
            Err(_) => query.filter(posts::slug.eq(key)),
        };
        query.first(connection).optional()
    }

    pub fn published(connection: &mut PgConnection) -> QueryResult<Vec<Post>> {
        posts::table
            .filter(posts::is_published.eq(true))
            .order(posts::created_at.desc())
            .select(Post::as_select())
            .load(connection)
    }

    pub fn published_in(category: Category, connection: &mut PgConnection) -> QueryResult<Vec<Post>> {
        posts::table
            .filter(posts::is_published.eq(true))
            .filter(posts::category.eq(category))
            .order(posts::created_at.desc())
            .select(Post::as_select())
            .load(connection)
    }

    pub fn all(connection: &mut PgConnection) -> QueryResult<Vec<Post>> {
        posts::table
            .order(posts::created_at.desc())
            .select(Post::as_select())
            .load(connection)
    }

    /// The published posts of the same category immediately before and after
    /// this one by creation time. Posts sharing this post's exact timestamp
    /// are neither.
    pub fn neighbours(&self, connection: &mut PgConnection) -> QueryResult<(Option<Post>, Option<Post>)> {
        let siblings = || {
            posts::table
                .filter(posts::is_published.eq(true))
                .filter(posts::category.eq(self.category))
                .filter(posts::id.ne(self.id))
                .select(Post::as_select())
        };

        let prev = siblings()
            .filter(posts::created_at.lt(self.created_at))
            .order(posts::created_at.desc())
            .first(connection)
            .optional()?;
        let next = siblings()
            .filter(posts::created_at.gt(self.created_at))
            .order(posts::created_at.asc())
            .first(connection)
            .optional()?;

        Ok((prev, next))
    }

    pub fn navigation(self, connection: &mut PgConnection) -> QueryResult<PostNavigation> {
        let (prev, next) = self.neighbours(connection)?;
        Ok(PostNavigation {
            current: self,
            prev,
            next,
        })
    }
}

pub fn make_slug(title: &str, created: DateTime<Utc>) -> String {
    created.timestamp().to_string() + "-" + &slugify(title)
}

/// The slug tried on the given attempt: the base first, then `base-2`,
/// `base-3` and so on.
pub fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt + 1)
    }
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_title(title: &str, errors: &mut ValidationError) {
    if title.trim().chars().count() < MIN_TITLE_LENGTH {
        errors.add_error(
            "title",
            format!("Title must be at least {} characters", MIN_TITLE_LENGTH),
        );
    }
}

fn check_content(content: &str, errors: &mut ValidationError) {
    if content.trim().chars().count() < MIN_CONTENT_LENGTH {
        errors.add_error(
            "content",
            format!("Content must be at least {} characters", MIN_CONTENT_LENGTH),
        );
    }
}

fn check_image_url(url: &str, errors: &mut ValidationError) {
    if !URL_RE.is_match(url) {
        errors.add_error("imageUrl", format!("Invalid URL: {}", url));
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Insertable)]
#[diesel(table_name = posts)]
pub struct NewPost {
    slug: String,
    title: String,
    content: String,
    category: Category,
    author_id: Uuid,
    image_url: Option<String>,
    country: Option<String>,
    tags: Option<Vec<String>>,
    is_published: bool,
}

impl NewPost {
    /// Inserts the post, suffixing the slug until it is free.
    fn insert(mut self, connection: &mut PgConnection) -> Result<Post, ApiError> {
        let base = self.slug.clone();
        for attempt in 0..MAX_SLUG_ATTEMPTS {
            self.slug = slug_candidate(&base, attempt);
            let inserted = insert_into(posts::table)
                .values(&self)
                .returning(Post::as_returning())
                .get_result(connection);
            match inserted {
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    tracing::debug!(slug = %self.slug, "slug taken");
                }
                result => return Ok(result?),
            }
        }
        Err(ApiError::Conflict("No free slug for this title".to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetails {
    title: String,
    content: String,
    category: Category,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    is_published: Option<bool>,
}

impl Validate for PostDetails {
    fn validate(mut self) -> Result<Self, ValidationError> {
        let mut errors = ValidationError::default();
        check_title(&self.title, &mut errors);
        check_content(&self.content, &mut errors);

        self.image_url = clean_optional(self.image_url);
        if let Some(url) = &self.image_url {
            check_image_url(url, &mut errors);
        }
        self.country = clean_optional(self.country);
        self.tags = self.tags.map(clean_tags);

        errors.into_result(self)
    }
}

impl PostDetails {
    fn into_new_post(self, author_id: Uuid) -> NewPost {
        let title = self.title.trim().to_string();
        NewPost {
            slug: make_slug(&title, Utc::now()),
            title,
            content: self.content,
            category: self.category,
            author_id,
            image_url: self.image_url,
            country: self.country,
            tags: self.tags,
            is_published: self.is_published.unwrap_or(true),
        }
    }
}

#[derive(Debug, Default, Deserialize, AsChangeset)]
#[diesel(table_name = posts)]
#[serde(rename_all = "camelCase")]
pub struct PostChanges {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    category: Option<Category>,
    #[serde(default, deserialize_with = "nullable")]
    image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    country: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    tags: Option<Option<Vec<String>>>,
    #[serde(default)]
    is_published: Option<bool>,
    #[serde(skip)]
    updated_at: Option<DateTime<Utc>>,
}

impl Validate for PostChanges {
    fn validate(mut self) -> Result<Self, ValidationError> {
        let mut errors = ValidationError::default();
        if let Some(title) = &self.title {
            check_title(title, &mut errors);
        }
        if let Some(content) = &self.content {
            check_content(content, &mut errors);
        }

        self.title = self.title.map(|title| title.trim().to_string());
        self.image_url = self.image_url.map(clean_optional);
        if let Some(Some(url)) = &self.image_url {
            check_image_url(url, &mut errors);
        }
        self.country = self.country.map(clean_optional);
        self.tags = self.tags.map(|tags| tags.map(clean_tags));

        errors.into_result(self)
    }
}

#[get("/posts")]
pub async fn list(db: Db) -> ApiResult<Vec<Post>> {
    Ok(Json(db.run(|conn| Ok(Post::published(conn)?)).await?))
}

/// Unknown categories have no posts.
#[get("/posts/category/<category>", rank = 2)]
pub async fn by_category(db: Db, category: &str) -> ApiResult<Vec<Post>> {
    match category.parse::<Category>() {
        Ok(category) => Ok(Json(db.run(move |conn| Ok(Post::published_in(category, conn)?)).await?)),
        Err(_) => Ok(Json(Vec::new())),
    }
}

#[get("/posts/<key>")]
pub async fn get(db: Db, key: &str) -> ApiResult<PostNavigation> {
    let key = key.to_string();
    let navigation = db
        .run(move |conn| {
            let post = Post::load_published(&key, conn)?.ok_or_else(|| ApiError::not_found("Post not found"))?;
            Ok(post.navigation(conn)?)
        })
        .await?;
    Ok(Json(navigation))
}

#[get("/posts/admin")]
pub async fn list_admin(_admin: Admin, db: Db) -> ApiResult<Vec<Post>> {
    Ok(Json(db.run(|conn| Ok(Post::all(conn)?)).await?))
}

#[get("/posts/<id>/admin")]
pub async fn get_admin(_admin: Admin, db: Db, id: Uuid) -> ApiResult<Post> {
    let post = db
        .run(move |conn| Post::load(id, conn)?.ok_or_else(|| ApiError::not_found("Post not found")))
        .await?;
    Ok(Json(post))
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    message: &'static str,
    post: Post,
}

#[post("/posts", format = "json", data = "<create>")]
pub async fn create(admin: Admin, db: Db, create: Json<PostDetails>) -> Result<(Status, Json<PostResponse>), ApiError> {
    let create = create.validate()?.into_inner();
    let new_post = create.into_new_post(admin.user_id);
    let post = db.run(move |conn| new_post.insert(conn)).await?;

    tracing::info!(post_id = %post.id, category = %post.category, author_id = %admin.user_id, "post created");
    Ok((
        Status::Created,
        Json(PostResponse {
            message: "Post created",
            post,
        }),
    ))
}

#[put("/posts/<id>", format = "json", data = "<update>")]
pub async fn update(_admin: Admin, db: Db, id: Uuid, update: Json<PostChanges>) -> ApiResult<PostResponse> {
    let mut changes = update.validate()?.into_inner();
    changes.updated_at = Some(Utc::now());

    let post = db
        .run(move |conn| {
            diesel_update(posts::table.find(id))
                .set(&changes)
                .returning(Post::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or_else(|| ApiError::not_found("Post not found"))
        })
        .await?;

    tracing::info!(post_id = %post.id, "post updated");
    Ok(Json(PostResponse {
        message: "Post updated",
        post,
    }))
}

#[delete("/posts/<id>")]
pub async fn delete(_admin: Admin, db: Db, id: Uuid) -> ApiResult<Message> {
    let deleted = db
        .run(move |conn| Ok(diesel_delete(posts::table.find(id)).execute(conn)?))
        .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Post not found"));
    }
    tracing::info!(post_id = %id, "post deleted");
    Ok(Message::new("Post deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn details(json: &str) -> PostDetails {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn categories_round_trip_through_their_names() {
        for category in Category::ALL.iter() {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), *category);
        }
        assert!("ingenieria".parse::<Category>().is_err());
        assert_eq!(serde_json::to_value(Category::Travel).unwrap(), "travel");
    }

    #[test]
    fn valid_post_body_is_cleaned() {
        let post = details(
            r#"{"title":"  Bridges of Lisbon ","content":"A walk across the Tagus.","category":"travel",
                "imageUrl":"https://img.example.com/lisbon.jpg","country":"  ","tags":["bridges"," ",""," walk "]}"#,
        )
        .validate()
        .unwrap();

        assert_eq!(post.country, None);
        assert_eq!(post.tags, Some(vec!["bridges".to_string(), "walk".to_string()]));

        let new_post = post.into_new_post(Uuid::new_v4());
        assert_eq!(new_post.title, "Bridges of Lisbon");
        assert!(new_post.slug.ends_with("-bridges-of-lisbon"));
        assert!(new_post.is_published);
    }

    #[test]
    fn short_fields_and_bad_urls_are_reported_together() {
        let errors = details(r#"{"title":"Hi","content":"short","category":"sports","imageUrl":"not a url"}"#)
            .validate()
            .unwrap_err();

        assert!(errors.get("title").is_some());
        assert!(errors.get("content").is_some());
        assert!(errors.get("imageUrl").is_some());
    }

    #[test]
    fn unknown_category_is_rejected_by_the_body_parser() {
        let parsed = serde_json::from_str::<PostDetails>(
            r#"{"title":"Valid title","content":"Long enough content","category":"cooking"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn partial_update_tells_null_from_missing() {
        let changes: PostChanges = serde_json::from_str(r#"{"imageUrl":null,"title":"New title"}"#).unwrap();
        let changes = changes.validate().unwrap();

        assert_eq!(changes.image_url, Some(None));
        assert_eq!(changes.country, None);
        assert_eq!(changes.tags, None);
        assert_eq!(changes.title.as_deref(), Some("New title"));
    }

    #[test]
    fn partial_update_still_checks_present_fields() {
        let changes: PostChanges = serde_json::from_str(r#"{"content":"tiny","imageUrl":"ftp://x"}"#).unwrap();
        let errors = changes.validate().unwrap_err();
        assert!(errors.get("content").is_some());
        assert!(errors.get("imageUrl").is_some());
        assert!(errors.get("title").is_none());
    }

    #[test]
    fn slug_is_prefixed_with_creation_time() {
        let created = Utc.with_ymd_and_hms(2026, 5, 9, 12, 0, 0).unwrap();
        assert_eq!(make_slug("Giro d'Italia: Stage 1", created), "1778328000-giro-d-italia-stage-1");
    }

    #[test]
    fn taken_slugs_get_a_numeric_suffix() {
        assert_eq!(slug_candidate("1778328000-weekly-roundup", 0), "1778328000-weekly-roundup");
        assert_eq!(slug_candidate("1778328000-weekly-roundup", 1), "1778328000-weekly-roundup-2");
        assert_eq!(slug_candidate("1778328000-weekly-roundup", 2), "1778328000-weekly-roundup-3");
    }

    #[test]
    fn post_serializes_with_camel_case_keys() {
        let post = Post {
            id: Uuid::new_v4(),
            slug: "1-title".to_string(),
            title: "Title".to_string(),
            content: "Some content here".to_string(),
            category: Category::Engineering,
            author_id: Uuid::new_v4(),
            image_url: None,
            country: Some("Chile".to_string()),
            tags: None,
            is_published: false,
            created_at: Utc::now(),
            updated_at: None,
        };
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["category"], "engineering");
        assert_eq!(json["isPublished"], false);
        assert_eq!(json["country"], "Chile");
        assert!(json["updatedAt"].is_null());
        assert!(json.get("authorId").is_some());
    }
}

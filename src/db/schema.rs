pub mod sql_types {
    #[derive(diesel::query_builder::QueryId, diesel::sql_types::SqlType)]
    #[diesel(postgres_type(name = "post_category"))]
    pub struct PostCategory;

    #[derive(diesel::query_builder::QueryId, diesel::sql_types::SqlType)]
    #[diesel(postgres_type(name = "user_role"))]
    pub struct UserRole;
}

table! {
    use diesel::sql_types::*;

    comments (id) {
        id -> Uuid,
        content -> Text,
        user_id -> Uuid,
        post_id -> Uuid,
        created_at -> Timestamptz,
    }
}

table! {
    use diesel::sql_types::*;

    post_likes (id) {
        id -> Uuid,
        user_id -> Uuid,
        post_id -> Uuid,
        created_at -> Timestamptz,
    }
}

table! {
    use diesel::sql_types::*;
    use super::sql_types::PostCategory;

    posts (id) {
        id -> Uuid,
        slug -> Text,
        title -> Text,
        content -> Text,
        category -> PostCategory,
        author_id -> Uuid,
        image_url -> Nullable<Text>,
        country -> Nullable<Text>,
        tags -> Nullable<Array<Text>>,
        is_published -> Bool,
        created_at -> Timestamptz,
        updated_at -> Nullable<Timestamptz>,
    }
}

table! {
    use diesel::sql_types::*;

    saved_posts (id) {
        id -> Uuid,
        user_id -> Uuid,
        post_id -> Uuid,
        created_at -> Timestamptz,
    }
}

table! {
    use diesel::sql_types::*;
    use super::sql_types::UserRole;

    users (id) {
        id -> Uuid,
        email -> Text,
        password_hash -> Text,
        role -> UserRole,
        created_at -> Timestamptz,
    }
}

joinable!(comments -> posts (post_id));
joinable!(comments -> users (user_id));
joinable!(post_likes -> posts (post_id));
joinable!(post_likes -> users (user_id));
joinable!(posts -> users (author_id));
joinable!(saved_posts -> posts (post_id));
joinable!(saved_posts -> users (user_id));

allow_tables_to_appear_in_same_query!(comments, post_likes, posts, saved_posts, users);

use chrono::NaiveDateTime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Author projection joined onto articles and comments. Never carries
/// credentials or ids.
#[derive(Debug, Clone)]
pub struct Author {
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Article {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    pub author_id: i64,
    pub author: Author,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: i64,
    pub body: String,
    pub article_id: i64,
    pub author_id: i64,
    pub author: Author,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// One row of the diagnostic follows dump, joined with both usernames.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FollowEdge {
    pub follower_id: i64,
    pub following_id: i64,
    pub follower_username: String,
    pub following_username: String,
    pub created_at: NaiveDateTime,
}

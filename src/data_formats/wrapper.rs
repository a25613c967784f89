use serde::{Deserialize, Serialize};

use super::response::{ArticleResponse, CommentResponse, FollowEdgeResponse, ProfileResponse};

#[derive(Debug, Deserialize, Serialize)]
pub struct ArticleWrapper<T> {
    pub article: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentWrapper<T> {
    pub comment: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProfileWrapper {
    pub profile: ProfileResponse,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MultipleArticlesWrapper {
    pub articles: Vec<ArticleResponse>,
    #[serde(rename = "articlesCount")]
    pub articles_count: i64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MultipleCommentsWrapper {
    pub comments: Vec<CommentResponse>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TagsWrapper {
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FollowsDumpWrapper {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "followRelationships")]
    pub follow_relationships: Vec<FollowEdgeResponse>,
}

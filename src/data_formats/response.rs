use serde::{Deserialize, Serialize};

use crate::models::{Article, Author, Comment, FollowEdge};

/// Author projection as it appears inside articles and comments. No id, no
/// credentials.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AuthorResponse {
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ProfileResponse {
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub following: bool,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct ArticleResponse {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    #[serde(rename = "tagList")]
    pub tag_list: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorited: Option<bool>,
    #[serde(rename = "favoritesCount", skip_serializing_if = "Option::is_none")]
    pub favorites_count: Option<i64>,
    pub author: AuthorResponse,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct CommentResponse {
    pub id: i64,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
    pub body: String,
    pub author: AuthorResponse,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct FollowEdgeResponse {
    #[serde(rename = "followerId")]
    pub follower_id: i64,
    #[serde(rename = "followingId")]
    pub following_id: i64,
    #[serde(rename = "followerUsername")]
    pub follower_username: String,
    #[serde(rename = "followingUsername")]
    pub following_username: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl From<Author> for AuthorResponse {
    fn from(Author { username, bio, image }: Author) -> Self {
        AuthorResponse {
            username,
            bio,
            image,
        }
    }
}

impl ArticleResponse {
    pub fn new(
        Article {
            id,
            slug,
            title,
            description,
            body,
            tag_list,
            created_at,
            updated_at,
            author,
            ..
        }: Article,
    ) -> Self {
        ArticleResponse {
            id,
            slug,
            title,
            description,
            body,
            tag_list,
            created_at: created_at.to_string(),
            updated_at: updated_at.to_string(),
            favorited: None,
            favorites_count: None,
            author: author.into(),
        }
    }

    /// Projection used by the favorite/unfavorite endpoints, where the
    /// response is annotated with the action just taken and the recomputed
    /// count.
    pub fn favorited(article: Article, favorited: bool, favorites_count: i64) -> Self {
        ArticleResponse {
            favorited: Some(favorited),
            favorites_count: Some(favorites_count),
            ..ArticleResponse::new(article)
        }
    }
}

impl CommentResponse {
    pub fn new(
        Comment {
            id,
            body,
            created_at,
            updated_at,
            author,
            ..
        }: Comment,
    ) -> Self {
        CommentResponse {
            id,
            created_at: created_at.to_string(),
            updated_at: updated_at.to_string(),
            body,
            author: author.into(),
        }
    }
}

impl From<FollowEdge> for FollowEdgeResponse {
    fn from(edge: FollowEdge) -> Self {
        FollowEdgeResponse {
            follower_id: edge.follower_id,
            following_id: edge.following_id,
            follower_username: edge.follower_username,
            following_username: edge.following_username,
            created_at: edge.created_at.to_string(),
        }
    }
}

use std::sync::Arc;

use async_trait::async_trait;

use crate::data_formats::{
    ArticleQueryParams, CreateArticleRequest, FeedQueryParams, UpdateArticleRequest,
};
use crate::errors::RequestError;
use crate::models::{Article, Comment, FollowEdge, User};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type DynStore = Arc<dyn Store>;

/// Row access for the whole API behind one interface, so the join/count
/// logic in the handlers can be exercised against [`MemoryStore`] without a
/// live database. [`SqliteStore`] is the production implementation.
///
/// Existence checks and ownership policy live above this trait; methods here
/// are plain reads and writes. Follow and favorite inserts are
/// insert-if-absent, their deletes are delete-if-present.
#[async_trait]
pub trait Store: Send + Sync {
    // ----- articles -----

    /// Persists a new article. The slug is derived from the title; a
    /// duplicate slug is a `Conflict`.
    async fn insert_article(
        &self,
        author_id: i64,
        article: CreateArticleRequest,
    ) -> Result<Article, RequestError>;

    async fn article_by_slug(&self, slug: &str) -> Result<Option<Article>, RequestError>;

    /// Applies the patch; when the title changes the slug is recomputed.
    async fn update_article(
        &self,
        slug: &str,
        patch: UpdateArticleRequest,
    ) -> Result<Article, RequestError>;

    async fn delete_article(&self, slug: &str) -> Result<(), RequestError>;

    /// Filtered listing ordered by id descending, plus the total count for
    /// the same filter (ignoring pagination).
    async fn list_articles(
        &self,
        filter: &ArticleQueryParams,
    ) -> Result<(Vec<Article>, i64), RequestError>;

    /// Articles authored by any of `author_ids`, ordered by creation time
    /// descending. Callers short-circuit on an empty id set.
    async fn feed_articles(
        &self,
        author_ids: &[i64],
        page: FeedQueryParams,
    ) -> Result<(Vec<Article>, i64), RequestError>;

    // ----- favorites -----

    async fn insert_favorite(&self, user_id: i64, article_id: i64) -> Result<(), RequestError>;

    async fn delete_favorite(&self, user_id: i64, article_id: i64) -> Result<(), RequestError>;

    async fn favorites_count(&self, article_id: i64) -> Result<i64, RequestError>;

    // ----- comments -----

    async fn insert_comment(
        &self,
        article_id: i64,
        author_id: i64,
        body: &str,
    ) -> Result<Comment, RequestError>;

    /// Comments for one article, newest first.
    async fn comments_for_article(&self, article_id: i64) -> Result<Vec<Comment>, RequestError>;

    async fn comment_by_id(&self, comment_id: i64) -> Result<Option<Comment>, RequestError>;

    async fn delete_comment(&self, comment_id: i64) -> Result<(), RequestError>;

    // ----- social graph -----

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, RequestError>;

    async fn is_following(&self, follower_id: i64, following_id: i64)
        -> Result<bool, RequestError>;

    async fn insert_follow(&self, follower_id: i64, following_id: i64)
        -> Result<(), RequestError>;

    async fn delete_follow(&self, follower_id: i64, following_id: i64)
        -> Result<(), RequestError>;

    /// Ids of every user `follower_id` follows, for feed generation.
    async fn following_ids(&self, follower_id: i64) -> Result<Vec<i64>, RequestError>;

    /// Every follow edge touching `user_id`, joined with both usernames.
    /// Diagnostic only.
    async fn follows_touching(&self, user_id: i64) -> Result<Vec<FollowEdge>, RequestError>;

    // ----- tags -----

    /// Distinct tags attached to at least one article, lexicographically
    /// sorted.
    async fn all_tags(&self) -> Result<Vec<String>, RequestError>;
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};

use crate::data_formats::{
    ArticleQueryParams, CreateArticleRequest, FeedQueryParams, UpdateArticleRequest,
};
use crate::errors::RequestError;
use crate::models::{Article, Author, Comment, FollowEdge, User};
use crate::slugify;

use super::Store;

/// In-memory implementation of [`Store`], semantically equivalent to
/// [`super::SqliteStore`] including ordering and idempotence. Backs the unit
/// and integration tests so the query layer is exercised without a live
/// database.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    feed_queries: AtomicU64,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    articles: Vec<ArticleRow>,
    comments: Vec<CommentRow>,
    follows: Vec<FollowRow>,
    favorites: Vec<(i64, i64)>,
    next_id: i64,
}

struct ArticleRow {
    id: i64,
    slug: String,
    title: String,
    description: String,
    body: String,
    tag_list: Vec<String>,
    author_id: i64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

struct CommentRow {
    id: i64,
    body: String,
    article_id: i64,
    author_id: i64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

struct FollowRow {
    follower_id: i64,
    following_id: i64,
    created_at: NaiveDateTime,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn author_of(&self, author_id: i64) -> Result<Author, RequestError> {
        self.users
            .iter()
            .find(|user| user.id == author_id)
            .map(|user| Author {
                username: user.username.clone(),
                bio: user.bio.clone(),
                image: user.image.clone(),
            })
            .ok_or(RequestError::ServerError)
    }

    fn project_article(&self, row: &ArticleRow) -> Result<Article, RequestError> {
        Ok(Article {
            id: row.id,
            slug: row.slug.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            body: row.body.clone(),
            tag_list: row.tag_list.clone(),
            author_id: row.author_id,
            author: self.author_of(row.author_id)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn project_comment(&self, row: &CommentRow) -> Result<Comment, RequestError> {
        Ok(Comment {
            id: row.id,
            body: row.body.clone(),
            article_id: row.article_id,
            author_id: row.author_id,
            author: self.author_of(row.author_id)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a user row directly; identity creation is outside the API
    /// surface, so tests seed users through this.
    pub fn seed_user(&self, username: &str, bio: Option<&str>, image: Option<&str>) -> i64 {
        let mut inner = self.inner.write().unwrap();
        let id = inner.next_id();
        inner.users.push(User {
            id,
            username: username.to_string(),
            bio: bio.map(str::to_string),
            image: image.map(str::to_string),
            created_at: now(),
        });
        id
    }

    /// How many times [`Store::feed_articles`] has been called. The feed
    /// handler must not call it at all for a caller who follows nobody.
    pub fn feed_queries(&self) -> u64 {
        self.feed_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_article(
        &self,
        author_id: i64,
        article: CreateArticleRequest,
    ) -> Result<Article, RequestError> {
        let mut inner = self.inner.write().unwrap();
        let slug = slugify(&article.title);
        if inner.articles.iter().any(|a| a.slug == slug) {
            return Err(RequestError::Conflict(
                "An article with this title already exists",
            ));
        }
        let id = inner.next_id();
        let timestamp = now();
        inner.articles.push(ArticleRow {
            id,
            slug,
            title: article.title,
            description: article.description,
            body: article.body,
            tag_list: article.tag_list.unwrap_or_default(),
            author_id,
            created_at: timestamp,
            updated_at: timestamp,
        });
        let row = inner.articles.last().unwrap();
        inner.project_article(row)
    }

    async fn article_by_slug(&self, slug: &str) -> Result<Option<Article>, RequestError> {
        let inner = self.inner.read().unwrap();
        match inner.articles.iter().find(|a| a.slug == slug) {
            Some(row) => Ok(Some(inner.project_article(row)?)),
            None => Ok(None),
        }
    }

    async fn update_article(
        &self,
        slug: &str,
        patch: UpdateArticleRequest,
    ) -> Result<Article, RequestError> {
        let mut inner = self.inner.write().unwrap();
        let new_slug = patch.title.as_deref().map(slugify);
        if let Some(new_slug) = &new_slug {
            if inner
                .articles
                .iter()
                .any(|a| a.slug == *new_slug && a.slug != slug)
            {
                return Err(RequestError::Conflict(
                    "An article with this title already exists",
                ));
            }
        }
        let index = inner
            .articles
            .iter()
            .position(|a| a.slug == slug)
            .ok_or(RequestError::NotFound("Article not found"))?;
        {
            let row = &mut inner.articles[index];
            if let Some(title) = patch.title {
                row.title = title;
            }
            if let Some(description) = patch.description {
                row.description = description;
            }
            if let Some(body) = patch.body {
                row.body = body;
            }
            if let Some(new_slug) = new_slug {
                row.slug = new_slug;
            }
            row.updated_at = now();
        }
        let row = &inner.articles[index];
        inner.project_article(row)
    }

    async fn delete_article(&self, slug: &str) -> Result<(), RequestError> {
        let mut inner = self.inner.write().unwrap();
        let index = inner
            .articles
            .iter()
            .position(|a| a.slug == slug)
            .ok_or(RequestError::NotFound("Article not found"))?;
        let id = inner.articles[index].id;
        inner.articles.remove(index);
        // mirror the database cascades
        inner.comments.retain(|c| c.article_id != id);
        inner.favorites.retain(|&(_, article_id)| article_id != id);
        Ok(())
    }

    async fn list_articles(
        &self,
        filter: &ArticleQueryParams,
    ) -> Result<(Vec<Article>, i64), RequestError> {
        let inner = self.inner.read().unwrap();
        let author_id = match &filter.author {
            Some(username) => Some(
                inner
                    .users
                    .iter()
                    .find(|u| u.username == *username)
                    .map(|u| u.id),
            ),
            None => None,
        };
        let mut matching: Vec<&ArticleRow> = inner
            .articles
            .iter()
            .filter(|a| match &filter.tag {
                Some(tag) => a.tag_list.iter().any(|t| t == tag),
                None => true,
            })
            .filter(|a| match author_id {
                Some(id) => Some(a.author_id) == id,
                None => true,
            })
            .collect();
        matching.sort_by(|a, b| b.id.cmp(&a.id));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .map(|row| inner.project_article(row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((page, total))
    }

    async fn feed_articles(
        &self,
        author_ids: &[i64],
        page: FeedQueryParams,
    ) -> Result<(Vec<Article>, i64), RequestError> {
        self.feed_queries.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.read().unwrap();
        let mut matching: Vec<&ArticleRow> = inner
            .articles
            .iter()
            .filter(|a| author_ids.contains(&a.author_id))
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len() as i64;
        let rows = matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .map(|row| inner.project_article(row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((rows, total))
    }

    async fn insert_favorite(&self, user_id: i64, article_id: i64) -> Result<(), RequestError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.favorites.contains(&(user_id, article_id)) {
            inner.favorites.push((user_id, article_id));
        }
        Ok(())
    }

    async fn delete_favorite(&self, user_id: i64, article_id: i64) -> Result<(), RequestError> {
        let mut inner = self.inner.write().unwrap();
        inner.favorites.retain(|&pair| pair != (user_id, article_id));
        Ok(())
    }

    async fn favorites_count(&self, article_id: i64) -> Result<i64, RequestError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .favorites
            .iter()
            .filter(|&&(_, a)| a == article_id)
            .count() as i64)
    }

    async fn insert_comment(
        &self,
        article_id: i64,
        author_id: i64,
        body: &str,
    ) -> Result<Comment, RequestError> {
        let mut inner = self.inner.write().unwrap();
        let id = inner.next_id();
        let timestamp = now();
        inner.comments.push(CommentRow {
            id,
            body: body.to_string(),
            article_id,
            author_id,
            created_at: timestamp,
            updated_at: timestamp,
        });
        let row = inner.comments.last().unwrap();
        inner.project_comment(row)
    }

    async fn comments_for_article(&self, article_id: i64) -> Result<Vec<Comment>, RequestError> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<&CommentRow> = inner
            .comments
            .iter()
            .filter(|c| c.article_id == article_id)
            .collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        rows.into_iter()
            .map(|row| inner.project_comment(row))
            .collect()
    }

    async fn comment_by_id(&self, comment_id: i64) -> Result<Option<Comment>, RequestError> {
        let inner = self.inner.read().unwrap();
        match inner.comments.iter().find(|c| c.id == comment_id) {
            Some(row) => Ok(Some(inner.project_comment(row)?)),
            None => Ok(None),
        }
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<(), RequestError> {
        let mut inner = self.inner.write().unwrap();
        let index = inner
            .comments
            .iter()
            .position(|c| c.id == comment_id)
            .ok_or(RequestError::NotFound("Comment not found"))?;
        inner.comments.remove(index);
        Ok(())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, RequestError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn is_following(
        &self,
        follower_id: i64,
        following_id: i64,
    ) -> Result<bool, RequestError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.following_id == following_id))
    }

    async fn insert_follow(
        &self,
        follower_id: i64,
        following_id: i64,
    ) -> Result<(), RequestError> {
        let mut inner = self.inner.write().unwrap();
        let exists = inner
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.following_id == following_id);
        if !exists {
            inner.follows.push(FollowRow {
                follower_id,
                following_id,
                created_at: now(),
            });
        }
        Ok(())
    }

    async fn delete_follow(
        &self,
        follower_id: i64,
        following_id: i64,
    ) -> Result<(), RequestError> {
        let mut inner = self.inner.write().unwrap();
        inner
            .follows
            .retain(|f| !(f.follower_id == follower_id && f.following_id == following_id));
        Ok(())
    }

    async fn following_ids(&self, follower_id: i64) -> Result<Vec<i64>, RequestError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .follows
            .iter()
            .filter(|f| f.follower_id == follower_id)
            .map(|f| f.following_id)
            .collect())
    }

    async fn follows_touching(&self, user_id: i64) -> Result<Vec<FollowEdge>, RequestError> {
        let inner = self.inner.read().unwrap();
        inner
            .follows
            .iter()
            .filter(|f| f.follower_id == user_id || f.following_id == user_id)
            .map(|f| {
                Ok(FollowEdge {
                    follower_id: f.follower_id,
                    following_id: f.following_id,
                    follower_username: inner.author_of(f.follower_id)?.username,
                    following_username: inner.author_of(f.following_id)?.username,
                    created_at: f.created_at,
                })
            })
            .collect()
    }

    async fn all_tags(&self) -> Result<Vec<String>, RequestError> {
        let inner = self.inner.read().unwrap();
        let mut tags: Vec<String> = inner
            .articles
            .iter()
            .flat_map(|a| a.tag_list.iter().cloned())
            .collect();
        tags.sort();
        tags.dedup();
        Ok(tags)
    }
}

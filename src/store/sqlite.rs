use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{Sqlite, SqlitePool};

use crate::data_formats::{
    ArticleQueryParams, CreateArticleRequest, FeedQueryParams, UpdateArticleRequest,
};
use crate::errors::RequestError;
use crate::models::{Article, Author, Comment, FollowEdge, User};
use crate::slugify;

use super::Store;

/// `sqlx`-backed store. All SQL lives here; every read of an article or a
/// comment joins the author projection so callers never issue a second
/// lookup.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteStore { pool }
    }
}

const ARTICLE_QUERY: &str = r#"
    SELECT articles.id          AS id,
           articles.slug        AS slug,
           articles.title       AS title,
           articles.description AS description,
           articles.body        AS body,
           articles.author_id   AS author_id,
           articles.created_at  AS created_at,
           articles.updated_at  AS updated_at,
           (SELECT group_concat(tags.name, ',')
              FROM tags
                   JOIN article_tags
                     ON article_tags.tag_id = tags.id
             WHERE article_tags.article_id = articles.id) AS tag_list,
           users.username       AS author_username,
           users.bio            AS author_bio,
           users.image          AS author_image
      FROM articles
           JOIN users
             ON articles.author_id = users.id
"#;

const LIST_FILTER: &str = r#"
     WHERE ( users.username = $1 OR $1 IS NULL )
       AND ( $2 IS NULL
             OR EXISTS (SELECT 1
                          FROM article_tags
                               JOIN tags
                                 ON tags.id = article_tags.tag_id
                         WHERE article_tags.article_id = articles.id
                           AND tags.name = $2) )
"#;

const COMMENT_QUERY: &str = r#"
    SELECT comments.id         AS id,
           comments.body       AS body,
           comments.article_id AS article_id,
           comments.author_id  AS author_id,
           comments.created_at AS created_at,
           comments.updated_at AS updated_at,
           users.username      AS author_username,
           users.bio           AS author_bio,
           users.image         AS author_image
      FROM comments
           JOIN users
             ON comments.author_id = users.id
"#;

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    slug: String,
    title: String,
    description: String,
    body: String,
    author_id: i64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    tag_list: Option<String>,
    author_username: String,
    author_bio: Option<String>,
    author_image: Option<String>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: row.id,
            slug: row.slug,
            title: row.title,
            description: row.description,
            body: row.body,
            tag_list: row
                .tag_list
                .map(|tags| tags.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
            author_id: row.author_id,
            author: Author {
                username: row.author_username,
                bio: row.author_bio,
                image: row.author_image,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    body: String,
    article_id: i64,
    author_id: i64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    author_username: String,
    author_bio: Option<String>,
    author_image: Option<String>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            body: row.body,
            article_id: row.article_id,
            author_id: row.author_id,
            author: Author {
                username: row.author_username,
                bio: row.author_bio,
                image: row.author_image,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(e) => e.message().contains("UNIQUE constraint failed"),
        _ => false,
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_article(
        &self,
        author_id: i64,
        article: CreateArticleRequest,
    ) -> Result<Article, RequestError> {
        let slug = slugify(&article.title);
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_scalar::<Sqlite, i64>(
            r#"
            INSERT INTO articles (slug, title, description, body, author_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&slug)
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.body)
        .bind(author_id)
        .fetch_one(&mut tx)
        .await;

        let article_id = match inserted {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => {
                return Err(RequestError::Conflict(
                    "An article with this title already exists",
                ))
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(tags) = &article.tag_list {
            for tag in tags {
                let tag_id = sqlx::query_scalar::<Sqlite, i64>(
                    r#"
                    INSERT INTO tags (name)
                    VALUES ($1)
                    ON CONFLICT (name) DO UPDATE SET name = $1
                    RETURNING id
                    "#,
                )
                .bind(tag)
                .fetch_one(&mut tx)
                .await?;

                sqlx::query(
                    r#"
                    INSERT INTO article_tags (article_id, tag_id)
                    VALUES ($1, $2)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(article_id)
                .bind(tag_id)
                .execute(&mut tx)
                .await?;
            }
        }
        tx.commit().await?;

        self.article_by_slug(&slug)
            .await?
            .ok_or(RequestError::ServerError)
    }

    async fn article_by_slug(&self, slug: &str) -> Result<Option<Article>, RequestError> {
        let query = format!("{} WHERE articles.slug = $1", ARTICLE_QUERY);
        let row = sqlx::query_as::<Sqlite, ArticleRow>(&query)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Article::from))
    }

    async fn update_article(
        &self,
        slug: &str,
        patch: UpdateArticleRequest,
    ) -> Result<Article, RequestError> {
        let new_slug = patch.title.as_deref().map(slugify);

        let mut clause = String::from("SET ");
        let mut params: Vec<String> = Vec::new();
        let columns = [
            ("title", patch.title),
            ("description", patch.description),
            ("body", patch.body),
            ("slug", new_slug.clone()),
        ];
        for (column, value) in columns {
            if let Some(value) = value {
                clause.push_str(&format!("{} = ${}, ", column, params.len() + 1));
                params.push(value);
            }
        }
        let query = format!(
            "UPDATE articles {}updated_at = CURRENT_TIMESTAMP WHERE slug = ${}",
            clause,
            params.len() + 1
        );

        let mut update = sqlx::query(&query);
        for param in &params {
            update = update.bind(param);
        }
        let result = match update.bind(slug).execute(&self.pool).await {
            Ok(result) => result,
            Err(e) if is_unique_violation(&e) => {
                return Err(RequestError::Conflict(
                    "An article with this title already exists",
                ))
            }
            Err(e) => return Err(e.into()),
        };
        if result.rows_affected() == 0 {
            return Err(RequestError::NotFound("Article not found"));
        }

        let slug = new_slug.as_deref().unwrap_or(slug);
        self.article_by_slug(slug)
            .await?
            .ok_or(RequestError::ServerError)
    }

    async fn delete_article(&self, slug: &str) -> Result<(), RequestError> {
        // comments, favorites and tag links go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM articles WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RequestError::NotFound("Article not found"));
        }
        Ok(())
    }

    async fn list_articles(
        &self,
        filter: &ArticleQueryParams,
    ) -> Result<(Vec<Article>, i64), RequestError> {
        let query = format!(
            "{}{} ORDER BY articles.id DESC LIMIT $3 OFFSET $4",
            ARTICLE_QUERY, LIST_FILTER
        );
        let rows = sqlx::query_as::<Sqlite, ArticleRow>(&query)
            .bind(filter.author.as_deref())
            .bind(filter.tag.as_deref())
            .bind(filter.limit as i64)
            .bind(filter.offset as i64)
            .fetch_all(&self.pool)
            .await?;

        let count_query = format!(
            "SELECT count(*) FROM articles JOIN users ON articles.author_id = users.id {}",
            LIST_FILTER
        );
        let total = sqlx::query_scalar::<Sqlite, i64>(&count_query)
            .bind(filter.author.as_deref())
            .bind(filter.tag.as_deref())
            .fetch_one(&self.pool)
            .await?;

        Ok((rows.into_iter().map(Article::from).collect(), total))
    }

    async fn feed_articles(
        &self,
        author_ids: &[i64],
        page: FeedQueryParams,
    ) -> Result<(Vec<Article>, i64), RequestError> {
        // ids are i64s we resolved ourselves, safe to format into the IN list
        let ids = author_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        let query = format!(
            "{} WHERE articles.author_id IN ({}) \
             ORDER BY articles.created_at DESC, articles.id DESC LIMIT $1 OFFSET $2",
            ARTICLE_QUERY, ids
        );
        let rows = sqlx::query_as::<Sqlite, ArticleRow>(&query)
            .bind(page.limit as i64)
            .bind(page.offset as i64)
            .fetch_all(&self.pool)
            .await?;

        let count_query = format!(
            "SELECT count(*) FROM articles WHERE author_id IN ({})",
            ids
        );
        let total = sqlx::query_scalar::<Sqlite, i64>(&count_query)
            .fetch_one(&self.pool)
            .await?;

        Ok((rows.into_iter().map(Article::from).collect(), total))
    }

    async fn insert_favorite(&self, user_id: i64, article_id: i64) -> Result<(), RequestError> {
        sqlx::query(
            r#"
            INSERT INTO favorites (user_id, article_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(article_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_favorite(&self, user_id: i64, article_id: i64) -> Result<(), RequestError> {
        sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND article_id = $2")
            .bind(user_id)
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn favorites_count(&self, article_id: i64) -> Result<i64, RequestError> {
        let count =
            sqlx::query_scalar::<Sqlite, i64>("SELECT count(*) FROM favorites WHERE article_id = $1")
                .bind(article_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn insert_comment(
        &self,
        article_id: i64,
        author_id: i64,
        body: &str,
    ) -> Result<Comment, RequestError> {
        let comment_id = sqlx::query_scalar::<Sqlite, i64>(
            r#"
            INSERT INTO comments (body, author_id, article_id)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(body)
        .bind(author_id)
        .bind(article_id)
        .fetch_one(&self.pool)
        .await?;

        self.comment_by_id(comment_id)
            .await?
            .ok_or(RequestError::ServerError)
    }

    async fn comments_for_article(&self, article_id: i64) -> Result<Vec<Comment>, RequestError> {
        let query = format!(
            "{} WHERE comments.article_id = $1 \
             ORDER BY comments.created_at DESC, comments.id DESC",
            COMMENT_QUERY
        );
        let rows = sqlx::query_as::<Sqlite, CommentRow>(&query)
            .bind(article_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn comment_by_id(&self, comment_id: i64) -> Result<Option<Comment>, RequestError> {
        let query = format!("{} WHERE comments.id = $1", COMMENT_QUERY);
        let row = sqlx::query_as::<Sqlite, CommentRow>(&query)
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Comment::from))
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<(), RequestError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RequestError::NotFound("Comment not found"));
        }
        Ok(())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, RequestError> {
        let user = sqlx::query_as::<Sqlite, User>(
            "SELECT id, username, bio, image, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn is_following(
        &self,
        follower_id: i64,
        following_id: i64,
    ) -> Result<bool, RequestError> {
        let exists = sqlx::query_scalar::<Sqlite, i64>(
            r#"
            SELECT EXISTS (SELECT 1
                             FROM follows
                            WHERE follower_id = $1
                              AND following_id = $2)
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists != 0)
    }

    async fn insert_follow(
        &self,
        follower_id: i64,
        following_id: i64,
    ) -> Result<(), RequestError> {
        sqlx::query(
            r#"
            INSERT INTO follows (follower_id, following_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_follow(
        &self,
        follower_id: i64,
        following_id: i64,
    ) -> Result<(), RequestError> {
        sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
            .bind(follower_id)
            .bind(following_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn following_ids(&self, follower_id: i64) -> Result<Vec<i64>, RequestError> {
        let ids = sqlx::query_scalar::<Sqlite, i64>(
            "SELECT following_id FROM follows WHERE follower_id = $1",
        )
        .bind(follower_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn follows_touching(&self, user_id: i64) -> Result<Vec<FollowEdge>, RequestError> {
        let edges = sqlx::query_as::<Sqlite, FollowEdge>(
            r#"
            SELECT follows.follower_id  AS follower_id,
                   follows.following_id AS following_id,
                   follows.created_at   AS created_at,
                   follower.username    AS follower_username,
                   following.username   AS following_username
              FROM follows
                   JOIN users AS follower
                     ON follows.follower_id = follower.id
                   JOIN users AS following
                     ON follows.following_id = following.id
             WHERE follows.follower_id = $1
                OR follows.following_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(edges)
    }

    async fn all_tags(&self) -> Result<Vec<String>, RequestError> {
        let tags = sqlx::query_scalar::<Sqlite, String>(
            r#"
            SELECT DISTINCT tags.name
              FROM tags
                   JOIN article_tags
                     ON article_tags.tag_id = tags.id
             ORDER BY tags.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }
}

mod authentication;
mod data_formats;
mod errors;
mod handlers;
pub mod models;
mod policy;
pub mod store;

use std::sync::Arc;

use anyhow::Context;
pub use anyhow::Result;
use axum::http::StatusCode;
use axum::{routing::*, Extension, Json, Router};
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::net::SocketAddr;

pub use authentication::{get_jwt_token, verify_jwt_token};
pub use data_formats::*;
pub use errors::{RequestError, RequestErrorJsonWrapper};
use handlers::*;
use store::{DynStore, SqliteStore};

pub type JsonResponse<T> = (StatusCode, Json<T>);

/// URL-safe identifier derived from an article title: lowercase, strip
/// everything that is not alphanumeric or whitespace, collapse whitespace
/// runs into single hyphens.
pub fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

pub async fn run_app(address: SocketAddr) -> Result<()> {
    let store = init_db().await?;
    let app = make_router(Arc::new(store));
    tracing::info!("listening on {}", address);
    axum::Server::bind(&address)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

pub async fn init_db() -> Result<SqliteStore> {
    let db_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    if !Sqlite::database_exists(&db_url).await.unwrap_or(false) {
        tracing::info!("creating database {}", db_url);
        Sqlite::create_database(&db_url)
            .await
            .context("Failed to create database")?;
    }
    let pool = SqlitePool::connect(&db_url).await?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("migrations completed");
    Ok(SqliteStore::new(pool))
}

pub fn make_router(store: DynStore) -> Router {
    let api = Router::new()
        .route("/articles", post(create_article).get(list_articles))
        .route("/articles/feed", get(feed_articles))
        .route(
            "/articles/:slug",
            get(get_article).put(update_article).delete(delete_article),
        )
        .route(
            "/articles/:slug/favorite",
            post(favorite_article).delete(unfavorite_article),
        )
        .route(
            "/articles/:slug/comments",
            post(create_comment).get(list_comments),
        )
        .route("/articles/:slug/comments/:id", delete(delete_comment))
        .route("/profiles/:username", get(get_profile))
        .route(
            "/profiles/:username/follow",
            post(follow_profile).delete(unfollow_profile),
        )
        .route("/profiles/debug/follows/:user_id", get(debug_follows))
        .route("/tags", get(get_tags));

    Router::new()
        .route("/check_health", get(alive))
        .nest("/api", api)
        .fallback(not_found)
        .layer(Extension(store))
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_strips_punctuation_and_hyphenates() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
    }

    #[test]
    fn slugify_collapses_whitespace_runs() {
        assert_eq!(slugify("  How   to   train\tdragons "), "how-to-train-dragons");
    }

    #[test]
    fn slugify_is_deterministic() {
        assert_eq!(slugify("Same Title"), slugify("Same Title"));
    }
}

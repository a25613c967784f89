use std::net::TcpListener;
use std::sync::Arc;

use conduit::store::{DynStore, MemoryStore};
use conduit::{get_jwt_token, make_router};
use serde_json::{json, Value};

struct TestApp {
    base: String,
    store: Arc<MemoryStore>,
    client: reqwest::Client,
}

async fn spawn_app() -> TestApp {
    std::env::set_var("JWT_SECRET", "integration-test-secret");
    let store = Arc::new(MemoryStore::new());
    let router = make_router(store.clone() as DynStore);

    let listener = TcpListener::bind("127.0.0.1:0").expect("could not bind a free port");
    listener.set_nonblocking(true).unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(router.into_make_service())
            .await
            .unwrap();
    });

    TestApp {
        base: format!("http://127.0.0.1:{}/api", port),
        store,
        client: reqwest::Client::new(),
    }
}

fn token_for(id: i64, username: &str) -> String {
    let token = get_jwt_token(id, &format!("{}@example.com", username)).unwrap();
    format!("Token {}", token)
}

fn article_body(title: &str, tags: &[&str]) -> Value {
    json!({
        "article": {
            "title": title,
            "description": "a description",
            "body": "a body",
            "tagList": tags,
        }
    })
}

impl TestApp {
    async fn post(&self, path: &str, token: Option<&str>, body: &Value) -> reqwest::Response {
        let mut request = self.client.post(format!("{}{}", self.base, path)).json(body);
        if let Some(token) = token {
            request = request.header("Authorization", token);
        }
        request.send().await.unwrap()
    }

    async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(format!("{}{}", self.base, path));
        if let Some(token) = token {
            request = request.header("Authorization", token);
        }
        request.send().await.unwrap()
    }

    async fn put(&self, path: &str, token: &str, body: &Value) -> reqwest::Response {
        self.client
            .put(format!("{}{}", self.base, path))
            .header("Authorization", token)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    async fn delete(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.delete(format!("{}{}", self.base, path));
        if let Some(token) = token {
            request = request.header("Authorization", token);
        }
        request.send().await.unwrap()
    }
}

#[tokio::test]
async fn article_lifecycle() {
    let app = spawn_app().await;
    let alice = app.store.seed_user("alice", Some("likes rust"), None);
    let token = token_for(alice, "alice");

    let response = app
        .post("/articles", Some(&token), &article_body("Hello, World!", &["greetings"]))
        .await;
    assert_eq!(response.status(), 200);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["article"]["slug"], "hello-world");
    assert_eq!(created["article"]["author"]["username"], "alice");
    assert!(created["article"].get("authorId").is_none());

    let response = app.get("/articles/hello-world", None).await;
    assert_eq!(response.status(), 200);
    let fetched: Value = response.json().await.unwrap();
    assert_eq!(fetched["article"]["title"], "Hello, World!");

    let response = app
        .put(
            "/articles/hello-world",
            &token,
            &json!({ "article": { "title": "Goodbye, World!" } }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["article"]["slug"], "goodbye-world");

    let response = app.get("/articles/hello-world", None).await;
    assert_eq!(response.status(), 404);

    let response = app.delete("/articles/goodbye-world", Some(&token)).await;
    assert_eq!(response.status(), 200);
    let deleted: Value = response.json().await.unwrap();
    assert_eq!(deleted["message"], "Article deleted successfully");

    let response = app.get("/articles/goodbye-world", None).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn author_id_never_leaks_from_listings() {
    let app = spawn_app().await;
    let alice = app.store.seed_user("alice", None, None);
    let token = token_for(alice, "alice");
    app.post("/articles", Some(&token), &article_body("Leak Check", &[]))
        .await;

    let listing: Value = app.get("/articles", None).await.json().await.unwrap();
    for article in listing["articles"].as_array().unwrap() {
        assert!(article.get("authorId").is_none());
        assert!(article.get("author_id").is_none());
    }
}

#[tokio::test]
async fn only_the_author_may_update_or_delete() {
    let app = spawn_app().await;
    let alice = app.store.seed_user("alice", None, None);
    let bob = app.store.seed_user("bob", None, None);
    let alice_token = token_for(alice, "alice");
    let bob_token = token_for(bob, "bob");

    app.post("/articles", Some(&alice_token), &article_body("Owned", &[]))
        .await;

    let response = app
        .put("/articles/owned", &bob_token, &json!({ "article": { "body": "hijack" } }))
        .await;
    assert_eq!(response.status(), 401);

    let response = app.delete("/articles/owned", Some(&bob_token)).await;
    assert_eq!(response.status(), 401);

    // missing credentials are rejected before the handler runs
    let response = app.delete("/articles/owned", None).await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn duplicate_title_is_a_conflict() {
    let app = spawn_app().await;
    let alice = app.store.seed_user("alice", None, None);
    let token = token_for(alice, "alice");

    let first = app
        .post("/articles", Some(&token), &article_body("Twice Told", &[]))
        .await;
    assert_eq!(first.status(), 200);
    let second = app
        .post("/articles", Some(&token), &article_body("Twice Told", &[]))
        .await;
    assert_eq!(second.status(), 409);
}

#[tokio::test]
async fn favoriting_is_idempotent() {
    let app = spawn_app().await;
    let alice = app.store.seed_user("alice", None, None);
    let bob = app.store.seed_user("bob", None, None);
    let alice_token = token_for(alice, "alice");
    let bob_token = token_for(bob, "bob");

    app.post("/articles", Some(&alice_token), &article_body("Popular", &[]))
        .await;

    let first: Value = app
        .post("/articles/popular/favorite", Some(&bob_token), &json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first["article"]["favorited"], true);
    assert_eq!(first["article"]["favoritesCount"], 1);

    let second: Value = app
        .post("/articles/popular/favorite", Some(&bob_token), &json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(second["article"]["favoritesCount"], 1);

    let removed: Value = app
        .delete("/articles/popular/favorite", Some(&bob_token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(removed["article"]["favorited"], false);
    assert_eq!(removed["article"]["favoritesCount"], 0);

    // unfavoriting an unfavorited article leaves the count unchanged
    let again: Value = app
        .delete("/articles/popular/favorite", Some(&bob_token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(again["article"]["favoritesCount"], 0);
}

#[tokio::test]
async fn feed_is_scoped_to_followed_authors() {
    let app = spawn_app().await;
    let alice = app.store.seed_user("alice", None, None);
    let bob = app.store.seed_user("bob", None, None);
    let carol = app.store.seed_user("carol", None, None);
    let alice_token = token_for(alice, "alice");
    let bob_token = token_for(bob, "bob");
    let carol_token = token_for(carol, "carol");

    // following nobody: empty feed, and no article query issued at all
    let empty: Value = app
        .get("/articles/feed", Some(&bob_token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(empty["articlesCount"], 0);
    assert_eq!(empty["articles"].as_array().unwrap().len(), 0);
    assert_eq!(app.store.feed_queries(), 0);

    app.post("/articles", Some(&alice_token), &article_body("From Alice One", &[]))
        .await;
    app.post("/articles", Some(&alice_token), &article_body("From Alice Two", &[]))
        .await;
    app.post("/articles", Some(&carol_token), &article_body("From Carol", &[]))
        .await;

    // following twice leaves exactly one edge
    app.post("/profiles/alice/follow", Some(&bob_token), &json!({}))
        .await;
    let followed: Value = app
        .post("/profiles/alice/follow", Some(&bob_token), &json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(followed["profile"]["following"], true);

    let feed: Value = app
        .get("/articles/feed", Some(&bob_token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(feed["articlesCount"], 2);
    let articles = feed["articles"].as_array().unwrap();
    assert_eq!(articles.len(), 2);
    for article in articles {
        assert_eq!(article["author"]["username"], "alice");
    }

    // unfollowing a non-followed user is a no-op
    app.delete("/profiles/alice/follow", Some(&bob_token)).await;
    let response = app.delete("/profiles/alice/follow", Some(&bob_token)).await;
    assert_eq!(response.status(), 200);

    let empty_again: Value = app
        .get("/articles/feed", Some(&bob_token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(empty_again["articlesCount"], 0);
}

#[tokio::test]
async fn feed_requires_authentication() {
    let app = spawn_app().await;
    let response = app.get("/articles/feed", None).await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn self_follow_is_rejected() {
    let app = spawn_app().await;
    let alice = app.store.seed_user("alice", None, None);
    let token = token_for(alice, "alice");

    let response = app
        .post("/profiles/alice/follow", Some(&token), &json!({}))
        .await;
    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn profile_treats_bad_credentials_as_anonymous() {
    let app = spawn_app().await;
    app.store.seed_user("alice", Some("a bio"), None);

    let anonymous: Value = app.get("/profiles/alice", None).await.json().await.unwrap();
    assert_eq!(anonymous["profile"]["following"], false);
    assert_eq!(anonymous["profile"]["bio"], "a bio");

    // a malformed credential on an optional-auth endpoint is swallowed
    let response = app.get("/profiles/alice", Some("Token not-a-jwt")).await;
    assert_eq!(response.status(), 200);
    let profile: Value = response.json().await.unwrap();
    assert_eq!(profile["profile"]["following"], false);

    let response = app.get("/profiles/nobody", None).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn comment_lifecycle_and_scoping() {
    let app = spawn_app().await;
    let alice = app.store.seed_user("alice", None, None);
    let bob = app.store.seed_user("bob", None, None);
    let alice_token = token_for(alice, "alice");
    let bob_token = token_for(bob, "bob");

    app.post("/articles", Some(&alice_token), &article_body("Discussed", &[]))
        .await;
    app.post("/articles", Some(&alice_token), &article_body("Quiet", &[]))
        .await;

    let created: Value = app
        .post(
            "/articles/discussed/comments",
            Some(&bob_token),
            &json!({ "comment": { "body": "first!" } }),
        )
        .await
        .json()
        .await
        .unwrap();
    let comment_id = created["comment"]["id"].as_i64().unwrap();
    assert_eq!(created["comment"]["author"]["username"], "bob");

    let listed: Value = app
        .get("/articles/discussed/comments", None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listed["comments"].as_array().unwrap().len(), 1);

    // a comment can only be deleted through the article it belongs to
    let response = app
        .delete(
            &format!("/articles/quiet/comments/{}", comment_id),
            Some(&bob_token),
        )
        .await;
    assert_eq!(response.status(), 404);

    // and only by its author
    let response = app
        .delete(
            &format!("/articles/discussed/comments/{}", comment_id),
            Some(&alice_token),
        )
        .await;
    assert_eq!(response.status(), 401);

    let response = app
        .delete(
            &format!("/articles/discussed/comments/{}", comment_id),
            Some(&bob_token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let deleted: Value = response.json().await.unwrap();
    assert_eq!(deleted["message"], "Comment deleted successfully");

    let listed: Value = app
        .get("/articles/discussed/comments", None)
        .await
        .json()
        .await
        .unwrap();
    assert!(listed["comments"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn empty_comment_body_is_rejected() {
    let app = spawn_app().await;
    let alice = app.store.seed_user("alice", None, None);
    let token = token_for(alice, "alice");
    app.post("/articles", Some(&token), &article_body("Strict", &[]))
        .await;

    let response = app
        .post(
            "/articles/strict/comments",
            Some(&token),
            &json!({ "comment": { "body": "   " } }),
        )
        .await;
    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn tag_names_with_commas_are_rejected() {
    let app = spawn_app().await;
    let alice = app.store.seed_user("alice", None, None);
    let token = token_for(alice, "alice");

    let response = app
        .post("/articles", Some(&token), &article_body("Tagged", &["go,web"]))
        .await;
    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn tags_are_sorted_and_deduplicated() {
    let app = spawn_app().await;
    let alice = app.store.seed_user("alice", None, None);
    let token = token_for(alice, "alice");

    app.post("/articles", Some(&token), &article_body("On Go", &["go", "web"]))
        .await;
    app.post("/articles", Some(&token), &article_body("On APIs", &["api", "go"]))
        .await;

    let tags: Value = app.get("/tags", None).await.json().await.unwrap();
    assert_eq!(tags["tags"], json!(["api", "go", "web"]));
}

#[tokio::test]
async fn listing_filters_by_tag_and_author() {
    let app = spawn_app().await;
    let alice = app.store.seed_user("alice", None, None);
    let bob = app.store.seed_user("bob", None, None);
    let alice_token = token_for(alice, "alice");
    let bob_token = token_for(bob, "bob");

    app.post("/articles", Some(&alice_token), &article_body("Alice on Rust", &["rust"]))
        .await;
    app.post("/articles", Some(&bob_token), &article_body("Bob on Rust", &["rust"]))
        .await;
    app.post("/articles", Some(&bob_token), &article_body("Bob on Go", &["go"]))
        .await;

    let by_tag: Value = app
        .get("/articles?tag=rust", None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(by_tag["articlesCount"], 2);

    let by_author: Value = app
        .get("/articles?author=bob", None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(by_author["articlesCount"], 2);

    let both: Value = app
        .get("/articles?author=bob&tag=rust", None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(both["articlesCount"], 1);
    assert_eq!(both["articles"][0]["slug"], "bob-on-rust");

    // most recently created first
    let all: Value = app.get("/articles", None).await.json().await.unwrap();
    assert_eq!(all["articles"][0]["slug"], "bob-on-go");
}

#[tokio::test]
async fn debug_follows_dump_lists_both_directions() {
    let app = spawn_app().await;
    let _alice = app.store.seed_user("alice", None, None);
    let bob = app.store.seed_user("bob", None, None);
    let carol = app.store.seed_user("carol", None, None);
    let bob_token = token_for(bob, "bob");
    let carol_token = token_for(carol, "carol");

    app.post("/profiles/alice/follow", Some(&bob_token), &json!({}))
        .await;
    app.post("/profiles/bob/follow", Some(&carol_token), &json!({}))
        .await;

    let dump: Value = app
        .get(&format!("/profiles/debug/follows/{}", bob), None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(dump["userId"], bob);
    let edges = dump["followRelationships"].as_array().unwrap();
    assert_eq!(edges.len(), 2);
    assert!(edges
        .iter()
        .any(|e| e["followerUsername"] == "bob" && e["followingUsername"] == "alice"));
    assert!(edges
        .iter()
        .any(|e| e["followerUsername"] == "carol" && e["followingUsername"] == "bob"));
}

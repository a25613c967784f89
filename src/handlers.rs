use axum::{
    extract::{Path, Query},
    http::{StatusCode, Uri},
    Extension, Json,
};

use crate::{
    authentication::{AuthUser, MaybeUser},
    data_formats::{
        ArticleQueryParams, ArticleResponse, ArticleWrapper, CommentRequest, CommentResponse,
        CommentWrapper, CreateArticleRequest, FeedQueryParams, FollowsDumpWrapper,
        MessageResponse, MultipleArticlesWrapper, MultipleCommentsWrapper, ProfileResponse,
        ProfileWrapper, TagsWrapper, UpdateArticleRequest,
    },
    errors::{RequestError, RequestErrorJsonWrapper},
    models::User,
    policy,
    store::DynStore,
    JsonResponse,
};

type HandlerResult<T> = Result<Json<T>, RequestError>;

// ----------------- Helper Handlers -----------------
pub async fn alive() -> &'static str {
    "alive"
}

pub async fn not_found(uri: Uri) -> JsonResponse<RequestErrorJsonWrapper> {
    (
        StatusCode::NOT_FOUND,
        Json(RequestErrorJsonWrapper::new(&format!(
            "URL {} provided was not found",
            uri
        ))),
    )
}

// ----------------- Article Handlers -----------------
pub async fn create_article(
    Extension(store): Extension<DynStore>,
    user: AuthUser,
    Json(ArticleWrapper { article }): Json<ArticleWrapper<CreateArticleRequest>>,
) -> HandlerResult<ArticleWrapper<ArticleResponse>> {
    if article.title.trim().is_empty() {
        return Err(RequestError::Validation("Title must not be empty"));
    }
    // the tag list round-trips through a comma-joined aggregate in sqlite
    if let Some(tags) = &article.tag_list {
        if tags.iter().any(|tag| tag.contains(',')) {
            return Err(RequestError::Validation("Tag names must not contain commas"));
        }
    }
    let article = store.insert_article(user.id, article).await?;
    Ok(Json(ArticleWrapper {
        article: ArticleResponse::new(article),
    }))
}

pub async fn get_article(
    Extension(store): Extension<DynStore>,
    Path(slug): Path<String>,
) -> HandlerResult<ArticleWrapper<ArticleResponse>> {
    let article = store
        .article_by_slug(&slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;
    Ok(Json(ArticleWrapper {
        article: ArticleResponse::new(article),
    }))
}

pub async fn update_article(
    Extension(store): Extension<DynStore>,
    user: AuthUser,
    Path(slug): Path<String>,
    Json(ArticleWrapper { article: patch }): Json<ArticleWrapper<UpdateArticleRequest>>,
) -> HandlerResult<ArticleWrapper<ArticleResponse>> {
    let article = store
        .article_by_slug(&slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;
    if !policy::can_mutate(user.id, article.author_id) {
        return Err(RequestError::NotAuthorized(
            "Not authorized to update this article",
        ));
    }
    if matches!(&patch.title, Some(title) if title.trim().is_empty()) {
        return Err(RequestError::Validation("Title must not be empty"));
    }
    let article = store.update_article(&slug, patch).await?;
    Ok(Json(ArticleWrapper {
        article: ArticleResponse::new(article),
    }))
}

pub async fn delete_article(
    Extension(store): Extension<DynStore>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> HandlerResult<MessageResponse> {
    let article = store
        .article_by_slug(&slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;
    if !policy::can_mutate(user.id, article.author_id) {
        return Err(RequestError::NotAuthorized(
            "Not authorized to delete this article",
        ));
    }
    store.delete_article(&slug).await?;
    Ok(Json(MessageResponse {
        message: "Article deleted successfully",
    }))
}

pub async fn list_articles(
    Extension(store): Extension<DynStore>,
    Query(params): Query<ArticleQueryParams>,
) -> HandlerResult<MultipleArticlesWrapper> {
    let (articles, articles_count) = store.list_articles(&params).await?;
    Ok(Json(MultipleArticlesWrapper {
        articles: articles.into_iter().map(ArticleResponse::new).collect(),
        articles_count,
    }))
}

pub async fn feed_articles(
    Extension(store): Extension<DynStore>,
    user: AuthUser,
    Query(params): Query<FeedQueryParams>,
) -> HandlerResult<MultipleArticlesWrapper> {
    let following = store.following_ids(user.id).await?;
    // following nobody means an empty feed, no article query issued
    if following.is_empty() {
        return Ok(Json(MultipleArticlesWrapper {
            articles: vec![],
            articles_count: 0,
        }));
    }
    let (articles, articles_count) = store.feed_articles(&following, params).await?;
    Ok(Json(MultipleArticlesWrapper {
        articles: articles.into_iter().map(ArticleResponse::new).collect(),
        articles_count,
    }))
}

pub async fn favorite_article(
    Extension(store): Extension<DynStore>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> HandlerResult<ArticleWrapper<ArticleResponse>> {
    let article = store
        .article_by_slug(&slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;
    store.insert_favorite(user.id, article.id).await?;
    let count = store.favorites_count(article.id).await?;
    Ok(Json(ArticleWrapper {
        article: ArticleResponse::favorited(article, true, count),
    }))
}

pub async fn unfavorite_article(
    Extension(store): Extension<DynStore>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> HandlerResult<ArticleWrapper<ArticleResponse>> {
    let article = store
        .article_by_slug(&slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;
    store.delete_favorite(user.id, article.id).await?;
    let count = store.favorites_count(article.id).await?;
    Ok(Json(ArticleWrapper {
        article: ArticleResponse::favorited(article, false, count),
    }))
}

// ----------------- Comment Handlers -----------------
pub async fn create_comment(
    Extension(store): Extension<DynStore>,
    user: AuthUser,
    Path(slug): Path<String>,
    Json(CommentWrapper { comment }): Json<CommentWrapper<CommentRequest>>,
) -> HandlerResult<CommentWrapper<CommentResponse>> {
    if comment.body.trim().is_empty() {
        return Err(RequestError::Validation("Comment body must not be empty"));
    }
    let article = store
        .article_by_slug(&slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;
    let comment = store
        .insert_comment(article.id, user.id, &comment.body)
        .await?;
    Ok(Json(CommentWrapper {
        comment: CommentResponse::new(comment),
    }))
}

pub async fn list_comments(
    Extension(store): Extension<DynStore>,
    Path(slug): Path<String>,
) -> HandlerResult<MultipleCommentsWrapper> {
    let article = store
        .article_by_slug(&slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;
    let comments = store.comments_for_article(article.id).await?;
    Ok(Json(MultipleCommentsWrapper {
        comments: comments.into_iter().map(CommentResponse::new).collect(),
    }))
}

pub async fn delete_comment(
    Extension(store): Extension<DynStore>,
    user: AuthUser,
    Path((slug, comment_id)): Path<(String, i64)>,
) -> HandlerResult<MessageResponse> {
    let article = store
        .article_by_slug(&slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;
    let comment = store
        .comment_by_id(comment_id)
        .await?
        .ok_or(RequestError::NotFound("Comment not found"))?;
    // the comment must belong to the article named by the path
    if comment.article_id != article.id {
        return Err(RequestError::NotFound("Comment not found"));
    }
    if !policy::can_mutate(user.id, comment.author_id) {
        return Err(RequestError::NotAuthorized(
            "Not authorized to delete this comment",
        ));
    }
    store.delete_comment(comment_id).await?;
    Ok(Json(MessageResponse {
        message: "Comment deleted successfully",
    }))
}

// ----------------- Profile Handlers -----------------
fn profile_of(user: User, following: bool) -> ProfileResponse {
    ProfileResponse {
        username: user.username,
        bio: user.bio,
        image: user.image,
        following,
    }
}

pub async fn get_profile(
    Extension(store): Extension<DynStore>,
    maybe_user: MaybeUser,
    Path(username): Path<String>,
) -> HandlerResult<ProfileWrapper> {
    let target = store
        .user_by_username(&username)
        .await?
        .ok_or(RequestError::NotFound("Profile not found"))?;
    let following = match maybe_user.get_id() {
        Some(viewer_id) => store.is_following(viewer_id, target.id).await?,
        None => false,
    };
    Ok(Json(ProfileWrapper {
        profile: profile_of(target, following),
    }))
}

pub async fn follow_profile(
    Extension(store): Extension<DynStore>,
    user: AuthUser,
    Path(username): Path<String>,
) -> HandlerResult<ProfileWrapper> {
    let target = store
        .user_by_username(&username)
        .await?
        .ok_or(RequestError::NotFound("Profile not found"))?;
    if target.id == user.id {
        return Err(RequestError::Validation("Cannot follow yourself"));
    }
    store.insert_follow(user.id, target.id).await?;
    let following = store.is_following(user.id, target.id).await?;
    Ok(Json(ProfileWrapper {
        profile: profile_of(target, following),
    }))
}

pub async fn unfollow_profile(
    Extension(store): Extension<DynStore>,
    user: AuthUser,
    Path(username): Path<String>,
) -> HandlerResult<ProfileWrapper> {
    let target = store
        .user_by_username(&username)
        .await?
        .ok_or(RequestError::NotFound("Profile not found"))?;
    store.delete_follow(user.id, target.id).await?;
    Ok(Json(ProfileWrapper {
        profile: profile_of(target, false),
    }))
}

pub async fn debug_follows(
    Extension(store): Extension<DynStore>,
    Path(user_id): Path<i64>,
) -> HandlerResult<FollowsDumpWrapper> {
    // no authorization check on this diagnostic dump; every hit is logged
    tracing::warn!(user_id, "unauthenticated follows dump requested");
    let edges = store.follows_touching(user_id).await?;
    Ok(Json(FollowsDumpWrapper {
        user_id,
        follow_relationships: edges.into_iter().map(Into::into).collect(),
    }))
}

// ----------------- Tag Handlers -----------------
pub async fn get_tags(Extension(store): Extension<DynStore>) -> HandlerResult<TagsWrapper> {
    let tags = store.all_tags().await?;
    Ok(Json(TagsWrapper { tags }))
}

//! `/content`: generation endpoints, local text helpers and history.
//!
//! Every `generate-*` call is counted against the caller's quota before the
//! model is touched, and model output is saved to their history. Malformed
//! requests are rejected before any quota is spent.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use scribe_core::content::requests::{
    BlogIdeasRequest, BlogOutlineRequest, FullBlogPostRequest, KeywordsRequest,
    SeoDescriptionRequest, SeoFaqsRequest, SocialMediaPostsRequest, TagsRequest, TitleRequest,
};
use scribe_core::content::{
    ContentStore, Generated, PersistContext, PgContentStore, history_window,
};
use scribe_core::{quota, text};
use scribe_db::models::{ContentType, GeneratedContent};
use scribe_db::queries::content as content_queries;

use super::{AppError, AppState, CurrentUser};

const TOTAL_COUNT: HeaderName = HeaderName::from_static("x-total-count");

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/content/generate-title", post(generate_title))
        .route("/content/generate-seo-description", post(generate_seo_description))
        .route("/content/generate-blog-ideas", post(generate_blog_ideas))
        .route("/content/generate-blog-outline", post(generate_blog_outline))
        .route("/content/generate-full-blog-post", post(generate_full_blog_post))
        .route("/content/generate-seo-faqs", post(generate_seo_faqs))
        .route("/content/generate-social-media-posts", post(generate_social_media_posts))
        .route("/content/extract-keywords", post(extract_keywords))
        .route("/content/suggest-tags", post(suggest_tags))
        .route("/content/history", get(history))
        .route("/content/history/{id}", get(history_item))
}

/// Render a generation outcome as `{ <field>: value, "source": ... }`.
fn respond<T: Serialize>(field: &str, generated: Generated<T>) -> Result<Response, AppError> {
    let value = serde_json::to_value(&generated.value).map_err(anyhow::Error::from)?;
    let mut body = serde_json::Map::new();
    body.insert(field.to_string(), value);
    body.insert("source".to_string(), json!(generated.source));
    if let Some(record) = &generated.record {
        body.insert("content_id".to_string(), json!(record.id));
    }
    Ok(Json(serde_json::Value::Object(body)).into_response())
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

async fn generate_title(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<TitleRequest>,
) -> Result<Response, AppError> {
    quota::check_and_consume(&state.pool, user.id).await?;
    let store = PgContentStore::new(state.pool.clone());
    let ctx = PersistContext {
        store: &store,
        user_id: user.id,
    };
    let generated = state.content.title(&req, Some(&ctx)).await?;
    respond("generated_title", generated)
}

async fn generate_seo_description(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<SeoDescriptionRequest>,
) -> Result<Response, AppError> {
    quota::check_and_consume(&state.pool, user.id).await?;
    let store = PgContentStore::new(state.pool.clone());
    let ctx = PersistContext {
        store: &store,
        user_id: user.id,
    };
    let generated = state.content.seo_description(&req, Some(&ctx)).await?;
    respond("seo_description", generated)
}

async fn generate_blog_ideas(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<BlogIdeasRequest>,
) -> Result<Response, AppError> {
    req.validate()?;
    quota::check_and_consume(&state.pool, user.id).await?;
    let store = PgContentStore::new(state.pool.clone());
    let ctx = PersistContext {
        store: &store,
        user_id: user.id,
    };
    let generated = state.content.blog_ideas(&req, Some(&ctx)).await?;
    respond("blog_ideas", generated)
}

async fn generate_blog_outline(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<BlogOutlineRequest>,
) -> Result<Response, AppError> {
    req.validate()?;
    quota::check_and_consume(&state.pool, user.id).await?;
    let store = PgContentStore::new(state.pool.clone());
    let ctx = PersistContext {
        store: &store,
        user_id: user.id,
    };
    let generated = state.content.blog_outline(&req, Some(&ctx)).await?;
    respond("blog_outline", generated)
}

async fn generate_full_blog_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<FullBlogPostRequest>,
) -> Result<Response, AppError> {
    quota::check_and_consume(&state.pool, user.id).await?;
    let store = PgContentStore::new(state.pool.clone());
    let ctx = PersistContext {
        store: &store,
        user_id: user.id,
    };
    let generated = state.content.full_blog_post(&req, Some(&ctx)).await?;
    respond("full_blog_post", generated)
}

async fn generate_seo_faqs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<SeoFaqsRequest>,
) -> Result<Response, AppError> {
    req.validate()?;
    quota::check_and_consume(&state.pool, user.id).await?;
    let store = PgContentStore::new(state.pool.clone());
    let ctx = PersistContext {
        store: &store,
        user_id: user.id,
    };
    let generated = state.content.seo_faqs(&req, Some(&ctx)).await?;
    respond("faqs", generated)
}

async fn generate_social_media_posts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<SocialMediaPostsRequest>,
) -> Result<Response, AppError> {
    req.validate()?;
    quota::check_and_consume(&state.pool, user.id).await?;
    let store = PgContentStore::new(state.pool.clone());
    let ctx = PersistContext {
        store: &store,
        user_id: user.id,
    };
    let generated = state.content.social_media_posts(&req, Some(&ctx)).await?;
    respond("social_media_posts", generated)
}

// ---------------------------------------------------------------------------
// Local helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct KeywordsResponse {
    extracted_keywords: Vec<String>,
}

async fn extract_keywords(Json(req): Json<KeywordsRequest>) -> Json<KeywordsResponse> {
    Json(KeywordsResponse {
        extracted_keywords: text::extract_keywords(&req.text_content, req.num_keywords),
    })
}

#[derive(Debug, Serialize)]
struct TagsResponse {
    suggested_tags: Vec<String>,
}

async fn suggest_tags(Json(req): Json<TagsRequest>) -> Json<TagsResponse> {
    Json(TagsResponse {
        suggested_tags: text::suggest_tags(&req.topic, &req.extracted_keywords),
    })
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct HistoryParams {
    skip: Option<i64>,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ContentResponse {
    id: Uuid,
    user_id: Uuid,
    content_type: ContentType,
    input_params: Option<serde_json::Value>,
    generated_text: String,
    display_title: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<GeneratedContent> for ContentResponse {
    fn from(c: GeneratedContent) -> Self {
        Self {
            id: c.id,
            user_id: c.user_id,
            content_type: c.content_type,
            input_params: c.input_params,
            generated_text: c.generated_text,
            display_title: c.display_title,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

async fn history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<HistoryParams>,
) -> Result<Response, AppError> {
    let (skip, limit) = history_window(params.skip, params.limit);
    let store = PgContentStore::new(state.pool.clone());
    let items: Vec<ContentResponse> = store
        .list_by_user(user.id, skip, limit)
        .await?
        .into_iter()
        .map(ContentResponse::from)
        .collect();
    let total = content_queries::count_content_for_user(&state.pool, user.id).await?;

    let mut response = Json(items).into_response();
    response
        .headers_mut()
        .insert(TOTAL_COUNT, HeaderValue::from(total));
    Ok(response)
}

async fn history_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentResponse>, AppError> {
    let store = PgContentStore::new(state.pool.clone());
    let item = store
        .get_by_id(user.id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Content item not found"))?;
    Ok(Json(item.into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Method, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::json;

    use scribe_core::generator::UnavailableGenerator;
    use scribe_test_utils::{create_test_db, drop_test_db, set_quota};

    use super::super::test_support::*;

    #[tokio::test]
    async fn generate_counts_quota_and_saves_history() {
        let (pool, db_name) = create_test_db().await;
        let state = state_with(pool.clone(), Arc::new(FixedReply("1. First idea\n2. Second idea")));
        register(&state, "writer", false).await;
        let token = token_for(&state, "writer").await;

        let resp = send(
            &state,
            Method::POST,
            "/content/generate-blog-ideas",
            Some(&token),
            Some(json!({ "topic": "urban gardening", "num_ideas": 2 })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["blog_ideas"], json!(["First idea", "Second idea"]));
        assert_eq!(json["source"], "model");
        let content_id = json["content_id"].as_str().unwrap().to_string();

        let me = body_json(send(&state, Method::GET, "/users/me", Some(&token), None).await).await;
        assert_eq!(me["api_call_count"], 1);

        let resp = send(&state, Method::GET, "/content/history", Some(&token), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("x-total-count").unwrap(), "1");
        let items = body_json(resp).await;
        assert_eq!(items[0]["id"], content_id.as_str());
        assert_eq!(items[0]["content_type"], "blog_ideas");
        assert_eq!(items[0]["display_title"], "Blog Ideas: urban gardening");

        let resp = send(
            &state,
            Method::GET,
            &format!("/content/history/{content_id}"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["input_params"]["topic"], "urban gardening");

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn exhausted_quota_is_429() {
        let (pool, db_name) = create_test_db().await;
        let state = state_with(pool.clone(), Arc::new(FixedReply("A Title")));
        let user = register(&state, "busy", false).await;
        let token = token_for(&state, "busy").await;
        set_quota(&pool, user.id, 100, Some(Utc::now() + Duration::days(3))).await;

        let resp = send(
            &state,
            Method::POST,
            "/content/generate-title",
            Some(&token),
            Some(json!({ "topic": "anything" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let detail = body_json(resp).await["detail"].as_str().unwrap().to_string();
        assert!(detail.starts_with("API call limit of 100 exceeded."), "{detail}");

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn fallback_is_returned_but_not_saved() {
        let (pool, db_name) = create_test_db().await;
        let state = state_with(pool.clone(), Arc::new(UnavailableGenerator::new("no key")));
        register(&state, "writer", false).await;
        let token = token_for(&state, "writer").await;

        let resp = send(
            &state,
            Method::POST,
            "/content/generate-title",
            Some(&token),
            Some(json!({ "topic": "solar panels" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["generated_title"], "A Comprehensive Guide to Solar Panels");
        assert_eq!(json["source"], "fallback");
        assert!(json.get("content_id").is_none());

        let items = body_json(send(&state, Method::GET, "/content/history", Some(&token), None).await).await;
        assert_eq!(items, json!([]));

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn social_posts_without_topic_or_snippet_is_400_and_free() {
        let (pool, db_name) = create_test_db().await;
        let state = state_with(pool.clone(), Arc::new(FixedReply("post")));
        register(&state, "social", false).await;
        let token = token_for(&state, "social").await;

        let resp = send(
            &state,
            Method::POST,
            "/content/generate-social-media-posts",
            Some(&token),
            Some(json!({ "platform": "Twitter" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let me = body_json(send(&state, Method::GET, "/users/me", Some(&token), None).await).await;
        assert_eq!(me["api_call_count"], 0);

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn oversized_item_counts_are_400_and_free() {
        let (pool, db_name) = create_test_db().await;
        let state = state_with(pool.clone(), Arc::new(UnavailableGenerator::new("no key")));
        register(&state, "greedy", false).await;
        let token = token_for(&state, "greedy").await;

        let cases = [
            ("/content/generate-blog-ideas", json!({ "topic": "x", "num_ideas": 1_000_000_000_000_000_u64 })),
            ("/content/generate-blog-outline", json!({ "topic": "x", "num_sections": 51 })),
            ("/content/generate-seo-faqs", json!({ "topic": "x", "num_faqs": 1_000_000_000 })),
            ("/content/generate-social-media-posts", json!({ "topic": "x", "num_posts": 500 })),
        ];
        for (uri, body) in cases {
            let resp = send(&state, Method::POST, uri, Some(&token), Some(body)).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
            let detail = body_json(resp).await["detail"].as_str().unwrap().to_string();
            assert!(detail.ends_with("must be at most 50."), "{uri}: {detail}");
        }

        let me = body_json(send(&state, Method::GET, "/users/me", Some(&token), None).await).await;
        assert_eq!(me["api_call_count"], 0);

        let resp = send(
            &state,
            Method::POST,
            "/content/generate-seo-faqs",
            Some(&token),
            Some(json!({ "topic": "x", "num_faqs": 50 })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["faqs"].as_array().unwrap().len(), 50);

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn history_is_owner_scoped() {
        let (pool, db_name) = create_test_db().await;
        let state = state_with(pool.clone(), Arc::new(FixedReply("Mine")));
        register(&state, "alice", false).await;
        register(&state, "bobby", false).await;
        let alice = token_for(&state, "alice").await;
        let bobby = token_for(&state, "bobby").await;

        let json = body_json(
            send(
                &state,
                Method::POST,
                "/content/generate-title",
                Some(&alice),
                Some(json!({ "topic": "privacy" })),
            )
            .await,
        )
        .await;
        let id = json["content_id"].as_str().unwrap().to_string();

        let resp = send(&state, Method::GET, &format!("/content/history/{id}"), Some(&bobby), None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["detail"], "Content item not found");

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn local_helpers_need_no_auth() {
        let (pool, db_name) = create_test_db().await;
        let state = state_with(pool.clone(), Arc::new(FixedReply("unused")));

        let resp = send(
            &state,
            Method::POST,
            "/content/extract-keywords",
            None,
            Some(json!({ "text_content": "Rust rust cargo crates cargo rust", "num_keywords": 2 })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["extracted_keywords"], json!(["rust", "cargo"]));

        let resp = send(
            &state,
            Method::POST,
            "/content/suggest-tags",
            None,
            Some(json!({ "topic": "Web Dev", "extracted_keywords": ["Rust", "axum"] })),
        )
        .await;
        assert_eq!(
            body_json(resp).await["suggested_tags"],
            json!(["axum", "rust", "web-dev"])
        );

        pool.close().await;
        drop_test_db(&db_name).await;
    }
}

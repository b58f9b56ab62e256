use crate::server::{
    Result, ServerError, ServerRouter,
    auth::{Access, Admin},
    extract::{Json, Query},
    routes::visible_filter,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use folio_common::model::post::{Post, PostDraft, PostIdentifier, PostPatch, PostStatus};
use folio_db::{client::DbClient, store::Pagination};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_LIMIT: u64 = 10;
const MAX_LIMIT: u64 = 100;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_put(update_post)
        .typed_delete(delete_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{identifier}", rejection(ServerError))]
struct PostPath {
    identifier: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct ListQuery {
    tag: Option<String>,
    status: Option<PostStatus>,
    page: Option<u64>,
    limit: Option<u64>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
struct PostListResponse {
    posts: Vec<Post>,
    total_pages: u64,
    current_page: u64,
    total_posts: u64,
}

fn pagination(page: Option<u64>, limit: Option<u64>) -> Result<Pagination> {
    let page = page.unwrap_or(DEFAULT_PAGE);
    let limit = limit.unwrap_or(DEFAULT_LIMIT);

    Pagination::new(page, limit)
        .filter(|_| limit <= MAX_LIMIT)
        .ok_or(ServerError::InvalidPagination { page, limit })
}

async fn list_posts(
    PostsPath(): PostsPath,
    access: Access,
    State(db): State<Arc<DbClient>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PostListResponse>> {
    let pagination = pagination(query.page, query.limit)?;
    let filter = visible_filter(access, query.status, query.tag);

    let page = db.list_posts(&filter, pagination).await?;

    Ok(Json(PostListResponse {
        posts: page.posts,
        total_pages: pagination.total_pages(page.total),
        current_page: pagination.page(),
        total_posts: page.total,
    }))
}

async fn get_post(
    PostPath { identifier }: PostPath,
    access: Access,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Post>> {
    let post = db.fetch_post(&PostIdentifier::new(identifier)).await?;

    // Drafts look exactly like missing posts to the public.
    if post.status != PostStatus::Published && !access.is_admin() {
        return Err(ServerError::PostHidden(post.slug.into_inner()));
    }

    Ok(Json(post))
}

async fn create_post(
    PostsPath(): PostsPath,
    _: Admin,
    State(db): State<Arc<DbClient>>,
    Json(draft): Json<PostDraft>,
) -> Result<(StatusCode, Json<Post>)> {
    let post = db.create_post(draft).await?;

    info!(id = %post.id, slug = %post.slug, "Created post");
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update_post(
    PostPath { identifier }: PostPath,
    _: Admin,
    State(db): State<Arc<DbClient>>,
    Json(patch): Json<PostPatch>,
) -> Result<Json<Post>> {
    let post = db
        .update_post(&PostIdentifier::new(identifier), patch)
        .await?;

    info!(id = %post.id, slug = %post.slug, "Updated post");
    Ok(Json(post))
}

async fn delete_post(
    PostPath { identifier }: PostPath,
    _: Admin,
    State(db): State<Arc<DbClient>>,
) -> Result<StatusCode> {
    let identifier = PostIdentifier::new(identifier);
    db.delete_post(&identifier).await?;

    info!(%identifier, "Deleted post");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::server::testing::{TestApp, body_json};
    use axum::http::{StatusCode, header};
    use serde_json::{Value, json};

    fn new_post(title: &str) -> Value {
        json!({ "title": title, "content": format!("Some words about {title}.") })
    }

    #[tokio::test]
    async fn create_then_fetch_by_id_and_slug() {
        let app = TestApp::new().await;

        let response = app.post_json("/posts", new_post("Hello, World!"), true).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["slug"], "hello-world");
        assert_eq!(created["author"], "Admin");
        assert_eq!(created["status"], "published");
        assert_eq!(created["readTime"], "1 min read");

        let id = created["id"].as_str().unwrap();
        let by_id = app.get(&format!("/posts/{id}"), false).await;
        assert_eq!(by_id.status(), StatusCode::OK);
        assert_eq!(body_json(by_id).await, created);

        let by_slug = app.get("/posts/hello-world", false).await;
        assert_eq!(body_json(by_slug).await, created);
    }

    #[tokio::test]
    async fn mutations_require_admin() {
        let app = TestApp::new().await;

        let response = app.post_json("/posts", new_post("Sneaky"), false).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"folio\""
        );
        assert_eq!(
            body_json(response).await,
            json!({ "status": 401, "message": "Admin access required" })
        );

        let response = app.delete("/posts/anything", false).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.get_with_credentials("/posts", "admin", "wrong").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn validation_and_conflicts() {
        let app = TestApp::new().await;

        let response = app.post_json("/posts", json!({ "title": "No body" }), true).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "Content is required");

        let mut unusable_slug = new_post("Punctuation");
        unusable_slug["slug"] = json!("!!!");
        let response = app.post_json("/posts", unusable_slug, true).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["message"],
            "The slug must contain letters or digits"
        );

        let response = app.post_json("/posts", new_post("Twice"), true).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let response = app.post_json("/posts", new_post("twice"), true).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["status"], 409);

        let response = app.post_raw("/posts", "{not json", true).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_moves_slug() {
        let app = TestApp::new().await;
        app.post_json("/posts", new_post("Old Title"), true).await;

        let response = app
            .put_json("/posts/old-title", json!({ "title": "New Title" }), true)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["slug"], "new-title");
        assert_eq!(updated["content"], "Some words about Old Title.");

        assert_eq!(
            app.get("/posts/old-title", false).await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            app.get("/posts/new-title", false).await.status(),
            StatusCode::OK
        );

        let response = app
            .put_json("/posts/missing", json!({ "title": "Whatever" }), true)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_removes_post() {
        let app = TestApp::new().await;
        app.post_json("/posts", new_post("Short lived"), true).await;

        let response = app.delete("/posts/short-lived", true).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        assert_eq!(
            app.get("/posts/short-lived", true).await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            app.delete("/posts/short-lived", true).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn drafts_are_hidden_from_the_public() {
        let app = TestApp::new().await;
        let mut draft = new_post("Work in progress");
        draft["status"] = json!("draft");
        app.post_json("/posts", draft, true).await;
        app.post_json("/posts", new_post("Finished"), true).await;

        let response = app.get("/posts/work-in-progress", false).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            app.get("/posts/work-in-progress", true).await.status(),
            StatusCode::OK
        );

        let public = body_json(app.get("/posts?status=draft", false).await).await;
        assert_eq!(public["totalPosts"], 1);
        assert_eq!(public["posts"][0]["slug"], "finished");

        let admin = body_json(app.get("/posts", true).await).await;
        assert_eq!(admin["totalPosts"], 2);

        let admin_drafts = body_json(app.get("/posts?status=draft", true).await).await;
        assert_eq!(admin_drafts["totalPosts"], 1);
        assert_eq!(admin_drafts["posts"][0]["slug"], "work-in-progress");
    }

    #[tokio::test]
    async fn list_is_paginated() {
        let app = TestApp::new().await;
        for n in 0..12 {
            let mut post = new_post(&format!("Post {n}"));
            post["tags"] = json!(if n % 2 == 0 { "even" } else { "odd" });
            app.post_json("/posts", post, true).await;
        }

        let response = app.get("/posts?page=2&limit=10&t=1700000000", false).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        let page = body_json(response).await;
        assert_eq!(page["totalPosts"], 12);
        assert_eq!(page["totalPages"], 2);
        assert_eq!(page["currentPage"], 2);
        assert_eq!(page["posts"].as_array().unwrap().len(), 2);
        assert_eq!(page["posts"][0]["title"], "Post 1");

        let even = body_json(app.get("/posts?tag=even", false).await).await;
        assert_eq!(even["totalPosts"], 6);
        assert_eq!(even["totalPages"], 1);

        for query in ["page=0", "limit=0", "limit=101", "page=abc"] {
            let response = app.get(&format!("/posts?{query}"), false).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{query}");
        }
    }
}

use crate::server::{AdminCredentials, ServerState, app};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, header},
    response::Response,
};
use folio_common::snowflake::WorkerId;
use folio_db::{client::DbClient, files::FileStore};
use headers::{Authorization, HeaderMapExt};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "correct horse";

/// The whole service on top of a file store in a temporary directory.
pub struct TestApp {
    router: Router,
    _content: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let content = tempfile::tempdir().unwrap();
        let store = FileStore::open(content.path(), WorkerId::default())
            .await
            .unwrap();

        let state = ServerState {
            db_client: Arc::new(DbClient::new(Box::new(store), Duration::from_secs(5))),
            admin: Arc::new(AdminCredentials::new(
                ADMIN_USERNAME.to_owned(),
                Some(ADMIN_PASSWORD.to_owned()),
            )),
        };

        Self {
            router: app(state),
            _content: content,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    fn request(method: Method, uri: &str, admin: bool) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if admin && let Some(headers) = builder.headers_mut() {
            headers.typed_insert(Authorization::basic(ADMIN_USERNAME, ADMIN_PASSWORD));
        }
        builder
    }

    pub async fn get(&self, uri: &str, admin: bool) -> Response {
        let request = Self::request(Method::GET, uri, admin)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn get_with_credentials(&self, uri: &str, username: &str, password: &str) -> Response {
        let mut request = Request::get(uri).body(Body::empty()).unwrap();
        request
            .headers_mut()
            .typed_insert(Authorization::basic(username, password));
        self.send(request).await
    }

    pub async fn delete(&self, uri: &str, admin: bool) -> Response {
        let request = Self::request(Method::DELETE, uri, admin)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_raw(&self, uri: &str, body: &str, admin: bool) -> Response {
        self.with_body(Method::POST, uri, body.to_owned(), admin).await
    }

    pub async fn post_json(&self, uri: &str, body: Value, admin: bool) -> Response {
        self.with_body(Method::POST, uri, body.to_string(), admin)
            .await
    }

    pub async fn put_json(&self, uri: &str, body: Value, admin: bool) -> Response {
        self.with_body(Method::PUT, uri, body.to_string(), admin).await
    }

    async fn with_body(&self, method: Method, uri: &str, body: String, admin: bool) -> Response {
        let request = Self::request(method, uri, admin)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

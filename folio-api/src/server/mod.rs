use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use extract::Json;
use folio_common::model::post::PostValidationError;
use folio_db::{
    client::DbClient,
    store::{StoreError, StoreErrorKind},
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, warn};

pub use auth::AdminCredentials;

mod auth;
mod extract;
mod routes;
#[cfg(test)]
mod testing;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub admin: Arc<AdminCredentials>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

/// The complete service: routes, state, request tracing and response headers.
pub fn app(state: ServerState) -> Router {
    routes()
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Pagination out of range: page {page}, limit {limit}")]
    InvalidPagination { page: u64, limit: u64 },
    #[error("Authorization header was invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("Provided credentials were invalid")]
    InvalidCredentials,
    #[error("Admin credentials are required")]
    AdminRequired,
    #[error("Post {0} is not visible to the caller")]
    PostHidden(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostHidden(_) => StatusCode::NOT_FOUND,
            ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::InvalidPagination { .. } => StatusCode::BAD_REQUEST,
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidCredentials
            | ServerError::AdminRequired => StatusCode::UNAUTHORIZED,
            ServerError::JsonResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Store(err) => match err.kind() {
                StoreErrorKind::Validation => StatusCode::BAD_REQUEST,
                StoreErrorKind::NotFound => StatusCode::NOT_FOUND,
                StoreErrorKind::Conflict => StatusCode::CONFLICT,
                StoreErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// What the client gets to read. Details stay in the log.
    pub fn message(&self) -> &'static str {
        match self {
            ServerError::UnknownRoute(_) | ServerError::PathRejection(_) => "Not found",
            ServerError::PostHidden(_) => "Post not found",
            ServerError::QueryRejection(_) => "Invalid query parameters",
            ServerError::JsonRejection(_) => "Invalid request body",
            ServerError::InvalidPagination { .. } => {
                "page must be at least 1 and limit between 1 and 100"
            }
            ServerError::InvalidAuthorizationHeader(_) | ServerError::InvalidCredentials => {
                "Invalid credentials"
            }
            ServerError::AdminRequired => "Admin access required",
            ServerError::JsonResponse(_) => "Internal server error",
            ServerError::Store(err) => match err {
                StoreError::Validation(PostValidationError::MissingTitle) => "A title is required",
                StoreError::Validation(PostValidationError::MissingContent) => {
                    "Content is required"
                }
                StoreError::Validation(PostValidationError::EmptySlug(_)) => {
                    "The slug must contain letters or digits"
                }
                StoreError::NotFound(_) => "Post not found",
                StoreError::Conflict(_) => "A post with this slug already exists",
                StoreError::Timeout { .. } => "The content store did not respond in time",
                _ => "Internal server error",
            },
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    message: &'static str,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            warn!(error = %self, %status, "Replying with error");
        }

        let error_response = ErrorResponse {
            status: status.as_u16(),
            message: self.message(),
        };

        if status == StatusCode::UNAUTHORIZED {
            let challenge = [(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"folio\""),
            )];
            (status, challenge, Json(error_response)).into_response()
        } else {
            (status, Json(error_response)).into_response()
        }
    }
}

use crate::server::{
    Result, ServerError, ServerRouter,
    auth::Access,
    extract::{Json, Query},
    routes::visible_filter,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use folio_common::model::{post::PostStatus, summary::PostSummary};
use folio_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(list_summaries)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/summaries", rejection(ServerError))]
struct SummariesPath();

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct SummaryQuery {
    tag: Option<String>,
    status: Option<PostStatus>,
}

/// The lightweight index the reader front end loads in one go.
async fn list_summaries(
    SummariesPath(): SummariesPath,
    access: Access,
    State(db): State<Arc<DbClient>>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<Vec<PostSummary>>> {
    let filter = visible_filter(access, query.status, query.tag);
    let summaries = db.post_summaries(&filter).await?;

    Ok(Json(summaries))
}

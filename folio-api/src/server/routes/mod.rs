use crate::server::{ServerRouter, auth::Access};
use axum::Router;
use folio_common::{
    model::post::{PostFilter, PostStatus},
    util::non_blank,
};

mod posts;
mod summaries;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(posts::routes())
        .merge(summaries::routes())
}

/// Non-admin callers only ever see published posts, whatever they ask for.
fn visible_filter(access: Access, status: Option<PostStatus>, tag: Option<String>) -> PostFilter {
    let status = if access.is_admin() {
        status
    } else {
        Some(PostStatus::Published)
    };

    PostFilter {
        status,
        tag: non_blank(tag),
    }
}

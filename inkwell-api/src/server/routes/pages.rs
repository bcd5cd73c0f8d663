use crate::server::{
    ServerRouter, ServerState,
    view::{PageContext, Viewer},
};
use askama::Template;
use axum::{
    Router,
    response::{IntoResponse, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};

pub fn routes() -> ServerRouter {
    Router::new().typed_get(about).typed_get(contact)
}

#[derive(TypedPath)]
#[typed_path("/about")]
pub struct AboutPath;

#[derive(TypedPath)]
#[typed_path("/contact")]
pub struct ContactPath;

#[derive(Template)]
#[template(path = "about.html")]
struct AboutTemplate {
    ctx: PageContext,
}

#[derive(Template)]
#[template(path = "contact.html")]
struct ContactTemplate {
    ctx: PageContext,
}

#[axum::debug_handler(state = ServerState)]
async fn about(_: AboutPath, viewer: Viewer) -> Response {
    viewer.page(|ctx| AboutTemplate { ctx }).into_response()
}

#[axum::debug_handler(state = ServerState)]
async fn contact(_: ContactPath, viewer: Viewer) -> Response {
    viewer.page(|ctx| ContactTemplate { ctx }).into_response()
}

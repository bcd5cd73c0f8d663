use crate::server::ServerRouter;
use axum::Router;

mod pages;
pub mod posts;
pub mod users;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(posts::routes())
        .merge(users::routes())
        .merge(pages::routes())
}

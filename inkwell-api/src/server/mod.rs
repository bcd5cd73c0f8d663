use askama::Template;
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{FormRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::Key;
use inkwell_common::model::{
    Id,
    auth::{PasswordHashError, SessionTokenHashError},
    post::PostMarker,
};
use inkwell_db::client::{DbClient, DbError};
use session::{Admins, SessionSettings};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

mod accounts;
mod flash;
mod form;
mod routes;
pub mod session;
mod view;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub cookie_key: Key,
    pub admins: Arc<Admins>,
    pub session_settings: SessionSettings,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub fn app(state: ServerState) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
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
    #[error("Submitted form rejected: {0}")]
    FormRejection(#[from] FormRejection),
    #[error("Page could not be rendered: {0}")]
    Render(#[from] askama::Error),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error(transparent)]
    SessionTokenHash(#[from] SessionTokenHashError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Only admins may do this")]
    Forbidden,
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::FormRejection(_) => StatusCode::BAD_REQUEST,
            ServerError::Forbidden => StatusCode::FORBIDDEN,
            ServerError::Render(_)
            | ServerError::PasswordHash(_)
            | ServerError::SessionTokenHash(_)
            | ServerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    status: u16,
    reason: &'static str,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Replying with error");
        }

        let page = ErrorTemplate {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Error"),
        };
        match page.render() {
            Ok(html) => (status, Html(html)).into_response(),
            Err(err) => {
                error!(error = %err, "Rendering the error page failed");
                status.into_response()
            }
        }
    }
}

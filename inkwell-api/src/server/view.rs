use crate::server::{
    Result, ServerError, flash,
    session::{Admins, CurrentUser},
};
use askama::Template;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::{SignedCookieJar, cookie::Key};
use inkwell_common::model::user::User;
use inkwell_db::client::DbClient;
use std::sync::Arc;

/// What every page shows around its own content.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct PageContext {
    pub user: Option<User>,
    pub is_admin: bool,
    pub messages: Vec<String>,
}

/// The visitor a page is rendered for, with their pending flash messages.
#[derive(Debug)]
pub struct Viewer {
    current_user: CurrentUser,
    is_admin: bool,
    jar: SignedCookieJar,
    messages: Vec<String>,
}

impl<S> FromRequestParts<S> for Viewer
where
    Arc<DbClient>: FromRef<S>,
    Arc<Admins>: FromRef<S>,
    Key: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let current_user = CurrentUser::from_request_parts(parts, state).await?;
        let is_admin = current_user
            .user()
            .is_some_and(|user| Arc::<Admins>::from_ref(state).contains(user.id));

        let Ok(jar) = SignedCookieJar::<Key>::from_request_parts(parts, state).await;
        let (jar, messages) = flash::take(jar);

        Ok(Self {
            current_user,
            is_admin,
            jar,
            messages,
        })
    }
}

impl Viewer {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.current_user.user()
    }

    /// Gives up on rendering, keeping the pending messages for the next page.
    #[must_use]
    pub fn into_jar(self) -> SignedCookieJar {
        self.messages.into_iter().fold(self.jar, flash::push)
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    pub fn page<T, F>(self, build: F) -> Page<T>
    where
        F: FnOnce(PageContext) -> T,
    {
        let context = PageContext {
            user: self.current_user.into_user(),
            is_admin: self.is_admin,
            messages: self.messages,
        };

        Page {
            jar: self.jar,
            template: build(context),
        }
    }
}

/// A rendered template together with the cookies to send along.
#[derive(Debug)]
pub struct Page<T> {
    jar: SignedCookieJar,
    template: T,
}

impl<T: Template> IntoResponse for Page<T> {
    fn into_response(self) -> Response {
        match self.template.render() {
            Ok(html) => (self.jar, Html(html)).into_response(),
            Err(err) => ServerError::Render(err).into_response(),
        }
    }
}

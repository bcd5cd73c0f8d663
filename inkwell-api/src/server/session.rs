use crate::server::{Result, ServerError};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::{
    SignedCookieJar,
    cookie::{Cookie, Key, SameSite},
};
use inkwell_common::{
    model::{
        Id,
        auth::{Session, SessionToken},
        user::{User, UserMarker},
    },
    util::PositiveDuration,
};
use inkwell_db::client::DbClient;
use std::{collections::HashSet, sync::Arc};
use time::UtcDateTime;
use tracing::{debug, info};

pub const SESSION_COOKIE: &str = "session";

/// Who is making the request, resolved from the signed session cookie.
///
/// A missing, tampered, revoked or expired session is not an error. The
/// request is simply anonymous.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub enum CurrentUser {
    #[default]
    Anonymous,
    Authenticated(User),
}

impl CurrentUser {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            CurrentUser::Anonymous => None,
            CurrentUser::Authenticated(user) => Some(user),
        }
    }

    #[must_use]
    pub fn into_user(self) -> Option<User> {
        match self {
            CurrentUser::Anonymous => None,
            CurrentUser::Authenticated(user) => Some(user),
        }
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<DbClient>: FromRef<S>,
    Key: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        if let Some(current_user) = parts.extensions.get::<CurrentUser>() {
            return Ok(current_user.clone());
        }

        let Ok(jar) = SignedCookieJar::<Key>::from_request_parts(parts, state).await;
        let db_client = Arc::<DbClient>::from_ref(state);
        let current_user = resolve(&db_client, &jar).await?;

        parts.extensions.insert(current_user.clone());
        Ok(current_user)
    }
}

async fn resolve(db_client: &DbClient, jar: &SignedCookieJar) -> Result<CurrentUser> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(CurrentUser::Anonymous);
    };

    let token: SessionToken = match cookie.value().parse() {
        Ok(token) => token,
        Err(err) => {
            debug!(error = %err, "Ignoring malformed session token");
            return Ok(CurrentUser::Anonymous);
        }
    };

    let token_hash = token.hash()?;
    let Some(session) = db_client.fetch_session(&token_hash).await? else {
        debug!("Ignoring unknown session");
        return Ok(CurrentUser::Anonymous);
    };

    if session.is_expired() {
        debug!(user_id = %session.user, "Ignoring expired session");
        return Ok(CurrentUser::Anonymous);
    }

    let Some(user) = db_client.fetch_user(session.user).await? else {
        debug!(user_id = %session.user, "Ignoring session of missing user");
        return Ok(CurrentUser::Anonymous);
    };

    Ok(CurrentUser::Authenticated(user))
}

/// An authenticated user whose id is in the admin set.
///
/// Rejects everyone else, anonymous visitors included, with 403.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct AdminUser(pub User);

impl<S> FromRequestParts<S> for AdminUser
where
    Arc<DbClient>: FromRef<S>,
    Arc<Admins>: FromRef<S>,
    Key: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let admins = Arc::<Admins>::from_ref(state);

        match CurrentUser::from_request_parts(parts, state).await? {
            CurrentUser::Authenticated(user) if admins.contains(user.id) => Ok(Self(user)),
            _ => Err(ServerError::Forbidden),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Admins(HashSet<Id<UserMarker>>);

impl Admins {
    #[must_use]
    pub fn contains(&self, user_id: Id<UserMarker>) -> bool {
        self.0.contains(&user_id)
    }
}

impl FromIterator<Id<UserMarker>> for Admins {
    fn from_iter<T: IntoIterator<Item = Id<UserMarker>>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct SessionSettings {
    /// `None` keeps sessions alive until logout.
    pub ttl: Option<PositiveDuration>,
    /// Marks the cookie `Secure`. Only set this when the site is served over https.
    pub secure: bool,
}

/// Logs `user` in, replacing any session the browser already holds.
pub async fn start(
    db_client: &DbClient,
    settings: SessionSettings,
    jar: SignedCookieJar,
    user: &User,
) -> Result<SignedCookieJar> {
    revoke(db_client, &jar).await?;

    let token = SessionToken::generate();
    let session = Session {
        user: user.id,
        token_hash: token.hash()?,
        expires_at: settings.ttl.map(|ttl| ttl.after(UtcDateTime::now())),
    };
    db_client.create_session(&session).await?;

    info!(user_id = %user.id, "Started session");

    let mut cookie = Cookie::build((SESSION_COOKIE, token.encode()))
        .path("/")
        .http_only(true)
        .secure(settings.secure)
        .same_site(SameSite::Lax);
    if let Some(ttl) = settings.ttl {
        cookie = cookie.max_age(ttl.get());
    }

    Ok(jar.add(cookie))
}

/// Logs the browser out. Ending a session that does not exist is fine.
pub async fn end(db_client: &DbClient, jar: SignedCookieJar) -> Result<SignedCookieJar> {
    revoke(db_client, &jar).await?;

    Ok(jar.remove(Cookie::build(SESSION_COOKIE).path("/")))
}

async fn revoke(db_client: &DbClient, jar: &SignedCookieJar) -> Result<()> {
    let Some(token) = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| cookie.value().parse::<SessionToken>().ok())
    else {
        return Ok(());
    };

    if db_client.delete_session(&token.hash()?).await? {
        info!("Ended session");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::server::session::Admins;
    use inkwell_common::model::Id;

    #[test]
    fn admin_set() {
        let admins: Admins = [1, 7].into_iter().map(Id::new).collect();

        assert!(admins.contains(Id::new(1)));
        assert!(admins.contains(Id::new(7)));
        assert!(!admins.contains(Id::new(2)));
        assert!(!Admins::default().contains(Id::new(1)));
    }
}

use crate::server::Result;
use inkwell_common::model::{
    auth::PasswordDigest,
    user::{CreateUser, DisplayName, Email, User},
};
use inkwell_db::client::{DbClient, DbError};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};

/// Checked instead of a stored hash when the email is unknown, so that a
/// failed login costs the same argon2 work either way.
static UNKNOWN_USER_DIGEST: LazyLock<Option<PasswordDigest>> =
    LazyLock::new(|| PasswordDigest::hash("unknown user").ok());

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Registration {
    Created(User),
    DuplicateEmail,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum AuthError {
    #[error("No user is registered with this email")]
    UnknownEmail,
    #[error("The password does not match")]
    WrongPassword,
}

impl AuthError {
    /// What the visitor gets to see. Both cases look the same so that
    /// nobody can tell which emails are registered.
    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            AuthError::UnknownEmail | AuthError::WrongPassword => "Invalid email or password.",
        }
    }
}

pub async fn register(
    db_client: &DbClient,
    email: Email,
    name: DisplayName,
    password: &str,
) -> Result<Registration> {
    if db_client.fetch_user_by_email(&email).await?.is_some() {
        debug!(%email, "Registration with taken email");
        return Ok(Registration::DuplicateEmail);
    }

    let create = CreateUser {
        email,
        name,
        password_hash: PasswordDigest::hash(password)?,
    };

    match db_client.create_user(&create).await {
        Ok(user) => {
            info!(user_id = %user.id, "Registered user");
            Ok(Registration::Created(user))
        }
        Err(DbError::EmailTaken(email)) => {
            debug!(%email, "Registration lost race for email");
            Ok(Registration::DuplicateEmail)
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn authenticate(
    db_client: &DbClient,
    email: &Email,
    password: &str,
) -> Result<Result<User, AuthError>> {
    let Some(credentials) = db_client.fetch_credentials(email).await? else {
        debug!(%email, "Login for unknown email");
        return Ok(Err(unknown_email(password)));
    };

    if !credentials.verify(password) {
        debug!(user_id = %credentials.user.id, "Login with wrong password");
        return Ok(Err(AuthError::WrongPassword));
    }

    info!(user_id = %credentials.user.id, "User logged in");
    Ok(Ok(credentials.user))
}

/// Fails a login for an email without an account after verifying `password`
/// against a throwaway digest.
pub fn unknown_email(password: &str) -> AuthError {
    match &*UNKNOWN_USER_DIGEST {
        Some(digest) => {
            let _ = digest.verify(password);
        }
        None => debug!("No digest for unknown-email logins"),
    }

    AuthError::UnknownEmail
}

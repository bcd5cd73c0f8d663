use crate::model::{Id, user::UserMarker};
use argon2::{
    Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use base64::{DecodeError, Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use std::{
    fmt::{Debug, Formatter},
    str::FromStr,
};
use thiserror::Error;
use time::UtcDateTime;

/// Leading bytes of a session token that salt the digest of the rest.
pub const SESSION_SALT_LEN: usize = 16;
pub const SESSION_SECRET_LEN: usize = 24;
pub const SESSION_TOKEN_LEN: usize = SESSION_SALT_LEN + SESSION_SECRET_LEN;
pub const SESSION_DIGEST_LEN: usize = Params::DEFAULT_OUTPUT_LEN;
pub const PASSWORD_SALT_LEN: usize = 16;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing session token failed: {0}")]
pub struct SessionTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum SessionTokenDecodeError {
    #[error("Session token is not url-safe base64: {0}")]
    Base64(#[from] DecodeError),
    #[error("Session token has {0} bytes, expected {SESSION_TOKEN_LEN}")]
    Length(usize),
}

/// Opaque cookie value identifying a session.
///
/// The server keeps only [`SessionTokenHash`], the argon2 digest of the
/// secret part salted with the leading bytes. Which user a session belongs
/// to is recorded on the server, not in the token.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SessionToken(Box<[u8; SESSION_TOKEN_LEN]>);

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SessionTokenHash(pub Box<[u8; SESSION_DIGEST_LEN]>);

/// Server-side record of a logged-in browser.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Session {
    pub user: Id<UserMarker>,
    pub token_hash: SessionTokenHash,
    /// `None` lasts until logout.
    pub expires_at: Option<UtcDateTime>,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now: UtcDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(UtcDateTime::now())
    }
}

impl SessionToken {
    #[must_use]
    pub fn generate() -> Self {
        Self(Box::new(rand::random()))
    }

    #[must_use]
    pub fn encode(&self) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(&self.0[..])
    }

    pub fn hash(&self) -> Result<SessionTokenHash, SessionTokenHashError> {
        let (salt, secret) = self.0.split_at(SESSION_SALT_LEN);

        let mut digest = Box::new([0; SESSION_DIGEST_LEN]);
        Argon2::default()
            .hash_password_into(secret, salt, &mut digest[..])
            .map_err(SessionTokenHashError)?;

        Ok(SessionTokenHash(digest))
    }
}

impl FromStr for SessionToken {
    type Err = SessionTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = BASE64_URL_SAFE_NO_PAD.decode(s)?;
        let len = bytes.len();
        let bytes: [u8; SESSION_TOKEN_LEN] = bytes
            .try_into()
            .map_err(|_| SessionTokenDecodeError::Length(len))?;

        Ok(Self(Box::new(bytes)))
    }
}

impl Debug for SessionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken([redacted])")
    }
}

impl Debug for SessionTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionTokenHash([redacted])")
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Stored session digest has the wrong length")]
pub struct InvalidSessionTokenHashError;

impl TryFrom<Vec<u8>> for SessionTokenHash {
    type Error = InvalidSessionTokenHashError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        value
            .into_boxed_slice()
            .try_into()
            .map(Self)
            .map_err(|_| InvalidSessionTokenHashError)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(argon2::password_hash::Error);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The stored password hash is not a valid PHC string")]
pub struct InvalidPasswordDigestError;

/// Salted argon2 hash of a password in PHC string format.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    /// Hashes `password` with a fresh random salt.
    pub fn hash(password: &str) -> Result<Self, PasswordHashError> {
        let salt_bytes: [u8; PASSWORD_SALT_LEN] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordHashError)?;

        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(PasswordHashError)?;

        Ok(Self(hash.to_string()))
    }

    pub fn new(phc: String) -> Result<Self, InvalidPasswordDigestError> {
        PasswordHash::new(&phc).map_err(|_| InvalidPasswordDigestError)?;

        Ok(Self(phc))
    }

    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        PasswordHash::new(&self.0).is_ok_and(|hash| {
            Argon2::default()
                .verify_password(password.as_bytes(), &hash)
                .is_ok()
        })
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Debug for PasswordDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PasswordDigest").field(&"[redacted]").finish()
    }
}

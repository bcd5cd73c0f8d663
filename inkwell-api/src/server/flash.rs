use axum_extra::extract::{SignedCookieJar, cookie::Cookie};
use base64::{DecodeError, Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use thiserror::Error;
use tracing::debug;

pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Error)]
pub enum FlashDecodeError {
    #[error("Decoding base64 failed: {0}")]
    Base64(#[from] DecodeError),
    #[error("Decoding the message list failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Queues `message` to be shown on the next rendered page.
#[must_use]
pub fn push(jar: SignedCookieJar, message: impl Into<String>) -> SignedCookieJar {
    let mut messages = peek(&jar);
    messages.push(message.into());

    let Ok(json) = serde_json::to_vec(&messages) else {
        return jar;
    };
    let cookie = Cookie::build((FLASH_COOKIE, BASE64_URL_SAFE_NO_PAD.encode(json)))
        .path("/")
        .http_only(true);

    jar.add(cookie)
}

/// Removes and returns all queued messages, oldest first.
#[must_use]
pub fn take(jar: SignedCookieJar) -> (SignedCookieJar, Vec<String>) {
    if jar.get(FLASH_COOKIE).is_none() {
        return (jar, Vec::new());
    }

    let messages = peek(&jar);
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), messages)
}

fn peek(jar: &SignedCookieJar) -> Vec<String> {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return Vec::new();
    };

    decode(cookie.value()).unwrap_or_else(|err| {
        debug!(error = %err, "Dropping undecodable flash messages");
        Vec::new()
    })
}

fn decode(value: &str) -> Result<Vec<String>, FlashDecodeError> {
    let json = BASE64_URL_SAFE_NO_PAD.decode(value)?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use crate::server::flash::{FLASH_COOKIE, decode, push, take};
    use axum_extra::extract::{SignedCookieJar, cookie::Key};

    #[test]
    fn push_then_take() {
        let jar = SignedCookieJar::new(Key::generate());
        let jar = push(jar, "first");
        let jar = push(jar, "second");

        let (jar, messages) = take(jar);
        assert_eq!(messages, ["first", "second"]);
        assert!(jar.get(FLASH_COOKIE).is_none());

        let (_, messages) = take(jar);
        assert!(messages.is_empty());
    }

    #[test]
    fn garbage_is_dropped() {
        assert!(decode("not base64!").is_err());
        assert!(decode("bm90IGpzb24").is_err());
        assert_eq!(decode("WyJoaSJd").unwrap(), ["hi"]);
    }
}

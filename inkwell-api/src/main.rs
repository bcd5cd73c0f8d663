use axum_extra::extract::cookie::Key;
use inkwell_common::{model::Id, util::PositiveDuration};
use inkwell_db::client::{DbClient, DbError};
use serde::Deserialize;
use server::{
    ServerState,
    session::{Admins, SessionSettings},
};
use std::{
    fmt::{Debug, Formatter},
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

/// Minimum length of `SECRET_KEY` for deriving the cookie key.
const SECRET_KEY_MIN_LEN: usize = 32;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("SECRET_KEY must be at least {SECRET_KEY_MIN_LEN} bytes long")]
    SecretTooShort,
    #[error("SESSION_TTL_SECONDS must be positive, got {0}")]
    InvalidSessionTtl(i64),
    #[error("Error opening database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Hash, Deserialize)]
#[serde(transparent)]
struct SecretKey(String);

impl Debug for SecretKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SecretKey").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    #[serde(default = "default_server_address")]
    server_address: IpAddr,
    #[serde(default = "default_server_port")]
    server_port: u16,
    database_url: String,
    secret_key: SecretKey,
    #[serde(default)]
    admin_ids: Vec<i64>,
    session_ttl_seconds: Option<i64>,
    #[serde(default)]
    secure_cookies: bool,
}

fn default_server_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_server_port() -> u16 {
    5000
}

impl Env {
    fn cookie_key(&self) -> Result<Key, InitError> {
        let secret = self.secret_key.0.as_bytes();
        if secret.len() < SECRET_KEY_MIN_LEN {
            return Err(InitError::SecretTooShort);
        }

        Ok(Key::derive_from(secret))
    }

    fn session_settings(&self) -> Result<SessionSettings, InitError> {
        let ttl = self
            .session_ttl_seconds
            .map(|seconds| {
                PositiveDuration::new(Duration::seconds(seconds))
                    .ok_or(InitError::InvalidSessionTtl(seconds))
            })
            .transpose()?;

        Ok(SessionSettings {
            ttl,
            secure: self.secure_cookies,
        })
    }

    fn admins(&self) -> Admins {
        self.admin_ids.iter().copied().map(Id::new).collect()
    }
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "inkwell_api=debug,\
                inkwell_db=debug,\
                inkwell_common=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        Err(err) => error!(error = %err, "Listening for ctrl-c failed"),
    }
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let state = ServerState {
        db_client: Arc::new(DbClient::connect(&env.database_url).await?),
        cookie_key: env.cookie_key()?,
        admins: Arc::new(env.admins()),
        session_settings: env.session_settings()?,
    };
    let app = server::app(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{Env, InitError, server::session::SessionSettings};
    use inkwell_common::model::Id;
    use std::net::{IpAddr, Ipv4Addr};
    use time::Duration;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn env(vars: &[(&str, &str)]) -> Result<Env, envy::Error> {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned())),
        )
    }

    #[test]
    fn defaults() {
        let env = env(&[("DATABASE_URL", "sqlite::memory:"), ("SECRET_KEY", SECRET)]).unwrap();

        assert_eq!(env.server_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(env.server_port, 5000);
        assert!(env.admin_ids.is_empty());
        assert!(env.cookie_key().is_ok());
        assert_eq!(
            env.session_settings().unwrap(),
            SessionSettings {
                ttl: None,
                secure: false
            }
        );
        assert!(!format!("{env:?}").contains(SECRET));
    }

    #[test]
    fn required_values() {
        assert!(env(&[("SECRET_KEY", SECRET)]).is_err());
        assert!(env(&[("DATABASE_URL", "sqlite::memory:")]).is_err());
    }

    #[test]
    fn full() {
        let env = env(&[
            ("DATABASE_URL", "sqlite://blog.db"),
            ("SECRET_KEY", SECRET),
            ("ADMIN_IDS", "1,3"),
            ("SESSION_TTL_SECONDS", "3600"),
            ("SERVER_ADDRESS", "0.0.0.0"),
            ("SERVER_PORT", "8080"),
            ("SECURE_COOKIES", "true"),
        ])
        .unwrap();

        let admins = env.admins();
        assert!(admins.contains(Id::new(1)));
        assert!(admins.contains(Id::new(3)));
        assert!(!admins.contains(Id::new(2)));
        let settings = env.session_settings().unwrap();
        assert_eq!(settings.ttl.map(|ttl| ttl.get()), Some(Duration::hours(1)));
        assert!(settings.secure);
        assert_eq!(env.server_port, 8080);
    }

    #[test]
    fn invalid_values() {
        let short = env(&[("DATABASE_URL", "sqlite::memory:"), ("SECRET_KEY", "short")]).unwrap();
        assert!(matches!(short.cookie_key(), Err(InitError::SecretTooShort)));

        let ttl = env(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("SECRET_KEY", SECRET),
            ("SESSION_TTL_SECONDS", "0"),
        ])
        .unwrap();
        assert!(matches!(
            ttl.session_settings(),
            Err(InitError::InvalidSessionTtl(0))
        ));
    }
}

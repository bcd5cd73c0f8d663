use crate::model::{Id, auth::PasswordDigest};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const EMAIL_MAX_LEN: usize = 250;
pub const DISPLAY_NAME_MAX_LEN: usize = 200;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct User {
    pub id: Id<UserMarker>,
    pub email: Email,
    pub name: DisplayName,
}

/// A user together with the stored hash of their password.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Credentials {
    pub user: User,
    pub password_hash: PasswordDigest,
}

impl Credentials {
    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        self.password_hash.verify(password)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateUser {
    pub email: Email,
    pub name: DisplayName,
    pub password_hash: PasswordDigest,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Email(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The email address is invalid: {0}")]
pub struct InvalidEmailError(String);

impl Email {
    /// Accepts anything shaped like `local@domain`. Full address validation
    /// happens on the form, this only guards what reaches storage.
    pub fn new(email: String) -> Result<Self, InvalidEmailError> {
        let shaped = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());

        if shaped && email.chars().count() <= EMAIL_MAX_LEN {
            Ok(Email(email))
        } else {
            Err(InvalidEmailError(email))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct DisplayName(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The display name is invalid: {0}")]
pub struct InvalidDisplayNameError(String);

impl DisplayName {
    pub fn new(name: String) -> Result<Self, InvalidDisplayNameError> {
        let len = name.chars().count();
        if len > 0 && len <= DISPLAY_NAME_MAX_LEN {
            Ok(DisplayName(name))
        } else {
            Err(InvalidDisplayNameError(name))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for DisplayName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::user::{DISPLAY_NAME_MAX_LEN, DisplayName, Email};

    #[test]
    fn email_shape() {
        assert!(Email::new("reader@example.com".to_owned()).is_ok());
        assert!(Email::new("a@b".to_owned()).is_ok());

        assert!(Email::new(String::new()).is_err());
        assert!(Email::new("no-at-sign".to_owned()).is_err());
        assert!(Email::new("@example.com".to_owned()).is_err());
        assert!(Email::new("reader@".to_owned()).is_err());
        assert!(Email::new(format!("{}@example.com", "a".repeat(250))).is_err());
    }

    #[test]
    fn display_name_length() {
        assert!(DisplayName::new("Ada".to_owned()).is_ok());
        assert!(DisplayName::new("ä".repeat(DISPLAY_NAME_MAX_LEN)).is_ok());

        assert!(DisplayName::new(String::new()).is_err());
        assert!(DisplayName::new("a".repeat(DISPLAY_NAME_MAX_LEN + 1)).is_err());
    }
}

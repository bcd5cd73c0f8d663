use crate::server::ServerError;
use axum::{Form as AxumForm, extract::FromRequest};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use validator::ValidationErrors;

/// `application/x-www-form-urlencoded` body, rejected as a [`ServerError`].
#[derive(FromRequest, Debug, Clone)]
#[from_request(via(AxumForm), rejection(ServerError))]
pub struct Form<T>(pub T);

/// Deserializes a form field with surrounding whitespace removed, so that a
/// blank field counts as empty.
pub fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_owned())
}

/// Messages to show next to the fields of a re-rendered form.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn first(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut form_errors = Self::default();

        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let message = error
                    .message
                    .as_ref()
                    .map_or_else(|| error.code.to_string(), ToString::to_string);
                form_errors.add(&field, message);
            }
        }

        form_errors
    }
}

#[cfg(test)]
mod tests {
    use crate::server::form::{FormErrors, trimmed};
    use serde::Deserialize;
    use validator::Validate;

    #[derive(Deserialize, Validate)]
    struct SignUp {
        #[serde(deserialize_with = "trimmed")]
        #[validate(length(min = 1, message = "This field is required."))]
        name: String,
        #[validate(email(message = "Please enter a valid email address."))]
        email: String,
    }

    #[test]
    fn collects_validation_messages() {
        let form = SignUp {
            name: String::new(),
            email: "nope".to_owned(),
        };
        let errors = FormErrors::from(form.validate().unwrap_err());

        assert_eq!(errors.first("name"), Some("This field is required."));
        assert_eq!(
            errors.first("email"),
            Some("Please enter a valid email address.")
        );
        assert_eq!(errors.first("password"), None);
    }

    #[test]
    fn trims_fields() {
        let form: SignUp = serde_json::from_str(r#"{"name": "   ", "email": "a@b.co"}"#).unwrap();

        assert_eq!(form.name, "");
        assert!(form.validate().is_err());
    }

    #[test]
    fn single_and_add() {
        let mut errors = FormErrors::single("title", "Taken.");
        errors.add("title", "Too long.");

        assert_eq!(errors.first("title"), Some("Taken."));
        assert_eq!(FormErrors::default().first("title"), None);
    }
}

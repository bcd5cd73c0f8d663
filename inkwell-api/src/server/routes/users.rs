use crate::server::{
    Result, ServerRouter, ServerState,
    accounts::{self, Registration},
    flash,
    form::{Form, FormErrors, trimmed},
    routes::posts::IndexPath,
    session::{self, SessionSettings},
    view::{PageContext, Viewer},
};
use askama::Template;
use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::{
    extract::SignedCookieJar,
    routing::{RouterExt, TypedPath},
};
use inkwell_common::model::user::{DisplayName, Email};
use inkwell_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(register_form)
        .typed_post(register)
        .typed_get(login_form)
        .typed_post(login)
        .typed_get(logout)
}

#[derive(TypedPath)]
#[typed_path("/register")]
pub struct RegisterPath;

#[derive(TypedPath)]
#[typed_path("/login")]
pub struct LoginPath;

#[derive(TypedPath)]
#[typed_path("/logout")]
pub struct LogoutPath;

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Validate)]
pub struct RegisterForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        length(min = 1, message = "This field is required."),
        email(message = "Please enter a valid email address.")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "This field is required."))]
    pub name: String,
}

impl RegisterForm {
    fn to_parts(&self) -> Result<(Email, DisplayName), FormErrors> {
        self.validate().map_err(FormErrors::from)?;

        let email = Email::new(self.email.clone())
            .map_err(|_| FormErrors::single("email", "Please enter a valid email address."))?;
        let name = DisplayName::new(self.name.clone())
            .map_err(|_| FormErrors::single("name", "This name is too long."))?;

        Ok((email, name))
    }

    /// The form as it is shown again, without the password.
    fn redisplay(self) -> Self {
        Self {
            password: String::new(),
            ..self
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Validate)]
pub struct LoginForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "This field is required."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    ctx: PageContext,
    form: RegisterForm,
    errors: FormErrors,
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    ctx: PageContext,
    email: String,
    errors: FormErrors,
}

#[axum::debug_handler(state = ServerState)]
async fn register_form(_: RegisterPath, viewer: Viewer) -> Response {
    viewer
        .page(|ctx| RegisterTemplate {
            ctx,
            form: RegisterForm::default(),
            errors: FormErrors::default(),
        })
        .into_response()
}

#[axum::debug_handler(state = ServerState)]
async fn register(
    _: RegisterPath,
    viewer: Viewer,
    State(db): State<Arc<DbClient>>,
    State(settings): State<SessionSettings>,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let (email, name) = match form.to_parts() {
        Ok(parts) => parts,
        Err(errors) => {
            return Ok(viewer
                .page(|ctx| RegisterTemplate {
                    ctx,
                    form: form.redisplay(),
                    errors,
                })
                .into_response());
        }
    };

    match accounts::register(&db, email, name, &form.password).await? {
        Registration::Created(user) => {
            let jar = session::start(&db, settings, viewer.into_jar(), &user).await?;
            Ok((jar, Redirect::to(&IndexPath.to_string())).into_response())
        }
        Registration::DuplicateEmail => {
            let jar = flash::push(
                viewer.into_jar(),
                "You've already signed up with that email, log in instead!",
            );
            Ok((jar, Redirect::to(&LoginPath.to_string())).into_response())
        }
    }
}

#[axum::debug_handler(state = ServerState)]
async fn login_form(_: LoginPath, viewer: Viewer) -> Response {
    viewer
        .page(|ctx| LoginTemplate {
            ctx,
            email: String::new(),
            errors: FormErrors::default(),
        })
        .into_response()
}

#[axum::debug_handler(state = ServerState)]
async fn login(
    _: LoginPath,
    viewer: Viewer,
    State(db): State<Arc<DbClient>>,
    State(settings): State<SessionSettings>,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    if let Err(errors) = form.validate() {
        return Ok(viewer
            .page(|ctx| LoginTemplate {
                ctx,
                email: form.email,
                errors: errors.into(),
            })
            .into_response());
    }

    let authenticated = match Email::new(form.email.clone()) {
        Ok(email) => accounts::authenticate(&db, &email, &form.password).await?,
        Err(_) => Err(accounts::unknown_email(&form.password)),
    };

    match authenticated {
        Ok(user) => {
            let jar = session::start(&db, settings, viewer.into_jar(), &user).await?;
            Ok((jar, Redirect::to(&IndexPath.to_string())).into_response())
        }
        Err(err) => Ok(viewer
            .with_message(err.user_message())
            .page(|ctx| LoginTemplate {
                ctx,
                email: form.email,
                errors: FormErrors::default(),
            })
            .into_response()),
    }
}

#[axum::debug_handler(state = ServerState)]
async fn logout(
    _: LogoutPath,
    State(db): State<Arc<DbClient>>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Redirect)> {
    let jar = session::end(&db, jar).await?;

    Ok((jar, Redirect::to(&IndexPath.to_string())))
}

#[cfg(test)]
mod tests {
    use crate::server::routes::users::RegisterForm;

    #[test]
    fn register_form_rules() {
        let form = RegisterForm {
            email: "a@x.io".to_owned(),
            password: "pw".to_owned(),
            name: "A".to_owned(),
        };
        let (email, name) = form.to_parts().unwrap();
        assert_eq!(email.get(), "a@x.io");
        assert_eq!(name.get(), "A");

        let errors = RegisterForm {
            email: "nope".to_owned(),
            ..form.clone()
        }
        .to_parts()
        .unwrap_err();
        assert_eq!(
            errors.first("email"),
            Some("Please enter a valid email address.")
        );

        let errors = RegisterForm {
            name: "n".repeat(201),
            ..form.clone()
        }
        .to_parts()
        .unwrap_err();
        assert_eq!(errors.first("name"), Some("This name is too long."));

        assert!(form.redisplay().password.is_empty());
    }
}

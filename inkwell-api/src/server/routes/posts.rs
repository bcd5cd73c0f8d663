use crate::server::{
    Result, ServerError, ServerRouter, ServerState, flash,
    form::{Form, FormErrors, trimmed},
    routes::users::LoginPath,
    session::AdminUser,
    view::{PageContext, Viewer},
};
use askama::Template;
use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use inkwell_common::model::{
    Id,
    comment::{Comment, CreateComment},
    post::{CreatePost, InvalidPostFieldError, Post, PostContent, PostDate, PostMarker},
};
use inkwell_db::client::{DbClient, DbError};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(index)
        .typed_get(show_post)
        .typed_post(add_comment)
        .typed_get(new_post_form)
        .typed_post(create_post)
        .typed_get(edit_post_form)
        .typed_post(edit_post)
        .typed_get(delete_post)
}

#[derive(TypedPath)]
#[typed_path("/")]
pub struct IndexPath;

#[derive(TypedPath, Deserialize)]
#[typed_path("/post/{id}", rejection(ServerError))]
pub struct PostPath {
    pub id: Id<PostMarker>,
}

#[derive(TypedPath)]
#[typed_path("/new-post")]
pub struct NewPostPath;

#[derive(TypedPath, Deserialize)]
#[typed_path("/edit-post/{id}", rejection(ServerError))]
pub struct EditPostPath {
    pub id: Id<PostMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/delete/{id}", rejection(ServerError))]
pub struct DeletePostPath {
    pub id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Validate)]
pub struct PostForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "This field is required."))]
    pub title: String,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "This field is required."))]
    pub subtitle: String,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        length(min = 1, message = "This field is required."),
        url(message = "Please enter a valid URL.")
    )]
    pub img_url: String,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "This field is required."))]
    pub body: String,
}

impl From<PostContent> for PostForm {
    fn from(content: PostContent) -> Self {
        Self {
            title: content.title,
            subtitle: content.subtitle,
            img_url: content.img_url,
            body: content.body,
        }
    }
}

impl PostForm {
    fn to_content(&self) -> Result<PostContent, FormErrors> {
        self.validate().map_err(FormErrors::from)?;

        PostContent::new(
            self.title.clone(),
            self.subtitle.clone(),
            self.body.clone(),
            self.img_url.clone(),
        )
        .map_err(|InvalidPostFieldError { field }| {
            FormErrors::single(field, "This field is too long.")
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Validate)]
pub struct CommentForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "This field is required."))]
    pub comment_text: String,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    ctx: PageContext,
    posts: Vec<Post>,
}

#[derive(Template)]
#[template(path = "post.html")]
struct PostTemplate {
    ctx: PageContext,
    post: Post,
    comments: Vec<Comment>,
    form: CommentForm,
    errors: FormErrors,
}

#[derive(Template)]
#[template(path = "make_post.html")]
struct MakePostTemplate {
    ctx: PageContext,
    heading: &'static str,
    action: String,
    form: PostForm,
    errors: FormErrors,
}

async fn fetch_post_or_404(db: &DbClient, id: Id<PostMarker>) -> Result<Post> {
    db.fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))
}

#[axum::debug_handler(state = ServerState)]
async fn index(_: IndexPath, viewer: Viewer, State(db): State<Arc<DbClient>>) -> Result<Response> {
    let posts = db.fetch_posts().await?;

    Ok(viewer
        .page(|ctx| IndexTemplate { ctx, posts })
        .into_response())
}

#[axum::debug_handler(state = ServerState)]
async fn show_post(
    PostPath { id }: PostPath,
    viewer: Viewer,
    State(db): State<Arc<DbClient>>,
) -> Result<Response> {
    let post = fetch_post_or_404(&db, id).await?;
    let comments = db.fetch_post_comments(id).await?;

    Ok(viewer
        .page(|ctx| PostTemplate {
            ctx,
            post,
            comments,
            form: CommentForm::default(),
            errors: FormErrors::default(),
        })
        .into_response())
}

#[axum::debug_handler(state = ServerState)]
async fn add_comment(
    PostPath { id }: PostPath,
    viewer: Viewer,
    State(db): State<Arc<DbClient>>,
    Form(form): Form<CommentForm>,
) -> Result<Response> {
    let post = fetch_post_or_404(&db, id).await?;

    if let Err(errors) = form.validate() {
        let comments = db.fetch_post_comments(id).await?;

        return Ok(viewer
            .page(|ctx| PostTemplate {
                ctx,
                post,
                comments,
                form,
                errors: errors.into(),
            })
            .into_response());
    }

    let Some(author) = viewer.user().map(|user| user.id) else {
        let jar = flash::push(
            viewer.into_jar(),
            "You need to login or register to comment.",
        );
        return Ok((jar, Redirect::to(&LoginPath.to_string())).into_response());
    };

    let comment_id = db
        .create_comment(&CreateComment {
            post: id,
            author,
            text: form.comment_text,
        })
        .await?;
    info!(%comment_id, post_id = %id, user_id = %author, "Added comment");

    Ok((
        viewer.into_jar(),
        Redirect::to(&PostPath { id }.to_string()),
    )
        .into_response())
}

#[axum::debug_handler(state = ServerState)]
async fn new_post_form(_: NewPostPath, _: AdminUser, viewer: Viewer) -> Response {
    viewer
        .page(|ctx| MakePostTemplate {
            ctx,
            heading: "New Post",
            action: NewPostPath.to_string(),
            form: PostForm::default(),
            errors: FormErrors::default(),
        })
        .into_response()
}

#[axum::debug_handler(state = ServerState)]
async fn create_post(
    _: NewPostPath,
    AdminUser(admin): AdminUser,
    viewer: Viewer,
    State(db): State<Arc<DbClient>>,
    Form(form): Form<PostForm>,
) -> Result<Response> {
    let errors = match form.to_content() {
        Ok(content) => {
            let create = CreatePost {
                author: admin.id,
                date: PostDate::today(),
                content,
            };

            match db.create_post(&create).await {
                Ok(post_id) => {
                    info!(%post_id, user_id = %admin.id, "Created post");
                    return Ok((viewer.into_jar(), Redirect::to(&IndexPath.to_string()))
                        .into_response());
                }
                Err(DbError::TitleTaken(_)) => title_taken(),
                Err(err) => return Err(err.into()),
            }
        }
        Err(errors) => errors,
    };

    Ok(viewer
        .page(|ctx| MakePostTemplate {
            ctx,
            heading: "New Post",
            action: NewPostPath.to_string(),
            form,
            errors,
        })
        .into_response())
}

#[axum::debug_handler(state = ServerState)]
async fn edit_post_form(
    EditPostPath { id }: EditPostPath,
    _: AdminUser,
    viewer: Viewer,
    State(db): State<Arc<DbClient>>,
) -> Result<Response> {
    let post = fetch_post_or_404(&db, id).await?;

    Ok(viewer
        .page(|ctx| MakePostTemplate {
            ctx,
            heading: "Edit Post",
            action: EditPostPath { id }.to_string(),
            form: post.content.into(),
            errors: FormErrors::default(),
        })
        .into_response())
}

#[axum::debug_handler(state = ServerState)]
async fn edit_post(
    EditPostPath { id }: EditPostPath,
    AdminUser(admin): AdminUser,
    viewer: Viewer,
    State(db): State<Arc<DbClient>>,
    Form(form): Form<PostForm>,
) -> Result<Response> {
    fetch_post_or_404(&db, id).await?;

    let errors = match form.to_content() {
        Ok(content) => match db.update_post(id, &content).await {
            Ok(true) => {
                info!(post_id = %id, user_id = %admin.id, "Edited post");
                return Ok((
                    viewer.into_jar(),
                    Redirect::to(&PostPath { id }.to_string()),
                )
                    .into_response());
            }
            Ok(false) => return Err(ServerError::PostByIdNotFound(id)),
            Err(DbError::TitleTaken(_)) => title_taken(),
            Err(err) => return Err(err.into()),
        },
        Err(errors) => errors,
    };

    Ok(viewer
        .page(|ctx| MakePostTemplate {
            ctx,
            heading: "Edit Post",
            action: EditPostPath { id }.to_string(),
            form,
            errors,
        })
        .into_response())
}

#[axum::debug_handler(state = ServerState)]
async fn delete_post(
    DeletePostPath { id }: DeletePostPath,
    AdminUser(admin): AdminUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Redirect> {
    if !db.delete_post(id).await? {
        return Err(ServerError::PostByIdNotFound(id));
    }

    info!(post_id = %id, user_id = %admin.id, "Deleted post");
    Ok(Redirect::to(&IndexPath.to_string()))
}

fn title_taken() -> FormErrors {
    FormErrors::single("title", "A post with this title already exists.")
}

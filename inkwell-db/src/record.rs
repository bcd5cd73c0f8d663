use inkwell_common::{
    model::{
        ModelValidationError,
        auth::{PasswordDigest, Session},
        comment::Comment,
        post::{Post, PostContent, PostDate},
        user::{Credentials, DisplayName, Email, User},
    },
    util::InvalidTimestampError,
};
use sqlx::FromRow;
use time::UtcDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub id: i64,
    pub email: String,
    pub name: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct CredentialsRecord {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub id: i64,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
    pub date: String,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub img_url: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_name: Option<String>,
    pub text: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct SessionRecord {
    pub user_id: i64,
    pub token_hash: Vec<u8>,
    pub expires_at: Option<i64>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            email: Email::new(value.email)?,
            name: DisplayName::new(value.name)?,
        })
    }
}

impl TryFrom<CredentialsRecord> for Credentials {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: User {
                id: value.id.into(),
                email: Email::new(value.email)?,
                name: DisplayName::new(value.name)?,
            },
            password_hash: PasswordDigest::new(value.password_hash)?,
        })
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            author_id: value.author_id.map(Into::into),
            author_name: value.author_name.map(DisplayName::new).transpose()?,
            date: PostDate::new(value.date),
            content: PostContent::new(value.title, value.subtitle, value.body, value.img_url)?,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            post_id: value.post_id.into(),
            author_id: value.author_id.into(),
            author_name: value.author_name.map(DisplayName::new).transpose()?,
            text: value.text,
        })
    }
}

impl TryFrom<SessionRecord> for Session {
    type Error = ModelValidationError;

    fn try_from(value: SessionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_id.into(),
            token_hash: value.token_hash.try_into()?,
            expires_at: value
                .expires_at
                .map(|timestamp| {
                    UtcDateTime::from_unix_timestamp(timestamp)
                        .map_err(|_| InvalidTimestampError(timestamp))
                })
                .transpose()?,
        })
    }
}

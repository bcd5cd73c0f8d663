use crate::record::{CommentRecord, CredentialsRecord, PostRecord, SessionRecord, UserRecord};
use inkwell_common::model::{
    Id, ModelValidationError,
    auth::{Session, SessionTokenHash},
    comment::{Comment, CommentMarker, CreateComment},
    post::{CreatePost, Post, PostContent, PostMarker},
    user::{CreateUser, Credentials, Email, User, UserMarker},
};
use sqlx::{
    SqlitePool,
    migrate::{MigrateError, Migrator},
    query, query_as, query_scalar,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;
use thiserror::Error;
use time::UtcDateTime;
use tracing::{debug, info};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

static MIGRATOR: Migrator = sqlx::migrate!();

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("A user with the email {0} already exists")]
    EmailTaken(Email),
    #[error("A post titled {0:?} already exists")]
    TitleTaken(String),
    #[error("Migrating the database failed: {0}")]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

const POST_COLUMNS: &str = "
    blog_posts.id,
    blog_posts.author_id,
    users.name AS author_name,
    blog_posts.date,
    blog_posts.title,
    blog_posts.subtitle,
    blog_posts.body,
    blog_posts.img_url
";

#[derive(Debug)]
pub struct DbClient {
    pool: SqlitePool,
}

impl DbClient {
    /// Connects to `database_url`, creating the database file if needed, and
    /// applies pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every in-memory connection is its own database, so keep exactly one alive.
        let pool_options = if is_in_memory(database_url) {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options.connect_with(options).await?;
        Self::from_pool(pool).await
    }

    /// A fresh, migrated database that lives as long as the client.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        MIGRATOR.run(&pool).await?;
        info!("Database migrations applied");

        Ok(Self { pool })
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.id,
                users.email,
                users.name
            FROM
                users
            WHERE
                users.id = ?
            ",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_user_by_email(&self, email: &Email) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.id,
                users.email,
                users.name
            FROM
                users
            WHERE
                users.email = ?
            ",
        )
        .bind(email.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_credentials(&self, email: &Email) -> Result<Option<Credentials>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT
                users.id,
                users.email,
                users.name,
                users.password_hash
            FROM
                users
            WHERE
                users.email = ?
            ",
        )
        .bind(email.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(Credentials::try_from).transpose()?;
        Ok(credentials)
    }

    /// Fails with [`DbError::EmailTaken`] if the email is already registered.
    pub async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let id = query_scalar::<_, i64>(
            "
            INSERT INTO users (email, password_hash, name)
            VALUES (?, ?, ?)
            RETURNING users.id
            ",
        )
        .bind(user.email.get())
        .bind(user.password_hash.get())
        .bind(user.name.get())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                DbError::EmailTaken(user.email.clone())
            } else {
                err.into()
            }
        })?;

        Ok(User {
            id: id.into(),
            email: user.email.clone(),
            name: user.name.clone(),
        })
    }

    pub async fn create_session(&self, session: &Session) -> Result<()> {
        query(
            "
            INSERT INTO sessions (token_hash, user_id, expires_at)
            VALUES (?, ?, ?)
            ",
        )
        .bind(&session.token_hash.0[..])
        .bind(session.user.get())
        .bind(session.expires_at.map(UtcDateTime::unix_timestamp))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch_session(&self, token_hash: &SessionTokenHash) -> Result<Option<Session>> {
        let record = query_as::<_, SessionRecord>(
            "
            SELECT
                sessions.user_id,
                sessions.token_hash,
                sessions.expires_at
            FROM
                sessions
            WHERE
                sessions.token_hash = ?
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let session = record.map(Session::try_from).transpose()?;
        Ok(session)
    }

    /// Returns whether a session was removed.
    pub async fn delete_session(&self, token_hash: &SessionTokenHash) -> Result<bool> {
        let result = query("DELETE FROM sessions WHERE sessions.token_hash = ?")
            .bind(&token_hash.0[..])
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All posts in storage order.
    pub async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let records = query_as::<_, PostRecord>(&format!(
            "
            SELECT {POST_COLUMNS}
            FROM
                blog_posts LEFT JOIN users ON users.id = blog_posts.author_id
            ORDER BY
                blog_posts.id
            "
        ))
        .fetch_all(&self.pool)
        .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(&format!(
            "
            SELECT {POST_COLUMNS}
            FROM
                blog_posts LEFT JOIN users ON users.id = blog_posts.author_id
            WHERE
                blog_posts.id = ?
            "
        ))
        .bind(post_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    /// Fails with [`DbError::TitleTaken`] if another post has the same title.
    pub async fn create_post(&self, post: &CreatePost) -> Result<Id<PostMarker>> {
        let content = &post.content;
        let id = query_scalar::<_, i64>(
            "
            INSERT INTO blog_posts (author_id, title, subtitle, date, body, img_url)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING blog_posts.id
            ",
        )
        .bind(post.author.get())
        .bind(&content.title)
        .bind(&content.subtitle)
        .bind(post.date.get())
        .bind(&content.body)
        .bind(&content.img_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| title_taken_or(err, content))?;

        Ok(id.into())
    }

    /// Replaces the written content of a post, keeping its author and date.
    ///
    /// Returns whether the post exists.
    pub async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<bool> {
        let result = query(
            "
            UPDATE blog_posts
            SET title = ?, subtitle = ?, body = ?, img_url = ?
            WHERE blog_posts.id = ?
            ",
        )
        .bind(&content.title)
        .bind(&content.subtitle)
        .bind(&content.body)
        .bind(&content.img_url)
        .bind(post_id.get())
        .execute(&self.pool)
        .await
        .map_err(|err| title_taken_or(err, content))?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes only the post itself, its comments stay behind.
    ///
    /// Returns whether the post existed.
    pub async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM blog_posts WHERE blog_posts.id = ?")
            .bind(post_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn fetch_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(
            "
            SELECT
                comments.id,
                comments.post_id,
                comments.author_id,
                users.name AS author_name,
                comments.text
            FROM
                comments LEFT JOIN users ON users.id = comments.author_id
            WHERE
                comments.post_id = ?
            ORDER BY
                comments.id
            ",
        )
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    pub async fn create_comment(&self, comment: &CreateComment) -> Result<Id<CommentMarker>> {
        let id = query_scalar::<_, i64>(
            "
            INSERT INTO comments (post_id, author_id, text)
            VALUES (?, ?, ?)
            RETURNING comments.id
            ",
        )
        .bind(comment.post.get())
        .bind(comment.author.get())
        .bind(&comment.text)
        .fetch_one(&self.pool)
        .await?;

        debug!(%id, post = %comment.post, "Stored comment");
        Ok(id.into())
    }
}

fn title_taken_or(err: sqlx::Error, content: &PostContent) -> DbError {
    if is_unique_violation(&err) {
        DbError::TitleTaken(content.title.clone())
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{DbClient, DbError};
    use inkwell_common::model::{
        Id,
        auth::{PasswordDigest, Session, SessionToken},
        comment::CreateComment,
        post::{CreatePost, PostContent, PostDate, PostMarker},
        user::{CreateUser, DisplayName, Email, User},
    };
    use time::UtcDateTime;

    async fn client() -> DbClient {
        DbClient::in_memory().await.unwrap()
    }

    async fn create_user(db: &DbClient, email: &str, password: &str) -> User {
        db.create_user(&CreateUser {
            email: Email::new(email.to_owned()).unwrap(),
            name: DisplayName::new("Reader".to_owned()).unwrap(),
            password_hash: PasswordDigest::hash(password).unwrap(),
        })
        .await
        .unwrap()
    }

    fn content(title: &str) -> PostContent {
        PostContent {
            title: title.to_owned(),
            subtitle: "A subtitle".to_owned(),
            body: "<p>Body</p>".to_owned(),
            img_url: "https://example.com/image.png".to_owned(),
        }
    }

    async fn create_post(db: &DbClient, author: &User, title: &str) -> Id<PostMarker> {
        db.create_post(&CreatePost {
            author: author.id,
            date: PostDate::new("October 16, 2026".to_owned()),
            content: content(title),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn users() {
        let db = client().await;
        let user = create_user(&db, "reader@example.com", "secret").await;

        assert_eq!(db.fetch_user(user.id).await.unwrap(), Some(user.clone()));
        assert_eq!(
            db.fetch_user_by_email(&user.email).await.unwrap(),
            Some(user.clone())
        );
        assert_eq!(db.fetch_user(Id::new(999)).await.unwrap(), None);

        let credentials = db.fetch_credentials(&user.email).await.unwrap().unwrap();
        assert_eq!(credentials.user, user);
        assert!(credentials.verify("secret"));
        assert!(!credentials.verify("Secret"));

        let unknown = Email::new("nobody@example.com".to_owned()).unwrap();
        assert!(db.fetch_credentials(&unknown).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email() {
        let db = client().await;
        create_user(&db, "reader@example.com", "first").await;

        let result = db
            .create_user(&CreateUser {
                email: Email::new("reader@example.com".to_owned()).unwrap(),
                name: DisplayName::new("Impostor".to_owned()).unwrap(),
                password_hash: PasswordDigest::hash("second").unwrap(),
            })
            .await;

        assert!(matches!(result, Err(DbError::EmailTaken(_))));
    }

    #[tokio::test]
    async fn sessions() {
        let db = client().await;
        let user = create_user(&db, "reader@example.com", "secret").await;

        let token = SessionToken::generate();
        let session = Session {
            user: user.id,
            token_hash: token.hash().unwrap(),
            expires_at: Some(UtcDateTime::from_unix_timestamp(1_790_000_000).unwrap()),
        };
        db.create_session(&session).await.unwrap();

        let fetched = db.fetch_session(&session.token_hash).await.unwrap();
        assert_eq!(fetched, Some(session.clone()));

        let lasting = Session {
            user: user.id,
            token_hash: SessionToken::generate().hash().unwrap(),
            expires_at: None,
        };
        db.create_session(&lasting).await.unwrap();
        assert_eq!(
            db.fetch_session(&lasting.token_hash).await.unwrap(),
            Some(lasting)
        );

        let other = SessionToken::generate().hash().unwrap();
        assert_eq!(db.fetch_session(&other).await.unwrap(), None);

        assert!(db.delete_session(&session.token_hash).await.unwrap());
        assert!(!db.delete_session(&session.token_hash).await.unwrap());
        assert_eq!(db.fetch_session(&session.token_hash).await.unwrap(), None);
    }

    #[tokio::test]
    async fn posts() {
        let db = client().await;
        let author = create_user(&db, "admin@example.com", "secret").await;

        let first = create_post(&db, &author, "First").await;
        let second = create_post(&db, &author, "Second").await;

        let posts = db.fetch_posts().await.unwrap();
        let titles: Vec<_> = posts.iter().map(|post| post.content.title.as_str()).collect();
        assert_eq!(titles, ["First", "Second"]);
        assert_eq!(posts[0].id, first);
        assert_eq!(posts[0].author_id, Some(author.id));
        assert_eq!(posts[0].author_name, Some(author.name.clone()));
        assert_eq!(posts[0].date.get(), "October 16, 2026");

        let mut edited = content("First, revised");
        edited.body = "<p>New body</p>".to_owned();
        assert!(db.update_post(first, &edited).await.unwrap());
        let post = db.fetch_post(first).await.unwrap().unwrap();
        assert_eq!(post.content, edited);
        assert_eq!(post.author_id, Some(author.id));

        assert!(!db.update_post(Id::new(999), &edited).await.unwrap());

        assert!(db.delete_post(second).await.unwrap());
        assert!(!db.delete_post(second).await.unwrap());
        assert_eq!(db.fetch_post(second).await.unwrap(), None);
        assert_eq!(db.fetch_posts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_title() {
        let db = client().await;
        let author = create_user(&db, "admin@example.com", "secret").await;
        create_post(&db, &author, "Taken").await;
        let other = create_post(&db, &author, "Free").await;

        let created = db
            .create_post(&CreatePost {
                author: author.id,
                date: PostDate::today(),
                content: content("Taken"),
            })
            .await;
        assert!(matches!(created, Err(DbError::TitleTaken(title)) if title == "Taken"));

        let updated = db.update_post(other, &content("Taken")).await;
        assert!(matches!(updated, Err(DbError::TitleTaken(_))));
    }

    #[tokio::test]
    async fn comments_outlive_posts() {
        let db = client().await;
        let author = create_user(&db, "admin@example.com", "secret").await;
        let post = create_post(&db, &author, "Doomed").await;

        let comment_id = db
            .create_comment(&CreateComment {
                post,
                author: author.id,
                text: "Nice post".to_owned(),
            })
            .await
            .unwrap();

        let comments = db.fetch_post_comments(post).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, comment_id);
        assert_eq!(comments[0].author_name, Some(author.name.clone()));

        assert!(db.delete_post(post).await.unwrap());

        let orphans = db.fetch_post_comments(post).await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].post_id, post);

        // A new post never reuses the deleted id.
        let next = create_post(&db, &author, "Phoenix").await;
        assert_ne!(next, post);
        assert!(db.fetch_post_comments(next).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_author() {
        let db = client().await;
        let author = create_user(&db, "admin@example.com", "secret").await;
        let post = create_post(&db, &author, "Orphaned").await;

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(author.id.get())
            .execute(&db.pool)
            .await
            .unwrap();

        let post = db.fetch_post(post).await.unwrap().unwrap();
        assert_eq!(post.author_id, Some(author.id));
        assert_eq!(post.author_name, None);
    }
}

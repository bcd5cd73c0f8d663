use crate::model::{
    Id,
    user::{DisplayName, UserMarker},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use time::{Date, OffsetDateTime};

pub const POST_LINE_MAX_LEN: usize = 250;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Post {
    pub id: Id<PostMarker>,
    /// `None` when the post was stored without an author.
    pub author_id: Option<Id<UserMarker>>,
    /// `None` when there is no author or the author no longer exists.
    pub author_name: Option<DisplayName>,
    pub date: PostDate,
    pub content: PostContent,
}

/// The parts of a post an admin writes and edits.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostContent {
    pub title: String,
    pub subtitle: String,
    /// Rich text, stored and rendered as HTML.
    pub body: String,
    pub img_url: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub date: PostDate,
    pub content: PostContent,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("The post field {field} is empty or longer than {POST_LINE_MAX_LEN} characters")]
pub struct InvalidPostFieldError {
    pub field: &'static str,
}

impl PostContent {
    pub fn new(
        title: String,
        subtitle: String,
        body: String,
        img_url: String,
    ) -> Result<Self, InvalidPostFieldError> {
        let content = Self {
            title,
            subtitle,
            body,
            img_url,
        };
        content.check()?;

        Ok(content)
    }

    pub fn check(&self) -> Result<(), InvalidPostFieldError> {
        let lines = [
            ("title", &self.title),
            ("subtitle", &self.subtitle),
            ("img_url", &self.img_url),
        ];
        for (field, value) in lines {
            let len = value.chars().count();
            if len == 0 || len > POST_LINE_MAX_LEN {
                return Err(InvalidPostFieldError { field });
            }
        }

        if self.body.trim().is_empty() {
            return Err(InvalidPostFieldError { field: "body" });
        }

        Ok(())
    }
}

/// Human readable creation date, e.g. `October 16, 2026`.
///
/// Kept as text: it is only ever displayed.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostDate(String);

impl PostDate {
    #[must_use]
    pub fn new(formatted: String) -> Self {
        Self(formatted)
    }

    #[must_use]
    pub fn from_date(date: Date) -> Self {
        Self(format!(
            "{} {:02}, {}",
            date.month(),
            date.day(),
            date.year()
        ))
    }

    #[must_use]
    pub fn today() -> Self {
        Self::from_date(OffsetDateTime::now_utc().date())
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for PostDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::post::{POST_LINE_MAX_LEN, PostContent, PostDate};
    use time::macros::date;

    fn content() -> PostContent {
        PostContent {
            title: "On Rust".to_owned(),
            subtitle: "Why borrow".to_owned(),
            body: "<p>Because.</p>".to_owned(),
            img_url: "https://example.com/crab.png".to_owned(),
        }
    }

    #[test]
    fn post_date_format() {
        assert_eq!(PostDate::from_date(date!(2026-10-16)).get(), "October 16, 2026");
        assert_eq!(PostDate::from_date(date!(2024-02-03)).get(), "February 03, 2024");
    }

    #[test]
    fn content_check() {
        assert!(content().check().is_ok());

        let mut untitled = content();
        untitled.title = String::new();
        assert_eq!(untitled.check().unwrap_err().field, "title");

        let mut long_subtitle = content();
        long_subtitle.subtitle = "s".repeat(POST_LINE_MAX_LEN + 1);
        assert_eq!(long_subtitle.check().unwrap_err().field, "subtitle");

        let mut blank_body = content();
        blank_body.body = "  \n ".to_owned();
        assert_eq!(blank_body.check().unwrap_err().field, "body");

        let built = PostContent::new(
            "t".to_owned(),
            "s".to_owned(),
            "b".to_owned(),
            "u".to_owned(),
        );
        assert!(built.is_ok());
    }
}

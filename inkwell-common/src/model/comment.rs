use crate::model::{
    Id,
    post::PostMarker,
    user::{DisplayName, UserMarker},
};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    /// May point at a post that has since been deleted.
    pub post_id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub author_name: Option<DisplayName>,
    pub text: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CreateComment {
    pub post: Id<PostMarker>,
    pub author: Id<UserMarker>,
    pub text: String,
}

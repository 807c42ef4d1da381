//! Records of the blog domain and the key-spaces they are looked up in.

use std::fmt;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

pub type AuthorId = i32;
pub type PostId = i32;

/// An author, as served by the remote author service or the `authors` table.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: AuthorId,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: PostId,
    pub author_id: AuthorId,
    pub title: String,
    pub content: String,
}

/// Comments have no identity of their own; they are only reached through a post or an author.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::FromRow)]
pub struct Comment {
    pub post_id: PostId,
    pub author_id: AuthorId,
    pub content: String,
}

/// A named domain of lookup keys sharing one backend relation.
///
/// Each key-space gets its own request-scoped cache, so the same integer can be looked up as an
/// author id and as a post id in one request without the two colliding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum KeySpace {
    AuthorById,
    PostById,
    PostsByAuthor,
    AllPosts,
    CommentsByPost,
    CommentsByAuthor,
}

impl KeySpace {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySpace::AuthorById => "author_by_id",
            KeySpace::PostById => "post_by_id",
            KeySpace::PostsByAuthor => "posts_by_author",
            KeySpace::AllPosts => "all_posts",
            KeySpace::CommentsByPost => "comments_by_post",
            KeySpace::CommentsByAuthor => "comments_by_author",
        }
    }
}

impl fmt::Display for KeySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

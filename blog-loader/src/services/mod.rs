//! Backends the resolution layer fetches records from.
//!
//! Both are shared by every request of the process. Their connection pools are the only
//! resources concurrent requests contend on.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::model::Author;
use crate::model::AuthorId;
use crate::model::Comment;
use crate::model::Post;
use crate::model::PostId;

mod author_service;
mod postgres;

pub use self::author_service::HttpAuthorService;
pub use self::postgres::PostgresStore;

/// The relational store: every method is one round trip answering a whole key set.
///
/// Keys without records are left out of the returned maps.
#[async_trait]
pub trait BlogStore: Send + Sync + 'static {
    async fn authors(&self, ids: &[AuthorId]) -> Result<HashMap<AuthorId, Author>, FetchError>;

    async fn posts(&self, ids: &[PostId]) -> Result<HashMap<PostId, Post>, FetchError>;

    async fn posts_by_author(
        &self,
        author_ids: &[AuthorId],
    ) -> Result<HashMap<AuthorId, Vec<Post>>, FetchError>;

    async fn all_posts(&self) -> Result<Vec<Post>, FetchError>;

    async fn comments_by_post(
        &self,
        post_ids: &[PostId],
    ) -> Result<HashMap<PostId, Vec<Comment>>, FetchError>;

    async fn comments_by_author(
        &self,
        author_ids: &[AuthorId],
    ) -> Result<HashMap<AuthorId, Vec<Comment>>, FetchError>;
}

/// The remote author service, which only answers one author per call.
#[async_trait]
pub trait AuthorService: Send + Sync + 'static {
    /// Fetch one author; `Ok(None)` when the service does not know it.
    async fn fetch_one(&self, id: AuthorId) -> Result<Option<Author>, FetchError>;
}

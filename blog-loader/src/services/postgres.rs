use std::collections::HashMap;

use async_trait::async_trait;
use itertools::Itertools;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::BlogStore;
use crate::configuration::StoreConfig;
use crate::error::FetchError;
use crate::model::Author;
use crate::model::AuthorId;
use crate::model::Comment;
use crate::model::KeySpace;
use crate::model::Post;
use crate::model::PostId;

const SELECT_AUTHORS: &str = "select id, first_name, last_name, bio from authors where id = any($1)";
const SELECT_POSTS: &str = "select id, author_id, title, content from posts where id = any($1)";
const SELECT_POSTS_BY_AUTHOR: &str =
    "select id, author_id, title, content from posts where author_id = any($1)";
const SELECT_ALL_POSTS: &str = "select id, author_id, title, content from posts";
const SELECT_COMMENTS_BY_POST: &str =
    "select post_id, author_id, content from comments where post_id = any($1)";
const SELECT_COMMENTS_BY_AUTHOR: &str =
    "select post_id, author_id, content from comments where author_id = any($1)";

/// The blog database, queried with one `= any($1)` statement per key set.
///
/// The pool's `max_connections` bounds the number of concurrent round trips across all
/// requests; further calls queue for a connection until `acquire_timeout` elapses.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a store whose connections are opened on first use.
    pub fn connect_lazy(config: &StoreConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy(config.url.as_str())?;
        Ok(Self { pool })
    }
}

fn fetch_error(key_space: KeySpace, error: sqlx::Error) -> FetchError {
    match error {
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_) => FetchError::MalformedResponse {
            key_space,
            reason: error.to_string(),
        },
        error => FetchError::backend(key_space, error),
    }
}

#[async_trait]
impl BlogStore for PostgresStore {
    async fn authors(&self, ids: &[AuthorId]) -> Result<HashMap<AuthorId, Author>, FetchError> {
        let authors: Vec<Author> = sqlx::query_as(SELECT_AUTHORS)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| fetch_error(KeySpace::AuthorById, error))?;
        Ok(authors
            .into_iter()
            .map(|author| (author.id, author))
            .collect())
    }

    async fn posts(&self, ids: &[PostId]) -> Result<HashMap<PostId, Post>, FetchError> {
        let posts: Vec<Post> = sqlx::query_as(SELECT_POSTS)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| fetch_error(KeySpace::PostById, error))?;
        Ok(posts.into_iter().map(|post| (post.id, post)).collect())
    }

    async fn posts_by_author(
        &self,
        author_ids: &[AuthorId],
    ) -> Result<HashMap<AuthorId, Vec<Post>>, FetchError> {
        let posts: Vec<Post> = sqlx::query_as(SELECT_POSTS_BY_AUTHOR)
            .bind(author_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| fetch_error(KeySpace::PostsByAuthor, error))?;
        Ok(posts.into_iter().into_group_map_by(|post| post.author_id))
    }

    async fn all_posts(&self) -> Result<Vec<Post>, FetchError> {
        sqlx::query_as(SELECT_ALL_POSTS)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| fetch_error(KeySpace::AllPosts, error))
    }

    async fn comments_by_post(
        &self,
        post_ids: &[PostId],
    ) -> Result<HashMap<PostId, Vec<Comment>>, FetchError> {
        let comments: Vec<Comment> = sqlx::query_as(SELECT_COMMENTS_BY_POST)
            .bind(post_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| fetch_error(KeySpace::CommentsByPost, error))?;
        Ok(comments
            .into_iter()
            .into_group_map_by(|comment| comment.post_id))
    }

    async fn comments_by_author(
        &self,
        author_ids: &[AuthorId],
    ) -> Result<HashMap<AuthorId, Vec<Comment>>, FetchError> {
        let comments: Vec<Comment> = sqlx::query_as(SELECT_COMMENTS_BY_AUTHOR)
            .bind(author_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| fetch_error(KeySpace::CommentsByAuthor, error))?;
        Ok(comments
            .into_iter()
            .into_group_map_by(|comment| comment.author_id))
    }
}

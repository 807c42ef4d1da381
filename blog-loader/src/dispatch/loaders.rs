//! Adapters from the relational store to the uniform key → value batch contract.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::batching::BatchLoader;
use crate::error::FetchError;
use crate::model::Author;
use crate::model::AuthorId;
use crate::model::Comment;
use crate::model::KeySpace;
use crate::model::Post;
use crate::model::PostId;
use crate::services::BlogStore;

macro_rules! store_loader {
    ($(#[$doc:meta])* $name:ident, $key_space:expr, $key:ty => $value:ty, $method:ident) => {
        $(#[$doc])*
        pub(crate) struct $name {
            store: Arc<dyn BlogStore>,
        }

        impl $name {
            pub(crate) fn new(store: Arc<dyn BlogStore>) -> Self {
                Self { store }
            }
        }

        #[async_trait]
        impl BatchLoader for $name {
            type Key = $key;
            type Value = $value;

            fn key_space(&self) -> KeySpace {
                $key_space
            }

            async fn load(&self, keys: &[$key]) -> Result<HashMap<$key, $value>, FetchError> {
                self.store.$method(keys).await
            }
        }
    };
}

store_loader!(
    /// Authors from the `authors` table, used when authors are resolved in batches.
    AuthorsById,
    KeySpace::AuthorById,
    AuthorId => Author,
    authors
);

store_loader!(PostsById, KeySpace::PostById, PostId => Post, posts);

store_loader!(
    /// Every post of each author; authors without posts are absent from the store's answer.
    PostsByAuthor,
    KeySpace::PostsByAuthor,
    AuthorId => Vec<Post>,
    posts_by_author
);

store_loader!(
    CommentsByPost,
    KeySpace::CommentsByPost,
    PostId => Vec<Comment>,
    comments_by_post
);

store_loader!(
    CommentsByAuthor,
    KeySpace::CommentsByAuthor,
    AuthorId => Vec<Comment>,
    comments_by_author
);

//! In-memory backends for tests and benchmarks.
//!
//! Both record every round trip they answer, so a test can assert how many calls a query cost
//! and with which key sets.

use std::collections::HashMap;
use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::FetchError;
use crate::model::Author;
use crate::model::AuthorId;
use crate::model::Comment;
use crate::model::KeySpace;
use crate::model::Post;
use crate::model::PostId;
use crate::services::AuthorService;
use crate::services::BlogStore;

/// One round trip answered by an in-memory backend. Keys are sorted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BackendCall {
    pub key_space: KeySpace,
    pub keys: Vec<i32>,
}

impl BackendCall {
    pub fn new(key_space: KeySpace, keys: impl IntoIterator<Item = i32>) -> Self {
        Self {
            key_space,
            keys: keys.into_iter().sorted().collect(),
        }
    }
}

#[derive(Debug, Default)]
struct Recorder {
    calls: Mutex<Vec<BackendCall>>,
    failing: Mutex<HashSet<KeySpace>>,
    latency: Option<Duration>,
}

impl Recorder {
    async fn round_trip(&self, call: BackendCall) -> Result<(), FetchError> {
        let key_space = call.key_space;
        tracing::debug!(%key_space, keys = ?call.keys, "in-memory round trip");
        self.calls.lock().push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.lock().contains(&key_space) {
            return Err(FetchError::backend(key_space, "injected failure"));
        }
        Ok(())
    }

    fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    fn calls_for(&self, key_space: KeySpace) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.key_space == key_space)
            .count()
    }
}

/// The authors of the [`MemoryStore::blog`] fixture.
pub fn blog_authors() -> Vec<Author> {
    [
        (1, "Ada", "Lovelace", "wrote the first program"),
        (2, "Grace", "Hopper", "built the first compiler"),
        (3, "Edsger", "Dijkstra", "considered goto harmful"),
    ]
    .into_iter()
    .map(|(id, first_name, last_name, bio)| Author {
        id,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        bio: bio.to_string(),
    })
    .collect()
}

/// An in-memory [`BlogStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    authors: Vec<Author>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    recorder: Recorder,
}

impl MemoryStore {
    /// Three authors. Author 1 wrote posts 10 and 11, author 2 wrote post 12; authors 2 and 3
    /// commented on posts 10 and 11.
    pub fn blog() -> Self {
        let post = |id, author_id| Post {
            id,
            author_id,
            title: format!("post {id}"),
            content: format!("content of post {id}"),
        };
        let comment = |post_id, author_id| Comment {
            post_id,
            author_id,
            content: format!("author {author_id} on post {post_id}"),
        };
        Self {
            authors: blog_authors(),
            posts: vec![post(10, 1), post(11, 1), post(12, 2)],
            comments: vec![
                comment(10, 2),
                comment(10, 3),
                comment(11, 2),
                comment(11, 3),
            ],
            recorder: Recorder::default(),
        }
    }

    /// Delay every round trip by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.recorder.latency = Some(latency);
        self
    }

    /// Fail every later round trip of `key_space`.
    pub fn fail(&self, key_space: KeySpace) {
        self.recorder.failing.lock().insert(key_space);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.recorder.calls()
    }

    pub fn calls_for(&self, key_space: KeySpace) -> usize {
        self.recorder.calls_for(key_space)
    }
}

#[async_trait]
impl BlogStore for MemoryStore {
    async fn authors(&self, ids: &[AuthorId]) -> Result<HashMap<AuthorId, Author>, FetchError> {
        self.recorder
            .round_trip(BackendCall::new(KeySpace::AuthorById, ids.iter().copied()))
            .await?;
        Ok(self
            .authors
            .iter()
            .filter(|author| ids.contains(&author.id))
            .map(|author| (author.id, author.clone()))
            .collect())
    }

    async fn posts(&self, ids: &[PostId]) -> Result<HashMap<PostId, Post>, FetchError> {
        self.recorder
            .round_trip(BackendCall::new(KeySpace::PostById, ids.iter().copied()))
            .await?;
        Ok(self
            .posts
            .iter()
            .filter(|post| ids.contains(&post.id))
            .map(|post| (post.id, post.clone()))
            .collect())
    }

    async fn posts_by_author(
        &self,
        author_ids: &[AuthorId],
    ) -> Result<HashMap<AuthorId, Vec<Post>>, FetchError> {
        self.recorder
            .round_trip(BackendCall::new(
                KeySpace::PostsByAuthor,
                author_ids.iter().copied(),
            ))
            .await?;
        Ok(self
            .posts
            .iter()
            .filter(|post| author_ids.contains(&post.author_id))
            .cloned()
            .into_group_map_by(|post| post.author_id))
    }

    async fn all_posts(&self) -> Result<Vec<Post>, FetchError> {
        self.recorder
            .round_trip(BackendCall::new(KeySpace::AllPosts, std::iter::empty()))
            .await?;
        Ok(self.posts.clone())
    }

    async fn comments_by_post(
        &self,
        post_ids: &[PostId],
    ) -> Result<HashMap<PostId, Vec<Comment>>, FetchError> {
        self.recorder
            .round_trip(BackendCall::new(
                KeySpace::CommentsByPost,
                post_ids.iter().copied(),
            ))
            .await?;
        Ok(self
            .comments
            .iter()
            .filter(|comment| post_ids.contains(&comment.post_id))
            .cloned()
            .into_group_map_by(|comment| comment.post_id))
    }

    async fn comments_by_author(
        &self,
        author_ids: &[AuthorId],
    ) -> Result<HashMap<AuthorId, Vec<Comment>>, FetchError> {
        self.recorder
            .round_trip(BackendCall::new(
                KeySpace::CommentsByAuthor,
                author_ids.iter().copied(),
            ))
            .await?;
        Ok(self
            .comments
            .iter()
            .filter(|comment| author_ids.contains(&comment.author_id))
            .cloned()
            .into_group_map_by(|comment| comment.author_id))
    }
}

/// An in-memory [`AuthorService`] answering one author per call.
#[derive(Debug, Default)]
pub struct MemoryAuthorService {
    authors: HashMap<AuthorId, Author>,
    recorder: Recorder,
}

impl MemoryAuthorService {
    /// Knows the authors of [`MemoryStore::blog`].
    pub fn blog() -> Self {
        Self {
            authors: blog_authors()
                .into_iter()
                .map(|author| (author.id, author))
                .collect(),
            recorder: Recorder::default(),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.recorder.latency = Some(latency);
        self
    }

    /// Fail every later call.
    pub fn fail(&self) {
        self.recorder.failing.lock().insert(KeySpace::AuthorById);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.recorder.calls()
    }
}

#[async_trait]
impl AuthorService for MemoryAuthorService {
    async fn fetch_one(&self, id: AuthorId) -> Result<Option<Author>, FetchError> {
        self.recorder
            .round_trip(BackendCall::new(KeySpace::AuthorById, [id]))
            .await?;
        Ok(self.authors.get(&id).cloned())
    }
}

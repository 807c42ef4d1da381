//! Resolution dispatch: one entry point per relation of the blog schema.
//!
//! Field resolvers call the methods added to [`RequestContext`] here with the key of the field
//! being resolved. Each returns a deferred value without blocking; the relation decides which
//! cache answers it and whether a miss is coalesced with the other keys of the breadth level or
//! sent to its backend on its own.
//!
//! | relation              | key-space            | backend                                         |
//! |-----------------------|----------------------|-------------------------------------------------|
//! | author by id          | `author_by_id`       | author service per key, or `authors` in batches |
//! | post by id            | `post_by_id`         | `posts where id = any($1)`                      |
//! | posts of an author    | `posts_by_author`    | `posts where author_id = any($1)`               |
//! | all posts             | `all_posts`          | `posts`, once per request                       |
//! | comments of a post    | `comments_by_post`   | `comments where post_id = any($1)`              |
//! | comments of an author | `comments_by_author` | `comments where author_id = any($1)`            |

use std::sync::Arc;

use futures::FutureExt;
use futures::TryFutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

mod loaders;

use self::loaders::AuthorsById;
use self::loaders::CommentsByAuthor;
use self::loaders::CommentsByPost;
use self::loaders::PostsByAuthor;
use self::loaders::PostsById;
use crate::batching::CachedLoader;
use crate::cache::LoadFuture;
use crate::cache::RequestCache;
use crate::configuration::AuthorResolution;
use crate::configuration::Configuration;
use crate::configuration::ConfigurationError;
use crate::context::RequestContext;
use crate::context::RequestStats;
use crate::error::FetchError;
use crate::model::Author;
use crate::model::AuthorId;
use crate::model::Comment;
use crate::model::KeySpace;
use crate::model::Post;
use crate::model::PostId;
use crate::services::AuthorService;
use crate::services::BlogStore;
use crate::services::HttpAuthorService;
use crate::services::PostgresStore;

/// A deferred list relation. A key without records resolves to an empty list.
pub type ListFuture<T> = BoxFuture<'static, Result<Arc<Vec<T>>, FetchError>>;

/// The process-wide backends, shared by every request.
#[derive(Clone)]
pub struct Backends {
    store: Arc<dyn BlogStore>,
    authors: AuthorBackend,
}

#[derive(Clone)]
enum AuthorBackend {
    Remote(Arc<dyn AuthorService>),
    Batched,
}

impl Backends {
    /// Resolve authors through the remote author service, one call per distinct author.
    pub fn new(store: Arc<dyn BlogStore>, author_service: Arc<dyn AuthorService>) -> Self {
        Self {
            store,
            authors: AuthorBackend::Remote(author_service),
        }
    }

    /// Resolve authors from the store, one query per breadth level.
    pub fn batched(store: Arc<dyn BlogStore>) -> Self {
        Self {
            store,
            authors: AuthorBackend::Batched,
        }
    }

    /// Build the Postgres store and, in remote mode, the author service client.
    ///
    /// The configuration is validated first. No connection is opened until the first round trip.
    /// Must be called from within a tokio runtime.
    pub fn from_configuration(configuration: &Configuration) -> Result<Self, ConfigurationError> {
        configuration.validate()?;
        let store: Arc<dyn BlogStore> =
            Arc::new(PostgresStore::connect_lazy(&configuration.store)?);
        Ok(match configuration.author_service.resolution {
            AuthorResolution::Remote => Self::new(
                store,
                Arc::new(HttpAuthorService::new(&configuration.author_service)?),
            ),
            AuthorResolution::Batched => Self::batched(store),
        })
    }

    /// Start resolving a new request.
    pub fn request_context(&self) -> RequestContext {
        RequestContext::new(self)
    }
}

enum AuthorLoader {
    Remote {
        cache: RequestCache<AuthorId, Author>,
        service: Arc<dyn AuthorService>,
    },
    Batched(CachedLoader<AuthorsById>),
}

/// The caches and coalescers of one request, one pairing per key-space.
pub(crate) struct Loaders {
    authors: AuthorLoader,
    posts: CachedLoader<PostsById>,
    posts_by_author: CachedLoader<PostsByAuthor>,
    all_posts: RequestCache<(), Vec<Post>>,
    comments_by_post: CachedLoader<CommentsByPost>,
    comments_by_author: CachedLoader<CommentsByAuthor>,
    store: Arc<dyn BlogStore>,
}

impl Loaders {
    pub(crate) fn new(
        backends: &Backends,
        cancel: &CancellationToken,
        stats: &Arc<RequestStats>,
    ) -> Self {
        let store = backends.store.clone();
        let authors = match &backends.authors {
            AuthorBackend::Remote(service) => AuthorLoader::Remote {
                cache: RequestCache::new(KeySpace::AuthorById, cancel.clone(), stats.clone()),
                service: service.clone(),
            },
            AuthorBackend::Batched => AuthorLoader::Batched(CachedLoader::new(
                Arc::new(AuthorsById::new(store.clone())),
                cancel,
                stats,
            )),
        };
        Self {
            authors,
            posts: CachedLoader::new(Arc::new(PostsById::new(store.clone())), cancel, stats),
            posts_by_author: CachedLoader::new(
                Arc::new(PostsByAuthor::new(store.clone())),
                cancel,
                stats,
            ),
            all_posts: RequestCache::new(KeySpace::AllPosts, cancel.clone(), stats.clone()),
            comments_by_post: CachedLoader::new(
                Arc::new(CommentsByPost::new(store.clone())),
                cancel,
                stats,
            ),
            comments_by_author: CachedLoader::new(
                Arc::new(CommentsByAuthor::new(store.clone())),
                cancel,
                stats,
            ),
            store,
        }
    }

    pub(crate) fn flush(&self) {
        if let AuthorLoader::Batched(authors) = &self.authors {
            authors.flush();
        }
        self.posts.flush();
        self.posts_by_author.flush();
        self.comments_by_post.flush();
        self.comments_by_author.flush();
    }

    pub(crate) fn cancel(&self) {
        if let AuthorLoader::Batched(authors) = &self.authors {
            authors.cancel();
        }
        self.posts.cancel();
        self.posts_by_author.cancel();
        self.comments_by_post.cancel();
        self.comments_by_author.cancel();
    }

    fn author(&self, id: AuthorId, coalesce: bool) -> LoadFuture<Author> {
        match &self.authors {
            AuthorLoader::Remote { cache, service } => cache.get_or_load(id, |id| {
                let service = service.clone();
                async move {
                    let author = service.fetch_one(id).await.inspect_err(|error| {
                        tracing::warn!(
                            key_space = %KeySpace::AuthorById,
                            author.id = id,
                            %error,
                            "author lookup failed"
                        );
                    })?;
                    Ok(author.map(Arc::new))
                }
            }),
            AuthorLoader::Batched(authors) if coalesce => authors.load(id),
            AuthorLoader::Batched(authors) => authors.load_now(id),
        }
    }

    fn all_posts(&self) -> ListFuture<Post> {
        let store = self.store.clone();
        self.all_posts
            .get_or_load((), |()| async move {
                Ok(Some(Arc::new(store.all_posts().await?)))
            })
            .map_ok(Option::unwrap_or_default)
            .boxed()
    }
}

fn list<T>(load: LoadFuture<Vec<T>>) -> ListFuture<T>
where
    T: Send + Sync + 'static,
{
    load.map_ok(Option::unwrap_or_default).boxed()
}

impl RequestContext {
    /// `Query.author(id:)`: looked up on its own, without waiting for the end of the level.
    pub fn root_author(&self, id: AuthorId) -> LoadFuture<Author> {
        self.loaders().author(id, false)
    }

    /// The author of a post or comment, coalesced with the other authors of the level.
    pub fn author(&self, id: AuthorId) -> LoadFuture<Author> {
        self.loaders().author(id, true)
    }

    pub fn post(&self, id: PostId) -> LoadFuture<Post> {
        self.loaders().posts.load(id)
    }

    /// The posts of `author`, or every post when no author is given.
    pub fn posts(&self, author: Option<AuthorId>) -> ListFuture<Post> {
        match author {
            Some(author) => list(self.loaders().posts_by_author.load(author)),
            None => self.loaders().all_posts(),
        }
    }

    pub fn comments_by_post(&self, post: PostId) -> ListFuture<Comment> {
        list(self.loaders().comments_by_post.load(post))
    }

    pub fn comments_by_author(&self, author: AuthorId) -> ListFuture<Comment> {
        list(self.loaders().comments_by_author.load(author))
    }
}

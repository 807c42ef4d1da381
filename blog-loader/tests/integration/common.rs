use std::sync::Arc;

use blog_loader::Backends;
use blog_loader::RequestContext;
use blog_loader::configuration::AuthorResolution;
use blog_loader::graphql;
use blog_loader::graphql::Path;
use blog_loader::model::AuthorId;
use blog_loader::test_harness::MemoryAuthorService;
use blog_loader::test_harness::MemoryStore;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

/// The blog fixture behind both kinds of author backend.
pub(crate) struct Blog {
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) author_service: Arc<MemoryAuthorService>,
    pub(crate) backends: Backends,
}

impl Blog {
    pub(crate) fn batched() -> Self {
        Self::new(
            MemoryStore::blog(),
            MemoryAuthorService::blog(),
            AuthorResolution::Batched,
        )
    }

    pub(crate) fn remote() -> Self {
        Self::new(
            MemoryStore::blog(),
            MemoryAuthorService::blog(),
            AuthorResolution::Remote,
        )
    }

    pub(crate) fn new(
        store: MemoryStore,
        author_service: MemoryAuthorService,
        resolution: AuthorResolution,
    ) -> Self {
        let store = Arc::new(store);
        let author_service = Arc::new(author_service);
        let backends = match resolution {
            AuthorResolution::Remote => Backends::new(store.clone(), author_service.clone()),
            AuthorResolution::Batched => Backends::batched(store.clone()),
        };
        Self {
            store,
            author_service,
            backends,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Response {
    pub(crate) data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) errors: Vec<graphql::Error>,
}

/// Executes, one breadth level at a time:
///
/// ```graphql
/// { author(id: $id) { firstName posts { title comments { content author { firstName } } } } }
/// ```
pub(crate) async fn author_posts_comments(context: &RequestContext, id: AuthorId) -> Response {
    let mut errors = Vec::new();
    let root = Path::default().key("author");

    let author = context
        .resolve_level([context.root_author(id)])
        .await
        .pop()
        .expect("one field per level");
    let author = match author {
        Ok(Some(author)) => author,
        Ok(None) => return null_author(errors),
        Err(error) => {
            errors.push(error.to_graphql_error(Some(root)));
            return null_author(errors);
        }
    };

    let posts = context
        .resolve_level([context.posts(Some(author.id))])
        .await
        .pop()
        .expect("one field per level");
    let posts = match posts {
        Ok(posts) => Some(posts),
        Err(error) => {
            errors.push(error.to_graphql_error(Some(root.clone().key("posts"))));
            None
        }
    };
    let posts_failed = posts.is_none();
    let posts = posts.as_deref().map(Vec::as_slice).unwrap_or_default();

    let mut comments = Vec::new();
    let outcomes = context
        .resolve_level(posts.iter().map(|post| context.comments_by_post(post.id)))
        .await;
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(list) => comments.push(Some(list)),
            Err(error) => {
                let path = root.clone().key("posts").index(index).key("comments");
                errors.push(error.to_graphql_error(Some(path)));
                comments.push(None);
            }
        }
    }

    let commenters = context
        .resolve_level(
            comments
                .iter()
                .flatten()
                .flat_map(|list| list.iter())
                .map(|comment| context.author(comment.author_id)),
        )
        .await;
    let mut commenters = commenters.into_iter();

    let mut posts_data = Vec::new();
    for (post_index, (post, list)) in posts.iter().zip(&comments).enumerate() {
        let comments_data = list.as_ref().map(|list| {
            let mut comments_data = Vec::new();
            for (comment_index, comment) in list.iter().enumerate() {
                let author = match commenters.next() {
                    Some(Ok(Some(author))) => json!({ "firstName": author.first_name }),
                    Some(Ok(None)) | None => Value::Null,
                    Some(Err(error)) => {
                        let path = root
                            .clone()
                            .key("posts")
                            .index(post_index)
                            .key("comments")
                            .index(comment_index)
                            .key("author");
                        errors.push(error.to_graphql_error(Some(path)));
                        Value::Null
                    }
                };
                comments_data.push(json!({ "content": comment.content, "author": author }));
            }
            comments_data
        });
        posts_data.push(json!({ "title": post.title, "comments": comments_data }));
    }

    let posts_data = if posts_failed {
        Value::Null
    } else {
        Value::Array(posts_data)
    };
    Response {
        data: json!({
            "author": { "firstName": author.first_name, "posts": posts_data }
        }),
        errors,
    }
}

fn null_author(errors: Vec<graphql::Error>) -> Response {
    Response {
        data: json!({ "author": null }),
        errors,
    }
}

use std::sync::Arc;
use std::time::Duration;

use blog_loader::KeySpace;
use blog_loader::configuration::AuthorResolution;
use blog_loader::test_harness::BackendCall;
use blog_loader::test_harness::MemoryAuthorService;
use blog_loader::test_harness::MemoryStore;
use pretty_assertions::assert_eq;
use test_log::test;
use tokio::sync::Barrier;

use crate::integration::common::Blog;
use crate::integration::common::author_posts_comments;

const RESOLVERS: usize = 16;

#[test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn resolvers_on_many_threads_share_one_window() {
    let blog = Blog::batched();
    let context = blog.backends.request_context();
    let registered = Arc::new(Barrier::new(RESOLVERS + 1));

    let resolvers: Vec<_> = (0..RESOLVERS)
        .map(|_| {
            let context = context.clone();
            let registered = registered.clone();
            tokio::spawn(async move {
                let author = context.author(2);
                registered.wait().await;
                author.await
            })
        })
        .collect();
    registered.wait().await;
    context.flush();

    let authors: Vec<_> = futures::future::try_join_all(resolvers)
        .await
        .unwrap()
        .into_iter()
        .map(|outcome| outcome.unwrap().unwrap())
        .collect();
    for author in &authors {
        assert!(Arc::ptr_eq(author, &authors[0]));
    }
    assert_eq!(
        blog.store.calls(),
        vec![BackendCall::new(KeySpace::AuthorById, [2])]
    );
    assert_eq!(context.statistics().cache_hits, RESOLVERS - 1);
}

#[test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn concurrent_remote_lookups_make_one_call() {
    let blog = Blog::new(
        MemoryStore::blog(),
        MemoryAuthorService::blog().with_latency(Duration::from_millis(50)),
        AuthorResolution::Remote,
    );
    let context = blog.backends.request_context();

    let resolvers: Vec<_> = (0..RESOLVERS)
        .map(|_| {
            let context = context.clone();
            tokio::spawn(async move { context.author(3).await })
        })
        .collect();

    for outcome in futures::future::try_join_all(resolvers).await.unwrap() {
        assert_eq!(outcome.unwrap().unwrap().last_name, "Dijkstra");
    }
    assert_eq!(
        blog.author_service.calls(),
        vec![BackendCall::new(KeySpace::AuthorById, [3])]
    );
}

#[test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn concurrent_requests_resolve_independently() {
    let blog = Blog::new(
        MemoryStore::blog().with_latency(Duration::from_millis(5)),
        MemoryAuthorService::blog(),
        AuthorResolution::Batched,
    );

    let requests: Vec<_> = (0..8)
        .map(|_| {
            let backends = blog.backends.clone();
            tokio::spawn(async move {
                let context = backends.request_context();
                let response = author_posts_comments(&context, 1).await;
                (serde_json::to_value(response).unwrap(), context.statistics())
            })
        })
        .collect();

    let results = futures::future::try_join_all(requests).await.unwrap();
    for (response, statistics) in &results {
        assert_eq!(response, &results[0].0);
        assert_eq!(statistics, &results[0].1);
        assert_eq!(statistics.windows_flushed, 3);
    }
    assert_eq!(blog.store.calls().len(), 8 * 4);
}

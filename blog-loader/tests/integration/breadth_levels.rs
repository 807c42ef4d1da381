use std::sync::Arc;

use blog_loader::KeySpace;
use blog_loader::Statistics;
use blog_loader::test_harness::BackendCall;
use pretty_assertions::assert_eq;
use test_log::test;

use crate::integration::common::Blog;
use crate::integration::common::author_posts_comments;

#[test(tokio::test)]
async fn nested_query_costs_one_round_trip_per_level() {
    let blog = Blog::batched();
    let context = blog.backends.request_context();

    let response = author_posts_comments(&context, 1).await;

    insta::assert_json_snapshot!(response, @r###"
    {
      "data": {
        "author": {
          "firstName": "Ada",
          "posts": [
            {
              "title": "post 10",
              "comments": [
                {
                  "content": "author 2 on post 10",
                  "author": {
                    "firstName": "Grace"
                  }
                },
                {
                  "content": "author 3 on post 10",
                  "author": {
                    "firstName": "Edsger"
                  }
                }
              ]
            },
            {
              "title": "post 11",
              "comments": [
                {
                  "content": "author 2 on post 11",
                  "author": {
                    "firstName": "Grace"
                  }
                },
                {
                  "content": "author 3 on post 11",
                  "author": {
                    "firstName": "Edsger"
                  }
                }
              ]
            }
          ]
        }
      }
    }
    "###);
    assert_eq!(
        blog.store.calls(),
        vec![
            BackendCall::new(KeySpace::AuthorById, [1]),
            BackendCall::new(KeySpace::PostsByAuthor, [1]),
            BackendCall::new(KeySpace::CommentsByPost, [10, 11]),
            BackendCall::new(KeySpace::AuthorById, [2, 3]),
        ]
    );
    assert_eq!(
        context.statistics(),
        Statistics {
            keys_requested: 8,
            cache_hits: 2,
            windows_flushed: 3,
        }
    );
}

#[test(tokio::test)]
async fn remote_authors_cost_one_call_per_distinct_author() {
    let remote = Blog::remote();
    let remote_response = author_posts_comments(&remote.backends.request_context(), 1).await;

    let batched = Blog::batched();
    let batched_response = author_posts_comments(&batched.backends.request_context(), 1).await;

    assert_eq!(
        serde_json::to_value(&remote_response).unwrap(),
        serde_json::to_value(&batched_response).unwrap()
    );
    assert_eq!(
        remote.store.calls(),
        vec![
            BackendCall::new(KeySpace::PostsByAuthor, [1]),
            BackendCall::new(KeySpace::CommentsByPost, [10, 11]),
        ]
    );
    let mut fetched: Vec<_> = remote
        .author_service
        .calls()
        .into_iter()
        .flat_map(|call| call.keys)
        .collect();
    fetched.sort();
    assert_eq!(fetched, vec![1, 2, 3]);
}

#[test(tokio::test)]
async fn requests_do_not_share_caches() {
    let blog = Blog::batched();
    let first = blog.backends.request_context();
    let second = blog.backends.request_context();

    let (first_response, second_response) = futures::join!(
        author_posts_comments(&first, 1),
        author_posts_comments(&second, 1)
    );

    assert_eq!(
        serde_json::to_value(&first_response).unwrap(),
        serde_json::to_value(&second_response).unwrap()
    );
    assert_eq!(blog.store.calls_for(KeySpace::AuthorById), 4);
    assert_eq!(blog.store.calls_for(KeySpace::CommentsByPost), 2);
    assert_eq!(first.statistics(), second.statistics());
}

#[test(tokio::test)]
async fn keys_resolved_in_an_earlier_level_are_not_fetched_again() {
    let blog = Blog::batched();
    let context = blog.backends.request_context();

    let root = context.root_author(2).await.unwrap().unwrap();
    let nested = context.resolve_level([context.author(2), context.author(3)]).await;

    assert!(Arc::ptr_eq(&root, nested[0].as_ref().unwrap().as_ref().unwrap()));
    assert_eq!(
        blog.store.calls(),
        vec![
            BackendCall::new(KeySpace::AuthorById, [2]),
            BackendCall::new(KeySpace::AuthorById, [3]),
        ]
    );
}

#[test(tokio::test)]
async fn keys_registered_after_a_flush_go_to_the_next_window() {
    let blog = Blog::batched();
    let context = blog.backends.request_context();

    let first = context.post(10);
    context.flush();
    assert_eq!(first.await.unwrap().unwrap().title, "post 10");

    let second = context.post(11);
    let again = context.post(10);
    context.flush();
    assert_eq!(second.await.unwrap().unwrap().title, "post 11");
    assert_eq!(again.await.unwrap().unwrap().title, "post 10");

    assert_eq!(
        blog.store.calls(),
        vec![
            BackendCall::new(KeySpace::PostById, [10]),
            BackendCall::new(KeySpace::PostById, [11]),
        ]
    );
}

#[test(tokio::test)]
async fn absent_root_author_resolves_to_null() {
    let blog = Blog::batched();
    let response = author_posts_comments(&blog.backends.request_context(), 99).await;

    insta::assert_json_snapshot!(response, @r###"
    {
      "data": {
        "author": null
      }
    }
    "###);
    assert_eq!(
        blog.store.calls(),
        vec![BackendCall::new(KeySpace::AuthorById, [99])]
    );
}

#[test(tokio::test)]
async fn absent_keys_do_not_affect_their_window() {
    let blog = Blog::batched();
    let context = blog.backends.request_context();

    let outcomes = context
        .resolve_level([context.post(10), context.post(404), context.post(12)])
        .await;

    let titles: Vec<_> = outcomes
        .into_iter()
        .map(|outcome| outcome.unwrap().map(|post| post.title.clone()))
        .collect();
    assert_eq!(
        titles,
        vec![Some("post 10".to_string()), None, Some("post 12".to_string())]
    );
    assert_eq!(
        blog.store.calls(),
        vec![BackendCall::new(KeySpace::PostById, [10, 12, 404])]
    );
}

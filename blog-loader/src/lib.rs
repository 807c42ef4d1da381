//! Request-scoped batching and caching for GraphQL field resolution over the blog domain.
//!
//! Every inbound request gets a [`RequestContext`]. Field resolvers call into it once per field
//! that needs backend data; lookups for the same key are served from a cache scoped to the
//! request, and lookups issued during one breadth level of the query tree are coalesced into a
//! single backend round trip when the executor signals the end of that level with
//! [`RequestContext::flush`].

#![warn(unreachable_pub)]

mod batching;
mod cache;
pub mod configuration;
mod context;
mod dispatch;
pub mod error;
pub mod graphql;
pub mod model;
pub mod services;
pub mod test_harness;

pub use cache::LoadFuture;
pub use cache::Outcome;
pub use configuration::Configuration;
pub use context::RequestContext;
pub use context::Statistics;
pub use dispatch::Backends;
pub use dispatch::ListFuture;
pub use error::FetchError;
pub use model::KeySpace;

pub(crate) mod common;

mod breadth_levels;
mod concurrency;

pub mod agents;
pub mod comments;
pub mod feed;
pub mod posts;
pub mod rate_limit;
pub mod thread;
pub mod votes;

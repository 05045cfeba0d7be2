mod accounts;
mod credentials;
mod links;
mod posts;
mod push_targets;
mod schema;
mod types;

pub use schema::Database;
pub use types::{
    Account, Credential, FeedLink, NewPost, Post, PushTarget, SharedLink, StoreError,
};

mod client;
mod types;

pub use client::{CredentialAuth, ProviderClient, ProviderError};
pub use types::{AccessTokenResponse, EntryAuthor, LinkEntity, RemoteUser, SharedSource, TimelineEntry};

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A remote account as returned by the follow-graph listing.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteUser {
    /// Unique handle on the provider. May be empty for placeholder rows.
    #[serde(default)]
    pub handle: String,
    /// Human display name. Empty for bot/placeholder accounts.
    #[serde(default)]
    pub display_name: String,
    /// Public homepage URL, if the account exposes one.
    #[serde(default)]
    pub homepage_url: Option<String>,
}

/// One page of the paginated follow-graph listing.
#[derive(Debug, Deserialize)]
pub(crate) struct FriendsPage {
    pub users: Vec<RemoteUser>,
    /// Opaque continuation cursor; 0 means the listing is exhausted.
    #[serde(default)]
    pub next_cursor: i64,
}

/// Author block attached to a timeline entry.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryAuthor {
    pub handle: String,
}

/// A link entity embedded in an entry.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkEntity {
    #[serde(default)]
    pub expanded_url: String,
}

/// The embedded original carried by a truncated share-of-another-entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SharedSource {
    pub author_handle: String,
    pub text: String,
}

/// One timeline entry as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineEntry {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author: EntryAuthor,
    #[serde(default)]
    pub links: Vec<LinkEntity>,
    /// Present when this entry is a share of another entry.
    #[serde(default)]
    pub shared_from: Option<SharedSource>,
}

/// Result of the request-token/verifier exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub access_secret: String,
    pub handle: String,
}

/// Response of the embed-lookup endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct OembedResponse {
    pub html: String,
}

mod client;
mod refresher;

pub use client::{PushClient, PushError, TargetStatus};
pub use refresher::refresh_push_targets;

mod artifact;
mod atom;
mod export;
mod materialize;
mod outline;

pub use artifact::write_artifact;
pub use atom::{FeedBuilder, FeedEntry};
pub use export::{export_outline, ExportError};
pub use materialize::{render_feed, RenderError};
pub use outline::{OutlineBuilder, OutlineNode};

mod enrich;
mod readability;

pub use enrich::{Enricher, ExtractError};
pub use readability::{run_extractor, Extraction};

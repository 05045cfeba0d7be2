mod text;
mod url_norm;

pub use text::strip_illegal_xml_chars;
pub use url_norm::{normalize_link_url, status_url, MAX_LINK_URL_LEN};

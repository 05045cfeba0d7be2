/// True if the codepoint is legal inside XML 1.0 character data.
///
/// Legal ranges: tab/LF/CR, 0x20-0xD7FF, 0xE000-0xFFFD, 0x10000-0x10FFFF.
/// Everything else (C0 controls, the surrogate block, 0xFFFE/0xFFFF) makes
/// serializers emit documents that parsers reject, so we filter before
/// embedding any upstream text in a feed.
fn is_legal_xml_char(c: char) -> bool {
    let cp = c as u32;
    // Ordered by presumed frequency
    (0x20..=0xD7FF).contains(&cp)
        || matches!(cp, 0x9 | 0xA | 0xD)
        || (0xE000..=0xFFFD).contains(&cp)
        || (0x10000..=0x10FFFF).contains(&cp)
}

/// Removes characters that are illegal in XML 1.0 character data.
///
/// Post bodies and extracted article text routinely carry stray control
/// characters (form feeds, NULs from bad scrapes). Returns the input
/// unchanged (borrowed capacity aside) when nothing needs stripping.
pub fn strip_illegal_xml_chars(input: &str) -> String {
    input.chars().filter(|c| is_legal_xml_char(*c)).collect()
}

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

/// One outline node referencing a per-account feed.
#[derive(Debug, Clone)]
pub struct OutlineNode {
    /// Display name of the followed account.
    pub text: String,
    /// Account homepage URL.
    pub html_url: String,
    /// Derived feed URL for the account.
    pub xml_url: String,
}

/// Plain builder for the OPML outline-of-feeds artifact.
#[derive(Debug)]
pub struct OutlineBuilder {
    title: String,
    created: DateTime<Utc>,
    nodes: Vec<OutlineNode>,
}

impl OutlineBuilder {
    pub fn new(title: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            created,
            nodes: Vec::new(),
        }
    }

    pub fn push_node(&mut self, node: OutlineNode) -> &mut Self {
        self.nodes.push(node);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Serialize the outline as an OPML 1.0 document.
    pub fn render(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .context("Failed to write XML declaration")?;

        let mut opml = BytesStart::new("opml");
        opml.push_attribute(("version", "1.0"));
        writer
            .write_event(Event::Start(opml))
            .context("Failed to write opml element")?;

        writer
            .write_event(Event::Comment(BytesText::new(
                "Feed list of all followed accounts",
            )))
            .context("Failed to write comment")?;

        let generated_on = self.created.to_rfc3339_opts(SecondsFormat::Secs, true);

        writer
            .write_event(Event::Start(BytesStart::new("head")))
            .context("Failed to write head element")?;
        write_text_element(&mut writer, "title", &self.title)?;
        write_text_element(&mut writer, "dateCreated", &generated_on)?;
        write_text_element(&mut writer, "dateModified", &generated_on)?;
        writer
            .write_event(Event::End(BytesEnd::new("head")))
            .context("Failed to write head end")?;

        writer
            .write_event(Event::Start(BytesStart::new("body")))
            .context("Failed to write body element")?;

        for node in &self.nodes {
            let mut outline = BytesStart::new("outline");
            outline.push_attribute(("text", node.text.as_str()));
            outline.push_attribute(("title", node.text.as_str()));
            outline.push_attribute(("type", "rss"));
            outline.push_attribute(("htmlUrl", node.html_url.as_str()));
            outline.push_attribute(("xmlUrl", node.xml_url.as_str()));
            writer
                .write_event(Event::Empty(outline))
                .context("Failed to write outline element")?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("body")))
            .context("Failed to write body end")?;
        writer
            .write_event(Event::End(BytesEnd::new("opml")))
            .context("Failed to write opml end")?;

        let result = writer.into_inner().into_inner();
        String::from_utf8(result).context("Generated outline contains invalid UTF-8")
    }
}

fn write_text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    text: &str,
) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .with_context(|| format!("Failed to write {} element", name))?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .with_context(|| format!("Failed to write {} text", name))?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .with_context(|| format!("Failed to write {} end", name))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_renders_nodes_with_feed_urls() {
        let mut builder =
            OutlineBuilder::new("My Feeds", Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        builder.push_node(OutlineNode {
            text: "Carol Example".to_string(),
            html_url: "https://carol.example.com".to_string(),
            xml_url: "http://host/static/xml/feed-carol.xml".to_string(),
        });

        let xml = builder.render().unwrap();
        assert!(xml.contains("<title>My Feeds</title>"));
        assert!(xml.contains("htmlUrl=\"https://carol.example.com\""));
        assert!(xml.contains("xmlUrl=\"http://host/static/xml/feed-carol.xml\""));
        assert!(xml.contains("type=\"rss\""));
        assert!(xml.contains("<dateCreated>"));
    }

    #[test]
    fn test_escapes_display_names() {
        let mut builder = OutlineBuilder::new("T", Utc::now());
        builder.push_node(OutlineNode {
            text: "A & B <quoted>".to_string(),
            html_url: "https://example.com".to_string(),
            xml_url: "http://host/feed-ab.xml".to_string(),
        });

        let xml = builder.render().unwrap();
        assert!(xml.contains("A &amp; B &lt;quoted&gt;"));
    }
}

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

/// One entry of the rendered feed.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    /// Entry id and title are both the link URL.
    pub id: String,
    pub title: String,
    /// Comma-joined sharer handles.
    pub author: String,
    pub published: DateTime<Utc>,
    /// HTML content; the caller strips XML-illegal codepoints first.
    pub content_html: String,
}

/// Plain builder for the Atom entry-feed artifact.
///
/// Typed setters, one `render()` finalizer, no dynamic dispatch.
#[derive(Debug)]
pub struct FeedBuilder {
    id: String,
    title: String,
    link: String,
    description: String,
    entries: Vec<FeedEntry>,
}

impl FeedBuilder {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        link: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            link: link.into(),
            description: description.into(),
            entries: Vec::new(),
        }
    }

    pub fn push_entry(&mut self, entry: FeedEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    /// Serialize the whole feed as an Atom document.
    pub fn render(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .context("Failed to write XML declaration")?;

        let mut feed = BytesStart::new("feed");
        feed.push_attribute(("xmlns", "http://www.w3.org/2005/Atom"));
        writer
            .write_event(Event::Start(feed))
            .context("Failed to write feed element")?;

        write_text_element(&mut writer, "id", &self.id)?;
        write_text_element(&mut writer, "title", &self.title)?;
        write_text_element(&mut writer, "subtitle", &self.description)?;

        let updated = self
            .entries
            .first()
            .map(|e| e.published)
            .unwrap_or_else(Utc::now);
        write_text_element(&mut writer, "updated", &rfc3339(updated))?;

        let mut link = BytesStart::new("link");
        link.push_attribute(("href", self.link.as_str()));
        link.push_attribute(("rel", "alternate"));
        writer
            .write_event(Event::Empty(link))
            .context("Failed to write link element")?;

        for entry in &self.entries {
            writer
                .write_event(Event::Start(BytesStart::new("entry")))
                .context("Failed to write entry element")?;

            write_text_element(&mut writer, "id", &entry.id)?;
            write_text_element(&mut writer, "title", &entry.title)?;

            writer
                .write_event(Event::Start(BytesStart::new("author")))
                .context("Failed to write author element")?;
            write_text_element(&mut writer, "name", &entry.author)?;
            writer
                .write_event(Event::End(BytesEnd::new("author")))
                .context("Failed to write author end")?;

            write_text_element(&mut writer, "published", &rfc3339(entry.published))?;
            write_text_element(&mut writer, "updated", &rfc3339(entry.published))?;

            let mut content = BytesStart::new("content");
            content.push_attribute(("type", "html"));
            writer
                .write_event(Event::Start(content))
                .context("Failed to write content element")?;
            writer
                .write_event(Event::Text(BytesText::new(&entry.content_html)))
                .context("Failed to write content text")?;
            writer
                .write_event(Event::End(BytesEnd::new("content")))
                .context("Failed to write content end")?;

            writer
                .write_event(Event::End(BytesEnd::new("entry")))
                .context("Failed to write entry end")?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("feed")))
            .context("Failed to write feed end")?;

        let result = writer.into_inner().into_inner();
        String::from_utf8(result).context("Generated feed contains invalid UTF-8")
    }
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
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

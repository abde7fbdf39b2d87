//! RSS 2.0 / Atom feed parsing.
//!
//! Only the handful of fields the pipeline needs are extracted from each
//! `<item>` (RSS) or `<entry>` (Atom):
//!
//! | Field | RSS | Atom |
//! |-------|-----|------|
//! | title | `<title>` | `<title>` |
//! | summary | `<description>` | `<summary>`, else `<content>` |
//! | link | `<link>` text | `<link href>` (alternate) |
//!
//! Summaries usually carry escaped HTML; [`strip_markup`] reduces them to text.

use crate::models::NewsItem;
use crate::utils::truncate_chars;
use quick_xml::Reader;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use scraper::Html;
use std::error::Error;
use tracing::warn;

/// Longest summary handed to the generator, in characters.
pub const MAX_SUMMARY_CHARS: usize = 500;

/// One entry as it appears in the feed, before normalization.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub description: String,
    pub summary: String,
    pub content: String,
    pub link: String,
}

impl FeedEntry {
    /// Normalize into a [`NewsItem`] labelled with `source`.
    ///
    /// Returns `None` for entries without a title.
    pub fn into_news_item(self, source: &str) -> Option<NewsItem> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return None;
        }

        let raw_summary = [&self.summary, &self.description, &self.content]
            .into_iter()
            .find(|s| !s.trim().is_empty())
            .map(|s| s.as_str())
            .unwrap_or_default();
        let stripped = strip_markup(raw_summary);
        let summary = if stripped.is_empty() {
            title.clone()
        } else {
            truncate_chars(&stripped, MAX_SUMMARY_CHARS).to_string()
        };

        Some(NewsItem {
            title,
            summary,
            source: source.to_string(),
            link: self.link.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Description,
    Summary,
    Content,
    Link,
}

impl Field {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"description" => Some(Field::Description),
            b"summary" => Some(Field::Summary),
            b"content" => Some(Field::Content),
            b"link" => Some(Field::Link),
            _ => None,
        }
    }
}

fn is_entry_tag(name: &[u8]) -> bool {
    name == b"item" || name == b"entry"
}

/// Accumulates the text of the entry currently being read.
#[derive(Default)]
struct EntryBuilder {
    entry: FeedEntry,
    field: Option<Field>,
    depth: usize,
}

impl EntryBuilder {
    fn push_text(&mut self, text: &str) {
        let Some(field) = self.field else { return };
        let target = match field {
            Field::Title => &mut self.entry.title,
            Field::Description => &mut self.entry.description,
            Field::Summary => &mut self.entry.summary,
            Field::Content => &mut self.entry.content,
            Field::Link => &mut self.entry.link,
        };
        target.push_str(text);
    }

    /// Atom links carry the url in `href`; keep the first alternate one.
    fn take_link_href(&mut self, start: &BytesStart<'_>) {
        if !self.entry.link.is_empty() {
            return;
        }
        let mut href = None;
        let mut rel_alternate = true;
        for attr in start.attributes().flatten() {
            match attr.key.local_name().as_ref() {
                b"href" => {
                    let raw = String::from_utf8_lossy(&attr.value).into_owned();
                    href = Some(unescape(&raw).map(|s| s.into_owned()).unwrap_or(raw));
                }
                b"rel" => rel_alternate = attr.value.as_ref() == b"alternate",
                _ => {}
            }
        }
        if let (Some(href), true) = (href, rel_alternate) {
            self.entry.link = href;
        }
    }
}

/// Parse every `<item>`/`<entry>` of a feed document.
///
/// If the document breaks part-way, the entries read so far are kept as long
/// as there is at least one; otherwise the parse error is returned.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, Box<dyn Error>> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut current: Option<EntryBuilder> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) if !entries.is_empty() => {
                warn!(
                    error = %e,
                    position = reader.buffer_position(),
                    kept = entries.len(),
                    "Feed document is malformed; keeping entries parsed so far"
                );
                break;
            }
            Err(e) => return Err(Box::new(e)),
        };

        match event {
            Event::Start(start) => {
                let name = start.name();
                if let Some(builder) = current.as_mut() {
                    builder.depth += 1;
                    if builder.depth == 1 {
                        builder.field = Field::from_tag(name.as_ref());
                        if builder.field == Some(Field::Link) {
                            builder.take_link_href(&start);
                        }
                    }
                } else if is_entry_tag(name.as_ref()) {
                    current = Some(EntryBuilder::default());
                }
            }
            Event::Empty(start) => {
                if let Some(builder) = current.as_mut() {
                    if builder.depth == 0 && start.name().as_ref() == b"link" {
                        builder.take_link_href(&start);
                    }
                }
            }
            Event::End(end) => {
                if let Some(builder) = current.as_mut() {
                    if builder.depth == 0 && is_entry_tag(end.name().as_ref()) {
                        if let Some(done) = current.take() {
                            entries.push(done.entry);
                        }
                    } else {
                        builder.depth = builder.depth.saturating_sub(1);
                        if builder.depth == 0 {
                            builder.field = None;
                        }
                    }
                }
            }
            Event::Text(text) => {
                if let Some(builder) = current.as_mut() {
                    let decoded = reader.decoder().decode(&text)?;
                    builder.push_text(&decoded);
                }
            }
            Event::CData(cdata) => {
                if let Some(builder) = current.as_mut() {
                    let decoded = reader.decoder().decode(&cdata)?;
                    builder.push_text(&decoded);
                }
            }
            Event::GeneralRef(reference) => {
                if let Some(builder) = current.as_mut() {
                    if let Some(ch) = reference.resolve_char_ref()? {
                        builder.push_text(ch.encode_utf8(&mut [0u8; 4]));
                    } else {
                        let name = reference.decode()?;
                        match resolve_predefined_entity(&name) {
                            Some(resolved) => builder.push_text(resolved),
                            None => builder.push_text(&format!("&{name};")),
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

/// Reduce an HTML fragment to its text content and trim it.
pub fn strip_markup(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return html.trim().to_string();
    }
    let fragment = Html::parse_fragment(html);
    fragment
        .root_element()
        .text()
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>World News</title>
    <link>https://example.com/world</link>
    <item>
      <title>Leaders meet in Geneva</title>
      <description>&lt;p&gt;Talks on &lt;b&gt;ceasefire&lt;/b&gt; terms &amp; aid.&lt;/p&gt;</description>
      <link>https://example.com/geneva</link>
    </item>
    <item>
      <title><![CDATA[Sanctions & trade]]></title>
      <description><![CDATA[<img src="x.jpg"/>New tariffs announced.]]></description>
      <link>https://example.com/tariffs</link>
    </item>
    <item>
      <title>   </title>
      <description>Untitled entry</description>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom World</title>
  <link href="https://example.org/"/>
  <entry>
    <title>Summit ends without deal</title>
    <link rel="self" href="https://example.org/api/1"/>
    <link rel="alternate" href="https://example.org/summit"/>
    <summary type="html">&lt;em&gt;No agreement&lt;/em&gt; on climate finance</summary>
  </entry>
  <entry>
    <title>Envoy recalled</title>
    <link href="https://example.org/envoy"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_items() {
        let entries = parse_feed(RSS).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title, "Leaders meet in Geneva");
        assert_eq!(entries[0].link, "https://example.com/geneva");
        assert_eq!(entries[0].description, "<p>Talks on <b>ceasefire</b> terms & aid.</p>");
        assert_eq!(entries[1].title, "Sanctions & trade");
    }

    #[test]
    fn test_channel_fields_are_not_entries() {
        let entries = parse_feed(RSS).unwrap();
        assert!(entries.iter().all(|e| e.title != "World News"));
    }

    #[test]
    fn test_rss_items_normalize() {
        let items: Vec<NewsItem> = parse_feed(RSS)
            .unwrap()
            .into_iter()
            .filter_map(|e| e.into_news_item("Example"))
            .collect();

        assert_eq!(items.len(), 2, "untitled entry is skipped");
        assert_eq!(items[0].summary, "Talks on ceasefire terms & aid.");
        assert_eq!(items[0].source, "Example");
        assert_eq!(items[1].summary, "New tariffs announced.");
    }

    #[test]
    fn test_parse_atom_entries() {
        let entries = parse_feed(ATOM).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].link, "https://example.org/summit");
        assert_eq!(entries[1].link, "https://example.org/envoy");

        let item = entries[0].clone().into_news_item("Atom").unwrap();
        assert_eq!(item.summary, "No agreement on climate finance");
    }

    #[test]
    fn test_empty_summary_falls_back_to_title() {
        let entries = parse_feed(ATOM).unwrap();
        let item = entries[1].clone().into_news_item("Atom").unwrap();
        assert_eq!(item.summary, "Envoy recalled");
    }

    #[test]
    fn test_summary_is_truncated() {
        let entry = FeedEntry {
            title: "Long".to_string(),
            description: "x".repeat(900),
            ..Default::default()
        };
        let item = entry.into_news_item("Test").unwrap();
        assert_eq!(item.summary.chars().count(), MAX_SUMMARY_CHARS);
    }

    #[test]
    fn test_truncated_document_keeps_complete_entries() {
        let broken = r#"<rss><channel>
            <item><title>First</title></item>
            <item><title>Second</titl"#;
        let entries = parse_feed(broken).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "First");
    }

    #[test]
    fn test_garbage_without_entries_is_an_error() {
        assert!(parse_feed("<rss><channel></rss>").is_err());
    }

    #[test]
    fn test_document_without_entries_is_empty() {
        let entries = parse_feed("<rss><channel><title>Quiet</title></channel></rss>").unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("<p>Hello <a href=\"#\">world</a></p>"), "Hello world");
        assert_eq!(strip_markup("  plain text  "), "plain text");
        assert_eq!(strip_markup("Fish &amp; chips"), "Fish & chips");
        assert_eq!(strip_markup(""), "");
    }
}

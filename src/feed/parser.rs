//! RSS 2.0 document model and XML parsing.
//!
//! The document is deserialized straight into structs via quick-xml's
//! serde support. Only the RSS 2.0 channel/item elements we consume are
//! mapped; everything else in the document is ignored, and no namespace
//! handling is attempted. Feed producers commonly double-encode HTML
//! entities, so every textual field is unescaped after parsing.

use serde::Deserialize;

/// Transient parse of one feed response. Lives for one fetch only.
#[derive(Debug, Deserialize)]
pub struct RawFeedDocument {
    pub channel: RawChannel,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawChannel {
    pub title: String,
    pub link: String,
    pub description: String,
    #[serde(rename = "item")]
    pub items: Vec<RawItem>,
}

/// One `<item>` element. `pub_date` stays a raw string here; turning it
/// into a timestamp is the normalizer's job.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub description: String,
    #[serde(rename = "pubDate")]
    pub pub_date: String,
}

/// Parse RSS 2.0 XML bytes into a [`RawFeedDocument`] with all textual
/// fields HTML-entity-unescaped.
pub fn parse_document(bytes: &[u8]) -> Result<RawFeedDocument, quick_xml::DeError> {
    let mut document: RawFeedDocument = quick_xml::de::from_reader(bytes)?;
    unescape_document(&mut document);
    Ok(document)
}

// Channel link and item links are URLs, not prose; they are left alone.
fn unescape_document(document: &mut RawFeedDocument) {
    unescape_in_place(&mut document.channel.title);
    unescape_in_place(&mut document.channel.description);
    for item in &mut document.channel.items {
        unescape_in_place(&mut item.title);
        unescape_in_place(&mut item.description);
    }
}

fn unescape_in_place(text: &mut String) {
    let decoded = html_escape::decode_html_entities(text);
    if decoded != *text {
        *text = decoded.into_owned();
    }
}

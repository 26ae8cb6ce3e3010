//! Tolerant location of result entries and their title spans.
//!
//! Nothing here parses the document into a tree. Entries are found with
//! regular expressions and described by byte offsets into the original text,
//! so everything outside a title span is never touched.

use regex::Regex;
use std::ops::Range;

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

/// How a title's text is written in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSyntax {
    /// Character data with entity references.
    Text,
    /// Wrapped in `<![CDATA[ ... ]]>`; the span covers only the content.
    CData,
}

/// The replaceable part of one entry's title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleSpan {
    /// Byte range in the document, surrounding whitespace excluded.
    pub range: Range<usize>,
    /// Title as the oracle should see it (entities decoded).
    pub raw_title: String,
    pub syntax: TitleSyntax,
}

impl TitleSpan {
    /// Encode `title` for insertion at this span.
    pub fn encode(&self, title: &str) -> String {
        match self.syntax {
            TitleSyntax::Text => escape_text(title),
            TitleSyntax::CData => escape_cdata(title),
        }
    }
}

/// One result entry found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEntry {
    pub title: TitleSpan,
    pub category: Option<String>,
}

/// Compiled patterns for one item/title element pair.
#[derive(Debug, Clone)]
pub struct DocumentPatterns {
    item: Regex,
    title: Regex,
    category: Regex,
    attr: Regex,
    attr_pair: Regex,
}

impl DocumentPatterns {
    pub fn compile(item_element: &str, title_element: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            item: element_pattern(item_element)?,
            title: element_pattern(title_element)?,
            category: element_pattern("category")?,
            attr: Regex::new(r#"(?is)<[\w.-]+:attr\b([^>]*)>"#)?,
            attr_pair: Regex::new(r#"(?s)([\w:.-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
        })
    }

    /// Every entry with a non-empty title, in document order.
    pub fn entries(&self, document: &str) -> Vec<ResultEntry> {
        let mut entries = Vec::new();
        for item in self.item.captures_iter(document) {
            let Some(body) = item.get(1) else { continue };
            let Some(title) = self.title.captures(body.as_str()).and_then(|c| c.get(1)) else {
                continue;
            };

            let inner = (body.start() + title.start())..(body.start() + title.end());
            let Some(span) = title_span(document, inner) else { continue };

            entries.push(ResultEntry {
                title: span,
                category: self.category_of(body.as_str()),
            });
        }
        entries
    }

    fn category_of(&self, item_body: &str) -> Option<String> {
        if let Some(text) = self
            .category
            .captures(item_body)
            .and_then(|c| c.get(1))
            .map(|m| element_text(m.as_str()))
            .filter(|t| !t.is_empty())
        {
            return Some(text);
        }

        self.attr.captures_iter(item_body).find_map(|attr| {
            let attrs = attr.get(1)?.as_str();
            let mut name = None;
            let mut value = None;
            for pair in self.attr_pair.captures_iter(attrs) {
                let key = pair.get(1)?.as_str();
                let val = pair.get(2).or_else(|| pair.get(3))?.as_str();
                match key.to_ascii_lowercase().as_str() {
                    "name" => name = Some(val),
                    "value" => value = Some(val),
                    _ => {}
                }
            }
            match (name, value) {
                (Some(n), Some(v)) if n.eq_ignore_ascii_case("category") => Some(unescape(v)),
                _ => None,
            }
        })
    }
}

/// `<name ...>content</name>`, content in group 1. Self-closing tags don't match.
fn element_pattern(name: &str) -> Result<Regex, regex::Error> {
    let name = regex::escape(name.trim());
    Regex::new(&format!(
        r"(?is)<{name}(?:\s[^>]*[^/>])?\s*>(.*?)</{name}\s*>"
    ))
}

/// Narrow an element's inner range to its replaceable title text.
fn title_span(document: &str, inner: Range<usize>) -> Option<TitleSpan> {
    let text = document.get(inner.clone())?;
    let lead = text.len() - text.trim_start().len();
    let trimmed = text.trim();
    let start = inner.start + lead;

    if let Some(content) = trimmed
        .strip_prefix(CDATA_OPEN)
        .and_then(|rest| rest.strip_suffix(CDATA_CLOSE))
    {
        let content_lead = content.len() - content.trim_start().len();
        let title = content.trim();
        if title.is_empty() {
            return None;
        }
        let content_start = start + CDATA_OPEN.len() + content_lead;
        return Some(TitleSpan {
            range: content_start..content_start + title.len(),
            raw_title: title.to_string(),
            syntax: TitleSyntax::CData,
        });
    }

    if trimmed.is_empty() {
        return None;
    }
    Some(TitleSpan {
        range: start..start + trimmed.len(),
        raw_title: unescape(trimmed),
        syntax: TitleSyntax::Text,
    })
}

/// Plain text of an element's content, CDATA unwrapped and entities decoded.
fn element_text(inner: &str) -> String {
    let trimmed = inner.trim();
    match trimmed
        .strip_prefix(CDATA_OPEN)
        .and_then(|rest| rest.strip_suffix(CDATA_CLOSE))
    {
        Some(content) => content.trim().to_string(),
        None => unescape(trimmed),
    }
}

pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// A CDATA section cannot contain `]]>`; split it across two sections.
pub fn escape_cdata(s: &str) -> String {
    s.replace(CDATA_CLOSE, "]]]]><![CDATA[>")
}

/// Decode the predefined XML entities and numeric character references.
/// Anything unrecognized is kept verbatim.
pub fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 12)
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

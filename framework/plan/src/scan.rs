//! Locates start tags and their attributes in a raw plan document.
//!
//! Offsets are byte offsets into the original text so that callers can splice replacements in
//! place and leave every other byte alone.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static START_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<([A-Za-z_][\w.:-]*)((?:\s+[\w.:-]+\s*=\s*(?:"[^"]*"|'[^']*'))*)\s*/?>"#,
    )
    .expect("valid start tag regex")
});

static END_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</([A-Za-z_][\w.:-]*)\s*>").expect("valid end tag regex"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([\w.:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attribute regex")
});

static OPAQUE_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<!\[CDATA\[.*?\]\]>").expect("valid comment regex")
});

#[derive(Debug, Clone)]
pub(crate) struct Attribute<'a> {
    pub name: &'a str,
    pub raw_value: &'a str,
    /// Span of the value, excluding the quotes.
    pub value_span: Range<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct StartTag<'a> {
    pub name: &'a str,
    pub attributes: Vec<Attribute<'a>>,
    /// Offset just after the last attribute, where a new attribute can be inserted.
    pub insert_at: usize,
    /// Offset of the opening `<`.
    pub start: usize,
    /// Whether the tag closes itself (`<tag/>`).
    pub self_closing: bool,
}

/// A start or end tag, in document order.
#[derive(Debug, Clone)]
pub(crate) enum Tag<'a> {
    Start(StartTag<'a>),
    End { name: &'a str },
}

impl<'a> StartTag<'a> {
    pub fn attribute(&self, name: &str) -> Option<&Attribute<'a>> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The decoded value of an attribute.
    pub fn value(&self, name: &str) -> Option<String> {
        self.attribute(name).map(|a| unescape(a.raw_value))
    }

    /// The element's class, taken from `testclass` and falling back to the element name.
    pub fn class(&self) -> &'a str {
        self.attribute("testclass")
            .map(|a| a.raw_value)
            .unwrap_or(self.name)
    }

    /// Only the literal `false` disables an element, a missing flag means enabled.
    pub fn is_enabled(&self) -> bool {
        self.attribute("enabled")
            .map(|a| a.raw_value.trim() != "false")
            .unwrap_or(true)
    }
}

/// All start tags in document order, skipping anything inside comments or CDATA sections.
pub(crate) fn start_tags(document: &str) -> Vec<StartTag<'_>> {
    let opaque = opaque_spans(document);

    START_TAG
        .captures_iter(document)
        .filter(|caps| {
            let start = caps.get(0).map(|m| m.start()).unwrap_or_default();
            !opaque.iter().any(|span| span.contains(&start))
        })
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            let attrs = caps.get(2)?;
            let attributes = ATTRIBUTE
                .captures_iter(attrs.as_str())
                .filter_map(|a| {
                    let attr_name = a.get(1)?;
                    let value = a.get(2).or_else(|| a.get(3))?;
                    Some(Attribute {
                        name: attr_name.as_str(),
                        raw_value: value.as_str(),
                        value_span: attrs.start() + value.start()..attrs.start() + value.end(),
                    })
                })
                .collect();

            Some(StartTag {
                name: name.as_str(),
                attributes,
                insert_at: attrs.end(),
                start: whole.start(),
                self_closing: whole.as_str().ends_with("/>"),
            })
        })
        .collect()
}

/// Start and end tags in document order, skipping anything inside comments or CDATA sections.
pub(crate) fn tags(document: &str) -> Vec<Tag<'_>> {
    let opaque = opaque_spans(document);

    let ends = END_TAG
        .captures_iter(document)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            (!opaque.iter().any(|span| span.contains(&whole.start())))
                .then(|| (whole.start(), Tag::End { name: name.as_str() }))
        });

    let mut tags = start_tags(document)
        .into_iter()
        .map(|tag| (tag.start, Tag::Start(tag)))
        .chain(ends)
        .collect::<Vec<_>>();
    tags.sort_by_key(|(offset, _)| *offset);
    tags.into_iter().map(|(_, tag)| tag).collect()
}

fn opaque_spans(document: &str) -> Vec<Range<usize>> {
    OPAQUE_SPAN
        .find_iter(document)
        .map(|m| m.range())
        .collect()
}

/// Decode the predefined XML entities and numeric character references.
pub(crate) fn unescape(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let entity = &rest[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ if entity.starts_with('#') => {
                    entity[1..].parse::<u32>().ok().and_then(char::from_u32)
                }
                _ => None,
            };
            ch.map(|c| (c, semi + 1))
        });

        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

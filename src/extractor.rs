//! Citation marker extraction from crawled regulation pages.

use std::borrow::Cow;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use scraper::Html;

use crate::record::{RawDocument, StructuredRecord};

const SECTION_PATTERN: &str = r"(?i)§\s*(\d+(?:\.\d+)*)\.?\s*([A-Z][^\n]+)";
const TITLE_PATTERN: &str = r"Title\s+(\d+)\.\s*([A-Za-z &]+)";

const IGNORED_TAGS: &[&str] = &["script", "style", "template", "noscript", "svg", "nav"];
const BLOCK_TAGS: &[&str] = &[
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "p",
    "li",
    "div",
    "td",
    "th",
    "dt",
    "dd",
    "blockquote",
    "pre",
    "section",
    "article",
];

/// Outcome of looking for one marker in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction<T> {
    /// The marker was located; the first match wins.
    Found(T),
    /// No marker in the document. Not an error: the gap is carried forward as absent fields.
    NotFound,
}

impl<T> Extraction<T> {
    /// True when the marker was located.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Borrowing view of the found value.
    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }

    /// Converts into an `Option`, dropping the tag.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }
}

/// `Title <number>. <name>` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleMarker {
    /// Title number.
    pub number: String,
    /// Title name, absent when only whitespace followed the number.
    pub name: Option<String>,
}

/// `§ <number> <Heading>` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMarker {
    /// Section number, optionally with dotted sub-parts.
    pub number: String,
    /// Heading fragment following the number, up to the end of the line.
    pub name: String,
}

/// Markers located in a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    /// Title marker outcome.
    pub title: Extraction<TitleMarker>,
    /// Section marker outcome.
    pub section: Extraction<SectionMarker>,
}

impl ExtractedFields {
    /// Copies located markers onto `record`, leaving gaps as `None`.
    pub fn apply_to(self, record: &mut StructuredRecord) {
        if let Extraction::Found(title) = self.title {
            record.title_number = Some(title.number);
            record.title_name = title.name;
        }
        if let Extraction::Found(section) = self.section {
            record.section_number = Some(section.number);
            record.section_name = Some(section.name);
        }
    }
}

/// Best-effort parser for title and section markers.
///
/// Holds the compiled patterns so one instance can be reused across a whole corpus.
#[derive(Debug, Clone)]
pub struct CitationExtractor {
    section: Regex,
    title: Regex,
}

impl Default for CitationExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl CitationExtractor {
    /// Compiles the marker patterns.
    pub fn new() -> Self {
        Self {
            section: Regex::new(SECTION_PATTERN).expect("section pattern"),
            title: Regex::new(TITLE_PATTERN).expect("title pattern"),
        }
    }

    /// Locates title and section markers in markdown or HTML text.
    pub fn extract(&self, raw_text: &str) -> ExtractedFields {
        let text = if looks_like_html(raw_text) {
            Cow::Owned(html_to_text(raw_text))
        } else {
            Cow::Borrowed(raw_text)
        };
        ExtractedFields {
            title: self.find_title(&text),
            section: self.find_section(&text),
        }
    }

    /// Same as [`extract`](Self::extract) for raw bytes; undecodable bytes are dropped.
    pub fn extract_bytes(&self, bytes: &[u8]) -> ExtractedFields {
        self.extract(&decode_lossy(bytes))
    }

    /// Builds a structured record from one crawled page, stamping the current time.
    pub fn structure(&self, document: &RawDocument) -> StructuredRecord {
        self.structure_at(document, Utc::now())
    }

    /// Builds a structured record from one crawled page with an explicit extraction time.
    pub fn structure_at(&self, document: &RawDocument, at: DateTime<Utc>) -> StructuredRecord {
        let mut record = StructuredRecord::new(document.url.clone(), document.markdown.clone());
        record.crawled_at = Some(at.to_rfc3339_opts(SecondsFormat::Micros, true));
        self.extract(&document.markdown).apply_to(&mut record);
        record
    }

    fn find_title(&self, text: &str) -> Extraction<TitleMarker> {
        let Some(caps) = self.title.captures(text) else {
            return Extraction::NotFound;
        };
        let name = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .filter(|name| !name.is_empty());
        Extraction::Found(TitleMarker {
            number: caps[1].to_string(),
            name,
        })
    }

    fn find_section(&self, text: &str) -> Extraction<SectionMarker> {
        let Some(caps) = self.section.captures(text) else {
            return Extraction::NotFound;
        };
        Extraction::Found(SectionMarker {
            number: caps[1].to_string(),
            name: caps[2].trim().to_string(),
        })
    }
}

/// Decodes bytes as UTF-8, dropping invalid sequences instead of failing.
pub fn decode_lossy(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(
            String::from_utf8_lossy(bytes)
                .chars()
                .filter(|&ch| ch != char::REPLACEMENT_CHARACTER)
                .collect(),
        ),
    }
}

fn looks_like_html(text: &str) -> bool {
    let head: String = text
        .trim_start()
        .chars()
        .take(512)
        .collect::<String>()
        .to_lowercase();
    head.contains("<!doctype") || head.contains("<html") || head.contains("<body")
}

/// Reduces an HTML page to visible text.
///
/// Lines break at block elements, `<br>` and newlines inside text; whitespace is collapsed
/// within each line.
fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    let mut current_block = None;

    for node in document.root_element().descendants() {
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| IGNORED_TAGS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        if node.value().as_element().is_some_and(|el| el.name() == "br") {
            end_line(&mut lines, &mut line);
            continue;
        }
        let Some(text) = node.value().as_text() else {
            continue;
        };
        if text.trim().is_empty() {
            continue;
        }

        let block = node
            .ancestors()
            .find(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| BLOCK_TAGS.contains(&el.name()))
            })
            .map(|ancestor| ancestor.id());
        if block != current_block {
            end_line(&mut lines, &mut line);
        }
        current_block = block;

        for (n, segment) in text.split('\n').enumerate() {
            if n > 0 {
                end_line(&mut lines, &mut line);
            }
            let collapsed = collapse_whitespace(segment);
            if collapsed.is_empty() {
                continue;
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&collapsed);
        }
    }
    end_line(&mut lines, &mut line);
    lines.join("\n")
}

fn end_line(lines: &mut Vec<String>, line: &mut String) {
    if !line.is_empty() {
        lines.push(std::mem::take(line));
    }
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn extracts_title_and_section_from_markdown() {
        let extractor = CitationExtractor::new();
        let fields =
            extractor.extract("Title 17. Food and Agriculture ... § 12345 Sanitation Rules");

        assert_eq!(
            fields.title,
            Extraction::Found(TitleMarker {
                number: "17".into(),
                name: Some("Food and Agriculture".into()),
            })
        );
        assert_eq!(
            fields.section,
            Extraction::Found(SectionMarker {
                number: "12345".into(),
                name: "Sanitation Rules".into(),
            })
        );
    }

    #[test]
    fn decimal_section_numbers_and_trailing_period() {
        let extractor = CitationExtractor::new();
        let fields = extractor.extract("# § 1234.5. Definitions\nbody text");
        let section = fields.section.into_option().unwrap();
        assert_eq!(section.number, "1234.5");
        assert_eq!(section.name, "Definitions");
    }

    #[test]
    fn missing_markers_are_gaps_not_errors() {
        let extractor = CitationExtractor::new();
        let fields = extractor.extract("Nothing regulatory on this page.");
        assert_eq!(fields.title, Extraction::NotFound);
        assert_eq!(fields.section, Extraction::NotFound);

        let mut record = StructuredRecord::new("https://x/1", "");
        fields.apply_to(&mut record);
        assert_eq!(record.title_number, None);
        assert_eq!(record.section_name, None);
    }

    #[test]
    fn first_marker_wins() {
        let extractor = CitationExtractor::new();
        let fields = extractor.extract(
            "Title 8. Industrial Relations\n§ 3203 Injury Prevention\nTitle 22. Social Security\n§ 9999 Other",
        );
        assert_eq!(fields.title.as_ref().unwrap().number, "8");
        assert_eq!(fields.section.as_ref().unwrap().number, "3203");
    }

    #[test]
    fn invalid_utf8_is_skipped() {
        let extractor = CitationExtractor::new();
        let mut bytes = b"Title 17. Public Health\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice("§ 100 Scope".as_bytes());

        let fields = extractor.extract_bytes(&bytes);
        assert_eq!(fields.title.as_ref().unwrap().name.as_deref(), Some("Public Health"));
        assert_eq!(fields.section.as_ref().unwrap().number, "100");
    }

    #[test]
    fn html_pages_are_reduced_to_text() {
        let extractor = CitationExtractor::new();
        let html = r#"<!DOCTYPE html>
            <html><head><style>p { color: red }</style></head>
            <body>
              <nav>Title 99. Navigation</nav>
              <p>Title 17. Public <b>Health</b></p>
              <h1>§ 2500. Reportable Diseases</h1>
            </body></html>"#;

        let fields = extractor.extract(html);
        let title = fields.title.into_option().unwrap();
        assert_eq!(title.number, "17");
        assert_eq!(title.name.as_deref(), Some("Public Health"));
        assert_eq!(fields.section.into_option().unwrap().name, "Reportable Diseases");
    }

    #[test]
    fn line_breaks_end_section_headings() {
        let extractor = CitationExtractor::new();
        let html = "<html><body><p>Title 17. Public Health<br>§ 100 Scope<br>\
                    Operators must keep kitchens clean.</p></body></html>";

        let fields = extractor.extract(html);
        assert!(fields.title.is_found());
        let section = fields.section.into_option().unwrap();
        assert_eq!(section.number, "100");
        assert_eq!(section.name, "Scope");
    }

    #[test]
    fn markdown_led_by_a_comment_keeps_its_lines() {
        let extractor = CitationExtractor::new();
        let fields = extractor.extract(
            "<!-- crawl4ai -->\nTitle 17. Public Health\n§ 100 Scope\nOperators must keep kitchens clean.",
        );
        assert_eq!(fields.section.into_option().unwrap().name, "Scope");
        assert!(!looks_like_html("<!-- note -->\n# Heading"));
        assert!(looks_like_html("<!DOCTYPE html><p>x</p>"));
    }

    #[test]
    fn newlines_inside_html_text_are_kept() {
        let text = html_to_text("<html><body><pre>§ 7 Scope\n  more   text</pre></body></html>");
        assert_eq!(text, "§ 7 Scope\nmore text");
    }

    #[test]
    fn structure_keeps_url_and_body() {
        let extractor = CitationExtractor::new();
        let doc = RawDocument::new("https://ccr/1", "Title 17. Public Health\n§ 1 Scope");
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = extractor.structure_at(&doc, at);

        assert_eq!(record.source_url, "https://ccr/1");
        assert_eq!(record.content_markdown, doc.markdown);
        assert_eq!(record.section_number.as_deref(), Some("1"));
        assert_eq!(record.division, None);
        assert_eq!(record.crawled_at.as_deref(), Some("2024-05-01T12:00:00.000000Z"));
    }
}

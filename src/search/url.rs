//! URL detection over terminal lines
//!
//! Finds http, https, ftp, file and mailto links line by line so a
//! presentation layer can underline them or open the one under the pointer.
//! Opening is left to the caller. A link that soft-wraps onto the next row is
//! reported as two separate pieces.

use regex::{Regex, RegexBuilder};

use super::{LineRef, SearchError, TextSource};

const URL_PATTERN: &str = r#"\b(?:https?://|ftp://|file://|mailto:)[^\s<>"'`]+"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlKind {
    Http,
    Https,
    Ftp,
    Mailto,
    File,
}

impl UrlKind {
    /// Kind and scheme length for a URL starting with a known scheme
    fn classify(url: &str) -> Option<(UrlKind, usize)> {
        const SCHEMES: [(&str, UrlKind); 5] = [
            ("https://", UrlKind::Https),
            ("http://", UrlKind::Http),
            ("ftp://", UrlKind::Ftp),
            ("file://", UrlKind::File),
            ("mailto:", UrlKind::Mailto),
        ];
        SCHEMES.iter().find_map(|(scheme, kind)| {
            url.get(..scheme.len())
                .filter(|prefix| prefix.eq_ignore_ascii_case(scheme))
                .map(|_| (*kind, scheme.len()))
        })
    }
}

/// A detected link. Columns are cell columns, end exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMatch {
    pub kind: UrlKind,
    pub url: String,
    pub line: usize,
    pub origin: LineRef,
    pub start_col: usize,
    pub end_col: usize,
}

impl UrlMatch {
    pub fn contains_col(&self, col: usize) -> bool {
        (self.start_col..self.end_col).contains(&col)
    }
}

#[derive(Debug, Clone)]
pub struct UrlDetector {
    regex: Regex,
}

impl UrlDetector {
    pub fn new() -> Result<Self, SearchError> {
        let regex = RegexBuilder::new(URL_PATTERN)
            .case_insensitive(true)
            .build()
            .map_err(|source| SearchError::InvalidPattern {
                pattern: URL_PATTERN.to_string(),
                source,
            })?;
        Ok(Self { regex })
    }

    /// Links on one line, left to right
    pub fn detect_line<S: TextSource + ?Sized>(&self, source: &S, line: usize) -> Vec<UrlMatch> {
        let (Some(text), Some(origin)) = (source.line_text(line), source.line_ref(line)) else {
            return Vec::new();
        };
        self.regex
            .find_iter(text.as_str())
            .filter_map(|m| {
                let url = trim_trailing(m.as_str());
                let (kind, scheme_len) = UrlKind::classify(url)?;
                if url.len() <= scheme_len {
                    return None;
                }
                let (start_col, end_col) = text.columns(m.start()..m.start() + url.len());
                Some(UrlMatch {
                    kind,
                    url: url.to_string(),
                    line,
                    origin,
                    start_col,
                    end_col,
                })
            })
            .collect()
    }

    /// Links in the whole source, oldest line first
    pub fn detect_all<S: TextSource + ?Sized>(&self, source: &S) -> Vec<UrlMatch> {
        (0..source.line_count())
            .flat_map(|line| self.detect_line(source, line))
            .collect()
    }

    /// The link covering cell `col` of `line`
    pub fn url_at<S: TextSource + ?Sized>(
        &self,
        source: &S,
        line: usize,
        col: usize,
    ) -> Option<UrlMatch> {
        self.detect_line(source, line)
            .into_iter()
            .find(|m| m.contains_col(col))
    }

    pub fn has_url_at<S: TextSource + ?Sized>(&self, source: &S, line: usize, col: usize) -> bool {
        self.url_at(source, line, col).is_some()
    }
}

/// Drop sentence punctuation and unbalanced closing brackets
fn trim_trailing(url: &str) -> &str {
    let mut end = url.len();
    while let Some(last) = url[..end].chars().next_back() {
        let head = &url[..end];
        let strip = match last {
            '.' | ',' | ';' | ':' | '!' | '?' => true,
            ')' => head.matches('(').count() < head.matches(')').count(),
            ']' => head.matches('[').count() < head.matches(']').count(),
            _ => false,
        };
        if !strip {
            break;
        }
        end -= last.len_utf8();
    }
    &url[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::HistoryView;
    use crate::terminal::Terminal;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detects_kinds_and_columns() {
        let detector = UrlDetector::new().unwrap();
        let source = lines(&["see https://example.com/a?b=1, then ftp://h/x."]);
        let found = detector.detect_all(&source);
        assert_eq!(found.len(), 2);

        assert_eq!(found[0].kind, UrlKind::Https);
        assert_eq!(found[0].url, "https://example.com/a?b=1");
        assert_eq!((found[0].start_col, found[0].end_col), (4, 29));
        assert_eq!(found[0].origin, LineRef::Text { index: 0 });

        assert_eq!(found[1].kind, UrlKind::Ftp);
        assert_eq!(found[1].url, "ftp://h/x");
    }

    #[test]
    fn test_other_schemes() {
        let detector = UrlDetector::new().unwrap();
        let source = lines(&[
            "mail mailto:ops@example.com now",
            "open file:///tmp/report.txt",
            "HTTP://EXAMPLE.ORG",
        ]);
        let kinds: Vec<UrlKind> = detector.detect_all(&source).iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![UrlKind::Mailto, UrlKind::File, UrlKind::Http]);
    }

    #[test]
    fn test_balanced_parentheses_are_kept() {
        let detector = UrlDetector::new().unwrap();
        let source = lines(&["(docs: https://en.wikipedia.org/wiki/Rust_(language))"]);
        let found = detector.detect_all(&source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://en.wikipedia.org/wiki/Rust_(language)");
    }

    #[test]
    fn test_rejects_bare_scheme_and_embedded_scheme() {
        let detector = UrlDetector::new().unwrap();
        let source = lines(&["https:// alone", "xhttps://a.b", "mailto:"]);
        assert!(detector.detect_all(&source).is_empty());
    }

    #[test]
    fn test_has_url_at_uses_cell_columns() {
        let detector = UrlDetector::new().unwrap();
        // Two wide glyphs and a space put the link at column 5
        let source = lines(&["日本 https://a.b end"]);
        assert!(!detector.has_url_at(&source, 0, 4));
        assert!(detector.has_url_at(&source, 0, 5));
        assert!(detector.has_url_at(&source, 0, 15));
        assert!(!detector.has_url_at(&source, 0, 16));
        assert_eq!(detector.url_at(&source, 0, 10).unwrap().url, "https://a.b");
        assert!(!detector.has_url_at(&source, 3, 0));
    }

    #[test]
    fn test_detects_in_scrollback_and_grid() {
        let mut term = Terminal::new(20, 2, 10);
        term.process(b"https://one.example\r\nplain\r\nhttps://two.example\r\n");

        let detector = UrlDetector::new().unwrap();
        let found = detector.detect_all(&HistoryView::of(term.screen()));
        assert_eq!(found.len(), 2);
        assert!(matches!(found[0].origin, LineRef::Scrollback { .. }));
        assert_eq!(found[0].url, "https://one.example");
        assert_eq!(found[1].origin, LineRef::Grid { row: 0 });
        assert_eq!(found[1].line, 2);
    }
}

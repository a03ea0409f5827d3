//! Search over terminal history
//!
//! The engine walks one logical sequence of lines: archived scrollback first
//! (oldest to newest), then the rows of the live grid. Matches are reported as
//! cell columns so a renderer can highlight them directly.
//!
//! Scrollback is immutable, so replace operations only work on sources that
//! opt in through [`TextSource::is_writable`], such as a plain `Vec<String>`.
//!
//! [`UrlDetector`] walks the same sources looking for links.

use std::ops::Range;

use regex::{Regex, RegexBuilder};

use crate::core::{char_width, Cell, Grid, Scrollback, Screen};

mod url;

pub use url::{UrlDetector, UrlKind, UrlMatch};

/// Errors from search operations
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("invalid search pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("search target is read-only")]
    ReadOnlyTarget,

    #[error("no active search query")]
    NoActiveMatch,
}

/// Where a matched line lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineRef {
    /// Archived line, identified by its stable sequence number
    Scrollback { seq: u64 },
    /// Row of the live grid
    Grid { row: usize },
    /// Line of a plain text source
    Text { index: usize },
}

/// A match position. Columns are cell columns, end exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    /// Index in the logical line sequence at the time of the search
    pub line: usize,
    pub origin: LineRef,
    pub start_col: usize,
    pub end_col: usize,
}

/// Text of one line plus the cell columns every byte covers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineText {
    text: String,
    /// Per byte: the `[start, end)` columns of the character it belongs to
    spans: Vec<(usize, usize)>,
}

impl LineText {
    /// Build from grid cells. Trailing blanks are dropped so `$` anchors
    /// at the last visible character.
    pub fn from_cells(cells: &[Cell]) -> Self {
        let mut line = LineText::default();
        let mut col = 0;
        for cell in cells {
            if cell.is_continuation() {
                continue;
            }
            let span = (col, col + usize::from(cell.width().max(1)));
            if cell.is_empty() {
                line.push(' ', span);
            } else {
                for c in cell.content().chars() {
                    line.push(c, span);
                }
            }
            col = span.1;
        }
        let trimmed = line.text.trim_end().len();
        line.text.truncate(trimmed);
        line.spans.truncate(trimmed);
        line
    }

    /// Build from plain text; columns follow display width
    pub fn from_plain(text: &str) -> Self {
        let mut line = LineText::default();
        let mut col = 0;
        for c in text.chars() {
            let width = char_width(c);
            let span = match (width, line.spans.last()) {
                // Combining marks share the span of their base character
                (0, Some(&prev)) => prev,
                (0, None) => (col, col),
                _ => {
                    let span = (col, col + width);
                    col += width;
                    span
                }
            };
            line.push(c, span);
        }
        line
    }

    fn push(&mut self, c: char, span: (usize, usize)) {
        self.text.push(c);
        self.spans
            .extend(std::iter::repeat(span).take(c.len_utf8()));
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Cell columns covered by a non-empty byte range
    fn columns(&self, bytes: Range<usize>) -> (usize, usize) {
        (self.spans[bytes.start].0, self.spans[bytes.end - 1].1)
    }

    /// Byte range covering the cell columns `[start_col, end_col)`
    pub fn byte_range(&self, start_col: usize, end_col: usize) -> Option<Range<usize>> {
        let start = self
            .text
            .char_indices()
            .map(|(b, _)| b)
            .find(|&b| self.spans[b].0 >= start_col)?;
        let end = self
            .text
            .char_indices()
            .map(|(b, c)| b + c.len_utf8())
            .filter(|&e| e > start)
            .find(|&e| self.spans[e - 1].1 >= end_col)?;
        Some(start..end)
    }
}

/// A sequence of lines the search engine can walk
pub trait TextSource {
    fn line_count(&self) -> usize;

    fn line_text(&self, index: usize) -> Option<LineText>;

    fn line_ref(&self, index: usize) -> Option<LineRef>;

    /// Current index of a previously returned line, if it still exists
    fn resolve(&self, line: LineRef) -> Option<usize>;

    fn is_writable(&self) -> bool {
        false
    }

    /// Replace the matched text with `replacement`
    fn replace(&mut self, _found: &SearchMatch, _replacement: &str) -> Result<(), SearchError> {
        Err(SearchError::ReadOnlyTarget)
    }
}

/// Scrollback followed by the live grid. Read-only.
#[derive(Debug, Clone, Copy)]
pub struct HistoryView<'a> {
    scrollback: &'a Scrollback,
    grid: &'a Grid,
}

impl<'a> HistoryView<'a> {
    pub fn new(scrollback: &'a Scrollback, grid: &'a Grid) -> Self {
        Self { scrollback, grid }
    }

    /// History of the screen's active buffer
    pub fn of(screen: &'a Screen) -> Self {
        Self::new(screen.scrollback(), screen.grid())
    }
}

impl TextSource for HistoryView<'_> {
    fn line_count(&self) -> usize {
        self.scrollback.line_count() + self.grid.rows()
    }

    fn line_text(&self, index: usize) -> Option<LineText> {
        let archived = self.scrollback.line_count();
        if index < archived {
            let line = self.scrollback.get(index).ok()?;
            Some(LineText::from_cells(line.cells()))
        } else {
            let line = self.grid.line(index - archived)?;
            Some(LineText::from_cells(&line.cells))
        }
    }

    fn line_ref(&self, index: usize) -> Option<LineRef> {
        let archived = self.scrollback.line_count();
        if index < archived {
            let seq = self.scrollback.get(index).ok()?.seq();
            Some(LineRef::Scrollback { seq })
        } else if index - archived < self.grid.rows() {
            Some(LineRef::Grid {
                row: index - archived,
            })
        } else {
            None
        }
    }

    fn resolve(&self, line: LineRef) -> Option<usize> {
        match line {
            LineRef::Scrollback { seq } => self.scrollback.index_of_seq(seq),
            LineRef::Grid { row } if row < self.grid.rows() => {
                Some(self.scrollback.line_count() + row)
            }
            _ => None,
        }
    }
}

/// Caller-owned editable text
impl TextSource for Vec<String> {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line_text(&self, index: usize) -> Option<LineText> {
        self.get(index).map(|s| LineText::from_plain(s))
    }

    fn line_ref(&self, index: usize) -> Option<LineRef> {
        (index < self.len()).then_some(LineRef::Text { index })
    }

    fn resolve(&self, line: LineRef) -> Option<usize> {
        match line {
            LineRef::Text { index } if index < self.len() => Some(index),
            _ => None,
        }
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn replace(&mut self, found: &SearchMatch, replacement: &str) -> Result<(), SearchError> {
        let text = self.get_mut(found.line).ok_or(SearchError::NoActiveMatch)?;
        let range = LineText::from_plain(text)
            .byte_range(found.start_col, found.end_col)
            .ok_or(SearchError::NoActiveMatch)?;
        text.replace_range(range, replacement);
        Ok(())
    }
}

/// The active query as the user typed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub case_sensitive: bool,
    pub is_regex: bool,
}

/// Where the next search resumes
#[derive(Debug, Clone, Copy)]
struct Resume {
    origin: LineRef,
    /// `find_next` takes matches starting at or after this column
    next_from: usize,
    /// `find_prev` takes matches starting before this column
    prev_before: usize,
}

/// Stateful search cursor
#[derive(Debug, Default)]
pub struct SearchEngine {
    query: Option<Query>,
    regex: Option<Regex>,
    current: Option<SearchMatch>,
    resume: Option<Resume>,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new query and reset the cursor. An empty query clears the
    /// search. On an invalid pattern the previous query and cursor are kept.
    pub fn set_query(
        &mut self,
        text: &str,
        case_sensitive: bool,
        is_regex: bool,
    ) -> Result<(), SearchError> {
        if text.is_empty() {
            self.clear();
            return Ok(());
        }
        let pattern = if is_regex {
            text.to_string()
        } else {
            regex::escape(text)
        };
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|source| SearchError::InvalidPattern {
                pattern: text.to_string(),
                source,
            })?;

        self.query = Some(Query {
            text: text.to_string(),
            case_sensitive,
            is_regex,
        });
        self.regex = Some(regex);
        self.current = None;
        self.resume = None;
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// The match the cursor is on
    pub fn current(&self) -> Option<&SearchMatch> {
        self.current.as_ref()
    }

    /// Move to the next match, wrapping past the newest line
    pub fn find_next<S: TextSource + ?Sized>(&mut self, source: &S) -> Option<SearchMatch> {
        let regex = self.regex.as_ref()?;
        let count = source.line_count();
        let start = self
            .resume
            .and_then(|r| source.resolve(r.origin).map(|line| (line, r.next_from)));
        let (start_line, from) = match start {
            Some((line, col)) => (line, Some(col)),
            None => (0, None),
        };

        let mut found = None;
        for step in 0..=count {
            let line = (start_line + step) % count.max(1);
            let mut matches = line_matches(regex, source, line).into_iter();
            found = match (step, from) {
                (0, Some(col)) => matches.find(|m| m.start_col >= col),
                _ => matches.next(),
            };
            if found.is_some() {
                break;
            }
        }
        self.settle(found)
    }

    /// Move to the previous match, wrapping past the oldest line
    pub fn find_prev<S: TextSource + ?Sized>(&mut self, source: &S) -> Option<SearchMatch> {
        let regex = self.regex.as_ref()?;
        let count = source.line_count();
        if count == 0 {
            return self.settle(None);
        }
        let start = self
            .resume
            .and_then(|r| source.resolve(r.origin).map(|line| (line, r.prev_before)));
        let (start_line, before) = match start {
            Some((line, col)) => (line, Some(col)),
            None => (count - 1, None),
        };

        let mut found = None;
        for step in 0..=count {
            let line = (start_line + count - step % count) % count;
            let mut matches = line_matches(regex, source, line).into_iter().rev();
            found = match (step, before) {
                (0, Some(col)) => matches.find(|m| m.start_col < col),
                _ => matches.next(),
            };
            if found.is_some() {
                break;
            }
        }
        self.settle(found)
    }

    fn settle(&mut self, found: Option<SearchMatch>) -> Option<SearchMatch> {
        self.resume = found.as_ref().map(|m| Resume {
            origin: m.origin,
            next_from: m.start_col + 1,
            prev_before: m.start_col,
        });
        self.current = found.clone();
        found
    }

    /// Every match in the source, oldest first
    pub fn find_all<S: TextSource + ?Sized>(&self, source: &S) -> Vec<SearchMatch> {
        let Some(regex) = &self.regex else {
            return Vec::new();
        };
        (0..source.line_count())
            .flat_map(|line| line_matches(regex, source, line))
            .collect()
    }

    /// Replace the current match (or the next one, if the cursor is not on a
    /// match) and leave the cursor just past the inserted text.
    pub fn replace_next<S: TextSource + ?Sized>(
        &mut self,
        source: &mut S,
        replacement: &str,
    ) -> Result<Option<SearchMatch>, SearchError> {
        if self.regex.is_none() {
            return Err(SearchError::NoActiveMatch);
        }
        if !source.is_writable() {
            return Err(SearchError::ReadOnlyTarget);
        }
        let target = match self.current.take() {
            Some(m) if self.still_matches(source, &m) => m,
            _ => match self.find_next(source) {
                Some(m) => m,
                None => return Ok(None),
            },
        };
        source.replace(&target, replacement)?;

        let inserted: usize = replacement.chars().map(char_width).sum();
        self.current = None;
        self.resume = Some(Resume {
            origin: target.origin,
            next_from: target.start_col + inserted,
            prev_before: target.start_col,
        });
        Ok(Some(target))
    }

    /// Replace every match; returns how many were replaced
    pub fn replace_all<S: TextSource + ?Sized>(
        &mut self,
        source: &mut S,
        replacement: &str,
    ) -> Result<usize, SearchError> {
        let Some(regex) = self.regex.clone() else {
            return Err(SearchError::NoActiveMatch);
        };
        if !source.is_writable() {
            return Err(SearchError::ReadOnlyTarget);
        }
        let mut replaced = 0;
        for line in 0..source.line_count() {
            // Right to left so earlier columns stay valid
            for found in line_matches(&regex, source, line).iter().rev() {
                source.replace(found, replacement)?;
                replaced += 1;
            }
        }
        self.current = None;
        self.resume = None;
        Ok(replaced)
    }

    fn still_matches<S: TextSource + ?Sized>(&self, source: &S, found: &SearchMatch) -> bool {
        let Some(regex) = &self.regex else {
            return false;
        };
        source
            .resolve(found.origin)
            .map(|line| line_matches(regex, source, line).contains(&SearchMatch { line, ..found.clone() }))
            .unwrap_or(false)
    }
}

/// Non-empty matches on one line, left to right
fn line_matches<S: TextSource + ?Sized>(regex: &Regex, source: &S, line: usize) -> Vec<SearchMatch> {
    let (Some(text), Some(origin)) = (source.line_text(line), source.line_ref(line)) else {
        return Vec::new();
    };
    regex
        .find_iter(text.as_str())
        .filter(|m| !m.is_empty())
        .map(|m| {
            let (start_col, end_col) = text.columns(m.range());
            SearchMatch {
                line,
                origin,
                start_col,
                end_col,
            }
        })
        .collect()
}

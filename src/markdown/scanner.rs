//! Single-pass line scanner.
//!
//! Classifies every line of a document once (frontmatter, header, section
//! marker, code fence, fenced code, text). The section index and the
//! structural validator are both built from this token stream so the line
//! grammar lives in exactly one place.

use std::ops::Range;

/// What a line is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Opening or closing `---` of the frontmatter block
    FrontmatterDelimiter,
    /// A line inside the frontmatter block
    Frontmatter,
    /// `#`-prefixed header. `level` may exceed 6; the validator rejects that.
    Header { level: usize, title: &'a str },
    /// `<!-- Section: title -->`
    Marker { title: &'a str },
    /// Opening code fence with its info string
    FenceOpen { info: &'a str },
    FenceClose,
    /// A line inside a fenced code block
    Code,
    Text,
}

/// One scanned line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// 1-based line number
    pub number: usize,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset just past the line terminator (or EOF)
    pub end: usize,
    /// Line text without its terminator
    pub text: &'a str,
    pub token: Token<'a>,
}

/// Result of scanning a whole document.
#[derive(Debug, Clone)]
pub struct Scan<'a> {
    pub lines: Vec<Line<'a>>,
    /// Byte range of the YAML between the delimiters, when a closed block exists
    pub frontmatter: Option<Range<usize>>,
    /// Byte offset just past the closing delimiter (0 without frontmatter)
    pub body_start: usize,
    /// The document opens with `---` but never closes it
    pub unclosed_frontmatter: bool,
    /// Line number of a fence left open at EOF
    pub unclosed_fence: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct OpenFence {
    ch: char,
    len: usize,
}

pub fn scan(content: &str) -> Scan<'_> {
    let raw: Vec<(usize, &str)> = split_lines(content);
    let mut lines = Vec::with_capacity(raw.len());

    let fm_close = frontmatter_close(&raw);
    let mut fence: Option<(OpenFence, usize)> = None;

    for (idx, (start, with_terminator)) in raw.iter().copied().enumerate() {
        let text = strip_terminator(with_terminator);
        let number = idx + 1;
        let end = start + with_terminator.len();

        let token = if let Some(close) = fm_close.filter(|close| idx <= *close) {
            if idx == 0 || idx == close {
                Token::FrontmatterDelimiter
            } else {
                Token::Frontmatter
            }
        } else if let Some((open, _)) = fence {
            if closes_fence(text, open) {
                fence = None;
                Token::FenceClose
            } else {
                Token::Code
            }
        } else if let Some((open, info)) = opens_fence(text) {
            fence = Some((open, number));
            Token::FenceOpen { info }
        } else if let Some((level, title)) = parse_header(text) {
            Token::Header { level, title }
        } else if let Some(title) = parse_marker(text) {
            Token::Marker { title }
        } else {
            Token::Text
        };

        lines.push(Line {
            number,
            start,
            end,
            text,
            token,
        });
    }

    let (frontmatter, body_start) = match fm_close {
        Some(close) => {
            let yaml_start = raw[0].0 + raw[0].1.len();
            let yaml_end = raw[close].0;
            (Some(yaml_start..yaml_end), raw[close].0 + raw[close].1.len())
        }
        None => (None, 0),
    };

    Scan {
        lines,
        frontmatter,
        body_start,
        unclosed_frontmatter: fm_close.is_none()
            && raw
                .first()
                .map(|(_, l)| is_delimiter(strip_terminator(l)))
                .unwrap_or(false),
        unclosed_fence: fence.map(|(_, line)| line),
    }
}

fn split_lines(content: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut offset = 0;
    for piece in content.split_inclusive('\n') {
        out.push((offset, piece));
        offset += piece.len();
    }
    out
}

fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

fn is_delimiter(text: &str) -> bool {
    text.trim_end() == "---"
}

/// Index of the closing `---` line if line 0 opens a frontmatter block.
fn frontmatter_close(raw: &[(usize, &str)]) -> Option<usize> {
    let first = raw.first()?;
    if !is_delimiter(strip_terminator(first.1)) {
        return None;
    }
    raw.iter()
        .enumerate()
        .skip(1)
        .find(|(_, (_, l))| is_delimiter(strip_terminator(l)))
        .map(|(i, _)| i)
}

/// `#`..`#` followed by whitespace or end of line. Titles are trimmed.
pub fn parse_header(text: &str) -> Option<(usize, &str)> {
    let level = text.bytes().take_while(|b| *b == b'#').count();
    if level == 0 {
        return None;
    }
    let rest = &text[level..];
    if rest.is_empty() {
        return Some((level, ""));
    }
    if rest.starts_with(' ') || rest.starts_with('\t') {
        return Some((level, rest.trim()));
    }
    None
}

/// `<!-- Section: title -->`, also accepting `SECTION` and loose spacing.
pub fn parse_marker(text: &str) -> Option<&str> {
    let inner = text.trim().strip_prefix("<!--")?.strip_suffix("-->")?;
    let inner = inner.trim_start();
    let rest = inner
        .strip_prefix("Section:")
        .or_else(|| inner.strip_prefix("SECTION:"))?;
    let title = rest.trim();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

fn fence_run(text: &str) -> Option<(OpenFence, &str)> {
    let indent = text.len() - text.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let body = &text[indent..];
    let ch = body.chars().next()?;
    if ch != '`' && ch != '~' {
        return None;
    }
    let len = body.chars().take_while(|c| *c == ch).count();
    if len < 3 {
        return None;
    }
    Some((OpenFence { ch, len }, &body[len..]))
}

fn opens_fence(text: &str) -> Option<(OpenFence, &str)> {
    let (fence, rest) = fence_run(text)?;
    if fence.ch == '`' && rest.contains('`') {
        return None;
    }
    Some((fence, rest.trim()))
}

fn closes_fence(text: &str, open: OpenFence) -> bool {
    match fence_run(text) {
        Some((fence, rest)) => fence.ch == open.ch && fence.len >= open.len && rest.trim().is_empty(),
        None => false,
    }
}

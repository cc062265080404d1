//! Lightweight lexical view of a Gradle script.
//!
//! [`MaskedText`] blanks comments (byte offsets are preserved) and records
//! string literal ranges, so that block location and brace matching never
//! see braces inside comments or strings. This is deliberately not a parser:
//! it only knows about comments, strings and braces.

use jvmdeps_core::Span;
use std::ops::Range;

/// A `name { ... }` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Start of the block name.
    pub start: usize,
    /// Offset of `{`.
    pub open: usize,
    /// Offset of the matching `}`.
    pub close: usize,
}

impl Block {
    pub const fn end(&self) -> usize {
        self.close + 1
    }

    pub const fn span(&self) -> Span {
        Span::from_bounds(self.start, self.end())
    }

    pub const fn body(&self) -> Range<usize> {
        self.open + 1..self.close
    }

    pub const fn contains(&self, pos: usize) -> bool {
        pos > self.open && pos < self.close
    }
}

#[derive(Debug, Clone)]
pub struct MaskedText {
    masked: String,
    strings: Vec<Range<usize>>,
}

fn blank(out: &mut [u8], range: Range<usize>) {
    for b in &mut out[range] {
        if *b != b'\n' && *b != b'\r' {
            *b = b' ';
        }
    }
}

fn find_from(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

impl MaskedText {
    pub fn new(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut out = bytes.to_vec();
        let mut strings = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    let end = find_from(bytes, i, b"\n").unwrap_or(bytes.len());
                    blank(&mut out, i..end);
                    i = end;
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    let end = find_from(bytes, i + 2, b"*/").map_or(bytes.len(), |p| p + 2);
                    blank(&mut out, i..end);
                    i = end;
                }
                quote @ (b'"' | b'\'') => {
                    let triple = [quote; 3];
                    let end = if bytes[i..].starts_with(&triple) {
                        find_from(bytes, i + 3, &triple).map_or(bytes.len(), |p| p + 3)
                    } else {
                        let mut j = i + 1;
                        loop {
                            match bytes.get(j) {
                                None | Some(b'\n') => break j,
                                Some(b'\\') => j += 2,
                                Some(&b) if b == quote => break j + 1,
                                Some(_) => j += 1,
                            }
                        }
                        .min(bytes.len())
                    };
                    strings.push(i..end);
                    i = end;
                }
                _ => i += 1,
            }
        }

        // Only whole comments were blanked, so the bytes stay valid UTF-8.
        let masked = String::from_utf8(out)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
        Self { masked, strings }
    }

    /// The text with comments replaced by spaces.
    pub fn as_str(&self) -> &str {
        &self.masked
    }

    /// String literal ranges, quotes included, in order.
    pub fn strings(&self) -> &[Range<usize>] {
        &self.strings
    }

    /// The string literal containing `pos`, if any.
    pub fn string_at(&self, pos: usize) -> Option<Range<usize>> {
        let i = self.strings.partition_point(|r| r.end <= pos);
        self.strings
            .get(i)
            .filter(|r| r.start <= pos)
            .cloned()
    }

    pub fn in_string(&self, pos: usize) -> bool {
        self.string_at(pos).is_some()
    }

    /// Whether `pos` is plain code: not inside a comment or string.
    pub fn is_code(&self, pos: usize) -> bool {
        !self.in_string(pos) && self.masked.as_bytes().get(pos).is_some_and(|b| *b != b' ')
    }

    /// First string literal starting within `range`.
    pub fn first_string_in(&self, range: Range<usize>) -> Option<Range<usize>> {
        let i = self.strings.partition_point(|r| r.start < range.start);
        self.strings
            .get(i)
            .filter(|r| r.start < range.end)
            .cloned()
    }

    /// Offset of the bracket closing the one at `open` (`{`, `(` or `[`).
    pub fn matching(&self, open: usize) -> Option<usize> {
        let bytes = self.masked.as_bytes();
        let (opener, closer) = match bytes.get(open)? {
            b'{' => (b'{', b'}'),
            b'(' => (b'(', b')'),
            b'[' => (b'[', b']'),
            _ => return None,
        };

        let mut depth = 0usize;
        let mut strings = self.strings.iter().skip_while(|r| r.end <= open).peekable();
        let mut i = open;
        while i < bytes.len() {
            if let Some(r) = strings.peek()
                && r.start == i
            {
                i = r.end;
                strings.next();
                continue;
            }
            if bytes[i] == opener {
                depth += 1;
            } else if bytes[i] == closer {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            i += 1;
        }
        None
    }

    /// Brace nesting depth at `pos`.
    pub fn depth_at(&self, pos: usize) -> usize {
        let bytes = self.masked.as_bytes();
        let mut depth = 0usize;
        let mut strings = self.strings.iter().peekable();
        let mut i = 0;
        while i < pos.min(bytes.len()) {
            if let Some(r) = strings.peek()
                && r.start == i
            {
                i = r.end;
                strings.next();
                continue;
            }
            match bytes[i] {
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                _ => {}
            }
            i += 1;
        }
        depth
    }

    /// Code occurrences of the identifier `name` (not part of a longer
    /// identifier, not a member access such as `x.name`).
    pub fn identifiers<'a>(&'a self, name: &'a str) -> impl Iterator<Item = usize> + 'a {
        let bytes = self.masked.as_bytes();
        self.masked.match_indices(name).filter_map(move |(pos, _)| {
            let before = pos.checked_sub(1).map(|p| bytes[p]);
            let after = bytes.get(pos + name.len()).copied();
            let bounded = !before.is_some_and(|b| is_ident_byte(b) || b == b'.' || b == b'$')
                && !after.is_some_and(is_ident_byte);
            (bounded && !self.in_string(pos)).then_some(pos)
        })
    }

    /// Every `name { ... }` block, in source order.
    pub fn blocks(&self, name: &str) -> Vec<Block> {
        let bytes = self.masked.as_bytes();
        self.identifiers(name)
            .filter_map(|start| {
                let mut open = start + name.len();
                while bytes.get(open).is_some_and(u8::is_ascii_whitespace) {
                    open += 1;
                }
                if bytes.get(open) != Some(&b'{') {
                    return None;
                }
                let close = self.matching(open)?;
                Some(Block { start, open, close })
            })
            .collect()
    }

    /// First `name { ... }` block at the top level of the script.
    pub fn top_level_block(&self, name: &str) -> Option<Block> {
        self.blocks(name)
            .into_iter()
            .find(|b| self.depth_at(b.start) == 0)
    }

    /// First `name { ... }` block directly inside `parent`.
    pub fn child_block(&self, parent: &Block, name: &str) -> Option<Block> {
        let depth = self.depth_at(parent.open) + 1;
        self.blocks(name)
            .into_iter()
            .find(|b| parent.contains(b.start) && self.depth_at(b.start) == depth)
    }
}

//! Span-based text splicing shared by the Gradle and Maven patch engines.
//!
//! Every function returns the complete new text, or `None` when the span no
//! longer fits the text or the requested change has nothing to act on.

use crate::model::Span;

/// Deletes `span`, one trailing LF/CRLF and the whitespace that precedes the
/// span on its line.
pub fn remove_span(text: &str, span: Span) -> Option<String> {
    let range = span.checked_range(text).ok()?;

    let mut start = range.start;
    let prefix = &text[..start];
    let ws = prefix.len() - prefix.trim_end_matches([' ', '\t']).len();
    start -= ws;

    let mut end = range.end;
    let rest = &text[end..];
    if rest.starts_with("\r\n") {
        end += 2;
    } else if rest.starts_with('\n') {
        end += 1;
    }

    let mut out = String::with_capacity(text.len() - (end - start));
    out.push_str(&text[..start]);
    out.push_str(&text[end..]);
    Some(out)
}

fn is_version_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+')
}

/// Replaces the first standalone `old` inside `span` with `new`. Matches
/// that are part of a longer token (`lib-1.0` when `old` is `1.0`) are
/// skipped. Text outside the span is never touched.
pub fn replace_in_span(text: &str, span: Span, old: &str, new: &str) -> Option<String> {
    if old.is_empty() {
        return None;
    }
    let range = span.checked_range(text).ok()?;
    let segment = &text[range.clone()];
    let (rel, _) = segment.match_indices(old).find(|&(at, _)| {
        let before = segment[..at].chars().next_back();
        let after = segment[at + old.len()..].chars().next();
        !before.is_some_and(is_version_char) && !after.is_some_and(is_version_char)
    })?;

    let mut out = String::with_capacity(text.len() + new.len());
    out.push_str(&text[..range.start + rel]);
    out.push_str(new);
    out.push_str(&text[range.start + rel + old.len()..]);
    Some(out)
}

/// Replaces the whole of `span` with `replacement`.
pub fn replace_span(text: &str, span: Span, replacement: &str) -> Option<String> {
    let range = span.checked_range(text).ok()?;
    let mut out = String::with_capacity(text.len() + replacement.len());
    out.push_str(&text[..range.start]);
    out.push_str(replacement);
    out.push_str(&text[range.end..]);
    Some(out)
}

pub fn insert_at(text: &str, offset: usize, insertion: &str) -> Option<String> {
    replace_span(text, Span::new(offset, 0), insertion)
}

/// Byte offset of the first character of the line containing `pos`.
pub fn line_start(text: &str, pos: usize) -> usize {
    text[..pos.min(text.len())].rfind('\n').map_or(0, |i| i + 1)
}

/// Leading whitespace of the line containing `pos`.
pub fn line_indent(text: &str, pos: usize) -> &str {
    let start = line_start(text, pos);
    let line = &text[start..];
    let len = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..len]
}

/// Whether only spaces or tabs precede `pos` on its line.
pub fn starts_line(text: &str, pos: usize) -> bool {
    text[line_start(text, pos)..pos]
        .chars()
        .all(|c| c == ' ' || c == '\t')
}

/// Indentation unit used by the file: a tab, or the smallest run of leading
/// spaces greater than zero. Defaults to four spaces.
pub fn indent_unit(text: &str) -> String {
    let mut smallest: Option<usize> = None;
    for line in text.lines() {
        if line.starts_with('\t') {
            return "\t".to_string();
        }
        let spaces = line.len() - line.trim_start_matches(' ').len();
        if spaces > 0 && spaces < line.len() {
            smallest = Some(smallest.map_or(spaces, |s| s.min(spaces)));
        }
    }
    " ".repeat(smallest.unwrap_or(4))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_takes_indent_and_newline() {
        let text = "dependencies {\n    implementation 'a:b:1'\n    api 'c:d:2'\n}\n";
        let offset = text.find("implementation").unwrap();
        let span = Span::new(offset, "implementation 'a:b:1'".len());
        assert_eq!(
            remove_span(text, span).unwrap(),
            "dependencies {\n    api 'c:d:2'\n}\n"
        );
    }

    #[test]
    fn test_remove_crlf() {
        let text = "a {\r\n\tx()\r\n}\r\n";
        let offset = text.find("x()").unwrap();
        assert_eq!(
            remove_span(text, Span::new(offset, 3)).unwrap(),
            "a {\r\n}\r\n"
        );
    }

    #[test]
    fn test_remove_at_end_of_file() {
        let text = "x\n  last";
        let offset = text.find("last").unwrap();
        assert_eq!(remove_span(text, Span::new(offset, 4)).unwrap(), "x\n");
    }

    #[test]
    fn test_stale_span_is_rejected() {
        assert_eq!(remove_span("short", Span::new(3, 10)), None);
        assert_eq!(replace_span("héllo", Span::new(2, 1), "e"), None);
    }

    #[test]
    fn test_replace_only_inside_span() {
        let text = "api 'a:b:1.0'\napi 'c:d:1.0'\n";
        let offset = text.find("api 'c").unwrap();
        let span = Span::new(offset, "api 'c:d:1.0'".len());
        assert_eq!(
            replace_in_span(text, span, "1.0", "2.0").unwrap(),
            "api 'a:b:1.0'\napi 'c:d:2.0'\n"
        );
        assert_eq!(replace_in_span(text, span, "9.9", "2.0"), None);
    }

    #[test]
    fn test_replace_skips_partial_tokens() {
        let text = "implementation(\"org.example:lib-1.0:1.0\")";
        let span = Span::new(0, text.len());
        assert_eq!(
            replace_in_span(text, span, "1.0", "2.0").unwrap(),
            "implementation(\"org.example:lib-1.0:2.0\")"
        );

        let text = "api 'a:b:11.0'";
        assert_eq!(replace_in_span(text, Span::new(0, text.len()), "1.0", "2.0"), None);
    }

    #[test]
    fn test_line_helpers() {
        let text = "a\n    b\n\tc";
        let b = text.find('b').unwrap();
        assert_eq!(line_start(text, b), 2);
        assert_eq!(line_indent(text, b), "    ");
        assert!(starts_line(text, b));
        assert!(!starts_line(text, b + 1));
        assert_eq!(line_indent(text, text.find('c').unwrap()), "\t");
    }

    #[test]
    fn test_indent_unit() {
        assert_eq!(indent_unit("<a>\n  <b>\n    <c/>\n  </b>\n</a>"), "  ");
        assert_eq!(indent_unit("x {\n    y\n}"), "    ");
        assert_eq!(indent_unit("x {\n\ty\n}"), "\t");
        assert_eq!(indent_unit("flat"), "    ");
    }
}

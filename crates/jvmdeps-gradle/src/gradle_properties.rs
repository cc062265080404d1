//! `gradle.properties` reading and repository credential writing.
//!
//! Values follow the Java properties format: `key=value`, `key: value` or
//! `key value`, `#`/`!` comments, trailing-backslash continuation lines and
//! backslash escapes.

use std::collections::HashMap;
use std::path::PathBuf;

pub const GRADLE_PROPERTIES_FILE: &str = "gradle.properties";

/// Property holding the user name for repository `repo_id`.
pub fn username_property(repo_id: &str) -> String {
    format!("{repo_id}User")
}

/// Property holding the password for repository `repo_id`.
pub fn password_property(repo_id: &str) -> String {
    format!("{repo_id}Password")
}

/// `$GRADLE_USER_HOME/gradle.properties`, defaulting to `~/.gradle`.
pub fn user_gradle_properties() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os("GRADLE_USER_HOME") {
        return Some(PathBuf::from(home).join(GRADLE_PROPERTIES_FILE));
    }
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".gradle").join(GRADLE_PROPERTIES_FILE))
}

/// Joins continuation lines into logical lines, skipping blanks and comments.
fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<String> = None;

    for raw in content.lines() {
        let line = raw.trim_start();
        let mut buf = match current.take() {
            Some(buf) => buf,
            None => {
                if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                    continue;
                }
                String::new()
            }
        };

        // An odd number of trailing backslashes continues the line.
        let trailing = line.len() - line.trim_end_matches('\\').len();
        if trailing % 2 == 1 {
            buf.push_str(&line[..line.len() - 1]);
            current = Some(buf);
        } else {
            buf.push_str(line);
            lines.push(buf);
        }
    }
    lines.extend(current);
    lines
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Splits a logical line into its raw key and raw value.
fn split_entry(line: &str) -> (&str, &str) {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'=' | b':' | b' ' | b'\t' => break,
            _ => i += 1,
        }
    }
    let key_end = i.min(line.len());
    let rest = line[key_end..].trim_start_matches([' ', '\t']);
    let rest = rest
        .strip_prefix(['=', ':'])
        .map_or(rest, |r| r.trim_start_matches([' ', '\t']));
    (&line[..key_end], rest)
}

/// Parses a properties file. Later entries override earlier ones.
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    logical_lines(content)
        .iter()
        .map(|line| {
            let (key, value) = split_entry(line);
            (unescape(key), unescape(value))
        })
        .collect()
}

fn escape(value: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            c if !c.is_ascii() => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{unit:04X}"));
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// Replaces the first entry for `key` or appends one. `None` when the entry
/// already holds `value`.
pub fn set_property(content: &str, key: &str, value: &str) -> Option<String> {
    let line = format!("{}={}", escape(key, true), escape(value, false));

    let mut offset = 0;
    for raw in content.split_inclusive('\n') {
        let start = offset;
        offset += raw.len();
        let trimmed = raw.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }
        let body = raw.trim_end_matches(['\n', '\r']);
        // Continuation lines are left alone; only single-line entries match.
        if body.ends_with('\\') {
            continue;
        }
        let (raw_key, raw_value) = split_entry(body.trim_start());
        if unescape(raw_key) != key {
            continue;
        }
        if unescape(raw_value) == value {
            return None;
        }
        let mut out = String::with_capacity(content.len() + line.len());
        out.push_str(&content[..start]);
        out.push_str(&line);
        out.push_str(&raw[body.len()..]);
        out.push_str(&content[offset..]);
        return Some(out);
    }

    let mut out = content.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&line);
    out.push('\n');
    Some(out)
}

/// Writes `<repo_id>User` and `<repo_id>Password`. `None` when both already
/// hold the given values.
pub fn set_credentials(
    content: &str,
    repo_id: &str,
    username: &str,
    password: &str,
) -> Option<String> {
    let with_user = set_property(content, &username_property(repo_id), username);
    let base = with_user.as_deref().unwrap_or(content);
    match set_property(base, &password_property(repo_id), password) {
        Some(updated) => Some(updated),
        None => with_user,
    }
}

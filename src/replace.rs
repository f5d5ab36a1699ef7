//! Replacement templates for substitution.
//!
//! Supported syntax:
//! - `\1` .. `\99` and `\g<n>`: text of group `n` (empty if it did not participate)
//! - `\g<0>`: the whole match
//! - `\0`, `\0N`, `\0NN` and three-digit `\NNN`: octal character codes up to `\377`
//! - `\\`: a backslash
//! - `\n \r \t \f \v \a`: control characters
//! - `\` before any other non-letter: kept verbatim, backslash included

use crate::error::{Error, Result};
use crate::matched::Match;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Group(usize),
}

/// A parsed replacement template, validated against a group count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pieces: Vec<Piece>,
}

impl Template {
    /// Parse `text`, rejecting references to groups above `group_count`.
    pub fn parse(text: &str, group_count: usize) -> Result<Self> {
        let chars: Vec<char> = text.chars().collect();
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];
            if ch != '\\' {
                literal.push(ch);
                i += 1;
                continue;
            }
            let Some(&next) = chars.get(i + 1) else {
                return Err(template_error(i, "trailing backslash"));
            };
            let group = match next {
                '0' => {
                    let start = i;
                    i += 2;
                    let mut code = 0;
                    while i < start + 4 {
                        let Some(d) = chars.get(i).and_then(|c| c.to_digit(8)) else {
                            break;
                        };
                        code = code * 8 + d;
                        i += 1;
                    }
                    literal.push(latin1(code));
                    None
                }
                '1'..='9' => {
                    let start = i;
                    let first = next as u32 - '0' as u32;
                    i += 2;
                    match chars.get(i).and_then(|c| c.to_digit(10)) {
                        None => Some(first as usize),
                        Some(second) => {
                            i += 1;
                            let third = chars.get(i).and_then(|c| c.to_digit(8));
                            match third {
                                // Three octal digits are a character code
                                Some(third) if first < 8 && second < 8 => {
                                    i += 1;
                                    let code = first * 64 + second * 8 + third;
                                    if code > 0o377 {
                                        return Err(template_error(
                                            start,
                                            format!("octal escape \\{first}{second}{third} out of range"),
                                        ));
                                    }
                                    literal.push(latin1(code));
                                    None
                                }
                                _ => Some((first * 10 + second) as usize),
                            }
                        }
                    }
                }
                'g' => {
                    let (n, end) = parse_named_ref(&chars, i)?;
                    i = end;
                    Some(n)
                }
                _ => {
                    match next {
                        '\\' => literal.push('\\'),
                        'n' => literal.push('\n'),
                        'r' => literal.push('\r'),
                        't' => literal.push('\t'),
                        'f' => literal.push('\x0c'),
                        'v' => literal.push('\x0b'),
                        'a' => literal.push('\x07'),
                        c if c.is_ascii_alphabetic() => {
                            return Err(template_error(i, format!("bad escape \\{c}")));
                        }
                        c => {
                            literal.push('\\');
                            literal.push(c);
                        }
                    }
                    i += 2;
                    None
                }
            };
            if let Some(group) = group {
                if group > group_count {
                    return Err(Error::UnknownGroup { group, group_count });
                }
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                pieces.push(Piece::Group(group));
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }
        Ok(Template { pieces })
    }

    /// Template without any group references, if it is one.
    pub fn as_literal(&self) -> Option<&str> {
        match self.pieces.as_slice() {
            [] => Some(""),
            [Piece::Literal(s)] => Some(s),
            _ => None,
        }
    }

    /// Append the expansion for `m` to `dst`.
    pub fn expand(&self, m: &Match<'_>, dst: &mut String) {
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => dst.push_str(s),
                Piece::Group(n) => dst.push_str(m.group(*n).unwrap_or("")),
            }
        }
    }
}

/// `\g<n>` starting at `at` (the backslash). Returns the group and the index past `>`.
fn parse_named_ref(chars: &[char], at: usize) -> Result<(usize, usize)> {
    if chars.get(at + 2) != Some(&'<') {
        return Err(template_error(at, "missing < after \\g"));
    }
    let digits_start = at + 3;
    let mut i = digits_start;
    while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        i += 1;
    }
    if i == digits_start || chars.get(i) != Some(&'>') {
        return Err(template_error(at, "expected a group number in \\g<...>"));
    }
    let digits: String = chars[digits_start..i].iter().collect();
    let group = digits
        .parse::<usize>()
        .map_err(|_| template_error(at, "group number too large"))?;
    Ok((group, i + 1))
}

/// Char with code point `code`, which the octal escapes keep below 256.
fn latin1(code: u32) -> char {
    char::from((code & 0xff) as u8)
}

fn template_error(position: usize, reason: impl Into<String>) -> Error {
    Error::Template {
        position,
        reason: reason.into(),
    }
}

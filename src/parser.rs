//! Pattern parser: converts a pattern string into an AST.

use crate::ast::*;
use crate::error::{Error, Result, SyntaxErrorKind};

/// Largest count accepted in a `{n,m}` repetition.
pub const MAX_REPEAT: u32 = 1000;

pub struct Parser {
    chars: Vec<char>,
    pos: usize,
    group_count: usize,
}

/// What an escape sequence stands for.
enum Escaped {
    Char(char),
    Shorthand(ShorthandKind),
    Anchor(AnchorKind),
}

/// A `{...}` counted repetition as written, before validation.
struct BraceCount {
    min: Option<u64>,
    comma: bool,
    max: Option<u64>,
    /// Position just past the closing `}`.
    end: usize,
}

impl Parser {
    pub fn new(pattern: &str) -> Self {
        Parser {
            chars: pattern.chars().collect(),
            pos: 0,
            group_count: 0,
        }
    }

    /// Parse the full pattern and return an AST node.
    pub fn parse(&mut self) -> Result<AstNode> {
        let node = self.parse_alternation()?;
        if self.pos < self.chars.len() {
            // parse_alternation only stops early on ')'
            return Err(Error::syntax(SyntaxErrorKind::UnbalancedParen, self.pos));
        }
        Ok(node)
    }

    /// Returns total number of capturing groups found.
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, at: usize) -> Option<char> {
        self.chars.get(at).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    /// Parse alternation: `a|b|c`
    fn parse_alternation(&mut self) -> Result<AstNode> {
        let mut branches = vec![self.parse_concat()?];
        while self.peek() == Some('|') {
            self.advance(); // consume '|'
            branches.push(self.parse_concat()?);
        }
        if branches.len() == 1 {
            Ok(branches.remove(0))
        } else {
            Ok(AstNode::Alternation(branches))
        }
    }

    /// Parse concatenation: `abc`
    fn parse_concat(&mut self) -> Result<AstNode> {
        let mut nodes = Vec::new();
        while let Some(ch) = self.peek() {
            if ch == ')' || ch == '|' {
                break;
            }
            nodes.push(self.parse_quantified()?);
        }
        if nodes.len() == 1 {
            Ok(nodes.remove(0))
        } else {
            Ok(AstNode::Concat(nodes))
        }
    }

    /// Parse an atom possibly followed by a quantifier.
    fn parse_quantified(&mut self) -> Result<AstNode> {
        let node = self.parse_atom()?;
        let quant_pos = self.pos;
        let Some((min, max)) = self.parse_quantifier()? else {
            return Ok(node);
        };
        if matches!(node, AstNode::Anchor(_)) {
            return Err(Error::syntax(SyntaxErrorKind::NothingToRepeat, quant_pos));
        }
        let greedy = if self.peek() == Some('?') {
            self.advance();
            false
        } else {
            true
        };
        if self.at_quantifier() {
            return Err(Error::syntax(SyntaxErrorKind::MultipleRepeat, self.pos));
        }
        Ok(AstNode::Quantifier {
            node: Box::new(node),
            min,
            max,
            greedy,
        })
    }

    /// Consume a quantifier if one starts here and return its bounds.
    fn parse_quantifier(&mut self) -> Result<Option<(u32, Option<u32>)>> {
        match self.peek() {
            Some('*') => {
                self.advance();
                Ok(Some((0, None)))
            }
            Some('+') => {
                self.advance();
                Ok(Some((1, None)))
            }
            Some('?') => {
                self.advance();
                Ok(Some((0, Some(1))))
            }
            Some('{') => {
                let start = self.pos;
                let Some(count) = self.scan_brace(start) else {
                    // Not a valid count: the '{' is a literal
                    return Ok(None);
                };
                self.pos = count.end;
                Self::brace_bounds(&count, start).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn at_quantifier(&self) -> bool {
        match self.peek() {
            Some('*' | '+' | '?') => true,
            Some('{') => self.scan_brace(self.pos).is_some(),
            _ => false,
        }
    }

    /// Scan `{n}`, `{n,}`, `{n,m}` or `{,m}` at `at` without consuming it.
    fn scan_brace(&self, at: usize) -> Option<BraceCount> {
        let mut i = at + 1;
        let min = self.scan_number(&mut i);
        let comma = self.peek_at(i) == Some(',');
        let max = if comma {
            i += 1;
            self.scan_number(&mut i)
        } else {
            None
        };
        if self.peek_at(i) != Some('}') || (min.is_none() && max.is_none()) {
            return None;
        }
        Some(BraceCount {
            min,
            comma,
            max,
            end: i + 1,
        })
    }

    fn scan_number(&self, i: &mut usize) -> Option<u64> {
        let mut value: Option<u64> = None;
        while let Some(digit) = self.peek_at(*i).and_then(|c| c.to_digit(10)) {
            value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(digit as u64));
            *i += 1;
        }
        value
    }

    fn brace_bounds(count: &BraceCount, at: usize) -> Result<(u32, Option<u32>)> {
        let limit = |n: u64| {
            u32::try_from(n)
                .ok()
                .filter(|&n| n <= MAX_REPEAT)
                .ok_or(Error::syntax(SyntaxErrorKind::RepeatTooLarge, at))
        };
        let min = limit(count.min.unwrap_or(0))?;
        let max = match (count.comma, count.max) {
            (false, _) => Some(min),
            (true, None) => None,
            (true, Some(m)) => Some(limit(m)?),
        };
        if max.is_some_and(|m| m < min) {
            return Err(Error::syntax(SyntaxErrorKind::BadRepeatBounds, at));
        }
        Ok((min, max))
    }

    /// Parse a single atom (literal, class, group, anchor, etc.)
    fn parse_atom(&mut self) -> Result<AstNode> {
        match self.peek() {
            None => Err(Error::syntax(SyntaxErrorKind::NothingToRepeat, self.pos)),
            Some('(') => self.parse_group(),
            Some('[') => self.parse_char_class(),
            Some('.') => {
                self.advance();
                Ok(AstNode::Dot)
            }
            Some('^') => {
                self.advance();
                Ok(AstNode::Anchor(AnchorKind::Start))
            }
            Some('$') => {
                self.advance();
                Ok(AstNode::Anchor(AnchorKind::End))
            }
            Some('\\') => match self.parse_escape(false)? {
                Escaped::Char(ch) => Ok(AstNode::Literal(ch)),
                Escaped::Shorthand(kind) => Ok(AstNode::CharClass {
                    items: vec![ClassItem::Shorthand(kind)],
                    negated: false,
                }),
                Escaped::Anchor(kind) => Ok(AstNode::Anchor(kind)),
            },
            Some('*' | '+' | '?') => Err(Error::syntax(SyntaxErrorKind::NothingToRepeat, self.pos)),
            Some('{') if self.scan_brace(self.pos).is_some() => {
                Err(Error::syntax(SyntaxErrorKind::NothingToRepeat, self.pos))
            }
            Some(ch) => {
                self.advance();
                Ok(AstNode::Literal(ch))
            }
        }
    }

    /// Parse an escape sequence. Inside a class `\b` is a backspace and anchors are invalid.
    fn parse_escape(&mut self, in_class: bool) -> Result<Escaped> {
        let start = self.pos;
        self.advance(); // consume '\\'
        let Some(ch) = self.advance() else {
            return Err(Error::syntax(SyntaxErrorKind::TrailingBackslash, start));
        };
        let escaped = match ch {
            'd' => Escaped::Shorthand(ShorthandKind::Digit),
            'D' => Escaped::Shorthand(ShorthandKind::NonDigit),
            'w' => Escaped::Shorthand(ShorthandKind::Word),
            'W' => Escaped::Shorthand(ShorthandKind::NonWord),
            's' => Escaped::Shorthand(ShorthandKind::Space),
            'S' => Escaped::Shorthand(ShorthandKind::NonSpace),
            'b' if in_class => Escaped::Char('\x08'),
            'b' => Escaped::Anchor(AnchorKind::WordBoundary),
            'B' if !in_class => Escaped::Anchor(AnchorKind::NonWordBoundary),
            'n' => Escaped::Char('\n'),
            'r' => Escaped::Char('\r'),
            't' => Escaped::Char('\t'),
            'f' => Escaped::Char('\x0c'),
            'v' => Escaped::Char('\x0b'),
            'a' => Escaped::Char('\x07'),
            '0' => Escaped::Char('\0'),
            'x' => Escaped::Char(self.parse_hex_escape(start)?),
            '1'..='9' => {
                return Err(Error::syntax(
                    SyntaxErrorKind::UnsupportedBackreference(ch),
                    start,
                ));
            }
            c if c.is_ascii_alphanumeric() => {
                return Err(Error::syntax(SyntaxErrorKind::BadEscape(c), start));
            }
            // Escaped literal: \., \*, \\, etc.
            c => Escaped::Char(c),
        };
        Ok(escaped)
    }

    /// Two hex digits following `\x`.
    fn parse_hex_escape(&mut self, start: usize) -> Result<char> {
        let bad = Error::syntax(SyntaxErrorKind::BadEscape('x'), start);
        let mut value = 0u32;
        for _ in 0..2 {
            let digit = self.peek().and_then(|c| c.to_digit(16)).ok_or(bad.clone())?;
            self.advance();
            value = value * 16 + digit;
        }
        char::from_u32(value).ok_or(bad)
    }

    /// Parse a group: `(...)` or `(?:...)`.
    fn parse_group(&mut self) -> Result<AstNode> {
        let open = self.pos;
        self.advance(); // consume '('

        let capture = if self.peek() == Some('?') {
            self.advance(); // consume '?'
            match self.advance() {
                Some(':') => None,
                Some(c) => {
                    return Err(Error::syntax(SyntaxErrorKind::UnsupportedGroup(c), open));
                }
                None => return Err(Error::syntax(SyntaxErrorKind::MissingParen, open)),
            }
        } else {
            // Numbered by the position of the opening parenthesis
            self.group_count += 1;
            Some(self.group_count)
        };

        let node = Box::new(self.parse_alternation()?);
        if self.advance() != Some(')') {
            return Err(Error::syntax(SyntaxErrorKind::MissingParen, open));
        }
        Ok(match capture {
            Some(index) => AstNode::Group { index, node },
            None => AstNode::NonCapturingGroup { node },
        })
    }

    /// Parse a character class: `[abc]`, `[a-z]`, `[^abc]`.
    fn parse_char_class(&mut self) -> Result<AstNode> {
        let open = self.pos;
        self.advance(); // consume '['
        let negated = if self.peek() == Some('^') {
            self.advance();
            true
        } else {
            false
        };

        let mut items = Vec::new();
        // Allow ']' as first character in class
        if self.peek() == Some(']') {
            self.advance();
            items.push(ClassItem::Literal(']'));
        }

        loop {
            let member = match self.peek() {
                None => return Err(Error::syntax(SyntaxErrorKind::UnterminatedClass, open)),
                Some(']') => break,
                Some('\\') => self.parse_escape(true)?,
                Some(ch) => {
                    self.advance();
                    Escaped::Char(ch)
                }
            };
            let lo = match member {
                Escaped::Char(ch) => ch,
                Escaped::Shorthand(kind) => {
                    items.push(ClassItem::Shorthand(kind));
                    continue;
                }
                Escaped::Anchor(_) => unreachable!("anchors are not parsed inside classes"),
            };
            // Check for range like a-z
            let is_range = self.peek() == Some('-')
                && !matches!(self.peek_at(self.pos + 1), None | Some(']'));
            if !is_range {
                items.push(ClassItem::Literal(lo));
                continue;
            }
            self.advance(); // consume '-'
            let hi = match self.peek() {
                Some('\\') => self.parse_escape(true)?,
                Some(c) => {
                    self.advance();
                    Escaped::Char(c)
                }
                None => return Err(Error::syntax(SyntaxErrorKind::UnterminatedClass, open)),
            };
            match hi {
                Escaped::Char(hi) if hi < lo => {
                    return Err(Error::syntax(SyntaxErrorKind::BadRange(lo, hi), open));
                }
                Escaped::Char(hi) => items.push(ClassItem::Range(lo, hi)),
                Escaped::Shorthand(_) => {
                    // Shorthand escapes are always two chars; report the letter
                    let letter = self.chars[self.pos - 1];
                    return Err(Error::syntax(SyntaxErrorKind::BadRangeEnd(lo, letter), open));
                }
                Escaped::Anchor(_) => unreachable!("anchors are not parsed inside classes"),
            }
        }
        self.advance(); // consume ']'
        Ok(AstNode::CharClass { items, negated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(pattern: &str) -> Result<AstNode> {
        Parser::new(pattern).parse()
    }

    fn syntax_kind(pattern: &str) -> SyntaxErrorKind {
        match parse(pattern) {
            Err(Error::Syntax { kind, .. }) => kind,
            other => panic!("expected syntax error for {pattern:?}, got {other:?}"),
        }
    }

    #[test]
    fn groups_are_numbered_by_opening_paren() {
        let mut parser = Parser::new("((a)(b))(c)");
        let ast = parser.parse().unwrap();
        assert_eq!(parser.group_count(), 4);
        let AstNode::Concat(parts) = ast else {
            panic!("expected concat");
        };
        let AstNode::Group { index, node } = &parts[0] else {
            panic!("expected outer group");
        };
        assert_eq!(*index, 1);
        let AstNode::Concat(inner) = node.as_ref() else {
            panic!("expected inner concat");
        };
        assert!(matches!(inner[0], AstNode::Group { index: 2, .. }));
        assert!(matches!(inner[1], AstNode::Group { index: 3, .. }));
        assert!(matches!(parts[1], AstNode::Group { index: 4, .. }));
    }

    #[test]
    fn lazy_and_counted_quantifiers() {
        assert_eq!(
            parse("a*?").unwrap(),
            AstNode::Quantifier {
                node: Box::new(AstNode::Literal('a')),
                min: 0,
                max: None,
                greedy: false,
            }
        );
        assert!(matches!(
            parse("a{2,5}").unwrap(),
            AstNode::Quantifier { min: 2, max: Some(5), greedy: true, .. }
        ));
        assert!(matches!(
            parse("a{,3}?").unwrap(),
            AstNode::Quantifier { min: 0, max: Some(3), greedy: false, .. }
        ));
        assert!(matches!(
            parse("a{4,}").unwrap(),
            AstNode::Quantifier { min: 4, max: None, .. }
        ));
    }

    #[test]
    fn brace_that_is_not_a_count_is_literal() {
        assert_eq!(
            parse("a{x}").unwrap(),
            AstNode::Concat(vec![
                AstNode::Literal('a'),
                AstNode::Literal('{'),
                AstNode::Literal('x'),
                AstNode::Literal('}'),
            ])
        );
        assert_eq!(parse("{").unwrap(), AstNode::Literal('{'));
    }

    #[test]
    fn class_ranges_negation_and_escapes() {
        assert_eq!(
            parse("[^\",]").unwrap(),
            AstNode::CharClass {
                items: vec![ClassItem::Literal('"'), ClassItem::Literal(',')],
                negated: true,
            }
        );
        assert_eq!(
            parse("[]a-c\\d-]").unwrap(),
            AstNode::CharClass {
                items: vec![
                    ClassItem::Literal(']'),
                    ClassItem::Range('a', 'c'),
                    ClassItem::Shorthand(ShorthandKind::Digit),
                    ClassItem::Literal('-'),
                ],
                negated: false,
            }
        );
    }

    #[test]
    fn escapes_map_to_classes_and_literals() {
        assert_eq!(parse("\\.").unwrap(), AstNode::Literal('.'));
        assert_eq!(parse("\\\\").unwrap(), AstNode::Literal('\\'));
        assert_eq!(parse("\\n").unwrap(), AstNode::Literal('\n'));
        assert_eq!(parse("\\x41").unwrap(), AstNode::Literal('A'));
        assert_eq!(
            parse("\\b").unwrap(),
            AstNode::Anchor(AnchorKind::WordBoundary)
        );
        assert!(matches!(parse("\\w").unwrap(), AstNode::CharClass { negated: false, .. }));
    }

    #[test]
    fn empty_pattern_and_empty_branches() {
        assert_eq!(parse("").unwrap(), AstNode::Concat(vec![]));
        assert_eq!(
            parse("a|").unwrap(),
            AstNode::Alternation(vec![AstNode::Literal('a'), AstNode::Concat(vec![])])
        );
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        assert_eq!(syntax_kind("(ab"), SyntaxErrorKind::MissingParen);
        assert_eq!(syntax_kind("ab)"), SyntaxErrorKind::UnbalancedParen);
        assert_eq!(syntax_kind("*a"), SyntaxErrorKind::NothingToRepeat);
        assert_eq!(syntax_kind("a|+"), SyntaxErrorKind::NothingToRepeat);
        assert_eq!(syntax_kind("^*"), SyntaxErrorKind::NothingToRepeat);
        assert_eq!(syntax_kind("{2}"), SyntaxErrorKind::NothingToRepeat);
        assert_eq!(syntax_kind("a**"), SyntaxErrorKind::MultipleRepeat);
        assert_eq!(syntax_kind("a{2}{3}"), SyntaxErrorKind::MultipleRepeat);
        assert_eq!(syntax_kind("a{3,2}"), SyntaxErrorKind::BadRepeatBounds);
        assert_eq!(syntax_kind("a{5000}"), SyntaxErrorKind::RepeatTooLarge);
        assert_eq!(syntax_kind("[abc"), SyntaxErrorKind::UnterminatedClass);
        assert_eq!(syntax_kind("[z-a]"), SyntaxErrorKind::BadRange('z', 'a'));
        assert_eq!(syntax_kind("[a-\\d]"), SyntaxErrorKind::BadRangeEnd('a', 'd'));
        assert_eq!(syntax_kind("[0-\\W]"), SyntaxErrorKind::BadRangeEnd('0', 'W'));
        assert_eq!(syntax_kind("\\q"), SyntaxErrorKind::BadEscape('q'));
        assert_eq!(syntax_kind("\\x4"), SyntaxErrorKind::BadEscape('x'));
        assert_eq!(syntax_kind("ab\\"), SyntaxErrorKind::TrailingBackslash);
        assert_eq!(syntax_kind("(a)\\1"), SyntaxErrorKind::UnsupportedBackreference('1'));
        assert_eq!(syntax_kind("(?=a)"), SyntaxErrorKind::UnsupportedGroup('='));
    }

    #[test]
    fn error_positions_point_at_the_offending_character() {
        assert_eq!(
            parse("ab(cd"),
            Err(Error::syntax(SyntaxErrorKind::MissingParen, 2))
        );
        assert_eq!(
            parse("abc**"),
            Err(Error::syntax(SyntaxErrorKind::MultipleRepeat, 4))
        );
    }
}

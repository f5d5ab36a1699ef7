//! AST types for the pattern engine.

/// A single node in the pattern AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstNode {
    /// Matches a single literal character.
    Literal(char),
    /// Matches any character (except newline unless dot-all is set).
    Dot,
    /// Concatenation of nodes (implicit in `ab`). May be empty.
    Concat(Vec<AstNode>),
    /// Alternation (`a|b`).
    Alternation(Vec<AstNode>),
    /// Repetition of a sub-expression between `min` and `max` times.
    /// `max` of `None` means unbounded.
    Quantifier {
        node: Box<AstNode>,
        min: u32,
        max: Option<u32>,
        greedy: bool,
    },
    /// Character class like `[abc]`, `[a-z]`, `[^abc]`, or a shorthand like `\d`.
    CharClass {
        items: Vec<ClassItem>,
        negated: bool,
    },
    /// Anchor: `^`, `$`, `\b`, `\B`.
    Anchor(AnchorKind),
    /// Capturing group `(...)` with its 1-based index.
    Group {
        index: usize,
        node: Box<AstNode>,
    },
    /// Non-capturing group `(?:...)`.
    NonCapturingGroup {
        node: Box<AstNode>,
    },
}

/// Item within a character class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassItem {
    /// Single character.
    Literal(char),
    /// Character range `a-z`.
    Range(char, char),
    /// Shorthand within a class, e.g. `[\d]`.
    Shorthand(ShorthandKind),
}

/// Shorthand character class kind. Membership follows ASCII conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShorthandKind {
    /// `\d` — digits.
    Digit,
    /// `\D` — non-digits.
    NonDigit,
    /// `\w` — word characters.
    Word,
    /// `\W` — non-word characters.
    NonWord,
    /// `\s` — whitespace.
    Space,
    /// `\S` — non-whitespace.
    NonSpace,
}

impl ShorthandKind {
    pub fn matches(self, ch: char) -> bool {
        match self {
            ShorthandKind::Digit => ch.is_ascii_digit(),
            ShorthandKind::NonDigit => !ch.is_ascii_digit(),
            ShorthandKind::Word => is_word_char(ch),
            ShorthandKind::NonWord => !is_word_char(ch),
            ShorthandKind::Space => is_space(ch),
            ShorthandKind::NonSpace => !is_space(ch),
        }
    }
}

impl ClassItem {
    pub fn matches(&self, ch: char) -> bool {
        match *self {
            ClassItem::Literal(c) => ch == c,
            ClassItem::Range(lo, hi) => lo <= ch && ch <= hi,
            ClassItem::Shorthand(kind) => kind.matches(ch),
        }
    }
}

/// ASCII word character: `[A-Za-z0-9_]`.
pub fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

// `is_ascii_whitespace` leaves out vertical tab.
fn is_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

/// Pattern flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    /// Case-insensitive matching.
    pub case_insensitive: bool,
    /// Multiline mode: `^` and `$` match at line boundaries.
    pub multiline: bool,
    /// Dotall mode: `.` matches newline.
    pub dot_all: bool,
}

impl Flags {
    /// Flags with only case-insensitive matching turned on.
    pub fn ignore_case() -> Self {
        Flags {
            case_insensitive: true,
            ..Flags::default()
        }
    }
}

/// Anchor kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorKind {
    /// `^` — start of string (or line, in multiline mode).
    Start,
    /// `$` — end of string (or line, in multiline mode).
    End,
    /// `\b` — word boundary.
    WordBoundary,
    /// `\B` — non-word boundary.
    NonWordBoundary,
}

impl AstNode {
    /// Whether this node can succeed without consuming any input.
    pub fn can_match_empty(&self) -> bool {
        match self {
            AstNode::Literal(_) | AstNode::Dot | AstNode::CharClass { .. } => false,
            AstNode::Anchor(_) => true,
            AstNode::Concat(nodes) => nodes.iter().all(AstNode::can_match_empty),
            AstNode::Alternation(branches) => branches.iter().any(AstNode::can_match_empty),
            AstNode::Quantifier { node, min, .. } => *min == 0 || node.can_match_empty(),
            AstNode::Group { node, .. } | AstNode::NonCapturingGroup { node } => {
                node.can_match_empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_membership_is_ascii() {
        assert!(ShorthandKind::Digit.matches('7'));
        assert!(!ShorthandKind::Digit.matches('٣'));
        assert!(ShorthandKind::Word.matches('_'));
        assert!(!ShorthandKind::Word.matches('é'));
        assert!(ShorthandKind::Space.matches('\x0b'));
        assert!(ShorthandKind::NonSpace.matches('x'));
    }

    #[test]
    fn empty_match_analysis() {
        let star = AstNode::Quantifier {
            node: Box::new(AstNode::Literal('x')),
            min: 0,
            max: None,
            greedy: true,
        };
        assert!(star.can_match_empty());
        assert!(!AstNode::Concat(vec![AstNode::Literal('a'), star.clone()]).can_match_empty());
        assert!(AstNode::Alternation(vec![AstNode::Literal('a'), AstNode::Concat(vec![])])
            .can_match_empty());
    }
}

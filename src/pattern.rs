//! Compiled patterns and the search, find-all and substitution API.

use std::fmt;

use crate::ast::{AstNode, Flags};
use crate::compiler::{self, Program};
use crate::error::Result;
use crate::matched::Match;
use crate::parser::Parser;
use crate::replace::Template;
use crate::vm;

/// Step budget used when the builder is not told otherwise.
pub const DEFAULT_STEP_LIMIT: usize = 5_000_000;

/// A compiled pattern. Immutable once built, so one value can serve any
/// number of searches, from any number of threads.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    ast: AstNode,
    program: Program,
    step_limit: Option<usize>,
}

/// Configures and compiles a [`Pattern`].
#[derive(Debug, Clone)]
pub struct PatternBuilder {
    source: String,
    flags: Flags,
    step_limit: Option<usize>,
}

impl PatternBuilder {
    pub fn new(pattern: &str) -> Self {
        PatternBuilder {
            source: pattern.to_string(),
            flags: Flags::default(),
            step_limit: Some(DEFAULT_STEP_LIMIT),
        }
    }

    /// Replace all flags at once.
    pub fn flags(&mut self, flags: Flags) -> &mut Self {
        self.flags = flags;
        self
    }

    pub fn case_insensitive(&mut self, yes: bool) -> &mut Self {
        self.flags.case_insensitive = yes;
        self
    }

    /// `^` and `$` also match around every `\n`.
    pub fn multiline(&mut self, yes: bool) -> &mut Self {
        self.flags.multiline = yes;
        self
    }

    /// `.` also matches `\n`.
    pub fn dot_all(&mut self, yes: bool) -> &mut Self {
        self.flags.dot_all = yes;
        self
    }

    /// Maximum VM steps per search call; `None` disables the guard.
    pub fn step_limit(&mut self, limit: Option<usize>) -> &mut Self {
        self.step_limit = limit;
        self
    }

    pub fn build(&self) -> Result<Pattern> {
        let mut parser = Parser::new(&self.source);
        let ast = parser.parse()?;
        let program = compiler::compile(&ast, parser.group_count(), self.flags)?;
        Ok(Pattern {
            source: self.source.clone(),
            ast,
            program,
            step_limit: self.step_limit,
        })
    }
}

impl Pattern {
    /// Compile `pattern` with default flags.
    pub fn new(pattern: &str) -> Result<Self> {
        PatternBuilder::new(pattern).build()
    }

    /// The pattern text this was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> Flags {
        self.program.flags
    }

    /// Number of capture groups, not counting the whole match.
    pub fn group_count(&self) -> usize {
        self.program.n_groups
    }

    pub fn ast(&self) -> &AstNode {
        &self.ast
    }

    pub fn step_limit(&self) -> Option<usize> {
        self.step_limit
    }

    /// First match anywhere in `subject`.
    pub fn search<'t>(&self, subject: &'t str) -> Result<Option<Match<'t>>> {
        self.search_at(subject, 0)
    }

    /// First match starting at byte offset `start` or later. `^` still only
    /// matches at the real start of the subject (or of a line, in multiline mode).
    pub fn search_at<'t>(&self, subject: &'t str, start: usize) -> Result<Option<Match<'t>>> {
        let slots = vm::search(&self.program, subject, start, self.step_limit)?;
        Ok(slots.map(|slots| Match::new(subject, slots)))
    }

    /// Match only at the very start of `subject`.
    pub fn match_start<'t>(&self, subject: &'t str) -> Result<Option<Match<'t>>> {
        let slots = vm::match_at(&self.program, subject, 0, self.step_limit)?;
        Ok(slots.map(|slots| Match::new(subject, slots)))
    }

    pub fn is_match(&self, subject: &str) -> Result<bool> {
        Ok(self.search(subject)?.is_some())
    }

    /// All non-overlapping matches, left to right, found lazily.
    pub fn find_all<'p, 't>(&'p self, subject: &'t str) -> Matches<'p, 't> {
        Matches {
            pattern: self,
            subject,
            next_start: 0,
            done: false,
        }
    }

    /// Replace every match with the expansion of `replacement`.
    pub fn substitute(&self, subject: &str, replacement: &str) -> Result<String> {
        self.substitute_n(subject, replacement, 0)
    }

    /// Replace at most `limit` matches; 0 means all of them.
    pub fn substitute_n(&self, subject: &str, replacement: &str, limit: usize) -> Result<String> {
        // Template errors surface even when nothing matches
        let template = Template::parse(replacement, self.group_count())?;
        let mut out = String::with_capacity(subject.len());
        let mut last_end = 0;
        let limit = if limit == 0 { usize::MAX } else { limit };
        for found in self.find_all(subject).take(limit) {
            let m = found?;
            out.push_str(&subject[last_end..m.start()]);
            match template.as_literal() {
                Some(text) => out.push_str(text),
                None => template.expand(&m, &mut out),
            }
            last_end = m.end();
        }
        out.push_str(&subject[last_end..]);
        Ok(out)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("source", &self.source)
            .field("flags", &self.program.flags)
            .field("groups", &self.program.n_groups)
            .finish()
    }
}

/// Iterator over successive non-overlapping matches.
///
/// After a match ending at `e` the next search starts at `e`, or one char
/// further if the match was empty, so the iterator always makes progress.
/// Stops for good after the last match or after an error.
#[derive(Debug, Clone)]
pub struct Matches<'p, 't> {
    pattern: &'p Pattern,
    subject: &'t str,
    next_start: usize,
    done: bool,
}

impl<'p, 't> Matches<'p, 't> {
    pub fn subject(&self) -> &'t str {
        self.subject
    }

    pub fn pattern(&self) -> &'p Pattern {
        self.pattern
    }
}

impl<'p, 't> Iterator for Matches<'p, 't> {
    type Item = Result<Match<'t>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next_start > self.subject.len() {
            self.done = true;
            return None;
        }
        let found = match self.pattern.search_at(self.subject, self.next_start) {
            Ok(Some(m)) => m,
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        self.next_start = if found.is_empty() {
            // Step over one char; past the end means we're finished
            self.subject[found.end()..]
                .chars()
                .next()
                .map_or(self.subject.len() + 1, |ch| found.end() + ch.len_utf8())
        } else {
            found.end()
        };
        Some(Ok(found))
    }
}

impl std::iter::FusedIterator for Matches<'_, '_> {}

/// Compile `pattern` with `flags`.
pub fn compile(pattern: &str, flags: Flags) -> Result<Pattern> {
    PatternBuilder::new(pattern).flags(flags).build()
}

/// One-shot search.
pub fn search<'t>(pattern: &str, subject: &'t str, flags: Flags) -> Result<Option<Match<'t>>> {
    compile(pattern, flags)?.search(subject)
}

/// One-shot find-all, collected.
pub fn find_all<'t>(pattern: &str, subject: &'t str, flags: Flags) -> Result<Vec<Match<'t>>> {
    compile(pattern, flags)?.find_all(subject).collect()
}

/// One-shot substitution.
pub fn substitute(pattern: &str, subject: &str, replacement: &str, flags: Flags) -> Result<String> {
    compile(pattern, flags)?.substitute(subject, replacement)
}

/// Escape every metacharacter in `text` so the result matches it literally.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
            | '-' | '#' | '&' | '~' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            '\x0c' => out.push_str("\\f"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn texts<'t>(pattern: &Pattern, subject: &'t str) -> Vec<&'t str> {
        pattern
            .find_all(subject)
            .map(|m| m.unwrap().as_str())
            .collect()
    }

    #[test]
    fn find_all_makes_progress_on_empty_matches() {
        let p = Pattern::new("x*").unwrap();
        let spans: Vec<_> = p.find_all("abxd").map(|m| m.unwrap().span()).collect();
        assert_eq!(spans, vec![(0, 0), (1, 1), (2, 3), (3, 3), (4, 4)]);
        let spans: Vec<_> = p.find_all("").map(|m| m.unwrap().span()).collect();
        assert_eq!(spans, vec![(0, 0)]);
    }

    #[test]
    fn find_all_steps_over_whole_chars() {
        let p = Pattern::new("").unwrap();
        let spans: Vec<_> = p.find_all("é").map(|m| m.unwrap().span()).collect();
        assert_eq!(spans, vec![(0, 0), (2, 2)]);
    }

    #[test]
    fn find_all_is_fused_after_exhaustion() {
        let p = Pattern::new("a").unwrap();
        let mut it = p.find_all("a");
        assert!(it.next().is_some());
        assert!(it.next().is_none());
        assert!(it.next().is_none());
    }

    #[test]
    fn anchored_pattern_matches_once() {
        let p = Pattern::new("^a").unwrap();
        assert_eq!(texts(&p, "aaa"), vec!["a"]);
    }

    #[test]
    fn substitute_copies_unmatched_text() {
        let p = Pattern::new("x*").unwrap();
        assert_eq!(p.substitute("abxd", "-").unwrap(), "-a-b--d-");
        let p = Pattern::new("(\\w+)@(\\w+)").unwrap();
        assert_eq!(
            p.substitute("mail bob@home now", "\\2 at \\1").unwrap(),
            "mail home at bob now"
        );
    }

    #[test]
    fn substitute_n_limits_replacements() {
        let p = Pattern::new("\\d").unwrap();
        assert_eq!(p.substitute_n("a1b2c3", "#", 2).unwrap(), "a#b#c3");
        assert_eq!(p.substitute_n("a1b2c3", "#", 0).unwrap(), "a#b#c#");
    }

    #[test]
    fn substitute_validates_template_before_scanning() {
        let p = Pattern::new("(a)").unwrap();
        assert_eq!(
            p.substitute("zzz", "\\2"),
            Err(Error::UnknownGroup {
                group: 2,
                group_count: 1
            })
        );
    }

    #[test]
    fn step_limit_surfaces_from_iteration() {
        let p = PatternBuilder::new("(a*)*b")
            .step_limit(Some(1_000))
            .build()
            .unwrap();
        let subject = "a".repeat(25);
        let results: Vec<_> = p.find_all(&subject).collect();
        assert_eq!(results, vec![Err(Error::StepLimitExceeded { limit: 1_000 })]);
        assert!(p.substitute(&subject, "").is_err());
    }

    #[test]
    fn default_budget_covers_long_scans_without_a_match() {
        let p = Pattern::new("ab").unwrap();
        assert_eq!(p.step_limit(), Some(DEFAULT_STEP_LIMIT));
        let subject = "a".repeat(3_000_000);
        assert!(!p.is_match(&subject).unwrap());
        assert!(Pattern::new("\\d").unwrap().search(&"x".repeat(6_000_000)).unwrap().is_none());
    }

    #[test]
    fn nested_counts_are_rejected_not_expanded() {
        assert!(matches!(
            Pattern::new("(?:(?:(?:a{1000}){1000}){1000})"),
            Err(Error::Syntax { kind: crate::error::SyntaxErrorKind::PatternTooLarge, .. })
        ));
    }

    #[test]
    fn octal_template_escape_is_not_the_whole_match() {
        let p = Pattern::new("a").unwrap();
        assert_eq!(p.substitute("a", "[\\0]").unwrap(), "[\0]");
        assert_eq!(p.substitute("a", "[\\g<0>]").unwrap(), "[a]");
    }

    #[test]
    fn accessors_expose_what_was_compiled() {
        let p = PatternBuilder::new("h(a)t").step_limit(None).build().unwrap();
        assert_eq!(p.as_str(), "h(a)t");
        assert_eq!(p.group_count(), 1);
        assert_eq!(p.step_limit(), None);
        assert!(matches!(p.ast(), AstNode::Concat(parts) if parts.len() == 3));
        assert!(p.is_match("that").unwrap());
        assert!(!p.is_match("hot").unwrap());

        let subject = "hat, hat";
        let mut matches = p.find_all(subject);
        assert_eq!(matches.subject(), subject);
        assert_eq!(matches.pattern().as_str(), "h(a)t");
        let second = matches.nth(1).unwrap().unwrap();
        assert_eq!(second.subject(), subject);
        assert_eq!(second.span(), (5, 8));
    }

    #[test]
    fn match_start_is_anchored() {
        let p = Pattern::new("\\d+").unwrap();
        assert!(p.match_start("a1").unwrap().is_none());
        assert_eq!(p.match_start("12a").unwrap().unwrap().as_str(), "12");
    }

    #[test]
    fn builder_flags() {
        let p = PatternBuilder::new("^b.c$")
            .multiline(true)
            .dot_all(true)
            .case_insensitive(true)
            .build()
            .unwrap();
        assert_eq!(texts(&p, "a\nB\nC\nd"), vec!["B\nC"]);
        assert_eq!(p.flags(), Flags { case_insensitive: true, multiline: true, dot_all: true });
    }

    #[test]
    fn escape_round_trips_metacharacters() {
        let text = "a.b*c(d)[e]{f}|g^h$i\\j?k+l";
        let p = Pattern::new(&escape(text)).unwrap();
        let found = p.search(text).unwrap().unwrap();
        assert_eq!(found.span(), (0, text.len()));
    }

    #[test]
    fn patterns_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pattern>();

        let p = Pattern::new("\\d+").unwrap();
        std::thread::scope(|s| {
            let handles: Vec<_> = ["a1", "b22", "c333"]
                .into_iter()
                .map(|subject| {
                    let p = &p;
                    s.spawn(move || p.search(subject).unwrap().unwrap().len())
                })
                .collect();
            let lens: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert_eq!(lens, vec![1, 2, 3]);
        });
    }
}

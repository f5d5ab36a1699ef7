//! Match results.

use std::fmt;
use std::ops::Range;

use crate::vm::Slots;

/// A single successful match of a pattern against a subject.
///
/// Offsets are byte offsets into the subject and always fall on char
/// boundaries, so `&subject[m.start()..m.end()]` is always valid.
#[derive(Clone, PartialEq, Eq)]
pub struct Match<'t> {
    subject: &'t str,
    slots: Slots,
}

impl<'t> Match<'t> {
    pub(crate) fn new(subject: &'t str, slots: Slots) -> Self {
        debug_assert!(slots.len() >= 2 && slots.len() % 2 == 0);
        Match { subject, slots }
    }

    /// Start offset of the whole match.
    pub fn start(&self) -> usize {
        self.slots[0].unwrap_or(0)
    }

    /// End offset (exclusive) of the whole match.
    pub fn end(&self) -> usize {
        self.slots[1].unwrap_or(0)
    }

    /// `(start, end)` of the whole match.
    pub fn span(&self) -> (usize, usize) {
        (self.start(), self.end())
    }

    pub fn range(&self) -> Range<usize> {
        self.start()..self.end()
    }

    pub fn len(&self) -> usize {
        self.end() - self.start()
    }

    pub fn is_empty(&self) -> bool {
        self.start() == self.end()
    }

    /// The matched text.
    pub fn as_str(&self) -> &'t str {
        &self.subject[self.range()]
    }

    /// The subject this match was found in.
    pub fn subject(&self) -> &'t str {
        self.subject
    }

    /// Number of capture groups in the pattern, not counting group 0.
    pub fn group_count(&self) -> usize {
        self.slots.len() / 2 - 1
    }

    /// Span of group `index`. Group 0 is the whole match. `None` if the
    /// index is out of range or the group did not take part in the match.
    pub fn group_span(&self, index: usize) -> Option<(usize, usize)> {
        let start = (*self.slots.get(index * 2)?)?;
        let end = (*self.slots.get(index * 2 + 1)?)?;
        Some((start, end))
    }

    /// Text of group `index`. Group 0 is the whole match.
    pub fn group(&self, index: usize) -> Option<&'t str> {
        self.group_span(index)
            .map(|(start, end)| &self.subject[start..end])
    }

    /// Texts of groups 1.. in order.
    pub fn groups(&self) -> impl Iterator<Item = Option<&'t str>> + '_ {
        (1..=self.group_count()).map(|i| self.group(i))
    }
}

impl fmt::Debug for Match<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("span", &self.range())
            .field("text", &self.as_str())
            .field("groups", &self.groups().collect::<Vec<_>>())
            .finish()
    }
}

//! VM executor: runs compiled bytecode against an input string.
//!
//! Backtracking is driven by an explicit stack of choice-points rather than
//! recursion, so deep inputs cannot overflow the native stack. Slot writes
//! are recorded in an undo log and rolled back when a choice-point resumes.
//! Every executed instruction costs one step against an optional budget,
//! which is refilled at each start offset a search tries.
//!
//! Positions are byte offsets into the subject, always on char boundaries.

use crate::ast::{ClassItem, is_word_char};
use crate::compiler::{Inst, Program};
use crate::error::{Error, Result};

/// Capture slots of a successful match: `2*i` is the start of group `i`,
/// `2*i+1` its end. Group 0 is the whole match.
pub type Slots = Vec<Option<usize>>;

/// A place to resume from when the current path fails.
struct Choice {
    pc: usize,
    pos: usize,
    /// Undo-log length when the choice was recorded.
    undo_len: usize,
}

/// An entry in the undo log: (slot_index, old_value).
type UndoEntry = (usize, Option<usize>);

/// Match state for one search call. Owned by that call alone.
struct Vm<'p, 's> {
    program: &'p Program,
    subject: &'s str,
    slots: Slots,
    undo_log: Vec<UndoEntry>,
    stack: Vec<Choice>,
    steps: usize,
    step_limit: Option<usize>,
}

/// Try to find a match starting at `start` or any later char boundary
/// (like `re.search`).
pub fn search(
    program: &Program,
    subject: &str,
    start: usize,
    step_limit: Option<usize>,
) -> Result<Option<Slots>> {
    if start > subject.len() {
        return Ok(None);
    }
    let mut start = start;
    while !subject.is_char_boundary(start) {
        start += 1;
    }

    let mut vm = Vm::new(program, subject, step_limit);

    // If anchored at start, only offset 0 can match
    if program.anchored_start {
        if start != 0 {
            return Ok(None);
        }
        return vm.attempt(0);
    }

    let mut at = start;
    loop {
        // First-char optimization: jump straight to the next occurrence of the required char
        if let Some(fc) = program.first_char {
            match subject[at..].find(fc) {
                Some(offset) => at += offset,
                None => return Ok(None),
            }
        }
        if let Some(slots) = vm.attempt(at)? {
            return Ok(Some(slots));
        }
        match subject[at..].chars().next() {
            Some(ch) => at += ch.len_utf8(),
            None => return Ok(None),
        }
    }
}

/// Try to match exactly at `at` (like `re.match`).
pub fn match_at(
    program: &Program,
    subject: &str,
    at: usize,
    step_limit: Option<usize>,
) -> Result<Option<Slots>> {
    if at > subject.len() || !subject.is_char_boundary(at) {
        return Ok(None);
    }
    Vm::new(program, subject, step_limit).attempt(at)
}

impl<'p, 's> Vm<'p, 's> {
    fn new(program: &'p Program, subject: &'s str, step_limit: Option<usize>) -> Self {
        Vm {
            program,
            subject,
            slots: vec![None; program.n_slots],
            undo_log: Vec::new(),
            stack: Vec::new(),
            steps: 0,
            step_limit,
        }
    }

    fn attempt(&mut self, start: usize) -> Result<Option<Slots>> {
        log::trace!("attempting match at offset {start}");
        self.steps = 0;
        if self.exec(start)? {
            let n_capture_slots = (self.program.n_groups + 1) * 2;
            Ok(Some(self.slots[..n_capture_slots].to_vec()))
        } else {
            Ok(None)
        }
    }

    /// Run the program anchored at `start`. Returns true if a match is found.
    fn exec(&mut self, start: usize) -> Result<bool> {
        self.slots.fill(None);
        self.undo_log.clear();
        self.stack.clear();
        self.slots[0] = Some(start);

        let program = self.program;
        let mut pc = 0;
        let mut pos = start;

        loop {
            self.tick()?;
            let advanced = match &program.insts[pc] {
                Inst::Match => {
                    // Record end of full match
                    self.slots[1] = Some(pos);
                    return Ok(true);
                }
                Inst::Char(expected) => match self.char_at(pos) {
                    Some(ch) if self.char_eq(ch, *expected) => {
                        pos += ch.len_utf8();
                        pc += 1;
                        true
                    }
                    _ => false,
                },
                Inst::AnyChar => match self.char_at(pos) {
                    Some(ch) if ch != '\n' || program.flags.dot_all => {
                        pos += ch.len_utf8();
                        pc += 1;
                        true
                    }
                    _ => false,
                },
                Inst::CharClass { items, negated } => match self.char_at(pos) {
                    Some(ch) if self.class_matches(ch, items) != *negated => {
                        pos += ch.len_utf8();
                        pc += 1;
                        true
                    }
                    _ => false,
                },
                Inst::Jump(target) => {
                    pc = *target;
                    true
                }
                Inst::Split(first, second) => {
                    self.stack.push(Choice {
                        pc: *second,
                        pos,
                        undo_len: self.undo_log.len(),
                    });
                    pc = *first;
                    true
                }
                Inst::Save(slot) | Inst::Mark(slot) => {
                    self.set_slot(*slot, pos);
                    pc += 1;
                    true
                }
                Inst::ExitIfEmpty { slot, exit } => {
                    pc = if self.slots[*slot] == Some(pos) {
                        *exit
                    } else {
                        pc + 1
                    };
                    true
                }
                Inst::AssertStart => {
                    let ok = pos == 0 || (program.flags.multiline && self.char_before(pos) == Some('\n'));
                    pc += 1;
                    ok
                }
                Inst::AssertEnd => {
                    let ok = self.at_end(pos);
                    pc += 1;
                    ok
                }
                Inst::AssertWordBoundary => {
                    pc += 1;
                    self.is_word_boundary(pos)
                }
                Inst::AssertNonWordBoundary => {
                    pc += 1;
                    !self.is_word_boundary(pos)
                }
                Inst::Nop => {
                    pc += 1;
                    true
                }
            };

            if !advanced {
                let Some(choice) = self.stack.pop() else {
                    return Ok(false);
                };
                self.undo_to(choice.undo_len);
                pc = choice.pc;
                pos = choice.pos;
            }
        }
    }

    fn tick(&mut self) -> Result<()> {
        self.steps += 1;
        match self.step_limit {
            Some(limit) if self.steps > limit => {
                log::warn!("backtracking step limit of {limit} exceeded");
                Err(Error::StepLimitExceeded { limit })
            }
            _ => Ok(()),
        }
    }

    fn set_slot(&mut self, slot: usize, pos: usize) {
        // Record old value in undo log before overwriting
        self.undo_log.push((slot, self.slots[slot]));
        self.slots[slot] = Some(pos);
    }

    fn undo_to(&mut self, mark: usize) {
        while self.undo_log.len() > mark {
            if let Some((slot, old)) = self.undo_log.pop() {
                self.slots[slot] = old;
            }
        }
    }

    fn char_at(&self, pos: usize) -> Option<char> {
        self.subject[pos..].chars().next()
    }

    fn char_before(&self, pos: usize) -> Option<char> {
        self.subject[..pos].chars().next_back()
    }

    /// `$`: end of subject, before a final newline, or before any newline in multiline mode.
    fn at_end(&self, pos: usize) -> bool {
        if pos == self.subject.len() {
            return true;
        }
        self.char_at(pos) == Some('\n')
            && (self.program.flags.multiline || pos + 1 == self.subject.len())
    }

    fn char_eq(&self, ch: char, expected: char) -> bool {
        ch == expected
            || (self.program.flags.case_insensitive
                && (simple_lower(ch) == simple_lower(expected)
                    || simple_upper(ch) == simple_upper(expected)))
    }

    /// Class membership before negation. Case-insensitive mode also tries the
    /// subject character's simple case mappings.
    fn class_matches(&self, ch: char, items: &[ClassItem]) -> bool {
        let member = |c: char| items.iter().any(|item| item.matches(c));
        member(ch)
            || (self.program.flags.case_insensitive
                && (member(simple_lower(ch)) || member(simple_upper(ch))))
    }

    /// Check if `pos` is at a word boundary.
    fn is_word_boundary(&self, pos: usize) -> bool {
        let before = self.char_before(pos).is_some_and(is_word_char);
        let after = self.char_at(pos).is_some_and(is_word_char);
        before != after
    }
}

/// Lowercase mapping when it is a single char, otherwise the char itself.
fn simple_lower(ch: char) -> char {
    let mut lower = ch.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(c), None) => c,
        _ => ch,
    }
}

fn simple_upper(ch: char) -> char {
    let mut upper = ch.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(c), None) => c,
        _ => ch,
    }
}

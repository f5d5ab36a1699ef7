//! Compiler: converts AST into bytecode instructions for the VM.

use crate::ast::*;
use crate::error::{Error, Result, SyntaxErrorKind};

/// Largest program the compiler will build. Counted repeats are expanded
/// into copies, so nesting them multiplies the size.
pub const MAX_PROGRAM_LEN: usize = 1_000_000;

/// VM instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inst {
    /// Match a specific character.
    Char(char),
    /// Match any character (newline only in dot-all mode).
    AnyChar,
    /// Match a character class.
    CharClass { items: Vec<ClassItem>, negated: bool },
    /// Successful match.
    Match,
    /// Jump to target instruction.
    Jump(usize),
    /// Try `first`, keeping `second` as the choice-point to resume on failure.
    Split(usize, usize),
    /// Save position into capture slot.
    Save(usize),
    /// Assert start of string (or line).
    AssertStart,
    /// Assert end of string (or line).
    AssertEnd,
    /// Assert word boundary.
    AssertWordBoundary,
    /// Assert non-word boundary.
    AssertNonWordBoundary,
    /// Record the current position in a progress slot.
    Mark(usize),
    /// Jump to `exit` if nothing was consumed since the matching `Mark`.
    ExitIfEmpty { slot: usize, exit: usize },
    /// No-op (used as placeholder).
    Nop,
}

/// Compiled program.
#[derive(Debug, Clone)]
pub struct Program {
    pub insts: Vec<Inst>,
    pub n_groups: usize,
    /// Capture slots (two per group, group 0 included) followed by progress slots.
    pub n_slots: usize,
    /// If the pattern must start with a specific literal character, store it here.
    /// Used by the VM to skip starting positions that can't possibly match.
    pub first_char: Option<char>,
    /// Whether the pattern can only match at offset 0.
    pub anchored_start: bool,
    pub flags: Flags,
}

/// Compile an AST into a bytecode program.
///
/// Fails with [`SyntaxErrorKind::PatternTooLarge`] once the expanded
/// program would exceed [`MAX_PROGRAM_LEN`] instructions.
pub fn compile(ast: &AstNode, n_groups: usize, flags: Flags) -> Result<Program> {
    let mut compiler = Compiler {
        insts: Vec::new(),
        n_slots: (n_groups + 1) * 2,
    };
    compiler.emit(ast)?;
    compiler.insts.push(Inst::Match);

    let insts = compiler.insts;
    let first_char = if flags.case_insensitive {
        None
    } else {
        extract_first_char(&insts)
    };
    let anchored_start = !flags.multiline
        && matches!(leading(&insts).next(), Some(Inst::AssertStart));
    log::debug!(
        "compiled program: {} instructions, {} groups, {} slots",
        insts.len(),
        n_groups,
        compiler.n_slots
    );
    Ok(Program {
        insts,
        n_groups,
        n_slots: compiler.n_slots,
        first_char,
        anchored_start,
        flags,
    })
}

/// Instructions executed first, skipping capture saves.
fn leading(insts: &[Inst]) -> impl Iterator<Item = &Inst> {
    insts.iter().filter(|inst| !matches!(inst, Inst::Save(_)))
}

/// Extract the first required literal character from the instruction stream, if any.
fn extract_first_char(insts: &[Inst]) -> Option<char> {
    let mut iter = leading(insts);
    match iter.next()? {
        Inst::Char(ch) => Some(*ch),
        // If the first instruction is AssertStart, check the next one
        Inst::AssertStart => match iter.next()? {
            Inst::Char(ch) => Some(*ch),
            _ => None,
        },
        _ => None,
    }
}

struct Compiler {
    insts: Vec<Inst>,
    n_slots: usize,
}

impl Compiler {
    fn alloc_slot(&mut self) -> usize {
        self.n_slots += 1;
        self.n_slots - 1
    }

    /// Emit one copy of a repeated node, then check the size cap.
    fn emit_copy(&mut self, node: &AstNode) -> Result<()> {
        self.emit(node)?;
        if self.insts.len() > MAX_PROGRAM_LEN {
            log::warn!("program exceeds {MAX_PROGRAM_LEN} instructions");
            return Err(Error::syntax(SyntaxErrorKind::PatternTooLarge, 0));
        }
        Ok(())
    }

    fn emit(&mut self, node: &AstNode) -> Result<()> {
        match node {
            AstNode::Literal(ch) => {
                self.insts.push(Inst::Char(*ch));
            }
            AstNode::Dot => {
                self.insts.push(Inst::AnyChar);
            }
            AstNode::Concat(nodes) => {
                for n in nodes {
                    self.emit(n)?;
                }
            }
            AstNode::Alternation(branches) => self.emit_alternation(branches)?,
            AstNode::Quantifier {
                node: sub,
                min,
                max,
                greedy,
            } => {
                for _ in 0..*min {
                    self.emit_copy(sub)?;
                }
                match max {
                    None => self.emit_star(sub, *greedy)?,
                    Some(max) => self.emit_optional_run(sub, (*max - *min) as usize, *greedy)?,
                }
            }
            AstNode::CharClass { items, negated } => {
                self.insts.push(Inst::CharClass {
                    items: items.clone(),
                    negated: *negated,
                });
            }
            AstNode::Anchor(kind) => {
                self.insts.push(match kind {
                    AnchorKind::Start => Inst::AssertStart,
                    AnchorKind::End => Inst::AssertEnd,
                    AnchorKind::WordBoundary => Inst::AssertWordBoundary,
                    AnchorKind::NonWordBoundary => Inst::AssertNonWordBoundary,
                });
            }
            AstNode::Group { index, node: sub } => {
                // Save start
                self.insts.push(Inst::Save(*index * 2));
                self.emit(sub)?;
                // Save end
                self.insts.push(Inst::Save(*index * 2 + 1));
            }
            AstNode::NonCapturingGroup { node: sub } => {
                self.emit(sub)?;
            }
        }
        Ok(())
    }

    fn emit_alternation(&mut self, branches: &[AstNode]) -> Result<()> {
        // a|b|c compiles to:
        //   split L1, L2
        //   L1: <a> jump END
        //   L2: split L3, L4
        //   L3: <b> jump END
        //   L4: <c>
        //   END:
        let Some((last, rest)) = branches.split_last() else {
            return Ok(());
        };
        let mut fixup_jumps = Vec::new();
        for branch in rest {
            let split_pc = self.insts.len();
            self.insts.push(Inst::Nop); // placeholder for split
            let branch_start = self.insts.len();
            self.emit(branch)?;
            fixup_jumps.push(self.insts.len());
            self.insts.push(Inst::Nop); // placeholder for jump to end
            let next_branch = self.insts.len();
            self.insts[split_pc] = Inst::Split(branch_start, next_branch);
        }
        self.emit(last)?;
        let end = self.insts.len();
        for jpc in fixup_jumps {
            self.insts[jpc] = Inst::Jump(end);
        }
        Ok(())
    }

    fn emit_star(&mut self, sub: &AstNode, greedy: bool) -> Result<()> {
        // L1: split L2, L3  (greedy: prefer L2)
        // L2: [mark s] <sub> [exit-if-empty s, L3] jump L1
        // L3:
        // The mark/exit pair is only needed when <sub> can match empty.
        let guard = sub.can_match_empty().then(|| self.alloc_slot());
        let l1 = self.insts.len();
        self.insts.push(Inst::Nop); // placeholder
        let l2 = self.insts.len();
        if let Some(slot) = guard {
            self.insts.push(Inst::Mark(slot));
        }
        self.emit_copy(sub)?;
        let exit_pc = self.insts.len();
        if guard.is_some() {
            self.insts.push(Inst::Nop); // placeholder for exit-if-empty
        }
        self.insts.push(Inst::Jump(l1));
        let l3 = self.insts.len();
        if let Some(slot) = guard {
            self.insts[exit_pc] = Inst::ExitIfEmpty { slot, exit: l3 };
        }
        self.insts[l1] = if greedy {
            Inst::Split(l2, l3)
        } else {
            Inst::Split(l3, l2)
        };
        Ok(())
    }

    /// Up to `count` optional copies, each reachable only if the previous one matched:
    ///
    ///   split B1, END
    ///   B1: <sub> split B2, END
    ///   B2: <sub> ...
    ///   END:
    fn emit_optional_run(&mut self, sub: &AstNode, count: usize, greedy: bool) -> Result<()> {
        let mut splits = Vec::with_capacity(count);
        for _ in 0..count {
            splits.push(self.insts.len());
            self.insts.push(Inst::Nop); // placeholder
            self.emit_copy(sub)?;
        }
        let end = self.insts.len();
        for split_pc in splits {
            let body = split_pc + 1;
            self.insts[split_pc] = if greedy {
                Inst::Split(body, end)
            } else {
                Inst::Split(end, body)
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn program(pattern: &str, flags: Flags) -> Program {
        let mut parser = Parser::new(pattern);
        let ast = parser.parse().unwrap();
        compile(&ast, parser.group_count(), flags).unwrap()
    }

    #[test]
    fn greedy_and_lazy_star_swap_split_order() {
        let greedy = program("a*", Flags::default());
        assert_eq!(
            greedy.insts,
            vec![Inst::Split(1, 3), Inst::Char('a'), Inst::Jump(0), Inst::Match]
        );
        let lazy = program("a*?", Flags::default());
        assert_eq!(lazy.insts[0], Inst::Split(3, 1));
    }

    #[test]
    fn nullable_loop_body_gets_progress_guard() {
        let prog = program("(a*)*", Flags::default());
        assert_eq!(prog.n_slots, 5);
        assert!(prog.insts.contains(&Inst::Mark(4)));
        assert!(prog
            .insts
            .iter()
            .any(|inst| matches!(inst, Inst::ExitIfEmpty { slot: 4, .. })));
        // Non-nullable bodies don't pay for it
        assert_eq!(program("(ab)*", Flags::default()).n_slots, 4);
    }

    #[test]
    fn bounded_repeat_nests_optional_copies() {
        let prog = program("a{1,3}", Flags::default());
        assert_eq!(
            prog.insts,
            vec![
                Inst::Char('a'),
                Inst::Split(2, 5),
                Inst::Char('a'),
                Inst::Split(4, 5),
                Inst::Char('a'),
                Inst::Match,
            ]
        );
    }

    #[test]
    fn nested_counts_hit_the_size_cap() {
        let mut parser = Parser::new("(?:(?:(?:a{1000}){1000}){1000})");
        let ast = parser.parse().unwrap();
        assert_eq!(
            compile(&ast, 0, Flags::default()).unwrap_err(),
            Error::syntax(SyntaxErrorKind::PatternTooLarge, 0)
        );
        // Two levels still fit
        assert_eq!(program("(?:a{1000}){999}", Flags::default()).insts.len(), 999_001);
    }

    #[test]
    fn alternation_layout() {
        let prog = program("a|b|c", Flags::default());
        assert_eq!(
            prog.insts,
            vec![
                Inst::Split(1, 3),
                Inst::Char('a'),
                Inst::Jump(7),
                Inst::Split(4, 6),
                Inst::Char('b'),
                Inst::Jump(7),
                Inst::Char('c'),
                Inst::Match,
            ]
        );
    }

    #[test]
    fn start_hints() {
        let prog = program("^(x)y", Flags::default());
        assert!(prog.anchored_start);
        assert_eq!(prog.first_char, Some('x'));
        let prog = program("(h)at", Flags::default());
        assert_eq!(prog.first_char, Some('h'));
        assert_eq!(program("hat", Flags::ignore_case()).first_char, None);
        let multiline = Flags {
            multiline: true,
            ..Flags::default()
        };
        assert!(!program("^a", multiline).anchored_start);
    }
}

//! A small backtracking regular-expression engine.
//!
//! Patterns are parsed into an AST, lowered to a linear program, and run by a
//! backtracking VM with an explicit choice-point stack:
//!
//! ```
//! use pattern_engine::{Flags, Pattern, compile};
//!
//! let p = Pattern::new(r"\d+").unwrap();
//! let m = p.search("Here's my number: 919-543-3300.").unwrap().unwrap();
//! assert_eq!(m.as_str(), "919");
//! assert_eq!(m.span(), (18, 21));
//!
//! let hats = compile("hat", Flags::ignore_case()).unwrap();
//! let found: Vec<_> = hats
//!     .find_all("That cat in the Hat")
//!     .map(|m| m.unwrap().as_str())
//!     .collect();
//! assert_eq!(found, ["hat", "Hat"]);
//!
//! let tags = Pattern::new("<.*?>").unwrap();
//! assert_eq!(tags.substitute("<b>bold</b>", "").unwrap(), "bold");
//! ```
//!
//! Supported syntax: literals, `.`, `[...]` classes with ranges and negation,
//! `\d \w \s` and their negations (ASCII), `^ $ \b \B`, capturing `(...)` and
//! non-capturing `(?:...)` groups, `|`, and greedy or lazy `* + ? {n,m}`.
//! Lookaround and backreferences inside patterns are not supported.

pub mod ast;
pub mod compiler;
pub mod error;
pub mod matched;
pub mod parser;
pub mod pattern;
pub mod replace;
pub mod vm;

pub use ast::Flags;
pub use error::{Error, Result, SyntaxErrorKind};
pub use matched::Match;
pub use pattern::{
    DEFAULT_STEP_LIMIT, Matches, Pattern, PatternBuilder, compile, escape, find_all, search,
    substitute,
};

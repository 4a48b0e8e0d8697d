//! Character-level comparison of sibling launcher scripts.

use crate::config::AliasPair;
use crate::error::Error;
use crate::script::ShellFamily;
use std::collections::BTreeSet;

/// The divergence between two launcher scripts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShimDiff {
    /// Multi-character runs, in diff order.
    pub chunks: Vec<String>,
    /// Uppercased single-character runs.
    pub letters: BTreeSet<char>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Computes the character-level diff between two scripts.
///
/// Only inserted or deleted runs are retained. A run is a maximal span of consecutive
/// characters removed from `a` or added in `b`; single-character runs contribute their
/// uppercase form to the letter set and longer runs are kept verbatim.
pub fn compare(a: &str, b: &str) -> ShimDiff {
    let mut result = ShimDiff::default();
    let mut run = String::new();
    let mut run_side = None;

    for entry in diff::chars(a, b) {
        let (side, c) = match entry {
            diff::Result::Left(c) => (Some(Side::Left), c),
            diff::Result::Right(c) => (Some(Side::Right), c),
            diff::Result::Both(c, _) => (None, c),
        };

        if side != run_side {
            result.take_run(&mut run);
            run_side = side;
        }

        if side.is_some() {
            run.push(c);
        }
    }

    result.take_run(&mut run);
    result
}

impl ShimDiff {
    fn take_run(&mut self, run: &mut String) {
        let mut chars = run.chars();
        match (chars.next(), chars.next()) {
            (None, _) => (),
            (Some(c), None) => self.letters.extend(c.to_uppercase()),
            (Some(_), Some(_)) => self.chunks.push(run.clone()),
        }
        run.clear();
    }
}

/// A way in which a pair of launchers diverged beyond what is allowed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShimDiffViolation {
    /// The single-character differences are not exactly the alias letters.
    UnexpectedLetters {
        /// The alias letters.
        expected: BTreeSet<char>,
        /// The letters observed.
        actual: BTreeSet<char>,
    },
    /// The number of multi-character differences is wrong.
    WrongChunkCount {
        /// Number of chunks allowed.
        expected: usize,
        /// The chunks observed.
        actual: Vec<String>,
    },
    /// The only chunk is not the alias-specific assignment line.
    ChunkMissingAnchor {
        /// The anchor pattern.
        pattern: String,
        /// The offending chunk.
        chunk: String,
    },
}

impl std::fmt::Display for ShimDiffViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedLetters { expected, actual } => write!(
                f,
                "differing letters {} do not match alias letters {}",
                actual.iter().collect::<String>(),
                expected.iter().collect::<String>()
            ),
            Self::WrongChunkCount { expected, actual } => write!(
                f,
                "expected {expected} multi-character difference(s), found {}: {actual:?}",
                actual.len()
            ),
            Self::ChunkMissingAnchor { pattern, chunk } => {
                write!(f, "difference {chunk:?} does not match /{pattern}/")
            }
        }
    }
}

/// What a family's launcher pair is allowed to differ by.
#[derive(Clone, Debug)]
pub struct ShimDiffExpectation {
    letters: BTreeSet<char>,
    anchor: Option<regex::Regex>,
}

impl ShimDiffExpectation {
    /// Builds the expectation for a family's launcher pair.
    ///
    /// PowerShell launchers differ only by the alias letters; the other families add one
    /// assignment of the secondary alias's entry-point variable.
    pub fn for_family(family: ShellFamily, aliases: &AliasPair) -> Result<Self, Error> {
        let var = regex::escape(&aliases.anchor_variable());
        let anchor = match family {
            ShellFamily::Posix => Some(regex::Regex::new(&format!("^{var}="))?),
            ShellFamily::Cmd => Some(regex::Regex::new(&format!("^SET \"{var}="))?),
            ShellFamily::PowerShell => None,
        };

        Ok(Self {
            letters: aliases.distinguishing_letters(),
            anchor,
        })
    }

    /// Checks an observed diff, returning every violation found.
    pub fn check(&self, diff: &ShimDiff) -> Vec<ShimDiffViolation> {
        let mut violations = vec![];

        if diff.letters != self.letters {
            violations.push(ShimDiffViolation::UnexpectedLetters {
                expected: self.letters.clone(),
                actual: diff.letters.clone(),
            });
        }

        let expected_chunks = usize::from(self.anchor.is_some());
        if diff.chunks.len() != expected_chunks {
            violations.push(ShimDiffViolation::WrongChunkCount {
                expected: expected_chunks,
                actual: diff.chunks.clone(),
            });
        }

        if let (Some(anchor), [chunk]) = (&self.anchor, diff.chunks.as_slice()) {
            // The run may start or end at a line break; read it right-to-left so the
            // assignment line comes first.
            let line: String = chunk.split('\n').rev().collect();
            if !anchor.is_match(&line) {
                violations.push(ShimDiffViolation::ChunkMissingAnchor {
                    pattern: anchor.as_str().to_owned(),
                    chunk: chunk.clone(),
                });
            }
        }

        violations
    }
}

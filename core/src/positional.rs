//! Ordering policies for positional values.
//!
//! A positional is an identifier the analyzer meets in flag-reading position
//! that is not a flag head, or a value left over after a flag consumed what it
//! needs. The router only decides *whether* a positional is acceptable at its
//! place in the input; slot filling is the analyzer's job.

use serde::{Deserialize, Serialize};

use crate::syntax::Spanned;

/// Where positionals may appear relative to flags.
///
/// # Examples
///
/// ```
/// use flagtree_core::PositionalPolicy;
///
/// assert_eq!(PositionalPolicy::default(), PositionalPolicy::UseDefault);
/// assert_eq!(
///     PositionalPolicy::UseDefault.resolve(PositionalPolicy::AfterFlags),
///     PositionalPolicy::AfterFlags
/// );
/// assert_eq!(
///     PositionalPolicy::BeforeFlags.resolve(PositionalPolicy::AfterFlags),
///     PositionalPolicy::BeforeFlags
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PositionalPolicy {
    /// Inherit from the enclosing context.
    #[default]
    UseDefault,
    /// Any order; slots fill in order of appearance.
    Interleaved,
    /// Every positional must precede the first flag.
    BeforeFlags,
    /// Every positional must follow the last flag.
    AfterFlags,
}

impl PositionalPolicy {
    /// Replaces `UseDefault` with the inherited policy.
    pub fn resolve(self, inherited: PositionalPolicy) -> PositionalPolicy {
        match self {
            PositionalPolicy::UseDefault => inherited,
            other => other,
        }
    }
}

/// Outcome of routing one positional value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Routed {
    /// Hand the value to the next free slot.
    Assign(Spanned),
    /// The value violates the policy.
    Reject { value: Spanned, message: String },
}

/// Per-context router state for one parse.
#[derive(Debug)]
pub(crate) struct PositionalRouter {
    policy: PositionalPolicy,
    seen_flag: bool,
    pending: Vec<Spanned>,
}

impl PositionalRouter {
    /// `policy` must already be resolved (not `UseDefault`).
    pub fn new(policy: PositionalPolicy) -> Self {
        Self {
            policy,
            seen_flag: false,
            pending: Vec::new(),
        }
    }

    /// Notes a flag or group occurrence in this context.
    pub fn flag_seen(&mut self) -> Vec<Routed> {
        self.seen_flag = true;
        if self.policy != PositionalPolicy::AfterFlags {
            return Vec::new();
        }
        self.pending
            .drain(..)
            .map(|value| {
                let message = format!(
                    "Positional argument '{}' must appear after all flags",
                    value.text
                );
                Routed::Reject { value, message }
            })
            .collect()
    }

    pub fn positional(&mut self, value: Spanned) -> Vec<Routed> {
        match self.policy {
            PositionalPolicy::AfterFlags => {
                self.pending.push(value);
                Vec::new()
            }
            PositionalPolicy::BeforeFlags if self.seen_flag => {
                let message = format!(
                    "Positional argument '{}' must appear before any flags",
                    value.text
                );
                vec![Routed::Reject { value, message }]
            }
            _ => vec![Routed::Assign(value)],
        }
    }

    /// Releases positionals buffered until the end of the context.
    pub fn finish(&mut self) -> Vec<Routed> {
        self.pending.drain(..).map(Routed::Assign).collect()
    }
}

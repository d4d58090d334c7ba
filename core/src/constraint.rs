//! Inter-flag constraints, checked once after analysis.
//!
//! Constraints are matched against the flat list of [`SetFlag`]s harvested
//! from the whole schema. A constraint path matches a set flag when the group
//! depth is the same and every step names the schema entry by its primary
//! name or one of its aliases.

use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::diagnostics::ErrorTree;
use crate::schema::{FlagPath, SetFlag};

/// A failed constraint, handed to message generators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// The constrained flag as declared.
    pub flag: FlagPath,
    /// Flags that caused the failure: the conflicting ones for mutual
    /// exclusion, the missing ones for dependencies, empty for `Required`.
    pub offending: Vec<FlagPath>,
}

/// How a violation is worded.
#[derive(Clone, Default)]
pub enum ConstraintMessage {
    #[default]
    Default,
    Text(String),
    Generator(Rc<dyn Fn(&Violation) -> String>),
}

impl fmt::Debug for ConstraintMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintMessage::Default => f.write_str("Default"),
            ConstraintMessage::Text(text) => f.debug_tuple("Text").field(text).finish(),
            ConstraintMessage::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

impl ConstraintMessage {
    /// The custom wording, or `None` to fall back to the default.
    fn custom(&self, violation: &Violation) -> Option<String> {
        match self {
            ConstraintMessage::Default => None,
            ConstraintMessage::Text(text) => Some(text.clone()),
            ConstraintMessage::Generator(generate) => Some(generate(violation)),
        }
    }
}

/// A rule over which flags may or must appear together.
///
/// # Examples
///
/// ```
/// use flagtree_core::{Constraint, Parser, SingleOption};
///
/// let mut parser = Parser::new("app")
///     .with_option(SingleOption::<i32>::new("--x").alias("-x"))
///     .with_option(SingleOption::<i32>::new("--y"))
///     .with_constraint(Constraint::depends_on("--x", ["--y"]));
///
/// let errors = parser.parse_str("-x 10").unwrap();
/// assert_eq!(
///     errors.messages()[0].text,
///     "Flag '--x' depends on flag '--y', which is not set"
/// );
/// ```
#[derive(Debug, Clone)]
pub enum Constraint {
    Required {
        flag: FlagPath,
        message: ConstraintMessage,
    },
    MutuallyExclusive {
        flag: FlagPath,
        others: Vec<FlagPath>,
        message: ConstraintMessage,
    },
    DependsOn {
        flag: FlagPath,
        required: Vec<FlagPath>,
        message: ConstraintMessage,
    },
}

impl Constraint {
    pub fn required(flag: impl Into<FlagPath>) -> Self {
        Constraint::Required {
            flag: flag.into(),
            message: ConstraintMessage::Default,
        }
    }

    pub fn mutually_exclusive<P: Into<FlagPath>>(
        flag: impl Into<FlagPath>,
        others: impl IntoIterator<Item = P>,
    ) -> Self {
        Constraint::MutuallyExclusive {
            flag: flag.into(),
            others: others.into_iter().map(Into::into).collect(),
            message: ConstraintMessage::Default,
        }
    }

    pub fn depends_on<P: Into<FlagPath>>(
        flag: impl Into<FlagPath>,
        required: impl IntoIterator<Item = P>,
    ) -> Self {
        Constraint::DependsOn {
            flag: flag.into(),
            required: required.into_iter().map(Into::into).collect(),
            message: ConstraintMessage::Default,
        }
    }

    /// Replaces the default wording with fixed text.
    pub fn with_message(self, text: impl Into<String>) -> Self {
        self.with(ConstraintMessage::Text(text.into()))
    }

    /// Replaces the default wording with a generator.
    pub fn with_generator(self, generate: impl Fn(&Violation) -> String + 'static) -> Self {
        self.with(ConstraintMessage::Generator(Rc::new(generate)))
    }

    fn with(mut self, custom: ConstraintMessage) -> Self {
        match &mut self {
            Constraint::Required { message, .. }
            | Constraint::MutuallyExclusive { message, .. }
            | Constraint::DependsOn { message, .. } => *message = custom,
        }
        self
    }

    pub fn flag(&self) -> &FlagPath {
        match self {
            Constraint::Required { flag, .. }
            | Constraint::MutuallyExclusive { flag, .. }
            | Constraint::DependsOn { flag, .. } => flag,
        }
    }
}

fn find<'a>(set: &'a [SetFlag], path: &FlagPath) -> Option<&'a SetFlag> {
    set.iter().find(|flag| flag.path.matches(path))
}

fn quoted(paths: &[FlagPath]) -> String {
    paths
        .iter()
        .map(|p| format!("'{p}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Checks every constraint plus fixed cardinality, adding messages to `errors`.
///
/// `end` anchors failures that have no token of their own (missing required
/// flags).
pub fn check_constraints(
    constraints: &[Constraint],
    set: &[SetFlag],
    end: usize,
    errors: &mut ErrorTree,
) {
    for constraint in constraints {
        check_one(constraint, set, end, errors);
    }

    for flag in set {
        if let Some(expected) = flag.capacity
            && flag.multi
            && flag.count != expected
        {
            errors.add_message(
                format!(
                    "Flag '{}' must have exactly {expected} values specified",
                    flag.path
                ),
                flag.position,
            );
        }
    }
}

fn check_one(constraint: &Constraint, set: &[SetFlag], end: usize, errors: &mut ErrorTree) {
    match constraint {
        Constraint::Required { flag, message } => {
            if find(set, flag).is_some() {
                return;
            }
            trace!(flag = %flag, "required flag missing");
            let violation = Violation {
                flag: flag.clone(),
                offending: Vec::new(),
            };
            let text = message
                .custom(&violation)
                .unwrap_or_else(|| format!("Flag '{flag}' is a required flag and must be set"));
            errors.add_message(text, end);
        }
        Constraint::MutuallyExclusive {
            flag,
            others,
            message,
        } => {
            let Some(anchor) = find(set, flag) else {
                return;
            };
            let offending: Vec<FlagPath> = others
                .iter()
                .filter(|other| find(set, other).is_some())
                .cloned()
                .collect();
            if offending.is_empty() {
                return;
            }
            trace!(flag = %flag, conflicts = offending.len(), "mutual exclusion violated");
            let violation = Violation {
                flag: flag.clone(),
                offending,
            };
            let text = message.custom(&violation).unwrap_or_else(|| {
                format!(
                    "Flag '{flag}' cannot be used together with {}",
                    quoted(&violation.offending)
                )
            });
            errors.add_message(text, anchor.position);
        }
        Constraint::DependsOn {
            flag,
            required,
            message,
        } => {
            let Some(anchor) = find(set, flag) else {
                return;
            };
            let missing: Vec<FlagPath> = required
                .iter()
                .filter(|dep| find(set, dep).is_none())
                .cloned()
                .collect();
            if missing.is_empty() {
                return;
            }
            trace!(flag = %flag, missing = missing.len(), "dependency violated");
            let violation = Violation {
                flag: flag.clone(),
                offending: missing,
            };
            match message.custom(&violation) {
                Some(text) => errors.add_message(text, anchor.position),
                None => {
                    for dep in &violation.offending {
                        errors.add_message(
                            format!("Flag '{flag}' depends on flag '{dep}', which is not set"),
                            anchor.position,
                        );
                    }
                }
            }
        }
    }
}

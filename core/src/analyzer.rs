//! Binds the statement tree to the schema.
//!
//! The analyzer walks the nodes of one context at a time, resolves each flag
//! in the active context, drives conversion into the entry (and its
//! destination), routes positionals to slots, and files every problem in the
//! error tree. It never stops early.

use tracing::{trace, warn};

use crate::convert::CharMode;
use crate::diagnostics::ErrorTree;
use crate::positional::{PositionalPolicy, PositionalRouter, Routed};
use crate::schema::{ContextId, ContextScope, EntryId, EntryKind, Schema};
use crate::syntax::{FlagNode, GroupNode, Node, Spanned, Statement};

pub(crate) struct Analyzer<'a> {
    schema: &'a mut Schema,
    errors: &'a mut ErrorTree,
    char_mode: CharMode,
    policy: PositionalPolicy,
}

/// State of one context while its nodes are walked.
struct Frame {
    context: ContextId,
    scope: ContextScope,
    router: PositionalRouter,
    next_slot: usize,
}

impl<'a> Analyzer<'a> {
    /// `char_mode` and `policy` are the root defaults.
    pub fn new(
        schema: &'a mut Schema,
        errors: &'a mut ErrorTree,
        char_mode: CharMode,
        policy: PositionalPolicy,
    ) -> Self {
        Self {
            schema,
            errors,
            char_mode,
            policy,
        }
    }

    pub fn analyze(&mut self, statement: &Statement) {
        self.context(ContextId::ROOT, &statement.nodes);
    }

    fn context(&mut self, context: ContextId, nodes: &[Node]) {
        let policy = self.schema.positional_policy(context, self.policy);
        let mut frame = Frame {
            context,
            scope: self.schema.scope(context, self.char_mode),
            router: PositionalRouter::new(policy),
            next_slot: 0,
        };
        trace!(context = %self.schema.context(context).name, ?policy, nodes = nodes.len(), "entering context");

        for node in nodes {
            match node {
                Node::Flag(flag) => self.flag(&mut frame, flag),
                Node::Group(group) => self.group(&mut frame, group),
                Node::Positional(value) => {
                    let routed = frame.router.positional(value.clone());
                    self.route(&mut frame, routed);
                }
            }
        }

        let routed = frame.router.finish();
        self.route(&mut frame, routed);
    }

    fn flag(&mut self, frame: &mut Frame, node: &FlagNode) {
        let name = &node.name;
        let Some(id) = self.schema.lookup(frame.context, &name.text) else {
            self.errors
                .add_message(format!("Unknown option: '{}'", name.text), name.position);
            return;
        };
        trace!(flag = %name.text, position = name.position, "resolved flag");

        let routed = frame.router.flag_seen();
        self.route(frame, routed);

        match self.schema.kind(id) {
            EntryKind::Group => {
                self.errors.add_message(
                    format!("Flag '{}' is not an option", name.text),
                    name.position,
                );
            }
            EntryKind::Multi => self.multi(frame, id, node),
            EntryKind::Single | EntryKind::Positional => self.single(frame, id, node),
        }
    }

    fn single(&mut self, frame: &mut Frame, id: EntryId, node: &FlagNode) {
        let name = &node.name;
        let has_slots = self.schema.positional_count(frame.context) > 0;
        let entry = self.schema.entry_mut(id);
        entry.record_occurrence(name.position);
        let Some(value) = entry.value_mut() else {
            return;
        };

        let Some((first, extra)) = node.values.split_first() else {
            if value.is_switch() {
                if let Err(message) = value.assign("true", &name.text, &frame.scope) {
                    self.errors.add_message(message, name.position);
                }
            } else {
                self.errors.add_message(
                    format!("Missing value for flag '{}'", name.text),
                    name.position,
                );
            }
            return;
        };

        // A switch followed by a non-boolean word: the word is a positional.
        if value.is_switch() && !node.attached && has_slots && !is_bool_literal(&first.text) {
            if let Err(message) = value.assign("true", &name.text, &frame.scope) {
                self.errors.add_message(message, name.position);
            }
            self.reroute(frame, &node.values);
            return;
        }

        if let Err(message) = value.assign(&first.text, &name.text, &frame.scope) {
            self.errors.add_message(message, first.position);
        }

        if let Some(second) = extra.first() {
            if has_slots {
                self.reroute(frame, extra);
            } else {
                self.errors.add_message(
                    format!("Unexpected extra values for flag '{}'", name.text),
                    second.position,
                );
            }
        }
    }

    fn multi(&mut self, frame: &mut Frame, id: EntryId, node: &FlagNode) {
        let name = &node.name;
        let entry = self.schema.entry_mut(id);
        entry.record_occurrence(name.position);
        let Some(value) = entry.value_mut() else {
            return;
        };
        value.mark_set();

        for item in &node.values {
            if let Some(capacity) = value.capacity()
                && value.count() >= capacity
            {
                self.errors.add_message(
                    format!("Flag '{}' accepts at most {capacity} values", name.text),
                    item.position,
                );
                break;
            }
            if let Err(message) = value.assign(&item.text, &name.text, &frame.scope) {
                self.errors.add_message(message, item.position);
            }
        }
    }

    fn group(&mut self, frame: &mut Frame, node: &GroupNode) {
        let name = &node.name;
        let child = match self.schema.lookup(frame.context, &name.text) {
            None => Err(format!("Unknown option: '{}'", name.text)),
            Some(id) => match self.schema.child_context(id) {
                Some(child) => Ok((id, child)),
                None => Err(format!("Flag '{}' is not a group", name.text)),
            },
        };

        let (id, child) = match child {
            Ok(resolved) => resolved,
            Err(message) => {
                self.errors.add_message(message, name.position);
                if self.errors.remove_group(node.open) {
                    warn!(group = %name.text, position = node.open, "revoked error group of invalid group header");
                }
                return;
            }
        };

        let routed = frame.router.flag_seen();
        self.route(frame, routed);

        self.schema.entry_mut(id).record_occurrence(name.position);
        self.context(child, &node.body.nodes);
    }

    /// Sends values that a flag did not consume through the router.
    fn reroute(&mut self, frame: &mut Frame, values: &[Spanned]) {
        for value in values {
            let routed = frame.router.positional(value.clone());
            self.route(frame, routed);
        }
    }

    fn route(&mut self, frame: &mut Frame, routed: Vec<Routed>) {
        for outcome in routed {
            match outcome {
                Routed::Assign(value) => self.fill_slot(frame, &value),
                Routed::Reject { value, message } => {
                    self.errors.add_message(message, value.position);
                }
            }
        }
    }

    /// Assigns `value` to the next slot with room, in declaration order. The
    /// cursor lives in the frame, so every occurrence of a group starts over at
    /// its first slot.
    fn fill_slot(&mut self, frame: &mut Frame, value: &Spanned) {
        let slots = self.schema.positional_count(frame.context);
        while frame.next_slot < slots {
            let id = EntryId {
                context: frame.context,
                index: frame.next_slot,
                positional: true,
            };
            let entry = self.schema.entry_mut(id);
            let label = entry.descriptor.name().to_string();
            let Some(slot) = entry.value_mut() else {
                frame.next_slot += 1;
                continue;
            };

            // Single slots are passed by the cursor, so a repeated group
            // overwrites them like a repeated flag. Multi slots keep appending.
            let full = slot.is_multi() && slot.capacity().is_some_and(|cap| slot.count() >= cap);
            if full {
                frame.next_slot += 1;
                continue;
            }

            let result = slot.assign(&value.text, &label, &frame.scope);
            let single = !slot.is_multi();
            entry.record_occurrence(value.position);
            if let Err(message) = result {
                self.errors.add_message(message, value.position);
            }
            if single {
                frame.next_slot += 1;
            }
            trace!(slot = %label, value = %value.text, "filled positional slot");
            return;
        }

        self.errors.add_message(
            format!("Unexpected positional argument: '{}'", value.text),
            value.position,
        );
    }
}

fn is_bool_literal(text: &str) -> bool {
    text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::{Destination, Group, MultiOption, SingleOption};
    use crate::syntax::build_statement;
    use crate::token::Tokenizer;

    fn run(schema: &mut Schema, input: &str) -> Vec<(String, usize)> {
        let prefixes = vec!["--".to_string(), "-".to_string()];
        let (statement, _) = build_statement(Tokenizer::tokenize(input), &prefixes);
        let mut errors = ErrorTree::new("app", input.len());
        statement.for_each_group(&mut |g| {
            errors
                .add_group(g.name.text.clone(), g.open, g.close)
                .unwrap();
        });
        Analyzer::new(
            schema,
            &mut errors,
            CharMode::ExpectAscii,
            PositionalPolicy::Interleaved,
        )
        .analyze(&statement);
        errors
            .messages()
            .iter()
            .map(|m| (m.text.clone(), m.position))
            .collect()
    }

    fn schema_with(entries: Vec<crate::option::OptionEntry>) -> Schema {
        let mut schema = Schema::new("app");
        for entry in entries {
            schema.add_entry(ContextId::ROOT, entry).unwrap();
        }
        schema
    }

    #[test]
    fn test_unknown_and_missing_values() {
        let mut schema = schema_with(vec![SingleOption::<i32>::new("--n").into()]);
        let errors = run(&mut schema, "--age 20 --n");
        assert_eq!(
            errors,
            vec![
                ("Unknown option: '--age'".to_string(), 0),
                ("Missing value for flag '--n'".to_string(), 9),
            ]
        );
    }

    #[test]
    fn test_bool_switch_and_explicit_value() {
        let verbose = Destination::new(false);
        let quiet = Destination::new(true);
        let mut schema = schema_with(vec![
            SingleOption::<bool>::new("--verbose").bind(&verbose).into(),
            SingleOption::<bool>::new("--quiet").bind(&quiet).into(),
        ]);
        assert!(run(&mut schema, "--verbose --quiet=false").is_empty());
        assert!(verbose.get());
        assert!(!quiet.get());
    }

    #[test]
    fn test_extra_values_without_slots() {
        let mut schema = schema_with(vec![SingleOption::<u32>::new("--w").into()]);
        assert_eq!(
            run(&mut schema, "--w 1 2 3"),
            vec![("Unexpected extra values for flag '--w'".to_string(), 6)]
        );
    }

    #[test]
    fn test_extra_values_and_switch_words_become_positionals() {
        let files = Destination::new(Vec::new());
        let width = Destination::new(0u32);
        let verbose = Destination::new(false);
        let mut schema = schema_with(vec![
            SingleOption::<u32>::new("--w").bind(&width).into(),
            SingleOption::<bool>::new("-v").bind(&verbose).into(),
        ]);
        schema
            .add_positional(
                ContextId::ROOT,
                MultiOption::<String>::growable("files").bind(&files).into(),
            )
            .unwrap();

        assert!(run(&mut schema, "--w 5 a.txt -v b.txt").is_empty());
        assert_eq!(width.get(), 5);
        assert!(verbose.get());
        assert_eq!(files.get(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_multi_overflow_and_conversion_errors() {
        let ints = Destination::new(Vec::new());
        let mut schema = schema_with(vec![MultiOption::<i32>::fixed("--ints", 2).bind(&ints).into()]);
        assert_eq!(
            run(&mut schema, "--ints 1 x 3 4"),
            vec![
                (
                    "Invalid value 'x' for flag '--ints': expected signed 32-bit integer in range [-2147483648, 2147483647]"
                        .to_string(),
                    9
                ),
                ("Flag '--ints' accepts at most 2 values".to_string(), 13),
            ]
        );
        assert_eq!(ints.get(), vec![1, 3]);
    }

    #[test]
    fn test_multi_with_no_values_is_still_set() {
        let mut schema = schema_with(vec![MultiOption::<i32>::fixed("--ints", 3).into()]);
        assert!(run(&mut schema, "--ints").is_empty());
        let id = schema.lookup(ContextId::ROOT, "--ints").unwrap();
        assert!(schema.entry(id).is_set());
    }

    #[test]
    fn test_group_resolution_and_revocation() {
        let major = Destination::new(String::new());
        let mut schema = schema_with(vec![SingleOption::<String>::new("--name").into()]);
        schema
            .add_group(
                ContextId::ROOT,
                Group::new("--degrees")
                    .with_option(SingleOption::<String>::new("--major").bind(&major)),
            )
            .unwrap();

        let input = "--degrees [--major CS --bogus] --name [x] --nope [y] --degrees";
        let errors = run(&mut schema, input);
        assert_eq!(
            errors,
            vec![
                ("Unknown option: '--bogus'".to_string(), 22),
                ("Flag '--name' is not a group".to_string(), 31),
                ("Unknown option: '--nope'".to_string(), 42),
                ("Flag '--degrees' is not an option".to_string(), 53),
            ]
        );
        assert_eq!(major.get(), "CS");
    }

    #[test]
    fn test_positional_slots_fill_in_order() {
        let input = Destination::new(String::new());
        let output = Destination::new(String::new());
        let mut schema = Schema::new("app");
        schema
            .add_positional(ContextId::ROOT, SingleOption::<String>::new("input").bind(&input).into())
            .unwrap();
        schema
            .add_positional(ContextId::ROOT, SingleOption::<String>::new("output").bind(&output).into())
            .unwrap();

        let errors = run(&mut schema, "in.txt out.txt extra");
        assert_eq!(
            errors,
            vec![("Unexpected positional argument: 'extra'".to_string(), 15)]
        );
        assert_eq!(input.get(), "in.txt");
        assert_eq!(output.get(), "out.txt");
    }

    #[test]
    fn test_repeated_group_refills_its_slots() {
        let target = Destination::new(String::new());
        let mut schema = Schema::new("app");
        schema
            .add_group(
                ContextId::ROOT,
                Group::new("--copy")
                    .with_option(SingleOption::<bool>::new("-f"))
                    .with_positional(SingleOption::<String>::new("target").bind(&target)),
            )
            .unwrap();

        let errors = run(&mut schema, "--copy [a.txt] --copy [-f b.txt]");
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(target.get(), "b.txt");
    }

    #[test]
    fn test_policy_violations() {
        let mut schema = schema_with(vec![SingleOption::<bool>::new("-v").into()]);
        schema
            .add_positional(ContextId::ROOT, MultiOption::<String>::growable("rest").into())
            .unwrap();
        schema.context_mut(ContextId::ROOT).settings.positional_policy = PositionalPolicy::BeforeFlags;
        assert_eq!(
            run(&mut schema, "a -v b"),
            vec![("Positional argument 'b' must appear before any flags".to_string(), 5)]
        );

        schema.context_mut(ContextId::ROOT).settings.positional_policy = PositionalPolicy::AfterFlags;
        schema.reset();
        assert_eq!(
            run(&mut schema, "a -v b"),
            vec![("Positional argument 'a' must appear after all flags".to_string(), 0)]
        );
    }
}

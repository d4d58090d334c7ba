//! Plain-text help rendering for a schema.
//!
//! ```text
//! Usage: app [OPTIONS] <input> <files>...
//!
//! Arguments:
//!   input  [FILE]  Input file
//!   files          Extra files
//!
//! Options:
//!   --width, -w  [N]  Width in pixels (default: 80) (range: [1, 4096])
//!   --degrees [ ... ]
//!     --major         Major subject
//! ```

use crate::schema::{ContextId, Entry, EntryBody, Schema};

struct Row {
    left: String,
    right: String,
}

/// Renders usage, positional slots and options, group members indented
/// under their group header.
pub fn render_help(schema: &Schema) -> String {
    let root = schema.root();
    let mut out = format!("Usage: {}", root.name);
    if !root.entries.is_empty() {
        out.push_str(" [OPTIONS]");
    }
    for slot in &root.positionals {
        out.push_str(&format!(" <{}>", slot.descriptor.name()));
        if slot.value().is_some_and(|v| v.is_multi()) {
            out.push_str("...");
        }
    }
    out.push('\n');

    if !root.positionals.is_empty() {
        let rows: Vec<Row> = root
            .positionals
            .iter()
            .map(|slot| Row {
                left: format!("{}{}", slot.descriptor.name(), hint(slot)),
                right: details(slot),
            })
            .collect();
        out.push_str("\nArguments:\n");
        write_rows(&rows, &mut out);
    }

    let mut rows = Vec::new();
    option_rows(schema, ContextId::ROOT, 0, &mut rows);
    if !rows.is_empty() {
        out.push_str("\nOptions:\n");
        write_rows(&rows, &mut out);
    }

    out
}

fn option_rows(schema: &Schema, context: ContextId, depth: usize, rows: &mut Vec<Row>) {
    let indent = "  ".repeat(depth);
    let ctx = schema.context(context);

    for entry in &ctx.entries {
        let names = entry.descriptor.names().collect::<Vec<_>>().join(", ");
        match &entry.body {
            EntryBody::Group(child) => {
                rows.push(Row {
                    left: format!("{indent}{names} [ ... ]"),
                    right: details(entry),
                });
                let child_ctx = schema.context(*child);
                for slot in &child_ctx.positionals {
                    rows.push(Row {
                        left: format!("{indent}  <{}>{}", slot.descriptor.name(), hint(slot)),
                        right: details(slot),
                    });
                }
                option_rows(schema, *child, depth + 1, rows);
            }
            EntryBody::Value(_) => rows.push(Row {
                left: format!("{indent}{names}{}", hint(entry)),
                right: details(entry),
            }),
        }
    }
}

fn hint(entry: &Entry) -> String {
    entry
        .description
        .as_ref()
        .and_then(|d| d.hint.as_deref())
        .map(|h| format!("  [{h}]"))
        .unwrap_or_default()
}

fn details(entry: &Entry) -> String {
    let mut parts = Vec::new();
    if let Some(description) = &entry.description
        && !description.text.is_empty()
    {
        parts.push(description.text.clone());
    }
    if let Some(value) = entry.value() {
        if !value.is_switch()
            && let Some(default) = value.rendered_default()
            && !default.is_empty()
        {
            parts.push(format!("(default: {default})"));
        }
        if let Some(bounds) = value.bounds_description() {
            parts.push(format!("(range: {bounds})"));
        }
    }
    parts.join(" ")
}

fn write_rows(rows: &[Row], out: &mut String) {
    let width = rows.iter().map(|r| r.left.chars().count()).max().unwrap_or(0);
    for row in rows {
        if row.right.is_empty() {
            out.push_str(&format!("  {}\n", row.left));
        } else {
            out.push_str(&format!("  {:width$}  {}\n", row.left, row.right));
        }
    }
}

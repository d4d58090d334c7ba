//! Text renderers for [`ErrorTree`].

use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use super::{ErrorEntry, ErrorGroup, ErrorTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorStyle {
    /// `[root > group]` headers followed by ` - message` lines.
    #[default]
    Flat,
    /// Box-drawn tree; groups without errors are pruned.
    Tree,
}

/// Line-drawing characters for [`ErrorStyle::Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Charset {
    Ascii,
    Unicode,
}

impl Charset {
    /// Unicode when stderr, where errors are printed, is a terminal with a
    /// UTF-8 locale. ASCII otherwise.
    pub fn detect() -> Self {
        Self::choose(std::io::stderr().is_terminal(), locale_is_utf8())
    }

    fn choose(terminal: bool, utf8_locale: bool) -> Self {
        if terminal && utf8_locale {
            Charset::Unicode
        } else {
            Charset::Ascii
        }
    }

    fn branch(self, last: bool) -> &'static str {
        match (self, last) {
            (Charset::Unicode, false) => "├── ",
            (Charset::Unicode, true) => "└── ",
            (Charset::Ascii, false) => "|-- ",
            (Charset::Ascii, true) => "`-- ",
        }
    }

    fn rail(self, last: bool) -> &'static str {
        match (self, last) {
            (_, true) => "    ",
            (Charset::Unicode, false) => "│   ",
            (Charset::Ascii, false) => "|   ",
        }
    }
}

fn locale_is_utf8() -> bool {
    ["LC_ALL", "LC_CTYPE", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
        .is_some_and(|value| {
            let value = value.to_ascii_lowercase();
            value.contains("utf-8") || value.contains("utf8")
        })
}

/// Renders every group with direct messages as a `[path]` header followed by
/// its messages. A header is repeated when a nested group interrupts the run.
pub fn render_flat(tree: &ErrorTree) -> String {
    let mut out = String::new();
    let mut path = Vec::new();
    flat_group(tree.root(), &mut path, &mut out);
    out
}

fn flat_group<'a>(group: &'a ErrorGroup, path: &mut Vec<&'a str>, out: &mut String) {
    path.push(&group.name);
    let mut header_open = false;

    for entry in &group.entries {
        match entry {
            ErrorEntry::Message(message) => {
                if !header_open {
                    out.push('[');
                    out.push_str(&path.join(" > "));
                    out.push_str("]\n");
                    header_open = true;
                }
                out.push_str(" - ");
                out.push_str(&message.text);
                out.push('\n');
            }
            ErrorEntry::Group(inner) => {
                if inner.has_errors {
                    flat_group(inner, path, out);
                    header_open = false;
                }
            }
        }
    }

    path.pop();
}

/// Renders the tree with box-drawing lines, pruning error-free groups.
pub fn render_tree(tree: &ErrorTree, charset: Charset) -> String {
    let root = tree.root();
    let mut out = String::new();
    if !root.has_errors {
        return out;
    }
    out.push_str(&root.name);
    out.push('\n');
    tree_children(root, "", charset, &mut out);
    out
}

fn tree_children(group: &ErrorGroup, prefix: &str, charset: Charset, out: &mut String) {
    let visible: Vec<&ErrorEntry> = group
        .entries
        .iter()
        .filter(|entry| match entry {
            ErrorEntry::Message(_) => true,
            ErrorEntry::Group(inner) => inner.has_errors,
        })
        .collect();

    for (idx, entry) in visible.iter().enumerate() {
        let last = idx + 1 == visible.len();
        out.push_str(prefix);
        out.push_str(charset.branch(last));
        match entry {
            ErrorEntry::Message(message) => {
                out.push_str(&message.text);
                out.push('\n');
            }
            ErrorEntry::Group(inner) => {
                out.push_str(&inner.name);
                out.push('\n');
                let nested = format!("{prefix}{}", charset.rail(last));
                tree_children(inner, &nested, charset, out);
            }
        }
    }
}

//! Hierarchical, position-ordered diagnostics.
//!
//! Every input problem found during a parse lands in an [`ErrorTree`]. The
//! tree mirrors the group nesting of the input: each `--group [ ... ]` that
//! the parser sees becomes an [`ErrorGroup`] spanning its brackets, and
//! messages anchored inside those brackets are filed under it. Entries at
//! every level stay sorted by position no matter in which order they were
//! inserted, so a late constraint failure anchored at an early token still
//! sorts early.

pub mod render;

use serde::Serialize;

use crate::error::{Error, Result};

pub use render::{Charset, ErrorStyle};

/// One diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorMessage {
    pub text: String,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorEntry {
    Message(ErrorMessage),
    Group(ErrorGroup),
}

impl ErrorEntry {
    /// Sort key: a message's position or a group's start.
    pub fn position(&self) -> usize {
        match self {
            ErrorEntry::Message(message) => message.position,
            ErrorEntry::Group(group) => group.start,
        }
    }

    fn has_errors(&self) -> bool {
        match self {
            ErrorEntry::Message(_) => true,
            ErrorEntry::Group(group) => group.has_errors,
        }
    }
}

/// A named range `[start, end]` of the input with the entries inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorGroup {
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub entries: Vec<ErrorEntry>,
    /// Whether any message exists in this group or below.
    pub has_errors: bool,
}

impl ErrorGroup {
    pub fn new(name: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            entries: Vec::new(),
            has_errors: false,
        }
    }

    pub fn contains(&self, position: usize) -> bool {
        self.start <= position && position <= self.end
    }

    fn encloses(&self, other: &ErrorGroup) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    fn overlap_error(&self, other: &ErrorGroup) -> Error {
        Error::OverlappingGroup {
            start: other.start,
            end: other.end,
            other_start: self.start,
            other_end: self.end,
        }
    }

    fn insert_message(&mut self, message: ErrorMessage) {
        self.has_errors = true;
        let idx = self
            .entries
            .partition_point(|entry| entry.position() <= message.position);

        if idx > 0
            && let ErrorEntry::Group(group) = &mut self.entries[idx - 1]
            && group.contains(message.position)
        {
            group.insert_message(message);
            return;
        }
        self.entries.insert(idx, ErrorEntry::Message(message));
    }

    fn insert_group(&mut self, mut group: ErrorGroup) -> Result<()> {
        let idx = self
            .entries
            .partition_point(|entry| entry.position() < group.start);

        if idx > 0
            && let ErrorEntry::Group(preceding) = &mut self.entries[idx - 1]
            && preceding.end >= group.start
        {
            if !preceding.encloses(&group) {
                return Err(preceding.overlap_error(&group));
            }
            self.has_errors |= group.has_errors;
            return preceding.insert_group(group);
        }

        if let Some(ErrorEntry::Group(same_start)) = self.entries.get_mut(idx)
            && same_start.encloses(&group)
        {
            self.has_errors |= group.has_errors;
            return same_start.insert_group(group);
        }

        let mut end_idx = idx;
        while let Some(entry) = self.entries.get(end_idx) {
            if entry.position() > group.end {
                break;
            }
            if let ErrorEntry::Group(inner) = entry
                && !group.encloses(inner)
            {
                return Err(inner.overlap_error(&group));
            }
            end_idx += 1;
        }

        let absorbed: Vec<ErrorEntry> = self.entries.drain(idx..end_idx).collect();
        group.has_errors |= absorbed.iter().any(ErrorEntry::has_errors);
        let mut merged = absorbed;
        merged.extend(std::mem::take(&mut group.entries));
        merged.sort_by_key(ErrorEntry::position);
        group.entries = merged;

        self.has_errors |= group.has_errors;
        self.entries.insert(idx, ErrorEntry::Group(group));
        Ok(())
    }

    fn remove_group(&mut self, start: usize) -> bool {
        let idx = self.entries.iter().position(|entry| {
            matches!(entry, ErrorEntry::Group(group) if group.start == start)
        });
        if let Some(idx) = idx {
            if let ErrorEntry::Group(group) = self.entries.remove(idx) {
                let tail = self.entries.split_off(idx);
                self.entries.extend(group.entries);
                self.entries.extend(tail);
            }
            return true;
        }

        self.entries.iter_mut().any(|entry| match entry {
            ErrorEntry::Group(group) if group.contains(start) => group.remove_group(start),
            _ => false,
        })
    }

    fn collect_messages<'a>(&'a self, out: &mut Vec<&'a ErrorMessage>) {
        for entry in &self.entries {
            match entry {
                ErrorEntry::Message(message) => out.push(message),
                ErrorEntry::Group(group) => group.collect_messages(out),
            }
        }
    }
}

/// The diagnostics of one parse.
///
/// # Examples
///
/// ```
/// use flagtree_core::ErrorTree;
///
/// let mut tree = ErrorTree::new("app", 40);
/// tree.add_message("top-level problem", 30);
/// tree.add_group("--degrees", 10, 25).unwrap();
/// tree.add_message("inside the group", 12);
///
/// let positions: Vec<_> = tree.messages().iter().map(|m| m.position).collect();
/// assert_eq!(positions, vec![12, 30]);
/// assert!(tree.has_errors());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorTree {
    root: ErrorGroup,
}

impl ErrorTree {
    /// `name` labels the root group; `input_len` is the End position.
    pub fn new(name: impl Into<String>, input_len: usize) -> Self {
        Self {
            root: ErrorGroup::new(name, 0, input_len),
        }
    }

    pub fn root(&self) -> &ErrorGroup {
        &self.root
    }

    pub fn has_errors(&self) -> bool {
        self.root.has_errors
    }

    pub fn add_message(&mut self, text: impl Into<String>, position: usize) {
        self.root.insert_message(ErrorMessage {
            text: text.into(),
            position,
        });
    }

    /// Adds a group over `[start, end]`, adopting existing entries inside
    /// the range. Partial overlap with an existing group is an error.
    pub fn add_group(&mut self, name: impl Into<String>, start: usize, end: usize) -> Result<()> {
        self.root.insert_group(ErrorGroup::new(name, start, end))
    }

    /// Dissolves the group starting at `start`, moving its entries up one
    /// level. Returns `false` if no such group exists.
    pub fn remove_group(&mut self, start: usize) -> bool {
        self.root.remove_group(start)
    }

    /// All messages in order.
    pub fn messages(&self) -> Vec<&ErrorMessage> {
        let mut out = Vec::new();
        self.root.collect_messages(&mut out);
        out
    }

    pub fn render(&self, style: ErrorStyle, charset: Charset) -> String {
        match style {
            ErrorStyle::Flat => render::render_flat(self),
            ErrorStyle::Tree => render::render_tree(self, charset),
        }
    }
}

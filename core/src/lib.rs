//! Declarative, typed command-line parsing with nested flag groups.
//!
//! A program declares its options once, as typed values with aliases,
//! defaults, bounds and destinations. Options can be collected into
//! bracketed groups (`--degrees [--major CS]`) that open their own naming
//! scope. A parse runs in stages:
//!
//! - [`Tokenizer`] splits the input into identifiers, brackets and `=`.
//! - [`SyntaxTreeBuilder`] builds a [`Statement`] of flag, group and
//!   positional nodes by recursive descent.
//! - The analyzer binds nodes to the [`Schema`], converting values through
//!   the [`ConversionRegistry`] and routing positionals by [`PositionalPolicy`].
//! - [`Constraint`]s (required, mutually exclusive, depends-on) are checked
//!   against the flags that were set.
//!
//! Problems in the input never abort a parse: they accumulate in an
//! [`ErrorTree`] whose groups mirror the bracket structure and render as flat
//! `[app > --group]` blocks or as a box-drawn tree. Mistakes in the schema
//! itself are returned as [`Error`].
//!
//! # Example
//!
//! ```
//! use flagtree_core::*;
//!
//! let width = Destination::new(0u32);
//! let mut parser = Parser::new("app")
//!     .with_option(SingleOption::<u32>::new("--width").alias("-w").bind(&width))
//!     .with_option(MultiOption::<f64>::growable("--doubles"))
//!     .with_group(
//!         Group::new("--degrees")
//!             .with_option(SingleOption::<String>::new("--major"))
//!             .with_option(SingleOption::<String>::new("--minor")),
//!     )
//!     .with_constraint(Constraint::required("--width"));
//!
//! let errors = parser
//!     .parse_str("-w 100 --doubles 4.0 5.5 --degrees [--major CS --minor Music --age 20]")
//!     .unwrap();
//! assert_eq!(
//!     errors.render(ErrorStyle::Flat, Charset::Ascii),
//!     "[app > --degrees]\n - Unknown option: '--age'\n",
//! );
//!
//! assert_eq!(width.get(), 100);
//! assert_eq!(parser.get_all::<f64>("--doubles").unwrap(), vec![4.0, 5.5]);
//! assert_eq!(parser.get::<String>("--degrees > --major").unwrap(), "CS");
//! ```

mod analyzer;
mod config;
mod constraint;
mod convert;
mod diagnostics;
mod error;
mod help;
mod option;
mod parser;
mod positional;
mod schema;
mod schema_file;
mod syntax;
mod token;

pub use config::ParserConfig;
pub use constraint::{Constraint, ConstraintMessage, Violation, check_constraints};
pub use convert::{
    Bounds, CharMode, ConversionErrorKind, ConversionFailure, ConversionRegistry, ConversionScope,
    ConvertFn, ErrorFormatter, FlagValue,
};
pub use diagnostics::{Charset, ErrorEntry, ErrorGroup, ErrorMessage, ErrorStyle, ErrorTree};
pub use error::{Error, Result};
pub use help::render_help;
pub use option::{
    Destination, Group, MultiOption, MultiValue, OptionEntry, OptionValue, SingleOption,
    SingleValue,
};
pub use parser::Parser;
pub use positional::PositionalPolicy;
pub use schema::{
    Context, ContextId, ContextScope, ContextSettings, Description, Entry, EntryBody, EntryId,
    EntryKind, FlagDescriptor, FlagPath, FlagPathWithAlias, Schema, SetFlag,
};
pub use schema_file::{ConstraintSpec, GroupSpec, OptionSpec, SchemaFile};
pub use syntax::{
    FlagNode, GroupNode, Node, Spanned, Statement, SyntaxError, SyntaxTreeBuilder, build_statement,
    is_flag_head,
};
pub use token::{Mark, Token, TokenKind, TokenStream, Tokenizer};

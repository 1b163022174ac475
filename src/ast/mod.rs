//! Compiled template representation.
//!
//! - **Template layer** ([`template`]): a [`Template`] is a list of text,
//!   variable and tag nodes whose outputs are concatenated.
//! - **Expression layer** ([`expr`]): variables, filter expressions and the
//!   [`Argument`] references tag nodes resolve at render time.

pub mod expr;
pub mod span;
pub mod template;
pub mod value;

pub use expr::*;
pub use span::{Span, Spanned};
pub use template::*;
pub use value::Value;

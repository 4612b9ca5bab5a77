//! Filter matching and update application over [`Document`]s.

mod eval;
mod exec;
mod parse;
mod types;

pub use eval::{compare_values, eval_filter, eval_value, lookup, values_equal};
pub use exec::{
    add_numbers, apply_update, apply_upsert, get_path, mul_numbers, set_path, unset_path,
};
pub use parse::{parse_filter, parse_update, validate_update};
pub use types::{CmpOp, Filter, TypeSpec, UpdateOp, UpdateOperator, UpdateSpec};

use crate::document::Document;
use crate::errors::DbError;

/// Parses `filter` and reports whether `doc` satisfies it.
///
/// # Errors
/// Returns an error when the filter is malformed.
pub fn filter_document(doc: &Document, filter: &Document) -> Result<bool, DbError> {
    let compiled = parse_filter(filter)?;
    Ok(eval_filter(doc, &compiled))
}

/// Parses `update` and applies it to `doc`, reporting whether anything changed.
///
/// # Errors
/// Returns an error when the update is malformed or cannot be applied; `doc`
/// is unchanged in that case.
pub fn update_document(doc: &mut Document, update: &Document) -> Result<bool, DbError> {
    let spec = parse_update(update)?;
    apply_update(doc, &spec)
}

use crate::document::{Document, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// One entry of a `$type` operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSpec {
    /// A concrete BSON type code.
    Code(i32),
    /// The `"number"` alias: any numeric type.
    Number,
}

/// Compiled filter tree. Paths are dotted field paths; an empty path refers to
/// the value being matched itself (used inside `$elemMatch`).
#[derive(Debug, Clone)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    Not(Box<Filter>),
    Cmp { path: String, op: CmpOp, value: Value },
    In { path: String, values: Vec<Value> },
    Exists { path: String, exists: bool },
    Size { path: String, size: usize },
    All { path: String, values: Vec<Value> },
    ElemMatch { path: String, filter: Box<Filter> },
    Type { path: String, types: Vec<TypeSpec> },
    #[cfg(feature = "regex")]
    Regex { path: String, regex: regex::Regex },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    Set,
    Unset,
    Inc,
    Mul,
    Min,
    Max,
    Rename,
    CurrentDate,
    SetOnInsert,
    Push,
    AddToSet,
    Pop,
}

impl UpdateOperator {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "$set" => Self::Set,
            "$unset" => Self::Unset,
            "$inc" => Self::Inc,
            "$mul" => Self::Mul,
            "$min" => Self::Min,
            "$max" => Self::Max,
            "$rename" => Self::Rename,
            "$currentDate" => Self::CurrentDate,
            "$setOnInsert" => Self::SetOnInsert,
            "$push" => Self::Push,
            "$addToSet" => Self::AddToSet,
            "$pop" => Self::Pop,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Set => "$set",
            Self::Unset => "$unset",
            Self::Inc => "$inc",
            Self::Mul => "$mul",
            Self::Min => "$min",
            Self::Max => "$max",
            Self::Rename => "$rename",
            Self::CurrentDate => "$currentDate",
            Self::SetOnInsert => "$setOnInsert",
            Self::Push => "$push",
            Self::AddToSet => "$addToSet",
            Self::Pop => "$pop",
        }
    }
}

/// A single `{<operator>: {<path>: <arg>}}` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOp {
    pub op: UpdateOperator,
    pub path: String,
    pub arg: Value,
}

/// A validated update specification.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateSpec {
    /// Full document replacement; `_id` is kept from the target.
    Replacement(Document),
    /// Operator entries in specification order.
    Operators(Vec<UpdateOp>),
}

use thiserror::Error;

/// Protocol error codes reported to clients in error replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InternalError,
    BadValue,
    FailedToParse,
    TypeMismatch,
    PathNotViable,
    ConflictingUpdateOperators,
    MaxTimeMSExpired,
    DollarPrefixedFieldName,
    EmptyFieldName,
    DottedFieldName,
    CommandNotFound,
    ImmutableField,
    NotImplemented,
    Interrupted,
}

impl ErrorCode {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::InternalError => 1,
            Self::BadValue => 2,
            Self::FailedToParse => 9,
            Self::TypeMismatch => 14,
            Self::PathNotViable => 28,
            Self::ConflictingUpdateOperators => 40,
            Self::MaxTimeMSExpired => 50,
            Self::DollarPrefixedFieldName => 52,
            Self::EmptyFieldName => 56,
            Self::DottedFieldName => 57,
            Self::CommandNotFound => 59,
            Self::ImmutableField => 66,
            Self::NotImplemented => 238,
            Self::Interrupted => 11601,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::InternalError => "InternalError",
            Self::BadValue => "BadValue",
            Self::FailedToParse => "FailedToParse",
            Self::TypeMismatch => "TypeMismatch",
            Self::PathNotViable => "PathNotViable",
            Self::ConflictingUpdateOperators => "ConflictingUpdateOperators",
            Self::MaxTimeMSExpired => "MaxTimeMSExpired",
            Self::DollarPrefixedFieldName => "DollarPrefixedFieldName",
            Self::EmptyFieldName => "EmptyFieldName",
            Self::DottedFieldName => "DottedFieldName",
            Self::CommandNotFound => "CommandNotFound",
            Self::ImmutableField => "ImmutableField",
            Self::NotImplemented => "NotImplemented",
            Self::Interrupted => "Interrupted",
        }
    }
}

/// Broad classification of a [`DbError`], used to decide how the wire layer reacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Protocol,
    Validation,
    Unimplemented,
    Storage,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{message}")]
    Command { code: ErrorCode, message: String },

    #[error("{0}: support for field \"{0}\" is not implemented yet")]
    Unimplemented(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("operation was interrupted")]
    Cancelled,

    #[error("operation exceeded time limit")]
    DeadlineExceeded,

    #[error("BSON decode: {0}")]
    BsonDecode(#[from] bson::de::Error),

    #[error("BSON encode: {0}")]
    BsonEncode(#[from] bson::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    pub fn command(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Command { code, message: message.into() }
    }

    pub fn bad_value(message: impl Into<String>) -> Self {
        Self::command(ErrorCode::BadValue, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Protocol(_) | Self::BsonDecode(_) | Self::Io(_) => ErrorKind::Protocol,
            Self::Command { .. } | Self::BsonEncode(_) => ErrorKind::Validation,
            Self::Unimplemented(_) => ErrorKind::Unimplemented,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Cancelled | Self::DeadlineExceeded => ErrorKind::Cancelled,
        }
    }

    /// Error code reported in the `{ok: 0}` reply for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Command { code, .. } => *code,
            Self::Unimplemented(_) => ErrorCode::NotImplemented,
            Self::Cancelled => ErrorCode::Interrupted,
            Self::DeadlineExceeded => ErrorCode::MaxTimeMSExpired,
            Self::BsonEncode(_) => ErrorCode::BadValue,
            Self::Protocol(_) | Self::Storage(_) | Self::BsonDecode(_) | Self::Io(_) => {
                ErrorCode::InternalError
            }
        }
    }
}

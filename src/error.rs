// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The crate-wide error type.
//!
//! Every fallible operation returns [`Error`]. Variants fall into three
//! [`ErrorKind`]s: bad input data (duplicate ids, dangling links, unknown static
//! ids), misuse of the API, and failures of the cryptographic layer.
//!
//! Validation problems with user data are not errors. They are collected on the
//! record (see [`DataItem::field_errors`](crate::DataItem::field_errors)) and raise
//! its [`EditState`](crate::EditState) to `Error`.
use crate::{
    RecordId,
    security::{SecurityError, SymKeyType},
    state::{DataState, ListStyle},
};
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The data handed in is inconsistent.
    Data,
    /// The API was used in a way it does not support.
    Logic,
    /// Encryption, decryption or key handling failed.
    Security,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("duplicate id {id} in {list}")]
    DuplicateId { list: &'static str, id: RecordId },

    #[error("{list} has no record with id {id}")]
    NotFound { list: &'static str, id: RecordId },

    #[error("id {id} in {list} exceeds the largest record id")]
    IdOutOfRange { list: &'static str, id: RecordId },

    #[error("{list} {id} links to missing {target} {target_id}")]
    UnresolvedLink {
        list: &'static str,
        id: RecordId,
        target: &'static str,
        target_id: RecordId,
    },

    #[error("invalid {kind} id {id}")]
    InvalidStaticId { kind: &'static str, id: i64 },

    #[error("field {field} of {list} is missing or not {expected}")]
    FieldType {
        list: &'static str,
        field: &'static str,
        expected: &'static str,
    },

    #[error("control key {control} has no {key_type} data key")]
    MissingDataKey {
        control: RecordId,
        key_type: SymKeyType,
    },

    #[error("{list} may hold a single record only")]
    Singleton { list: &'static str },

    #[error("no control key is active")]
    NoControlKey,

    #[error("security is already initialised")]
    SecurityInitialised,

    #[error("no key material for control key {id}")]
    UnknownControlKey { id: RecordId },

    #[error("cannot move a record from {from} to {to}")]
    InvalidTransition { from: DataState, to: DataState },

    #[error("cannot {operation} a {style} list")]
    InvalidStyle {
        style: ListStyle,
        operation: &'static str,
    },

    #[error(transparent)]
    Security(#[from] SecurityError),
}

impl Error {
    /// Returns the broad category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DuplicateId { .. }
            | Error::IdOutOfRange { .. }
            | Error::NotFound { .. }
            | Error::UnresolvedLink { .. }
            | Error::InvalidStaticId { .. }
            | Error::FieldType { .. }
            | Error::MissingDataKey { .. }
            | Error::Singleton { .. } => ErrorKind::Data,
            Error::NoControlKey
            | Error::SecurityInitialised
            | Error::UnknownControlKey { .. }
            | Error::InvalidTransition { .. }
            | Error::InvalidStyle { .. } => ErrorKind::Logic,
            Error::Security(_) => ErrorKind::Security,
        }
    }
}

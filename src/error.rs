//! Rich diagnostic error types for the peirce knowledge base.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the peirce crate.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum PeirceError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Kb(#[from] KbError),
}

// ---------------------------------------------------------------------------
// Codec errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CodecError {
    #[error("truncated input: needed {needed} byte(s) at offset {offset}, {available} available")]
    #[diagnostic(
        code(peirce::codec::truncated),
        help(
            "The encoded record ends before the value it promises. \
             This usually means the data file was cut short or the offset \
             table points into the middle of a record."
        )
    )]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("unknown operator tag {tag:#04x} at offset {offset}")]
    #[diagnostic(
        code(peirce::codec::bad_tag),
        help(
            "Logical-function records start with an operator tag byte. \
             An unknown tag means the record was written by an incompatible \
             version or the read started at the wrong offset."
        )
    )]
    UnknownTag { tag: u8, offset: usize },

    #[error("invalid UTF-8 in encoded string at offset {offset}")]
    #[diagnostic(
        code(peirce::codec::utf8),
        help("String payloads are length-prefixed UTF-8. The bytes at this offset are not valid UTF-8.")
    )]
    Utf8 {
        offset: usize,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("arity id {id} is not registered")]
    #[diagnostic(
        code(peirce::codec::unknown_arity),
        help(
            "Literals are encoded against the arity registry of the knowledge base \
             they were compiled into. Reading them against a different registry \
             (or before the registry is loaded) produces this error."
        )
    )]
    UnknownArityId { id: u32 },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    #[diagnostic(
        code(peirce::store::io),
        help(
            "A filesystem operation failed. Check that the knowledge-base prefix \
             points at a writable directory and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("memory map error on {path}: {message}")]
    #[diagnostic(
        code(peirce::store::mmap),
        help("Failed to map the store file. Check available virtual memory and file permissions.")
    )]
    Mmap { path: String, message: String },

    #[error("malformed store file {path}: {message}")]
    #[diagnostic(
        code(peirce::store::malformed),
        help(
            "The file's offset table is inconsistent with its size. \
             The compile that produced it likely crashed before the close-time \
             patch; recompile the knowledge base."
        )
    )]
    Malformed { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Knowledge-base errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum KbError {
    #[error("{operation} requires state {expected}, but the knowledge base is in state {actual}")]
    #[diagnostic(
        code(peirce::kb::state),
        help(
            "The knowledge base is either compiling or answering queries, never both. \
             Call finalize() to leave the current state before switching."
        )
    )]
    InvalidState {
        operation: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("unknown distance provider \"{key}\"")]
    #[diagnostic(
        code(peirce::kb::unknown_provider),
        help("Known providers are \"null\", \"basic\" and \"cost\".")
    )]
    UnknownProvider { key: String },

    #[error("unknown distance provider tag {tag:#04x} in config")]
    #[diagnostic(
        code(peirce::kb::unknown_provider_tag),
        help(
            "The .conf file names a distance provider this build does not know. \
             The knowledge base was probably compiled by a newer version."
        )
    )]
    UnknownProviderTag { tag: u8 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Codec(#[from] CodecError),
}

/// Convenience alias for functions returning peirce results.
pub type PeirceResult<T> = std::result::Result<T, PeirceError>;

/// Result type for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type for knowledge-base operations.
pub type KbResult<T> = std::result::Result<T, KbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_error_converts_to_peirce_error() {
        let err = CodecError::UnknownTag { tag: 0xff, offset: 3 };
        let top: PeirceError = err.into();
        assert!(matches!(top, PeirceError::Codec(CodecError::UnknownTag { .. })));
    }

    #[test]
    fn store_error_converts_through_kb_error() {
        let err = StoreError::Malformed {
            path: "kb.rm.dat".into(),
            message: "trailer offset past EOF".into(),
        };
        let kb: KbError = err.into();
        assert!(matches!(kb, KbError::Store(StoreError::Malformed { .. })));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = KbError::InvalidState {
            operation: "insert_implication",
            expected: "COMPILE",
            actual: "QUERY",
        };
        let msg = format!("{err}");
        assert!(msg.contains("insert_implication"));
        assert!(msg.contains("COMPILE"));
        assert!(msg.contains("QUERY"));
    }
}

//! Error types for the codec layer.
//!
//! [`HeadError`] covers problems found in the fixed-size head before any
//! payload bytes are read. [`CodecError`] is the top-level type returned by
//! every [`WireCodec`](super::WireCodec) operation.

use thiserror::Error;

/// Problems with the fixed-size head.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HeadError {
    /// Declared payload length exceeds the configured maximum.
    #[error("declared payload exceeds max packet size: {declared} > {max}")]
    Oversized {
        /// Length declared by the head.
        declared: usize,
        /// Configured maximum payload length.
        max: usize,
    },

    /// Fewer bytes than the head size were supplied.
    #[error("truncated head: have {have}, need {need}")]
    Truncated {
        /// Bytes supplied.
        have: usize,
        /// Bytes required for a complete head.
        need: usize,
    },
}

/// Top-level codec error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The head could not be decoded.
    #[error("malformed head: {0}")]
    MalformedHead(#[from] HeadError),

    /// Body length differs from the length declared by the head.
    #[error("payload length mismatch: declared {declared}, got {actual}")]
    LengthMismatch {
        /// Length declared by the head.
        declared: usize,
        /// Length of the supplied payload.
        actual: usize,
    },

    /// Outgoing payload exceeds the maximum packet size.
    #[error("payload too large: {size} > {max}")]
    PayloadTooLarge {
        /// Payload length.
        size: usize,
        /// Configured maximum payload length.
        max: usize,
    },

    /// A typed message could not be serialized into a payload.
    #[error("message encoding failed: {0}")]
    Encode(String),
}

impl CodecError {
    /// Whether this error was raised while decoding inbound bytes.
    ///
    /// Inbound errors mean the peer violated the wire format and the
    /// connection cannot be resynchronised.
    #[must_use]
    pub fn is_inbound(&self) -> bool {
        matches!(self, Self::MalformedHead(_) | Self::LengthMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(CodecError::from(HeadError::Truncated { have: 1, need: 4 }), true)]
    #[case(CodecError::LengthMismatch { declared: 3, actual: 2 }, true)]
    #[case(CodecError::PayloadTooLarge { size: 9, max: 8 }, false)]
    #[case(CodecError::Encode("bad".into()), false)]
    fn inbound_classification(#[case] err: CodecError, #[case] inbound: bool) {
        assert_eq!(err.is_inbound(), inbound);
    }

    #[test]
    fn head_error_message_names_both_sizes() {
        let err = CodecError::from(HeadError::Oversized {
            declared: 5000,
            max: 4096,
        });
        assert_eq!(
            err.to_string(),
            "malformed head: declared payload exceeds max packet size: 5000 > 4096"
        );
    }
}

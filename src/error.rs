use std::io;

use thiserror::Error;

use crate::token::TokenError;

/// Errors that end an extraction run.
///
/// A clean end-of-stream is not an error; `run` returns `Ok` in that case.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Transport failure while reading (device unplugged, broken pipe).
    #[error("byte source failed: {0}")]
    Source(#[from] io::Error),

    /// A completed frame could not be persisted and the sink policy is `Abort`.
    #[error("sink failed to store frame #{index}: {source}")]
    Sink {
        index: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A token could not be decoded and the malformed policy is `Fail`.
    #[error("undecodable token after {tokens_read} tokens: {source}")]
    Token {
        tokens_read: u64,
        #[source]
        source: TokenError,
    },
}

//! Debug drawer error types.

use thiserror::Error;

/// A record could not be decoded from a partition's byte stream.
///
/// Decode errors never escape the consumer tick: the drain logs them and
/// abandons the rest of the affected partition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The tag at `offset` does not name any known record kind.
    #[error("unknown record tag {tag} at byte offset {offset}")]
    UnknownTag { tag: u32, offset: usize },
    /// Fewer bytes remain in the block than the tag's payload requires.
    #[error(
        "record with tag {tag} at byte offset {offset} needs {needed} bytes but only {available} remain"
    )]
    Truncated {
        tag: u32,
        offset: usize,
        needed: usize,
        available: usize,
    },
}

/// Invalid stream configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// At least one producer slot is required.
    #[error("max_producers must be at least 1")]
    InvalidMaxProducers,
    /// Blocks must be able to hold the largest record.
    #[error("block size {block_size} is smaller than the largest record ({required} bytes)")]
    BlockTooSmall { block_size: usize, required: usize },
    /// The configuration text could not be parsed.
    #[error("failed to parse stream config: {0}")]
    Parse(#[from] toml::de::Error),
}

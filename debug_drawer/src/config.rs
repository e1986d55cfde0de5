use serde::Deserialize;

use crate::error::ConfigError;
use crate::record::Record;

/// Default size of one partition block in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 16 * 1024;

/// Sizing of the debug command stream.
///
/// Hosts that keep settings in a project TOML file can embed a table with
/// the same field names and load it with [`StreamConfig::from_toml_str`];
/// missing fields keep their defaults.
///
/// ```
/// use redlilium_debug_drawer::StreamConfig;
///
/// let config = StreamConfig::from_toml_str("max_producers = 8\nframe_record_budget = 10000").unwrap();
/// assert_eq!(config.max_producers, 8);
/// assert_eq!(config.frame_record_budget, Some(10000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Producer thread indices `0..max_producers`. One extra partition is
    /// reserved for callers without an index.
    pub max_producers: usize,
    /// Bytes per partition block. Must hold the largest record.
    pub block_size: usize,
    /// Records accepted per generation before further writes are throttled.
    /// `None` means unbounded.
    pub frame_record_budget: Option<usize>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_producers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            block_size: DEFAULT_BLOCK_SIZE,
            frame_record_budget: None,
        }
    }
}

impl StreamConfig {
    pub fn with_max_producers(mut self, max_producers: usize) -> Self {
        self.max_producers = max_producers;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_frame_record_budget(mut self, budget: Option<usize>) -> Self {
        self.frame_record_budget = budget;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_producers == 0 {
            return Err(ConfigError::InvalidMaxProducers);
        }
        if self.block_size < Record::MAX_ENCODED_LEN {
            return Err(ConfigError::BlockTooSmall {
                block_size: self.block_size,
                required: Record::MAX_ENCODED_LEN,
            });
        }
        Ok(())
    }

    /// Parse and validate a TOML table.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Number of partitions per segment, including the reserved one.
    pub fn partition_count(&self) -> usize {
        self.max_producers + 1
    }
}

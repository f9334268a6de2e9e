use crate::config::{MappingConfig, SyncConfig};
use crate::pipeline::defaults::{BoundaryWordTokenizer, RangeChangeGrouper};
use crate::pipeline::runtime::{PhonemeAligner, PhonemeAlignerParts};
use crate::pipeline::traits::{PhonemeGrouper, WordTokenizer};

pub struct PhonemeAlignerBuilder {
    mapping: MappingConfig,
    duration_epsilon_secs: f64,
    tokenizer: Option<Box<dyn WordTokenizer>>,
    grouper: Option<Box<dyn PhonemeGrouper>>,
}

impl PhonemeAlignerBuilder {
    pub fn new(mapping: MappingConfig) -> Self {
        Self {
            mapping,
            duration_epsilon_secs: SyncConfig::DEFAULT_DURATION_EPSILON_SECS,
            tokenizer: None,
            grouper: None,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.mapping).with_duration_epsilon(config.duration_epsilon_secs)
    }

    pub fn with_duration_epsilon(mut self, duration_epsilon_secs: f64) -> Self {
        if duration_epsilon_secs.is_finite() && duration_epsilon_secs > 0.0 {
            self.duration_epsilon_secs = duration_epsilon_secs;
        }
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Box<dyn WordTokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn with_grouper(mut self, grouper: Box<dyn PhonemeGrouper>) -> Self {
        self.grouper = Some(grouper);
        self
    }

    pub fn build(self) -> PhonemeAligner {
        PhonemeAligner::from_parts(PhonemeAlignerParts {
            mapping: self.mapping,
            duration_epsilon_secs: self.duration_epsilon_secs,
            tokenizer: self
                .tokenizer
                .unwrap_or_else(|| Box::new(BoundaryWordTokenizer)),
            grouper: self.grouper.unwrap_or_else(|| Box::new(RangeChangeGrouper)),
        })
    }
}

//! Algorithm tuning parameters.

/// Tuning parameters for the quorum-and-conviction algorithm.
///
/// The defaults are the values the protocol was characterized with: a
/// sample of 4 peers per round, a 0.75 quorum and conviction threshold,
/// and terminal classification after 3 epochs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusConfig {
    /// Number of engines queried per round (k).
    pub sample_size: usize,
    /// Minimum fraction of same-status responses in an epoch that counts
    /// as a threshold crossing (alpha).
    pub quorum_threshold: f64,
    /// Fraction of the sample size the conviction counter must exceed to
    /// advance an epoch (beta).
    pub conviction_threshold: f64,
    /// Number of epochs until terminal classification.
    pub max_epoch: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            sample_size: 4,
            quorum_threshold: 0.75,
            conviction_threshold: 0.75,
            max_epoch: 3,
        }
    }
}

impl ConsensusConfig {
    /// Validate the tuning constants. Malformed values are fatal at
    /// startup, never detected mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_size == 0 {
            return Err(ConfigError::ZeroSampleSize);
        }
        if !(self.quorum_threshold > 0.0 && self.quorum_threshold <= 1.0) {
            return Err(ConfigError::QuorumThreshold(self.quorum_threshold));
        }
        if !(self.conviction_threshold > 0.0 && self.conviction_threshold <= 1.0) {
            return Err(ConfigError::ConvictionThreshold(self.conviction_threshold));
        }
        if self.max_epoch == 0 {
            return Err(ConfigError::ZeroMaxEpoch);
        }
        Ok(())
    }

    /// Whether `n` matching responses cross the quorum threshold.
    pub fn quorum_reached(&self, n: usize) -> bool {
        n as f64 >= self.quorum_threshold * self.sample_size as f64
    }

    /// Whether the conviction counter is high enough to advance an epoch.
    pub fn conviction_reached(&self, cnt: u32) -> bool {
        cnt as f64 > self.conviction_threshold * self.sample_size as f64
    }
}

/// Errors in the tuning constants, surfaced at startup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The sample size must be at least 1.
    #[error("sample size must be at least 1")]
    ZeroSampleSize,

    /// The quorum threshold must lie in (0, 1].
    #[error("quorum threshold {0} outside (0, 1]")]
    QuorumThreshold(f64),

    /// The conviction threshold must lie in (0, 1].
    #[error("conviction threshold {0} outside (0, 1]")]
    ConvictionThreshold(f64),

    /// At least one epoch is required for a terminal classification.
    #[error("max epoch must be at least 1")]
    ZeroMaxEpoch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = ConsensusConfig::default();
        assert!(config.validate().is_ok());

        // ceil(0.75 * 4) = 3 matching responses reach quorum.
        assert!(!config.quorum_reached(2));
        assert!(config.quorum_reached(3));
        assert!(config.quorum_reached(4));

        // cnt > 0.75 * 4 means cnt >= 4.
        assert!(!config.conviction_reached(3));
        assert!(config.conviction_reached(4));
    }

    #[test]
    fn test_validate_rejects_malformed_constants() {
        let mut config = ConsensusConfig {
            sample_size: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroSampleSize));

        config.sample_size = 4;
        config.quorum_threshold = 1.5;
        assert_eq!(config.validate(), Err(ConfigError::QuorumThreshold(1.5)));

        config.quorum_threshold = 0.75;
        config.conviction_threshold = 0.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ConvictionThreshold(0.0))
        );

        config.conviction_threshold = 0.75;
        config.max_epoch = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxEpoch));
    }
}

//! Parameters of a key ceremony
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CeremonyConfig {
    /// Number of authorities that must finish a stage before the next stage may begin
    pub safety_threshold: usize,

    /// Number of authorities needed to decrypt; the sharing polynomials have degree one less
    pub decryption_threshold: usize,

    /// Upper bound on the authorities that may join in the first stage
    pub max_authorities: usize,

    /// Bit length of the safe prime behind the seed template
    pub key_bits: usize,
}

impl Default for CeremonyConfig {
    fn default() -> Self {
        return Self {
            safety_threshold: 1,
            decryption_threshold: 1,
            max_authorities: 3,
            key_bits: 128,
        };
    }
}

impl CeremonyConfig {
    pub fn new(
        safety_threshold: usize,
        decryption_threshold: usize,
        max_authorities: usize,
        key_bits: usize,
    ) -> Result<Self> {
        let config = Self {
            safety_threshold,
            decryption_threshold,
            max_authorities,
            key_bits,
        };
        config.validate()?;
        return Ok(config);
    }

    /// The thresholds must satisfy `max_authorities >= safety >= decryption > 0`
    pub fn validate(&self) -> Result<()> {
        if self.decryption_threshold == 0 {
            return Err(Error::Config(
                "decryption threshold must be positive".to_string(),
            ));
        }
        if self.safety_threshold < self.decryption_threshold {
            return Err(Error::Config(format!(
                "safety threshold {} is below decryption threshold {}",
                self.safety_threshold, self.decryption_threshold
            )));
        }
        if self.max_authorities < self.safety_threshold {
            return Err(Error::Config(format!(
                "{} authorities cannot meet safety threshold {}",
                self.max_authorities, self.safety_threshold
            )));
        }
        if self.key_bits < 16 || self.key_bits > crate::BigInt::BITS {
            return Err(Error::Config(format!(
                "key size of {} bits is outside 16..={}",
                self.key_bits,
                crate::BigInt::BITS
            )));
        }
        return Ok(());
    }

    /// Degree of every authority's secret polynomial
    pub fn polynomial_degree(&self) -> usize {
        return self.decryption_threshold - 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = CeremonyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.polynomial_degree(), 0);
    }

    #[test]
    fn test_rejects_bad_thresholds() {
        assert!(CeremonyConfig::new(3, 3, 3, 64).is_ok());
        assert!(CeremonyConfig::new(2, 3, 3, 64).is_err());
        assert!(CeremonyConfig::new(3, 0, 3, 64).is_err());
        assert!(CeremonyConfig::new(4, 2, 3, 64).is_err());
        assert!(CeremonyConfig::new(1, 1, 3, 8).is_err());
        assert!(CeremonyConfig::new(1, 1, 3, 4096).is_err());
    }
}

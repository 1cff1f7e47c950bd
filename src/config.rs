//! Configuration for the filter core and the surrounding services.
//!
//! Configuration is plain structs with builder-style setters, a
//! `validate()` that enforces the guardrail invariants, and sensible
//! defaults matching the original deployment (capacity 2^18 - 1, subtree
//! locking, proxy on 9090 in front of a filter on 9091).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::error::{Error, ErrorKind};

/// Default maximum item count: a full 18-level heap.
pub const DEFAULT_CAPACITY: usize = (1 << 18) - 1;

/// Default TCP port for the filter service.
pub const DEFAULT_FILTER_PORT: u16 = 9091;

/// Default HTTP port for the proxy.
pub const DEFAULT_PROXY_PORT: u16 = 9090;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Capacity below the minimum of 1.
    #[error("filter capacity must be at least 1")]
    InvalidCapacity,

    /// A variant name that matches neither locking strategy.
    #[error("unknown heap variant: {0}")]
    UnknownVariant(String),

    /// Worker thread count of zero.
    #[error("worker thread count must be at least 1")]
    InvalidWorkerThreads,

    /// An empty listen or upstream address.
    #[error("service address must not be empty")]
    EmptyAddress,
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        let kind = match &e {
            ConfigError::InvalidCapacity => ErrorKind::InvalidArgument,
            ConfigError::UnknownVariant(_) => ErrorKind::UnsupportedVariant,
            ConfigError::InvalidWorkerThreads | ConfigError::EmptyAddress => ErrorKind::Config,
        };
        Self::new(kind).with_message(e.to_string()).with_source(e)
    }
}

/// Heap locking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Variant {
    /// One reader/writer lock over the whole heap.
    Coarse,
    /// Per-node mutexes with tag-chasing percolation.
    #[default]
    Subtree,
}

impl Variant {
    /// Canonical name, as accepted by configuration and the CLI.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Coarse => "coarse",
            Self::Subtree => "subtree",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "coarse" | "coarse-rw" | "coarserw" => Ok(Self::Coarse),
            "subtree" => Ok(Self::Subtree),
            other => Err(ConfigError::UnknownVariant(other.to_string())),
        }
    }
}

/// Construction-time configuration for a [`Filter`].
///
/// [`Filter`]: crate::filter::Filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    /// Fixed maximum item count (must be at least 1).
    pub capacity: usize,
    /// Locking strategy.
    pub variant: Variant,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            variant: Variant::default(),
        }
    }
}

impl FilterConfig {
    /// Creates a configuration with the given capacity and the default
    /// variant.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Sets the locking variant.
    #[must_use]
    pub const fn variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    /// Validates the guardrail invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity < 1 {
            return Err(ConfigError::InvalidCapacity);
        }
        Ok(())
    }
}

/// Configuration for the TCP filter service.
#[derive(Debug, Clone)]
pub struct FilterServiceConfig {
    /// Service name used in log lines.
    pub name: String,
    /// TCP port to listen on.
    pub port: u16,
    /// The filter behind the service.
    pub filter: FilterConfig,
    /// Upper bound on concurrently served connections.
    pub worker_threads: usize,
}

impl Default for FilterServiceConfig {
    fn default() -> Self {
        Self {
            name: "filter".to_string(),
            port: DEFAULT_FILTER_PORT,
            filter: FilterConfig::default(),
            worker_threads: 8,
        }
    }
}

impl FilterServiceConfig {
    /// Validates the service and nested filter configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyAddress);
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::InvalidWorkerThreads);
        }
        self.filter.validate()
    }
}

/// Configuration for the HTTP front-end proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// HTTP port to listen on.
    pub port: u16,
    /// Address of the upstream filter service.
    pub filter_addr: String,
    /// Proxy instance id used in log lines.
    pub id: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PROXY_PORT,
            filter_addr: format!("127.0.0.1:{DEFAULT_FILTER_PORT}"),
            id: "1".to_string(),
        }
    }
}

impl ProxyConfig {
    /// Validates the proxy configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filter_addr.is_empty() || self.id.is_empty() {
            return Err(ConfigError::EmptyAddress);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(FilterConfig::default().capacity, 262_143);
        assert!(FilterConfig::default().validate().is_ok());
        assert!(FilterServiceConfig::default().validate().is_ok());
        assert!(ProxyConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = FilterConfig::with_capacity(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidCapacity));
        let err: Error = config.validate().unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn variant_parsing() {
        assert_eq!("coarse".parse::<Variant>(), Ok(Variant::Coarse));
        assert_eq!("coarseRW".parse::<Variant>(), Ok(Variant::Coarse));
        assert_eq!("SUBTREE".parse::<Variant>(), Ok(Variant::Subtree));
        assert!(matches!(
            "optimistic".parse::<Variant>(),
            Err(ConfigError::UnknownVariant(name)) if name == "optimistic"
        ));
    }

    #[test]
    fn unknown_variant_maps_to_unsupported() {
        let err: Error = "fancy".parse::<Variant>().unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVariant);
    }

    #[test]
    fn variant_display_round_trips() {
        for variant in [Variant::Coarse, Variant::Subtree] {
            assert_eq!(variant.as_str().parse::<Variant>(), Ok(variant));
        }
    }

    #[test]
    fn zero_workers_rejected() {
        let config = FilterServiceConfig {
            worker_threads: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidWorkerThreads));
    }
}

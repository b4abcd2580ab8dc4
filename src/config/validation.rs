//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check flag dependencies (a manager needs the service it hangs off)
//! - Validate value ranges (limits > 0, ports valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DaemonConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use url::Url;

use crate::config::schema::DaemonConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("feature `{feature}` requires feature `{requires}`")]
    MissingFeature {
        feature: &'static str,
        requires: &'static str,
    },
    #[error("listener.default_port must not be 0")]
    ZeroPort,
    #[error("listener.max_connections must be greater than 0")]
    ZeroConnections,
    #[error("auth.api_key must not be empty")]
    EmptyApiKey,
    #[error("satellite `{prefix}` has invalid url `{url}`")]
    InvalidSatellite { prefix: String, url: String },
    #[error("event_log.failure_status must not be 0")]
    ZeroFailureStatus,
}

/// Check a configuration for semantic errors.
pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.features.redfish_aggregation && !config.features.redfish {
        errors.push(ValidationError::MissingFeature {
            feature: "redfish_aggregation",
            requires: "redfish",
        });
    }

    if config.listener.default_port == 0 {
        errors.push(ValidationError::ZeroPort);
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroConnections);
    }

    if config.auth.api_key.is_empty() {
        errors.push(ValidationError::EmptyApiKey);
    }

    if config.event_log.failure_status == 0 {
        errors.push(ValidationError::ZeroFailureStatus);
    }

    for satellite in &config.aggregation.satellites {
        let valid = Url::parse(&satellite.url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::InvalidSatellite {
                prefix: satellite.prefix.clone(),
                url: satellite.url.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SatelliteConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&DaemonConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut config = DaemonConfig::default();
        config.features.redfish_aggregation = true;
        config.listener.default_port = 0;
        config.auth.api_key.clear();
        config.aggregation.satellites.push(SatelliteConfig {
            prefix: "5B247A".into(),
            url: "ftp://10.0.0.2".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::MissingFeature {
            feature: "redfish_aggregation",
            requires: "redfish",
        }));
        assert!(errors.contains(&ValidationError::ZeroPort));
    }

    #[test]
    fn monitor_failure_status_must_be_nonzero() {
        let mut config = DaemonConfig::default();
        config.event_log.failure_status = 0;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::ZeroFailureStatus]
        );
    }
}

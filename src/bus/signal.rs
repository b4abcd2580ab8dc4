//! Bus signals and match rules.

use serde::{Deserialize, Serialize};

use crate::bus::connection::BusError;

/// A signal emitted on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Object path the signal originates from.
    pub path: String,
    /// Interface the signal belongs to.
    pub interface: String,
    /// Signal name.
    pub member: String,
    /// Signal arguments.
    #[serde(default)]
    pub body: serde_json::Value,
}

impl Signal {
    pub fn new(
        path: impl Into<String>,
        interface: impl Into<String>,
        member: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            interface: interface.into(),
            member: member.into(),
            body: serde_json::Value::Null,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }
}

/// Which signals a subscription receives.
///
/// Unset fields match anything. `path_namespace` matches the path itself and
/// every path below it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchRule {
    pub interface: Option<String>,
    pub member: Option<String>,
    pub path: Option<String>,
    pub path_namespace: Option<String>,
}

impl MatchRule {
    /// Rule matching every signal.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn path_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.path_namespace = Some(namespace.into());
        self
    }

    /// Reject rules the bus would refuse.
    pub fn validate(&self) -> Result<(), BusError> {
        let invalid = |reason: &str| BusError::InvalidRule {
            rule: self.to_string(),
            reason: reason.to_string(),
        };

        if self.path.is_some() && self.path_namespace.is_some() {
            return Err(invalid("path and path_namespace are mutually exclusive"));
        }
        for p in self.path.iter().chain(self.path_namespace.iter()) {
            if !p.starts_with('/') {
                return Err(invalid("object paths must be absolute"));
            }
        }
        if self.interface.as_deref() == Some("") || self.member.as_deref() == Some("") {
            return Err(invalid("empty name"));
        }
        Ok(())
    }

    pub fn matches(&self, signal: &Signal) -> bool {
        if let Some(interface) = &self.interface {
            if *interface != signal.interface {
                return false;
            }
        }
        if let Some(member) = &self.member {
            if *member != signal.member {
                return false;
            }
        }
        if let Some(path) = &self.path {
            if *path != signal.path {
                return false;
            }
        }
        if let Some(ns) = &self.path_namespace {
            let ns = ns.trim_end_matches('/');
            let below = signal
                .path
                .strip_prefix(ns)
                .map(|rest| rest.is_empty() || rest.starts_with('/'))
                .unwrap_or(false);
            if !below {
                return false;
            }
        }
        true
    }
}

impl std::fmt::Display for MatchRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "type='signal'")?;
        if let Some(v) = &self.interface {
            write!(f, ",interface='{}'", v)?;
        }
        if let Some(v) = &self.member {
            write!(f, ",member='{}'", v)?;
        }
        if let Some(v) = &self.path {
            write!(f, ",path='{}'", v)?;
        }
        if let Some(v) = &self.path_namespace {
            write!(f, ",path_namespace='{}'", v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROPS: &str = "org.freedesktop.DBus.Properties";

    #[test]
    fn empty_rule_matches_everything() {
        let sig = Signal::new("/a/b", PROPS, "PropertiesChanged");
        assert!(MatchRule::any().matches(&sig));
    }

    #[test]
    fn namespace_matches_self_and_children_only() {
        let rule = MatchRule::any().path_namespace("/xyz/openbmc_project/state");
        assert!(rule.matches(&Signal::new("/xyz/openbmc_project/state", PROPS, "X")));
        assert!(rule.matches(&Signal::new("/xyz/openbmc_project/state/host0", PROPS, "X")));
        assert!(!rule.matches(&Signal::new("/xyz/openbmc_project/statez", PROPS, "X")));
        assert!(!rule.matches(&Signal::new("/xyz/openbmc_project", PROPS, "X")));
    }

    #[test]
    fn every_field_must_match() {
        let rule = MatchRule::any()
            .interface(PROPS)
            .member("PropertiesChanged")
            .path("/xyz/openbmc_project/network/hypervisor");
        assert!(rule.matches(&Signal::new(
            "/xyz/openbmc_project/network/hypervisor",
            PROPS,
            "PropertiesChanged"
        )));
        assert!(!rule.matches(&Signal::new(
            "/xyz/openbmc_project/network/hypervisor",
            PROPS,
            "InterfacesAdded"
        )));
    }

    #[test]
    fn validation() {
        assert!(MatchRule::any().path("relative").validate().is_err());
        assert!(MatchRule::any().path("/a").path_namespace("/a").validate().is_err());
        assert!(MatchRule::any().member("").validate().is_err());
        assert!(MatchRule::any().interface(PROPS).path("/a").validate().is_ok());
    }

    #[test]
    fn renders_as_match_string() {
        let rule = MatchRule::any().interface(PROPS).member("PropertiesChanged");
        assert_eq!(
            rule.to_string(),
            "type='signal',interface='org.freedesktop.DBus.Properties',member='PropertiesChanged'"
        );
    }
}

// Persisted subsystem state: last applied proxy (secret excluded) and the
// last capability snapshot. Both are re-validated on restore.

use chanline_api::ProxyScheme;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::capability::CapabilitySnapshot;
use super::proxy::ProxyConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedProxy {
    pub enabled: bool,
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl From<&ProxyConfig> for PersistedProxy {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            enabled: config.enabled,
            scheme: config.scheme,
            host: config.host.clone(),
            port: config.port,
            username: config.username().map(String::from),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub proxy: Option<PersistedProxy>,
    #[serde(default)]
    pub capabilities: Option<CapabilitySnapshot>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl PersistedState {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::proxy::ProxyCredentials;
    use secrecy::SecretString;

    #[test]
    fn password_never_reaches_disk() {
        let config = ProxyConfig {
            enabled: true,
            scheme: ProxyScheme::Socks5,
            host: "proxy.lan".into(),
            port: 1080,
            credentials: Some(ProxyCredentials {
                username: "viewer".into(),
                password: SecretString::from("do-not-persist"),
            }),
        };
        let state = PersistedState {
            proxy: Some(PersistedProxy::from(&config)),
            capabilities: Some(CapabilitySnapshot::baseline()),
            saved_at: None,
        };

        let json = state.to_json().unwrap();
        assert!(!json.contains("do-not-persist"));
        assert!(json.contains("\"socks5\""));
        assert_eq!(PersistedState::from_json(&json).unwrap(), state);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(PersistedState::from_json("{}").unwrap(), PersistedState::default());
    }
}

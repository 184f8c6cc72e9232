//! Client configuration: backend location, roles and credentials

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Role the caller is acting as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Patient,
    Clinician,
    Administrator,
}

impl Role {
    /// Header the backend reads this role's token from
    pub fn header_name(self) -> &'static str {
        match self {
            Role::Patient => "token",
            Role::Clinician => "dtoken",
            Role::Administrator => "atoken",
        }
    }

    /// Path prefix of this role's chatbot endpoints
    pub fn api_prefix(self) -> &'static str {
        match self {
            Role::Patient => "/api/user/chatbot",
            Role::Clinician => "/api/doctor/chatbot",
            Role::Administrator => "/api/admin/chatbot",
        }
    }

    /// Only the patient endpoints serve `/chat/stream`
    pub fn supports_streaming(self) -> bool {
        self == Role::Patient
    }

    /// Only the patient endpoints understand `symptom_checker_mode`
    pub fn supports_guided(self) -> bool {
        self == Role::Patient
    }

    /// Role whose endpoints a request with this credential reaches.
    ///
    /// Unauthenticated callers use the patient endpoints.
    pub fn of(credential: Option<&Credential>) -> Role {
        credential.map_or(Role::Patient, Credential::role)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Patient => "patient",
            Role::Clinician => "clinician",
            Role::Administrator => "administrator",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" | "user" => Ok(Role::Patient),
            "clinician" | "doctor" => Ok(Role::Clinician),
            "admin" | "administrator" => Ok(Role::Administrator),
            other => Err(ConfigError::UnknownRole(other.to_string())),
        }
    }
}

/// An opaque token bound to the role it was issued for
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    role: Role,
    token: String,
}

impl Credential {
    pub fn new(role: Role, token: impl Into<String>) -> Self {
        Self {
            role,
            token: token.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn header_name(&self) -> &'static str {
        self.role.header_name()
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("role", &self.role)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// The three stored role-scoped tokens
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub patient: Option<String>,
    pub clinician: Option<String>,
    pub administrator: Option<String>,
}

impl Credentials {
    /// Resolve the credential for the active role.
    ///
    /// `None` for an unauthenticated caller or when the role has no
    /// (non-empty) stored token.
    pub fn for_role(&self, role: Option<Role>) -> Option<Credential> {
        let role = role?;
        let token = match role {
            Role::Patient => self.patient.as_deref(),
            Role::Clinician => self.clinician.as_deref(),
            Role::Administrator => self.administrator.as_deref(),
        }?;
        if token.is_empty() {
            return None;
        }
        Some(Credential::new(role, token))
    }
}

/// Configuration for the chat client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Active role; `None` means unauthenticated
    pub role: Option<Role>,
    pub credentials: Credentials,
    /// Whether free-form messages use the streaming endpoint
    pub streaming: bool,
    /// Whole-request timeout applied by the HTTP client
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            role: Some(Role::Patient),
            credentials: Credentials::default(),
            streaming: true,
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (tests use a map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let role = match lookup("HEALTHMATE_ROLE") {
            Some(value) if value.trim().eq_ignore_ascii_case("none") => None,
            Some(value) => Some(value.parse()?),
            None => Some(Role::Patient),
        };

        let streaming = match lookup("HEALTHMATE_STREAMING") {
            Some(value) => parse_bool(&value).ok_or(ConfigError::InvalidValue {
                name: "HEALTHMATE_STREAMING",
                value,
            })?,
            None => true,
        };

        let request_timeout = match lookup("HEALTHMATE_TIMEOUT_SECS") {
            Some(value) => Some(Duration::from_secs(value.trim().parse().map_err(|_| {
                ConfigError::InvalidValue {
                    name: "HEALTHMATE_TIMEOUT_SECS",
                    value: value.clone(),
                }
            })?)),
            None => None,
        };

        Ok(Self {
            base_url: lookup("HEALTHMATE_API_URL")
                .map_or_else(|| DEFAULT_API_URL.to_string(), |url| {
                    url.trim_end_matches('/').to_string()
                }),
            role,
            credentials: Credentials {
                patient: lookup("HEALTHMATE_TOKEN"),
                clinician: lookup("HEALTHMATE_DTOKEN"),
                administrator: lookup("HEALTHMATE_ATOKEN"),
            },
            streaming,
            request_timeout,
        })
    }

    /// Credential for the configured role
    pub fn credential(&self) -> Option<Credential> {
        self.credentials.for_role(self.role)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn credential_follows_active_role() {
        let creds = Credentials {
            patient: Some("p-token".into()),
            clinician: Some("d-token".into()),
            administrator: None,
        };

        let patient = creds.for_role(Some(Role::Patient)).unwrap();
        assert_eq!(patient.header_name(), "token");
        assert_eq!(patient.token(), "p-token");

        let clinician = creds.for_role(Some(Role::Clinician)).unwrap();
        assert_eq!(clinician.header_name(), "dtoken");

        assert!(creds.for_role(Some(Role::Administrator)).is_none());
        assert!(creds.for_role(None).is_none());
    }

    #[test]
    fn only_patient_endpoints_stream_and_guide() {
        assert!(Role::Patient.supports_streaming());
        assert!(Role::Patient.supports_guided());
        for role in [Role::Clinician, Role::Administrator] {
            assert!(!role.supports_streaming());
            assert!(!role.supports_guided());
        }

        let doctor = Credential::new(Role::Clinician, "d");
        assert_eq!(Role::of(Some(&doctor)), Role::Clinician);
        assert_eq!(Role::of(None), Role::Patient);
    }

    #[test]
    fn empty_token_is_absent() {
        let creds = Credentials {
            patient: Some(String::new()),
            ..Credentials::default()
        };
        assert!(creds.for_role(Some(Role::Patient)).is_none());
    }

    #[test]
    fn debug_redacts_token() {
        let cred = Credential::new(Role::Administrator, "secret");
        let rendered = format!("{cred:?}");
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn defaults_without_environment() {
        let config = ClientConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.role, Some(Role::Patient));
        assert!(config.streaming);
        assert!(config.request_timeout.is_none());
        assert!(config.credential().is_none());
    }

    #[test]
    fn reads_all_variables() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("HEALTHMATE_API_URL", "https://api.example.org/"),
            ("HEALTHMATE_ROLE", "doctor"),
            ("HEALTHMATE_DTOKEN", "abc"),
            ("HEALTHMATE_STREAMING", "off"),
            ("HEALTHMATE_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://api.example.org");
        assert_eq!(config.role, Some(Role::Clinician));
        assert!(!config.streaming);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.credential().unwrap().token(), "abc");
    }

    #[test]
    fn none_role_is_unauthenticated() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("HEALTHMATE_ROLE", "none"),
            ("HEALTHMATE_TOKEN", "p"),
        ]))
        .unwrap();
        assert!(config.role.is_none());
        assert!(config.credential().is_none());
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            ClientConfig::from_lookup(lookup_from(&[("HEALTHMATE_ROLE", "nurse")])).unwrap_err(),
            ConfigError::UnknownRole("nurse".into())
        );
        assert!(matches!(
            ClientConfig::from_lookup(lookup_from(&[("HEALTHMATE_STREAMING", "maybe")])),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}

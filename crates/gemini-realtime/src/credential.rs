//! Externally supplied authentication for the connection request.

use crate::error::CredentialError;
use secrecy::{ExposeSecret, SecretString};

/// Where the token is placed on the connection request.
#[derive(Debug)]
pub enum Credential {
    /// Appended to the endpoint URL as `?name=value`.
    QueryParam { name: String, value: SecretString },
    /// Sent as an HTTP header on the upgrade request.
    Header { name: String, value: SecretString },
    /// The endpoint needs no authentication (local relays, tests).
    None,
}

impl Credential {
    pub fn query_param(name: impl Into<String>, value: SecretString) -> Self {
        Self::QueryParam {
            name: name.into(),
            value,
        }
    }

    pub fn header(name: impl Into<String>, value: SecretString) -> Self {
        Self::Header {
            name: name.into(),
            value,
        }
    }

    fn duplicate(&self) -> Self {
        let copy = |secret: &SecretString| SecretString::from(secret.expose_secret().to_owned());
        match self {
            Self::QueryParam { name, value } => Self::QueryParam {
                name: name.clone(),
                value: copy(value),
            },
            Self::Header { name, value } => Self::Header {
                name: name.clone(),
                value: copy(value),
            },
            Self::None => Self::None,
        }
    }
}

/// Supplies the credential each time a session connects.
pub trait CredentialProvider: Send + Sync {
    fn credential(&self) -> Result<Credential, CredentialError>;
}

/// A credential fixed at construction time.
#[derive(Debug)]
pub struct StaticCredential(Credential);

impl StaticCredential {
    pub fn new(credential: Credential) -> Self {
        Self(credential)
    }

    pub fn query_param(name: impl Into<String>, value: SecretString) -> Self {
        Self(Credential::query_param(name, value))
    }

    pub fn header(name: impl Into<String>, value: SecretString) -> Self {
        Self(Credential::header(name, value))
    }

    pub fn none() -> Self {
        Self(Credential::None)
    }
}

impl CredentialProvider for StaticCredential {
    fn credential(&self) -> Result<Credential, CredentialError> {
        Ok(self.0.duplicate())
    }
}

/// Reads the token from an environment variable on every connect, so a
/// rotated key is picked up by the next session.
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
    param: String,
    as_header: bool,
}

impl EnvCredential {
    /// Token from `var`, sent as the `param` query parameter.
    pub fn query_param(var: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            param: param.into(),
            as_header: false,
        }
    }

    /// Token from `var`, sent as the `header` request header.
    pub fn header(var: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            param: header.into(),
            as_header: true,
        }
    }
}

impl CredentialProvider for EnvCredential {
    fn credential(&self) -> Result<Credential, CredentialError> {
        let value =
            std::env::var(&self.var).map_err(|_| CredentialError::MissingVar(self.var.clone()))?;
        if value.trim().is_empty() {
            return Err(CredentialError::Empty(self.var.clone()));
        }
        let value = SecretString::from(value);
        Ok(if self.as_header {
            Credential::header(self.param.clone(), value)
        } else {
            Credential::query_param(self.param.clone(), value)
        })
    }
}

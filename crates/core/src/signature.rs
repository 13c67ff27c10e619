//! Digital signatures over reports.
//!
//! A signature is a SHA-256 commitment to `(report, signer, method,
//! timestamp)`. It records who attested to what and when; it is not a
//! cryptographic proof of identity. Real PKI signing would replace
//! [`DigitalSignature::compute_hash`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;

use crate::actor::ActorContext;
use crate::audit::{self, actions, resource_types, AuditFact, AuditSink};
use crate::error::CoreError;
use crate::hashing::sha256_hex;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Method and credentials
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureMethod {
    Password,
    Biometric,
    Token,
    Certificate,
}

impl SignatureMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureMethod::Password => "password",
            SignatureMethod::Biometric => "biometric",
            SignatureMethod::Token => "token",
            SignatureMethod::Certificate => "certificate",
        }
    }
}

impl FromStr for SignatureMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(SignatureMethod::Password),
            "biometric" => Ok(SignatureMethod::Biometric),
            "token" => Ok(SignatureMethod::Token),
            "certificate" => Ok(SignatureMethod::Certificate),
            other => Err(CoreError::UnsupportedMethod(other.to_string())),
        }
    }
}

impl fmt::Display for SignatureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secret material presented with a signing request. Never logged.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureCredentials {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub certificate: Option<String>,
}

impl SignatureCredentials {
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..Self::default()
        }
    }

    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn certificate(certificate: impl Into<String>) -> Self {
        Self {
            certificate: Some(certificate.into()),
            ..Self::default()
        }
    }

    /// Check that the material `method` needs is present and non-empty.
    ///
    /// Biometric capture happens on the client, so it needs nothing here.
    pub fn require_for(&self, method: SignatureMethod) -> Result<(), CoreError> {
        let (field, value) = match method {
            SignatureMethod::Password => ("password", &self.password),
            SignatureMethod::Token => ("token", &self.token),
            SignatureMethod::Certificate => ("certificate", &self.certificate),
            SignatureMethod::Biometric => return Ok(()),
        };
        match value.as_deref() {
            Some(v) if !v.is_empty() => Ok(()),
            _ => Err(CoreError::Authentication(format!(
                "{field} is required for {method} signatures"
            ))),
        }
    }
}

impl fmt::Debug for SignatureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("SignatureCredentials")
            .field("password", &mask(&self.password))
            .field("token", &mask(&self.token))
            .field("certificate", &mask(&self.certificate))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// DigitalSignature
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitalSignature {
    pub report_id: String,
    pub signer_id: String,
    pub signer_name: String,
    pub timestamp: Timestamp,
    pub method: SignatureMethod,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub signature_hash: String,
}

impl DigitalSignature {
    /// SHA-256 hex over the report, signer, method and the timestamp at
    /// nanosecond precision.
    pub fn compute_hash(
        report_id: &str,
        signer_id: &str,
        method: SignatureMethod,
        timestamp: Timestamp,
    ) -> String {
        let material = format!(
            "{report_id}|{signer_id}|{method}|{}",
            timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
        );
        sha256_hex(material.as_bytes())
    }

    /// Whether `signature_hash` still matches the signed fields.
    pub fn verify(&self) -> bool {
        Self::compute_hash(&self.report_id, &self.signer_id, self.method, self.timestamp)
            == self.signature_hash
    }
}

// ---------------------------------------------------------------------------
// Credential validation
// ---------------------------------------------------------------------------

/// Identity provider check of presented credentials.
///
/// Only called after [`SignatureCredentials::require_for`] has passed.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(
        &self,
        actor: &ActorContext,
        method: SignatureMethod,
        credentials: &SignatureCredentials,
    ) -> Result<(), CoreError>;
}

/// In-process validator.
///
/// Users with a registered password must present it for password
/// signatures; everything else that passed the presence check is accepted.
#[derive(Default)]
pub struct MemoryCredentialValidator {
    /// user id -> SHA-256 hex of the password
    password_digests: HashMap<String, String>,
}

impl MemoryCredentialValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(mut self, user_id: impl Into<String>, password: &str) -> Self {
        self.password_digests
            .insert(user_id.into(), sha256_hex(password.as_bytes()));
        self
    }
}

#[async_trait]
impl CredentialValidator for MemoryCredentialValidator {
    async fn validate(
        &self,
        actor: &ActorContext,
        method: SignatureMethod,
        credentials: &SignatureCredentials,
    ) -> Result<(), CoreError> {
        if method != SignatureMethod::Password {
            return Ok(());
        }
        let Some(expected) = self.password_digests.get(&actor.user_id) else {
            return Ok(());
        };
        let presented = credentials.password.as_deref().unwrap_or_default();
        if sha256_hex(presented.as_bytes()) == *expected {
            Ok(())
        } else {
            Err(CoreError::Authentication("Invalid credentials".into()))
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Issues signatures and remembers them.
///
/// The hash is unkeyed, so anyone can build a self-consistent
/// [`DigitalSignature`]. Only signatures recorded here passed the
/// credential check.
pub struct SignatureService {
    validator: Arc<dyn CredentialValidator>,
    audit: Arc<dyn AuditSink>,
    /// signature hash -> issued signature
    issued: RwLock<HashMap<String, DigitalSignature>>,
}

impl SignatureService {
    pub fn new(validator: Arc<dyn CredentialValidator>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            validator,
            audit,
            issued: RwLock::new(HashMap::new()),
        }
    }

    /// Whether this service issued exactly `signature`.
    pub async fn was_issued(&self, signature: &DigitalSignature) -> bool {
        self.issued.read().await.get(&signature.signature_hash) == Some(signature)
    }

    /// Validate the actor's credentials for `method` and sign `report_id`.
    ///
    /// Errors: `Authentication` without an actor or with missing/rejected
    /// credentials, `UnsupportedMethod` for unknown methods.
    pub async fn create_signature(
        &self,
        report_id: &str,
        method: &str,
        credentials: &SignatureCredentials,
        actor: Option<&ActorContext>,
    ) -> Result<DigitalSignature, CoreError> {
        let actor = actor
            .filter(|a| !a.user_id.is_empty())
            .ok_or_else(|| CoreError::Authentication("Signing requires an authenticated user".into()))?;
        let method: SignatureMethod = method.parse()?;

        credentials.require_for(method)?;
        self.validator.validate(actor, method, credentials).await?;

        let timestamp = Utc::now();
        let signature = DigitalSignature {
            report_id: report_id.to_string(),
            signer_id: actor.user_id.clone(),
            signer_name: actor.display_name.clone(),
            timestamp,
            method,
            ip_address: actor.ip_address.clone(),
            user_agent: actor.user_agent.clone(),
            signature_hash: DigitalSignature::compute_hash(report_id, &actor.user_id, method, timestamp),
        };

        self.issued
            .write()
            .await
            .insert(signature.signature_hash.clone(), signature.clone());

        tracing::info!(
            report_id,
            signer_id = %signature.signer_id,
            method = %method,
            "Signature created"
        );
        let fact = AuditFact::new(actions::SIGNATURE_CREATE, resource_types::REPORT, report_id)
            .with_actor(&actor.user_id)
            .with_details(json!({
                "method": method.as_str(),
                "signerId": signature.signer_id,
                "signerName": signature.signer_name,
                "signatureHash": signature.signature_hash,
                "ipAddress": signature.ip_address,
            }));
        audit::emit(self.audit.as_ref(), fact).await;

        Ok(signature)
    }
}

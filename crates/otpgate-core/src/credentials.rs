//! Session credentials and their local durable store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SessionResult;

/// An opaque session credential document.
///
/// The gateway never interprets the contents; it only moves the blob between
/// the retrieval backends, the local store and the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(serde_json::Value);

impl Credentials {
    /// Wraps an already-parsed credential document.
    pub fn from_value(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Parses a credential document from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> SessionResult<Self> {
        Ok(Self(serde_json::from_slice(bytes)?))
    }

    /// Returns the underlying document.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Serializes the document for persistence.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Serializing a Value cannot fail.
        serde_json::to_vec_pretty(&self.0).unwrap_or_default()
    }
}

/// Local durable storage for the process's single credential document.
///
/// One document per process; `persist` overwrites, `delete` is idempotent.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Writes the credential document, replacing any prior one.
    async fn persist(&self, credentials: &Credentials) -> SessionResult<()>;

    /// Reads the stored credential document, if any.
    async fn load(&self) -> SessionResult<Option<Credentials>>;

    /// Removes the stored credential document.
    async fn delete(&self) -> SessionResult<()>;
}

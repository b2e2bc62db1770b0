//! Session-credential resolution.
//!
//! Deployments carry a session identifier issued by a pairing site; the
//! structural prefix of the identifier selects which backend holds the
//! credential document. Every successfully resolved document is persisted
//! through the [`CredentialStore`] before it is returned, so a later
//! restart can fall back to the local copy.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::read::GzDecoder;
use serde::Deserialize;
use tracing::{info, warn};

use otpgate_core::{CredentialStore, Credentials, SessionError, SessionResult};

use crate::config::SessionConfig;

const DIRECT_PREFIX: &str = "Ice~";
const LEGACY_PREFIX: &str = "Darex~";
const OBJECT_PREFIX: &str = "SUBZERO~";
const KEYED_PREFIX: &str = "SUBZERO-MD~";
const FILE_STORE_PREFIX: &str = "SUBZERO-MD;;;";

const SHORT_SESSION_ID_LENGTH: usize = 6;
const OBJECT_SHORT_ID_LENGTH: usize = 8;

/// The retrieval strategy selected by a session identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Direct-JSON endpoint, `{success, session}` body.
    Direct(String),
    /// Legacy endpoint: plain `session` JSON or base64(gzip) `data` blob.
    Legacy(String),
    /// Object store: short hex id or a content hash resolved via an index.
    Object(String),
    /// Keyed API endpoint taking the full identifier.
    Keyed(String),
    /// File store fetched by bare id.
    FileStore(String),
}

impl Strategy {
    /// Classifies a session identifier by its structural prefix.
    pub fn detect(session_id: &str) -> Self {
        if let Some(id) = session_id.strip_prefix(DIRECT_PREFIX) {
            Self::Direct(id.to_string())
        } else if let Some(id) = session_id.strip_prefix(LEGACY_PREFIX) {
            Self::Legacy(id.to_string())
        } else if session_id.starts_with(KEYED_PREFIX) {
            // The keyed endpoint wants the full prefixed identifier.
            Self::Keyed(session_id.to_string())
        } else if let Some(id) = session_id.strip_prefix(OBJECT_PREFIX) {
            Self::Object(id.to_string())
        } else if let Some(id) = session_id.strip_prefix(FILE_STORE_PREFIX) {
            Self::FileStore(id.to_string())
        } else {
            Self::FileStore(session_id.to_string())
        }
    }
}

// =============================================================================
// Response shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct DirectResponse {
    #[serde(default)]
    success: bool,
    session: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LegacyResponse {
    #[serde(default)]
    success: bool,
    session: Option<serde_json::Value>,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    #[serde(default)]
    sha: String,
    #[serde(default)]
    path: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeyedResponse {
    #[serde(rename = "credsData")]
    creds_data: Option<serde_json::Value>,
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves session identifiers to credential documents.
pub struct SessionResolver {
    http: reqwest::Client,
    config: SessionConfig,
    store: Arc<dyn CredentialStore>,
}

impl SessionResolver {
    /// Creates a resolver over the configured endpoints.
    pub fn new(config: SessionConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            store,
        }
    }

    /// Resolves the credential document for a session identifier.
    ///
    /// An empty identifier falls back to the locally persisted document.
    pub async fn resolve(&self, session_id: &str) -> SessionResult<Credentials> {
        if session_id.is_empty() {
            info!("No session id configured, trying local credentials");
            return self
                .store
                .load()
                .await?
                .ok_or_else(|| SessionError::NotFound("no session id and no local credentials".into()));
        }

        let credentials = match Strategy::detect(session_id) {
            Strategy::Direct(id) => self.resolve_direct(&id).await,
            Strategy::Legacy(id) => self.resolve_legacy(&id).await,
            Strategy::Object(id) => self.resolve_object(&id).await,
            Strategy::Keyed(id) => self.resolve_keyed(&id).await,
            Strategy::FileStore(id) => self.resolve_file_store(&id).await,
        }?;

        // Persist before returning so a restart can reuse the document.
        self.store.persist(&credentials).await?;
        info!("Session credentials resolved and persisted");
        Ok(credentials)
    }

    async fn resolve_direct(&self, id: &str) -> SessionResult<Credentials> {
        if id.len() != SHORT_SESSION_ID_LENGTH {
            return Err(SessionError::InvalidFormat(format!(
                "direct session id must be {SHORT_SESSION_ID_LENGTH} characters"
            )));
        }

        let url = format!("{}/session/{id}", self.config.direct_base_url);
        let response: DirectResponse = self.get_json(&url, &[]).await?;

        if !response.success {
            return Err(SessionError::Unreachable(
                "direct session server refused the id".into(),
            ));
        }
        response
            .session
            .map(Credentials::from_value)
            .ok_or_else(|| SessionError::InvalidFormat("direct response carries no session".into()))
    }

    async fn resolve_legacy(&self, id: &str) -> SessionResult<Credentials> {
        if id.len() != SHORT_SESSION_ID_LENGTH {
            return Err(SessionError::InvalidFormat(format!(
                "legacy session id must be {SHORT_SESSION_ID_LENGTH} characters"
            )));
        }

        let url = format!("{}/session/{id}", self.config.legacy_base_url);
        let response: LegacyResponse = self.get_json(&url, &[]).await?;

        if !response.success {
            return Err(SessionError::Unreachable(
                "legacy session server refused the id".into(),
            ));
        }

        // Migrated records carry plain JSON; older ones a compressed blob.
        if let Some(session) = response.session {
            return Ok(Credentials::from_value(session));
        }
        if let Some(data) = response.data {
            return decode_legacy_blob(&data);
        }
        Err(SessionError::InvalidFormat(
            "legacy response carries neither session nor data".into(),
        ))
    }

    async fn resolve_object(&self, id: &str) -> SessionResult<Credentials> {
        if is_short_object_id(id) {
            let path = format!("sessions/SUBZERO_{id}.json");
            let entry: ObjectEntry = self.get_object(&path).await?;
            return decode_object_content(&entry);
        }

        // Content-hash form: list the index and match on the hash.
        let entries: Vec<ObjectEntry> = self.get_object("sessions").await?;
        let entry = entries
            .into_iter()
            .find(|e| e.sha == id)
            .ok_or_else(|| SessionError::NotFound(format!("no session object with hash {id}")))?;
        let full: ObjectEntry = self.get_object(&entry.path).await?;
        decode_object_content(&full)
    }

    async fn resolve_keyed(&self, full_id: &str) -> SessionResult<Credentials> {
        let url = format!("{}/api/downloadCreds.php/{full_id}", self.config.keyed_base_url);
        let response: KeyedResponse = self
            .get_json(&url, &[("x-api-key", self.config.keyed_api_key.clone())])
            .await?;

        response
            .creds_data
            .map(Credentials::from_value)
            .ok_or_else(|| SessionError::InvalidFormat("no credential data received".into()))
    }

    async fn resolve_file_store(&self, id: &str) -> SessionResult<Credentials> {
        if self.config.file_store_base_url.is_empty() {
            return Err(SessionError::Unreachable(
                "session id has no recognized prefix and no file store is configured".into(),
            ));
        }

        let url = format!("{}/{id}", self.config.file_store_base_url);
        let bytes = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(net_err)?
            .bytes()
            .await
            .map_err(net_err)?;
        Credentials::from_slice(&bytes)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        headers: &[(&str, String)],
    ) -> SessionResult<T> {
        let mut request = self.http.get(url);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(net_err)?
            .json()
            .await
            .map_err(|e| SessionError::InvalidFormat(e.to_string()))
    }

    async fn get_object<T: for<'de> Deserialize<'de>>(&self, path: &str) -> SessionResult<T> {
        let url = format!(
            "{}/repos/{}/{}/contents/{path}",
            self.config.object_store_api_base,
            self.config.object_store_owner,
            self.config.object_store_repo
        );
        self.get_json(
            &url,
            &[
                ("User-Agent", "otpgate".to_string()),
                ("Accept", "application/vnd.github+json".to_string()),
            ],
        )
        .await
    }
}

/// Whether an object-store id is the short hex form.
fn is_short_object_id(id: &str) -> bool {
    id.len() == OBJECT_SHORT_ID_LENGTH
        && id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

/// Decodes a legacy base64(gzip(json)) credential blob.
fn decode_legacy_blob(data: &str) -> SessionResult<Credentials> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    let compressed = BASE64
        .decode(cleaned.as_bytes())
        .map_err(|e| SessionError::InvalidFormat(format!("invalid base64 blob: {e}")))?;

    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(|e| SessionError::InvalidFormat(format!("invalid gzip blob: {e}")))?;

    Credentials::from_slice(&json)
}

/// Decodes the base64 `content` field of an object-store entry.
fn decode_object_content(entry: &ObjectEntry) -> SessionResult<Credentials> {
    let content = entry
        .content
        .as_deref()
        .ok_or_else(|| SessionError::InvalidFormat("object entry carries no content".into()))?;
    let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(cleaned.as_bytes())
        .map_err(|e| SessionError::InvalidFormat(format!("invalid object content: {e}")))?;
    Credentials::from_slice(&bytes)
}

fn net_err(e: reqwest::Error) -> SessionError {
    SessionError::Unreachable(e.to_string())
}

// =============================================================================
// File-backed credential store
// =============================================================================

/// Credential store writing a single `creds.json` under a directory.
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store rooted at `dir`. The directory is created lazily on
    /// first persist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn creds_path(&self) -> PathBuf {
        self.dir.join("creds.json")
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn persist(&self, credentials: &Credentials) -> SessionResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| SessionError::Unreachable(e.to_string()))?;
        tokio::fs::write(self.creds_path(), credentials.to_bytes())
            .await
            .map_err(|e| SessionError::Unreachable(e.to_string()))?;
        Ok(())
    }

    async fn load(&self) -> SessionResult<Option<Credentials>> {
        match tokio::fs::read(self.creds_path()).await {
            Ok(bytes) => Ok(Some(Credentials::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SessionError::Unreachable(e.to_string())),
        }
    }

    async fn delete(&self) -> SessionResult<()> {
        match tokio::fs::remove_file(self.creds_path()).await {
            Ok(()) => {
                warn!("Credential document deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Unreachable(e.to_string())),
        }
    }
}

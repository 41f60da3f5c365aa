//! Application and user credentials and their JSON files
//!
//! Files are written to a temporary sibling and atomically renamed into place,
//! so a failed write never leaves a truncated credential file behind.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::api::normalize_instance;
use crate::error::{Error, Result};

/// Redirect URI written into scaffolded application files
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";

/// OAuth2 application registered with an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCredentials {
    /// OAuth client ID
    pub id: String,
    /// OAuth client secret
    pub secret: String,
    /// Instance base URL
    #[serde(rename = "instance")]
    pub instance_url: String,
    /// Redirect URI registered for the application
    pub redirect_uri: String,
}

impl AppCredentials {
    /// Create application credentials
    pub fn new(id: &str, secret: &str, instance_url: &str, redirect_uri: &str) -> Result<Self> {
        Ok(Self {
            id: id.to_string(),
            secret: secret.to_string(),
            instance_url: normalize_instance(instance_url)?,
            redirect_uri: redirect_uri.to_string(),
        })
    }

    /// Empty application file for the user to fill in
    pub fn scaffold(instance_url: &str) -> Result<Self> {
        Self::new("", "", instance_url, DEFAULT_REDIRECT_URI)
    }

    /// Parsed redirect URI
    pub fn redirect_url(&self) -> Result<Url> {
        let url = Url::parse(&self.redirect_uri)?;
        if url.host_str().is_none() {
            return Err(Error::Config(format!(
                "redirect_uri {} has no host",
                self.redirect_uri
            )));
        }
        Ok(url)
    }

    /// Reject an application file that was scaffolded but never filled in
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Config("application id is empty".to_string()));
        }
        if self.secret.trim().is_empty() {
            return Err(Error::Config("application secret is empty".to_string()));
        }
        normalize_instance(&self.instance_url)?;
        self.redirect_url()?;
        Ok(())
    }
}

/// A user access token obtained through the OAuth2 grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    /// Bearer token
    pub access_token: String,
    /// Instance base URL the token was issued by
    #[serde(rename = "instance")]
    pub instance_url: String,
    /// Granted scopes
    pub scopes: BTreeSet<String>,
}

impl UserCredentials {
    /// Create user credentials
    pub fn new<I, S>(access_token: &str, instance_url: &str, scopes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            access_token: access_token.to_string(),
            instance_url: normalize_instance(instance_url)?,
            scopes: scopes.into_iter().map(Into::into).collect(),
        })
    }

    /// Whether an access token is present
    pub fn is_authenticated(&self) -> bool {
        !self.access_token.trim().is_empty()
    }

    /// Whether the scope was granted, counting `read:*`/`write:*` sub-scopes
    pub fn has_scope(&self, scope: &str) -> bool {
        if self.scopes.contains(scope) {
            return true;
        }
        scope
            .split_once(':')
            .is_some_and(|(parent, _)| self.scopes.contains(parent))
    }
}

/// A credential value that lives in a JSON file
pub trait CredentialFile: Serialize + DeserializeOwned {
    /// Read and decode a credential file
    fn load(path: &Path) -> Result<Self> {
        load(path)
    }

    /// Atomically write a credential file
    fn save(&self, path: &Path) -> Result<()> {
        save(self, path)
    }
}

impl CredentialFile for AppCredentials {}
impl CredentialFile for UserCredentials {}

/// Read and decode a credential file
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| Error::CredentialFormat {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write canonical JSON to a temp file next to `path`, then rename it over `path`
pub fn save<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut json = serde_json::to_string_pretty(value).map_err(|e| Error::CredentialFormat {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    json.push('\n');

    // Dropped (and deleted) on any early return below
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(json.as_bytes())?;
    file.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(file.path(), fs::Permissions::from_mode(0o600))?;
    }

    file.persist(path).map_err(|e| Error::Io(e.error))?;
    tracing::debug!("Saved credentials to {}", path.display());
    Ok(())
}

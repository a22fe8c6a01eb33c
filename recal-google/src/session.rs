//! Stored Google session (access token) for one account.
//!
//! Token acquisition and refresh happen outside this tool; we only load a
//! provisioned session file and hand out the bearer token while it is
//! valid. An expired or missing session surfaces as an auth error, which
//! aborts the run instead of retrying.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use recal_core::clients::CredentialProvider;
use recal_core::{SyncError, SyncResult};

pub struct Session {
    account: String,
    data: SessionData,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    fn path_for_account(account: &str) -> SyncResult<std::path::PathBuf> {
        let account_slug = account.replace(['/', '\\', ':'], "_");
        let base = dirs::config_dir()
            .ok_or_else(|| SyncError::Config("could not determine config directory".into()))?;
        Ok(base
            .join("recal")
            .join("session")
            .join(format!("{}.toml", account_slug)))
    }

    pub fn new(account: &str, data: SessionData) -> Self {
        Session {
            account: account.to_string(),
            data,
        }
    }

    pub fn load(account: &str) -> SyncResult<Self> {
        let path = Self::path_for_account(account)?;

        if !path.exists() {
            return Err(SyncError::Auth(format!(
                "no Google session stored for {} (expected {})",
                account,
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(&path)?;
        let data: SessionData = toml::from_str(&contents).map_err(|e| {
            SyncError::Config(format!("failed to parse session {}: {}", path.display(), e))
        })?;

        Ok(Session {
            account: account.to_string(),
            data,
        })
    }

    pub fn save(&self) -> SyncResult<()> {
        let contents = toml::to_string_pretty(&self.data)
            .map_err(|e| SyncError::Serialization(e.to_string()))?;

        let path = Self::path_for_account(&self.account)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;

        // Owner-only since the file contains a bearer token:
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn is_expired(&self) -> bool {
        match self.data.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }
}

impl CredentialProvider for Session {
    fn current_token(&self) -> SyncResult<String> {
        if self.data.access_token.is_empty() {
            return Err(SyncError::Auth(format!(
                "stored session for {} has no access token",
                self.account
            )));
        }
        if self.is_expired() {
            return Err(SyncError::Auth(format!(
                "Google session for {} has expired; provision a fresh token",
                self.account
            )));
        }
        Ok(self.data.access_token.clone())
    }
}

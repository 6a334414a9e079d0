//! Engine configuration loading and validation.

use crate::error::{ErrorKind, Result};
use crate::principal::Role;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const MIB: i64 = 1024 * 1024;

/// Tunables for the storage engine.
///
/// Values come from (lowest to highest precedence): the defaults below, an
/// optional TOML file, then `DEPOT_`-prefixed environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Filesystem area for in-flight chunk and merge files, keyed by
    /// session id underneath.
    pub temp_root: PathBuf,
    /// How long an abandoned upload session stays claimable before the
    /// sweep reclaims it.
    pub session_ttl_secs: u64,
    /// Import sessions poll a slow third-party source, so they get a much
    /// longer leash.
    pub import_ttl_secs: u64,
    /// Chunk-size thresholds per role. A payload at or under the threshold
    /// goes direct; anything larger is chunked at this size.
    pub guest_chunk_size: i64,
    pub user_chunk_size: i64,
    pub admin_chunk_size: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir().join("depot-uploads"),
            session_ttl_secs: 3600,
            import_ttl_secs: 86_400,
            guest_chunk_size: 5 * MIB,
            user_chunk_size: 15 * MIB,
            admin_chunk_size: 100 * MIB,
        }
    }
}

impl EngineConfig {
    /// Load configuration, optionally layering a TOML file over the
    /// defaults, with `DEPOT_*` environment variables on top.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        let config: Self =
            figment.merge(Env::prefixed("DEPOT_")).extract().or_raise(|| ErrorKind::InvalidArgument("configuration"))?;
        config.validated()
    }

    fn validated(self) -> Result<Self> {
        if self.guest_chunk_size <= 0 || self.user_chunk_size <= 0 || self.admin_chunk_size <= 0 {
            exn::bail!(ErrorKind::InvalidArgument("chunk sizes must be positive"));
        }
        Ok(self)
    }

    /// The chunk-size threshold for a role.
    pub fn chunk_size(&self, role: Role) -> i64 {
        match role {
            Role::Guest => self.guest_chunk_size,
            Role::User => self.user_chunk_size,
            Role::Admin => self.admin_chunk_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.chunk_size(Role::Guest), 5 * MIB);
        assert_eq!(config.chunk_size(Role::User), 15 * MIB);
        assert_eq!(config.chunk_size(Role::Admin), 100 * MIB);
        assert_eq!(config.session_ttl_secs, 3600);
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("depot.toml");
        std::fs::write(&file, "guest_chunk_size = 1024\nsession_ttl_secs = 60\n").unwrap();
        let config = EngineConfig::load(Some(&file)).unwrap();
        assert_eq!(config.guest_chunk_size, 1024);
        assert_eq!(config.session_ttl_secs, 60);
        // Untouched keys keep their defaults.
        assert_eq!(config.user_chunk_size, 15 * MIB);
    }

    #[test]
    fn test_rejects_nonsense_chunk_size() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("depot.toml");
        std::fs::write(&file, "guest_chunk_size = -5\n").unwrap();
        assert!(EngineConfig::load(Some(&file)).is_err());
    }
}

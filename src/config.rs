//! Backup configuration
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{BackupError, Result};
use crate::publish::{FileStrategy, PublishStrategy, RepositoryStrategy};

/// Config file looked up in the working directory (extension picks the format)
pub const CONFIG_FILE_STEM: &str = "spbu_config";
/// Environment variables override file values, e.g. `SPBU_SPOTIFY_CLIENT_ID`
pub const ENV_PREFIX: &str = "SPBU";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// App-only token; enough for public and collaborative playlists
    ClientCredentials,
    /// Browser consent with a local redirect listener; needed for private playlists
    AuthorizationCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    File,
    Repository,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    #[serde(default)]
    pub spotify_client_id: String,

    #[serde(default)]
    pub spotify_client_secret: String,

    #[serde(default = "default_auth_mode")]
    pub auth_mode: AuthMode,

    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Where the authorization-code token is kept between runs
    #[serde(default = "default_token_cache_path")]
    pub token_cache_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub playlist_urls: Vec<String>,

    #[serde(default = "default_output_mode")]
    pub output_mode: OutputMode,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub repo_origin: String,

    #[serde(default)]
    pub repo_branch: Option<String>,

    #[serde(default = "default_backup_file_name")]
    pub backup_file_name: String,

    #[serde(default)]
    pub git_user_name: String,

    #[serde(default)]
    pub git_user_email: String,
}

impl BackupConfig {
    /// Load configuration from `spbu_config.*` and `SPBU_*` environment variables
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE_STEM).required(false))
            .add_source(Self::environment());

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("playlist_urls")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.spotify_client_id.is_empty() {
            return Err(BackupError::Config(
                "spotify_client_id is required (set SPBU_SPOTIFY_CLIENT_ID)".to_string(),
            ));
        }

        if self.spotify_client_secret.is_empty() {
            return Err(BackupError::Config(
                "spotify_client_secret is required (set SPBU_SPOTIFY_CLIENT_SECRET)".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(BackupError::Config("timeout_secs must be positive".to_string()));
        }

        if self.output_mode == OutputMode::Repository && self.repo_origin.trim().is_empty() {
            return Err(BackupError::Config(
                "repo_origin is required for repository output (set SPBU_REPO_ORIGIN)"
                    .to_string(),
            ));
        }

        if self.backup_file_name.is_empty() || self.backup_file_name.contains(['/', '\\']) {
            return Err(BackupError::Config(format!(
                "backup_file_name must be a plain file name, got {:?}",
                self.backup_file_name
            )));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The publisher selected by `output_mode`
    pub fn publish_strategy(&self) -> Result<PublishStrategy> {
        Ok(match self.output_mode {
            OutputMode::File => PublishStrategy::File(FileStrategy {
                prefix: self.file_prefix.clone(),
                dir: self.output_dir.clone(),
            }),
            OutputMode::Repository => PublishStrategy::Repository(RepositoryStrategy {
                origin: self.repo_origin.clone(),
                dir: self
                    .output_dir
                    .join(RepositoryStrategy::dir_name_from_origin(&self.repo_origin)?),
                file_name: self.backup_file_name.clone(),
                branch: self.repo_branch.clone().filter(|b| !b.is_empty()),
                user_name: Some(self.git_user_name.clone()).filter(|s| !s.is_empty()),
                user_email: Some(self.git_user_email.clone()).filter(|s| !s.is_empty()),
            }),
        })
    }
}

// Default values
fn default_auth_mode() -> AuthMode {
    AuthMode::ClientCredentials
}

fn default_redirect_uri() -> String {
    "http://127.0.0.1:8898/callback".to_string()
}

fn default_token_cache_path() -> PathBuf {
    PathBuf::from(".spotify_token_cache.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_output_mode() -> OutputMode {
    OutputMode::Repository
}

fn default_file_prefix() -> String {
    "spotify_backup_".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_backup_file_name() -> String {
    "spbu_backup.json".to_string()
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            spotify_client_id: String::new(),
            spotify_client_secret: String::new(),
            auth_mode: default_auth_mode(),
            redirect_uri: default_redirect_uri(),
            token_cache_path: default_token_cache_path(),
            log_level: default_log_level(),
            timeout_secs: default_timeout_secs(),
            playlist_urls: Vec::new(),
            output_mode: default_output_mode(),
            file_prefix: default_file_prefix(),
            output_dir: default_output_dir(),
            repo_origin: String::new(),
            repo_branch: None,
            backup_file_name: default_backup_file_name(),
            git_user_name: String::new(),
            git_user_email: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_from(yaml: &str, env: &[(&str, &str)]) -> Result<BackupConfig> {
        let vars: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let config: BackupConfig = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .add_source(BackupConfig::environment().source(Some(vars)))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    const YAML: &str = r#"
spotify_client_id: abc
spotify_client_secret: shh
timeout_secs: 30
playlist_urls:
  - https://open.spotify.com/playlist/AAA
  - https://open.spotify.com/playlist/BBB
repo_origin: git@github.com:someone/playlist-archive.git
"#;

    #[test]
    fn test_file_values_and_defaults() {
        let config = load_from(YAML, &[]).unwrap();
        assert_eq!(config.spotify_client_id, "abc");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.playlist_urls.len(), 2);
        assert_eq!(config.auth_mode, AuthMode::ClientCredentials);
        assert_eq!(config.output_mode, OutputMode::Repository);
        assert_eq!(config.backup_file_name, "spbu_backup.json");
        assert_eq!(config.log_level, "info");
        assert_eq!(
            config.token_cache_path,
            PathBuf::from(".spotify_token_cache.json")
        );
    }

    #[test]
    fn test_environment_overrides_file() {
        let config = load_from(
            YAML,
            &[
                ("SPBU_SPOTIFY_CLIENT_ID", "from-env"),
                ("SPBU_OUTPUT_MODE", "file"),
                ("SPBU_PLAYLIST_URLS", "AAA,CCC,DDD"),
            ],
        )
        .unwrap();
        assert_eq!(config.spotify_client_id, "from-env");
        assert_eq!(config.output_mode, OutputMode::File);
        assert_eq!(config.playlist_urls, vec!["AAA", "CCC", "DDD"]);
    }

    #[test]
    fn test_missing_client_id_is_rejected() {
        let err = load_from("spotify_client_secret: shh\noutput_mode: file\n", &[]).unwrap_err();
        assert!(matches!(err, BackupError::Config(_)));
    }

    #[test]
    fn test_repository_mode_requires_origin() {
        let err = load_from("spotify_client_id: a\nspotify_client_secret: b\n", &[]).unwrap_err();
        assert!(err.to_string().contains("repo_origin"));
    }

    #[test]
    fn test_auth_mode_from_file() {
        let config = load_from(
            "spotify_client_id: a\nspotify_client_secret: b\nauth_mode: authorization_code\noutput_mode: file\n",
            &[],
        )
        .unwrap();
        assert_eq!(config.auth_mode, AuthMode::AuthorizationCode);
    }

    #[test]
    fn test_token_cache_path_from_environment() {
        let config = load_from(YAML, &[("SPBU_TOKEN_CACHE_PATH", "/var/lib/spbu/token.json")])
            .unwrap();
        assert_eq!(
            config.token_cache_path,
            PathBuf::from("/var/lib/spbu/token.json")
        );
    }

    #[test]
    fn test_publish_strategy_for_repository() {
        let config = load_from(YAML, &[("SPBU_REPO_BRANCH", "main")]).unwrap();
        match config.publish_strategy().unwrap() {
            PublishStrategy::Repository(repo) => {
                assert_eq!(repo.dir, PathBuf::from("./playlist-archive"));
                assert_eq!(repo.branch.as_deref(), Some("main"));
                assert_eq!(repo.user_name, None);
            }
            other => panic!("unexpected strategy {other:?}"),
        }
    }

    #[test]
    fn test_publish_strategy_for_file() {
        let config = BackupConfig {
            output_mode: OutputMode::File,
            file_prefix: "backup_".to_string(),
            ..Default::default()
        };
        match config.publish_strategy().unwrap() {
            PublishStrategy::File(file) => assert_eq!(file.prefix, "backup_"),
            other => panic!("unexpected strategy {other:?}"),
        }
    }
}

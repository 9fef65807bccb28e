use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use fieldsync_core::connection::{ConnectionModeManager, HttpHealthProbe, TcpReachability};
use fieldsync_core::remote::{HttpRemoteApi, StaticCredentials};
use fieldsync_core::sync::SyncSettings;
use fieldsync_core::util::normalize_text_option;
use fieldsync_core::{
    DatabaseService, EngineConfig, LocalId, SyncEngine, SyncError, SyncResult,
};

use crate::error::CliError;

/// Paths and effective config shared by every command
pub struct Context {
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub config: EngineConfig,
}

impl Context {
    pub fn load(
        cli_db_path: Option<PathBuf>,
        cli_config_path: Option<PathBuf>,
    ) -> Result<Self, CliError> {
        let config_path = resolve_config_path(cli_config_path);
        let mut config = EngineConfig::load_from_path(&config_path)?;
        apply_env_overrides(&mut config, env::var("FIELDSYNC_SERVER_URL").ok());
        Ok(Self {
            db_path: resolve_db_path(cli_db_path),
            config_path,
            config,
        })
    }

    pub fn server_url(&self) -> Result<&str, CliError> {
        if self.config.server_url.is_none() {
            return Err(CliError::ServerNotConfigured);
        }
        Ok(self.config.server_url()?)
    }

    pub const fn has_server(&self) -> bool {
        self.config.server_url.is_some()
    }
}

pub fn apply_env_overrides(config: &mut EngineConfig, server_url: Option<String>) {
    if let Some(server_url) = normalize_text_option(server_url) {
        config.server_url = Some(server_url);
    }
}

pub fn access_token() -> Option<String> {
    normalize_text_option(env::var("FIELDSYNC_TOKEN").ok())
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("FIELDSYNC_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fieldsync")
        .join("fieldsync.db")
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> PathBuf {
    cli_config_path
        .or_else(|| env::var_os("FIELDSYNC_CONFIG").map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fieldsync")
        .join("config.json")
}

pub async fn open_database(db_path: &Path) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(db_path).await?)
}

/// Local store plus an engine wired to the configured server
pub struct Services {
    pub db: DatabaseService,
    pub engine: SyncEngine,
}

pub async fn open_services(ctx: &Context) -> Result<Services, CliError> {
    let server_url = ctx.server_url()?;
    let db = open_database(&ctx.db_path).await?;
    let remote = HttpRemoteApi::new(server_url, ctx.config.request_timeout())?;
    let network = TcpReachability::for_url(server_url, ctx.config.probe.timeout())?;

    let engine = SyncEngine::new(
        Arc::new(db.clone()),
        Arc::new(db.clone()),
        Arc::new(remote),
        Arc::new(StaticCredentials::new(access_token())),
        Arc::new(network),
        SyncSettings::from(&ctx.config),
    );
    Ok(Services { db, engine })
}

pub async fn open_manager(ctx: &Context) -> Result<(Services, ConnectionModeManager), CliError> {
    let services = open_services(ctx).await?;
    let probe = HttpHealthProbe::for_server(ctx.server_url()?, &ctx.config.probe)?;
    let manager = ConnectionModeManager::load(
        services.engine.clone(),
        Arc::new(services.db.clone()),
        Arc::new(probe),
    )
    .await?;
    Ok((services, manager))
}

/// One-line report of the upload a local write triggered
pub fn describe_upload(outcome: Option<&Result<SyncResult, SyncError>>) -> String {
    match outcome {
        None => "upload deferred (offline or another sync running)".to_string(),
        Some(Ok(result)) => format!("upload finished: {}", result.summary()),
        Some(Err(error)) => format!("upload not run: {error}"),
    }
}

pub fn parse_local_id(raw: &str) -> Result<LocalId, CliError> {
    raw.trim()
        .parse()
        .map_err(|_| CliError::InvalidInput(format!("not a record id: {raw}")))
}

pub fn format_timestamp(millis: Option<i64>) -> String {
    millis
        .and_then(DateTime::from_timestamp_millis)
        .map_or_else(
            || "never".to_string(),
            |at| {
                at.with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            },
        )
}

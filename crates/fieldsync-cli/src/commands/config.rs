use fieldsync_core::util::{is_http_url, normalize_text_option};
use fieldsync_core::EngineConfig;
use serde::Serialize;

use crate::commands::common::{access_token, Context};
use crate::error::CliError;

pub struct ConfigInitArgs {
    pub server_url: Option<String>,
    pub download_window_days: Option<u32>,
    pub media_max_attempts: Option<u32>,
    pub monitor_interval_secs: Option<u64>,
}

#[derive(Serialize)]
struct ConfigReport<'a> {
    config_path: String,
    db_path: String,
    token_configured: bool,
    #[serde(flatten)]
    config: &'a EngineConfig,
}

pub fn run_config_show(ctx: &Context) -> Result<(), CliError> {
    let report = ConfigReport {
        config_path: ctx.config_path.display().to_string(),
        db_path: ctx.db_path.display().to_string(),
        token_configured: access_token().is_some(),
        config: &ctx.config,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn run_config_init(ctx: &Context, args: ConfigInitArgs) -> Result<(), CliError> {
    let mut config = EngineConfig::load_from_path(&ctx.config_path)?;
    apply_init_args(&mut config, args)?;
    config.save_to_path(&ctx.config_path)?;
    println!("Wrote config to {}", ctx.config_path.display());
    Ok(())
}

pub fn apply_init_args(config: &mut EngineConfig, args: ConfigInitArgs) -> Result<(), CliError> {
    if let Some(server_url) = args.server_url {
        config.server_url = Some(normalize_server_url(&server_url)?);
    }
    if let Some(days) = args.download_window_days {
        if days == 0 {
            return Err(CliError::Config(
                "download window must be at least one day".to_string(),
            ));
        }
        config.download_window_days = days;
    }
    if let Some(attempts) = args.media_max_attempts {
        if attempts == 0 {
            return Err(CliError::Config(
                "media upload attempts must be at least 1".to_string(),
            ));
        }
        config.media_max_attempts = attempts;
    }
    if let Some(secs) = args.monitor_interval_secs {
        config.monitor_interval_secs = secs.max(1);
    }
    Ok(())
}

/// Trim and validate a server URL, ensuring a trailing slash
pub fn normalize_server_url(raw: &str) -> Result<String, CliError> {
    let url = normalize_text_option(Some(raw.to_string()))
        .ok_or_else(|| CliError::Config("server URL cannot be empty".to_string()))?;
    if !is_http_url(&url) {
        return Err(CliError::Config(format!(
            "server URL must start with http:// or https://: {url}"
        )));
    }
    if url.ends_with('/') {
        Ok(url)
    } else {
        Ok(format!("{url}/"))
    }
}

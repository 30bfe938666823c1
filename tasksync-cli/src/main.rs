use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tasksync_core::config::LoggingConfig;
use tasksync_core::logging::{init_logging_with_config, LogConfig};
use tasksync_core::{
    Config, IdentityStore, MemoryBackend, RestBackend, SettingsStore, User, UserSettings,
    UserSettingsPatch,
};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "tasksync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Force JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// TOML config file; environment variables are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct Credentials {
    #[arg(long, env = "TASKSYNC_EMAIL")]
    email: String,

    #[arg(long, env = "TASKSYNC_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Parser, Debug)]
enum Command {
    /// Sign in and print the stored settings
    Show {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Sign in and update the stored settings
    Set {
        #[command(flatten)]
        credentials: Credentials,

        /// Age in days after which tasks are considered old
        #[arg(long)]
        task_age_days: u32,
    },
    /// Walk through sign-in, update and sign-out against an in-memory backend
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // `demo` runs in process and only reads a config file when one is given
    let config = match (&args.command, args.config.as_ref()) {
        (Command::Demo, None) => None,
        (_, path) => Some(load_config(path)?),
    };
    let logging = config
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_logging_with_config(resolve_log_config(
        &logging,
        args.log_level.as_deref(),
        args.json_logs,
    )?)?;
    tasksync_core::init_metrics();

    match args.command {
        Command::Show { credentials } => {
            let config = config.context("configuration is required")?;
            let (identity, settings, backend) = sign_in(&config, &credentials).await?;
            let report = serde_json::json!({
                "user": identity.get(),
                "settings": settings.get(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            backend.sign_out().await.ok();
        }
        Command::Set {
            credentials,
            task_age_days,
        } => {
            let config = config.context("configuration is required")?;
            let (_identity, settings, backend) = sign_in(&config, &credentials).await?;
            let updated = settings
                .update_settings(UserSettingsPatch::new().task_age_days(task_age_days))
                .await?
                .context("no authenticated user; nothing was updated")?;
            print_settings(&updated)?;
            backend.sign_out().await.ok();
        }
        Command::Demo => demo().await?,
    }

    Ok(())
}

/// Load and validate configuration from `path`, or from the environment
fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("reading config from {}", path.display()))?,
        None => Config::from_env()?,
    };
    Ok(config)
}

/// Logging options from config, with command-line flags taking precedence
fn resolve_log_config(
    logging: &LoggingConfig,
    level: Option<&str>,
    json_logs: bool,
) -> Result<LogConfig> {
    let mut log_config = LogConfig::from_config(logging)?;
    if let Some(level) = level {
        log_config.level = level.parse()?;
    }
    if json_logs {
        log_config.json_format = true;
    }
    Ok(log_config)
}

async fn sign_in(
    config: &Config,
    credentials: &Credentials,
) -> Result<(IdentityStore, SettingsStore, Arc<RestBackend>)> {
    let backend = Arc::new(RestBackend::new(
        &config.backend,
        config.sync.auth_event_capacity,
    )?);
    backend
        .sign_in_with_password(&credentials.email, &credentials.password)
        .await
        .context("sign-in failed")?;

    let identity = IdentityStore::connect(backend.clone()).await;
    let settings = SettingsStore::new(&identity, backend.clone(), &config.sync)?;
    settings.settled().await;
    debug!(user = ?identity.get().map(|u| u.id), "settings loaded");

    Ok((identity, settings, backend))
}

fn print_settings(settings: &UserSettings) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}

async fn demo() -> Result<()> {
    const PASSWORD: &str = "demo-password";

    let backend = Arc::new(MemoryBackend::new());
    backend.register(User::new("demo").with_email("demo@example.com"), PASSWORD);

    let identity = IdentityStore::connect(backend.clone()).await;
    let settings = SettingsStore::attach(identity.store(), backend.clone(), Default::default())?;

    let _identity_log = identity.subscribe(|user: &Option<User>| match user {
        Some(user) => println!("identity: {}", user.id),
        None => println!("identity: signed out"),
    });
    let _settings_log = settings.subscribe(|settings: &UserSettings| {
        println!("settings: task_age_days = {}", settings.task_age_days)
    });

    info!("signing in demo user");
    backend.sign_in_with_password("demo@example.com", PASSWORD)?;
    wait_until(&identity, true).await?;
    settings.settled().await;

    settings
        .update_settings(UserSettingsPatch::new().task_age_days(7))
        .await?;

    info!("signing out");
    backend.sign_out();
    wait_until(&identity, false).await?;

    if settings.get() != UserSettings::defaults() {
        warn!("settings were not reset after sign-out");
    }
    Ok(())
}

/// Wait for the auth change pump to deliver the expected state
async fn wait_until(identity: &IdentityStore, authenticated: bool) -> Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while identity.is_authenticated() != authenticated {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .context("auth change was not delivered")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_core::config::{ENV_BACKEND_ANON_KEY, ENV_BACKEND_URL, ENV_LOG_JSON, ENV_LOG_LEVEL};
    use tasksync_core::LogLevel;

    fn env_config(vars: &[(&str, &str)]) -> Config {
        let mut all = vec![
            (ENV_BACKEND_URL, "https://project.supabase.co"),
            (ENV_BACKEND_ANON_KEY, "anon-key"),
        ];
        all.extend_from_slice(vars);
        Config::from_lookup(|key| {
            all.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
        })
        .unwrap()
    }

    #[test]
    fn test_log_config_follows_environment() {
        let config = env_config(&[(ENV_LOG_LEVEL, "debug"), (ENV_LOG_JSON, "true")]);

        let log_config = resolve_log_config(&config.logging, None, false).unwrap();
        assert_eq!(log_config.level, LogLevel::Debug);
        assert!(log_config.json_format);
    }

    #[test]
    fn test_flags_override_config() {
        let config = env_config(&[(ENV_LOG_LEVEL, "debug")]);

        let log_config = resolve_log_config(&config.logging, Some("error"), true).unwrap();
        assert_eq!(log_config.level, LogLevel::Error);
        assert!(log_config.json_format);
    }

    #[test]
    fn test_invalid_level_flag_is_rejected() {
        assert!(resolve_log_config(&LoggingConfig::default(), Some("loud"), false).is_err());
    }

    #[test]
    fn test_defaults_without_config() {
        let log_config = resolve_log_config(&LoggingConfig::default(), None, false).unwrap();
        assert_eq!(log_config.level, LogLevel::Info);
        assert!(!log_config.json_format);
    }
}

//! Keygate CLI
//!
//! Command-line host for the API-key lifecycle: runs the startup check,
//! prompts for a key, and reports availability.
//!
//! # Usage
//!
//! ```bash
//! # Is a Gemini key available?
//! keygate status
//!
//! # Choose a DeepSeek key if none is stored
//! keygate --provider deepseek select
//!
//! # Check the deployment variable instead of the keyring
//! keygate --backend env --provider replicate status --format json
//! ```

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use keygate_core::{
    EnvKeyStore, GateView, KeyGate, KeyLifecycleController, KeyPicker, KeyStore, Provider,
    SecretKeyStore, SecretStore, create_store_in,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

mod config;
mod picker;

use config::{Backend, CliConfig};
use picker::StdinPicker;

#[derive(Parser)]
#[command(name = "keygate")]
#[command(about = "API-key availability for hosted AI tools")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Provider whose key is managed (gemini, openrouter, deepseek, replicate)
    #[arg(short, long, global = true)]
    provider: Option<Provider>,

    /// Where the key lives
    #[arg(short, long, global = true, value_enum)]
    backend: Option<Backend>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a usable key is available
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Choose a key if none is available
    Select {
        /// Prompt even if a key is already available
        #[arg(short, long)]
        force: bool,
    },

    /// Remove the stored key
    Forget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(provider) = cli.provider {
        config.provider = provider;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    init_logging(cli.verbose, &config.log_level);
    match &config.config_path {
        Some(path) => debug!("Loaded configuration from {:?}", path),
        None => debug!("No configuration file found, using defaults"),
    }

    let ok = match cli.command {
        Commands::Status { format } => {
            status(&build_controller(&config, StdinPicker), &config, format).await?
        }
        Commands::Select { force } => {
            select(&build_controller(&config, StdinPicker), &config, force).await?
        }
        Commands::Forget => forget(&config).await?,
    };

    Ok(exit_code(ok))
}

fn init_logging(verbose: bool, log_level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn secret_store(config: &CliConfig) -> Box<dyn SecretStore> {
    create_store_in(&config.keyring_service, config.backend == Backend::Keyring)
}

fn build_controller<P: KeyPicker + 'static>(
    config: &CliConfig,
    picker: P,
) -> KeyLifecycleController<Box<dyn KeyStore>> {
    let store: Box<dyn KeyStore> = match config.backend {
        Backend::Env => Box::new(EnvKeyStore::for_provider(config.provider)),
        Backend::Keyring | Backend::Memory => Box::new(SecretKeyStore::new(
            config.provider,
            secret_store(config),
            picker,
        )),
    };

    KeyLifecycleController::with_config(store, config.controller.clone())
}

/// Report availability. Returns whether a key is available.
async fn status<K: KeyStore>(
    controller: &KeyLifecycleController<K>,
    config: &CliConfig,
    format: Format,
) -> Result<bool> {
    let availability = controller.check_availability().await;

    match format {
        Format::Json => {
            let report = serde_json::json!({
                "provider": config.provider,
                "backend": config.backend,
                "availability": availability,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Format::Text => {
            println!("{}: {}", config.provider, availability);
            if GateView::from(availability) == GateView::KeyRequired {
                eprintln!("{}", key_required_hint(config));
            }
        }
    }

    Ok(availability.is_available())
}

/// Prompt for a key unless one is available. Returns whether a key is
/// available afterwards.
async fn select<K: KeyStore>(
    controller: &KeyLifecycleController<K>,
    config: &CliConfig,
    force: bool,
) -> Result<bool> {
    let gate = KeyGate::new(controller);

    let current = controller.check_availability().await;
    if current.is_available() && !force {
        println!("A {} key is already available", config.provider.display_name());
        return Ok(true);
    }

    let view = gate.select_key().await;
    println!("{}: {}", config.provider, controller.availability());
    if view == GateView::Ready {
        info!("{} key selected", config.provider);
    } else {
        eprintln!("{}", key_required_hint(config));
    }

    Ok(view == GateView::Ready)
}

async fn forget(config: &CliConfig) -> Result<bool> {
    if config.backend == Backend::Env {
        bail!(
            "keys from the environment cannot be forgotten; unset {} instead",
            config.provider.env_var()
        );
    }

    SecretKeyStore::new(config.provider, secret_store(config), StdinPicker)
        .forget()
        .await?;
    println!("Removed stored {} key", config.provider.display_name());
    Ok(true)
}

fn key_required_hint(config: &CliConfig) -> String {
    match config.backend {
        Backend::Env => format!(
            "This tool requires a {} API key. Set the {} environment variable to continue.",
            config.provider.display_name(),
            config.provider.env_var()
        ),
        Backend::Keyring | Backend::Memory => format!(
            "This tool requires a {} API key. Run `keygate --provider {} select` to continue.",
            config.provider.display_name(),
            config.provider
        ),
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keygate_core::{KeyStoreError, KeyringStore, Secret};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Picker that answers with a fixed key and counts prompts.
    #[derive(Clone, Default)]
    struct ScriptedPicker {
        key: Option<&'static str>,
        prompts: Arc<AtomicUsize>,
    }

    impl ScriptedPicker {
        fn typing(key: &'static str) -> Self {
            Self {
                key: Some(key),
                ..Self::default()
            }
        }

        fn dismissing() -> Self {
            Self::default()
        }

        fn prompts(&self) -> usize {
            self.prompts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeyPicker for ScriptedPicker {
        async fn pick_key(&self, _provider: Provider) -> Result<Option<Secret>, KeyStoreError> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            Ok(self.key.map(Secret::new))
        }
    }

    fn config_with(backend: Backend, provider: Provider) -> CliConfig {
        CliConfig {
            provider,
            backend,
            keyring_service: "keygate-cli-test".to_string(),
            ..CliConfig::default()
        }
    }

    #[tokio::test]
    async fn test_memory_select_stores_key() {
        let config = config_with(Backend::Memory, Provider::Gemini);
        let controller = build_controller(&config, ScriptedPicker::typing("AIza-test"));

        assert!(select(&controller, &config, false).await.unwrap());
        assert!(controller.key_store().has_selected_key().await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_status_without_key_reports_failure() {
        let config = config_with(Backend::Memory, Provider::OpenRouter);
        let controller = build_controller(&config, ScriptedPicker::dismissing());

        assert!(!status(&controller, &config, Format::Text).await.unwrap());
        assert!(!status(&controller, &config, Format::Json).await.unwrap());
    }

    #[tokio::test]
    async fn test_select_skips_prompt_when_key_available_unless_forced() {
        let config = config_with(Backend::Memory, Provider::DeepSeek);
        let picker = ScriptedPicker::typing("sk-ds");
        let controller = build_controller(&config, picker.clone());

        assert!(select(&controller, &config, false).await.unwrap());
        assert!(select(&controller, &config, false).await.unwrap());
        assert_eq!(picker.prompts(), 1);

        assert!(select(&controller, &config, true).await.unwrap());
        assert_eq!(picker.prompts(), 2);
    }

    #[tokio::test]
    async fn test_dismissed_prompt_reports_failure() {
        let config = config_with(Backend::Memory, Provider::Replicate);
        let controller = build_controller(&config, ScriptedPicker::dismissing());

        assert!(!select(&controller, &config, false).await.unwrap());
        assert!(!controller.availability().is_available());
    }

    #[tokio::test]
    async fn test_env_backend_cannot_select() {
        let config = config_with(Backend::Env, Provider::Replicate);
        let picker = ScriptedPicker::typing("r8_unused");
        let controller = build_controller(&config, picker.clone());

        assert!(!select(&controller, &config, true).await.unwrap());
        assert_eq!(picker.prompts(), 0);
    }

    #[tokio::test]
    async fn test_env_backend_status_follows_variable() {
        let config = config_with(Backend::Env, Provider::Replicate);
        let controller = build_controller(&config, ScriptedPicker::dismissing());
        let expected = std::env::var("VITE_REPLICATE_API_TOKEN")
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false);

        assert_eq!(status(&controller, &config, Format::Text).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_env_backend_forget_is_rejected() {
        let config = config_with(Backend::Env, Provider::DeepSeek);

        let err = forget(&config).await.unwrap_err();
        assert!(err.to_string().contains("DEEPSEEK_API_KEY"));
    }

    #[tokio::test]
    async fn test_memory_forget_succeeds() {
        let config = config_with(Backend::Memory, Provider::Gemini);
        assert!(forget(&config).await.unwrap());
    }

    #[test]
    fn test_key_required_hint_names_the_fix() {
        let env = config_with(Backend::Env, Provider::OpenRouter);
        let hint = key_required_hint(&env);
        assert!(hint.contains("OpenRouter API key"));
        assert!(hint.contains("VITE_OPENROUTER_API_KEY"));

        let keyring = config_with(Backend::Keyring, Provider::DeepSeek);
        assert!(key_required_hint(&keyring).contains("keygate --provider deepseek select"));
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(format!("{:?}", exit_code(true)), format!("{:?}", ExitCode::SUCCESS));
        assert_eq!(format!("{:?}", exit_code(false)), format!("{:?}", ExitCode::FAILURE));
    }

    #[tokio::test]
    async fn test_keyring_select_survives_into_fresh_controller() {
        if let Err(e) = KeyringStore::try_new("keygate-cli-test") {
            eprintln!("Skipping test: keyring unusable ({})", e);
            return;
        }

        let config = config_with(Backend::Keyring, Provider::Replicate);
        let selecting = build_controller(&config, ScriptedPicker::typing("r8_from_keyring"));
        assert!(select(&selecting, &config, true).await.unwrap());

        let checking = build_controller(&config, ScriptedPicker::dismissing());
        let found = status(&checking, &config, Format::Text).await.unwrap();

        assert!(forget(&config).await.unwrap());
        let after_forget = build_controller(&config, ScriptedPicker::dismissing());
        let still_found = status(&after_forget, &config, Format::Text).await.unwrap();

        assert!(found, "key selected through the keyring must be visible to a new controller");
        assert!(!still_found, "forget must remove the keyring entry");
    }
}

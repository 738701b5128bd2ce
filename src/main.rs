use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use vaultsync::cli::{Cli, Commands, SyncOpts, TransitOpts};
use vaultsync::config::{self, Settings};
use vaultsync::logging;
use vaultsync::resources::{LoadOptions, ResourceSet};
use vaultsync::sync::Synchronizer;
use vaultsync::transit::{self, TransitOptions};
use vaultsync::vault;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    std::panic::set_hook(Box::new(|panic| {
        eprintln!("[error] {panic}");
    }));

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("[error] {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    logging::init(cli.verbose, cli.json_logs);

    let load_settings = || -> Result<Settings> {
        let mut settings = Settings::load(cli.settings.as_deref())?;
        cli.vault.apply(&mut settings.vault);
        config::validate_settings_object(&settings)?;
        Ok(settings)
    };

    match &cli.command {
        Commands::Synchronize(opts) => synchronize(load_settings()?, opts).await,
        Commands::Transit(opts) => run_transit(load_settings()?, opts).await,
        Commands::Version => {
            println!("vaultsync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn synchronize(settings: Settings, opts: &SyncOpts) -> Result<()> {
    let reconciler_config = opts.reconciler_config();
    reconciler_config.validate()?;

    let mut resources = ResourceSet::load(&LoadOptions {
        config_files: opts.config.clone(),
        config_dirs: opts.config_dir.clone(),
        config_glob: opts
            .config_extension
            .clone()
            .unwrap_or(settings.sync.config_glob),
        policy_dirs: opts.policies.clone(),
        policy_glob: opts
            .policy_extension
            .clone()
            .unwrap_or(settings.sync.policy_glob),
    })?;

    if resources.is_empty() {
        warn!("no resources declared, only drift detection will run");
    }

    let client = vault::connect(&settings.vault).await?;
    let synchronizer = Synchronizer::new(Arc::new(client), reconciler_config)?;
    let report = synchronizer
        .run(&mut resources)
        .await
        .context("synchronization failed")?;

    for kind in report.kinds.iter().filter(|k| !k.skipped) {
        info!(
            kind = %kind.kind,
            applied = kind.applied,
            drifted = kind.drifted.len(),
            removed = kind.removed.len(),
            failures = kind.failures.len(),
            "summary"
        );
    }
    for failure in report.failures() {
        warn!(item = %failure.item, error = %failure.error, "failed item");
    }

    Ok(())
}

async fn run_transit(settings: Settings, opts: &TransitOpts) -> Result<()> {
    let options = TransitOptions {
        mode: opts.mode()?,
        mount: opts.transit.clone(),
        key: opts.key.clone(),
        files: opts.files.clone(),
        dirs: opts.directories.clone(),
        glob_filter: opts
            .glob_filter
            .clone()
            .unwrap_or(settings.transit.glob_filter),
        extension: opts
            .file_extension
            .clone()
            .unwrap_or(settings.transit.extension),
        stdout: opts.stdout,
        delete_files: opts.delete_files,
    };
    options.validate()?;

    let client = vault::connect(&settings.vault).await?;
    let outcomes = transit::run(&client, &options, &mut std::io::stdout().lock()).await?;
    info!(files = outcomes.len(), "transit complete");
    Ok(())
}

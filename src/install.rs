use crate::cli::Action;
use crate::config::Settings;
use crate::download::{download_file, extract_archive};
use crate::path_env::{add_to_path, remove_from_path, EnvStore};
use crate::release::{build_client, resolve_download_url};
use crate::types::{AbortReason, Outcome};
use anyhow::{Context, Result};
use std::fs;

/// The installation directory existing is the only "installed" signal. A
/// plain file at that path does not count.
pub fn is_installed(settings: &Settings) -> bool {
    settings.install_dir.is_dir()
}

pub async fn run(action: Action, settings: &Settings, env: &mut dyn EnvStore) -> Result<Outcome> {
    tracing::debug!("Running {:?}", action);
    match action {
        Action::Install => install(settings, env).await,
        Action::Update => update(settings, env).await,
        Action::Uninstall => uninstall(settings, env),
    }
}

pub async fn install(settings: &Settings, env: &mut dyn EnvStore) -> Result<Outcome> {
    if is_installed(settings) {
        println!(
            "An existing installation was found at {}. Aborting...",
            settings.install_dir.display()
        );
        return Ok(Outcome::Aborted(AbortReason::AlreadyInstalled));
    }

    println!("Beginning installation...");

    let client = build_client().context("Failed to build HTTP client")?;
    let Some(release_url) =
        resolve_download_url(&client, &settings.api_url, &settings.asset_name).await
    else {
        println!("Failed to get the release URL.");
        return Ok(Outcome::Aborted(AbortReason::NoReleaseUrl));
    };

    println!("Downloading release...");
    download_file(&client, &release_url, &settings.temp_archive_path).await?;

    println!("Extracting files...");
    fs::create_dir_all(&settings.install_dir).with_context(|| {
        format!("Could not create {}", settings.install_dir.display())
    })?;
    let extracted = extract_archive(&settings.temp_archive_path, &settings.install_dir);
    if let Err(e) = fs::remove_file(&settings.temp_archive_path) {
        tracing::warn!(
            "Could not delete {}: {}",
            settings.temp_archive_path.display(),
            e
        );
    }
    if extracted.is_err() {
        tracing::warn!(
            "{} may be partially populated; run with --update to replace it",
            settings.install_dir.display()
        );
    }
    let extracted = extracted?;
    tracing::info!("Installed {} files", extracted);

    println!("Adding {} folder to PATH...", settings.install_dir_name());
    add_to_path(env, &settings.install_dir.to_string_lossy())
        .context("Failed to add the installation to PATH")?;

    println!("Installation complete.");
    Ok(Outcome::Completed)
}

pub fn uninstall(settings: &Settings, env: &mut dyn EnvStore) -> Result<Outcome> {
    if !is_installed(settings) {
        println!("An installation was not found. Aborting...");
        return Ok(Outcome::Aborted(AbortReason::NotInstalled));
    }

    println!("Uninstalling...");
    remove_installation(settings, env)?;

    println!("Uninstallation complete.");
    Ok(Outcome::Completed)
}

/// Removes any existing installation, then installs the latest release.
pub async fn update(settings: &Settings, env: &mut dyn EnvStore) -> Result<Outcome> {
    if is_installed(settings) {
        println!("Removing the current installation...");
        remove_installation(settings, env)?;
    } else {
        tracing::info!("Nothing installed yet, updating is a fresh install");
    }

    install(settings, env).await
}

fn remove_installation(settings: &Settings, env: &mut dyn EnvStore) -> Result<()> {
    let name = settings.install_dir_name();

    println!("Deleting {} folder...", name);
    fs::remove_dir_all(&settings.install_dir)
        .with_context(|| format!("Could not delete {}", settings.install_dir.display()))?;

    println!("Deleting {} folder from PATH...", name);
    remove_from_path(env, &settings.install_dir.to_string_lossy())
        .context("Failed to remove the installation from PATH")?;
    Ok(())
}

use clap::{ArgGroup, Parser};

fn get_version() -> &'static str {
    const BASE_VERSION: &str = env!("CARGO_PKG_VERSION");

    if let Some(tag) = option_env!("LUAUP_GIT_TAG") {
        return tag;
    }

    let commit = option_env!("LUAUP_GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("LUAUP_GIT_BRANCH").unwrap_or("unknown");

    // Leaked once at startup; clap wants a 'static str
    let version = format!("v{}-{} ({})", BASE_VERSION, commit, branch);
    Box::leak(version.into_boxed_str())
}

/// What a single run of the installer does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    Update,
    Uninstall,
}

#[derive(Parser, Debug)]
#[command(name = "luaup")]
#[command(about = "Installs, updates and removes the Luau toolchain")]
#[command(version = get_version())]
#[command(group(ArgGroup::new("action").args(["install", "update", "uninstall"])))]
#[command(
    after_help = "Examples:\n  luaup\n  luaup --update\n  luaup --uninstall --no-pause\n\nWith no flag, luaup installs."
)]
pub struct Cli {
    /// Download the latest release and add it to PATH (default)
    #[arg(long)]
    pub install: bool,

    /// Remove the current installation, then install the latest release
    #[arg(long)]
    pub update: bool,

    /// Delete the installation and remove it from PATH
    #[arg(long)]
    pub uninstall: bool,

    /// Exit right away instead of waiting for a key press
    #[arg(long)]
    pub no_pause: bool,

    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn action(&self) -> Action {
        if self.uninstall {
            Action::Uninstall
        } else if self.update {
            Action::Update
        } else {
            Action::Install
        }
    }
}

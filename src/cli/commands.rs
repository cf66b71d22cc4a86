use crate::config::ServerConfig;
use crate::content::{ContentVariant, StaticFile};
use crate::logging::{init_logging, LogConfig};
use crate::router::{Route, RouteTable};
use crate::server::{Server, ServerHandle};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

/// Command-line interface for webobj
#[derive(Parser)]
#[command(name = "webobj")]
#[command(about = "Serve a directory tree through the webobj dispatch engine", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve files from a directory
    Serve {
        /// Address to bind, overriding the config file and `WEBOBJ_ADDR`
        #[arg(long)]
        addr: Option<String>,

        /// Directory to serve
        #[arg(short, long)]
        dir: PathBuf,

        /// Path prefix the directory is mounted at
        #[arg(long, default_value = "/")]
        mount: String,

        /// YAML server config; without it the config comes from `WEBOBJ_*` variables
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Parse the command line and run the selected command.
///
/// # Errors
///
/// Returns an error if logging cannot be initialised, the config cannot be loaded, the mount
/// prefix is invalid or the server cannot bind.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_env())?;

    match cli.command {
        Commands::Serve {
            addr,
            dir,
            mount,
            config,
        } => {
            let mut server_config = match config {
                Some(path) => ServerConfig::from_yaml_file(&path)?,
                None => ServerConfig::from_env(),
            };
            if let Some(addr) = addr {
                server_config.addr = addr;
            }

            let routes = directory_routes(&dir, &mount)?;
            routes.dump_routes();
            let handle = Server::new(routes)
                .with_config(server_config)
                .start()
                .context("failed to start server")?;
            info!(addr = %handle.local_addr(), dir = %dir.display(), mount = %mount, "Serving directory");
            wait_for_shutdown(handle)
        }
    }
}

/// Routes for serving `dir` under `mount`: its `index.html` at the mount point itself, then every
/// file below it.
///
/// # Errors
///
/// Returns an error if `dir` is not a directory or `mount` does not start with `/`.
pub fn directory_routes(dir: &Path, mount: &str) -> Result<RouteTable> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }
    if !mount.starts_with('/') {
        anyhow::bail!("mount prefix must start with '/': {mount}");
    }

    let mut routes = Vec::new();
    let index = dir.join("index.html");
    if index.is_file() {
        routes.push(Route::prefix(mount, StaticFile::new(index))?);
    }
    routes.push(Route::prefix(mount, ContentVariant::directory(dir))?);
    Ok(RouteTable::new(routes))
}

#[cfg(unix)]
fn wait_for_shutdown(handle: ServerHandle) -> Result<()> {
    use signal_hook::consts::signal::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("failed to install signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "Shutdown signal received");
    }
    handle.stop();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: ServerHandle) -> Result<()> {
    handle
        .join()
        .map_err(|e| anyhow::anyhow!("listener coroutine panicked: {e:?}"))
}

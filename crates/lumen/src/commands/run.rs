//! `lumen run` command implementation.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use lumen_config::{CliSettings, DEFAULT_HOST, SETTINGS_FILENAME, Settings, WatchBackend};
use lumen_server::run_server;

use crate::error::CliError;
use crate::output::Output;

/// File watch backend selectable on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum BackendArg {
    /// Native filesystem notifications.
    Notify,
    /// Modification time polling.
    Poll,
}

impl From<BackendArg> for WatchBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Notify => Self::Notify,
            BackendArg::Poll => Self::Poll,
        }
    }
}

/// Arguments for the run command.
#[derive(Args, Debug)]
pub(crate) struct RunArgs {
    /// Path to the settings file.
    #[arg(short, long, env = "LUMEN_CONFIG", default_value = SETTINGS_FILENAME)]
    config: PathBuf,

    /// Address to bind to (overrides settings).
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (overrides settings).
    #[arg(short, long)]
    port: Option<u16>,

    /// File watch backend (overrides settings).
    #[arg(long, value_enum)]
    watch_backend: Option<BackendArg>,

    /// Disable reloading of settings and templates.
    #[arg(long)]
    no_watch: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl RunArgs {
    /// Execute the run command.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be loaded or the server fails
    /// to start.
    pub(crate) async fn execute(self, version: &str) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = self.cli_settings();
        let settings = Settings::load(&self.config, Some(&cli_settings))?;

        output.highlight(&format!("lumen {version}"));
        output.info(&format!(
            "Listening on {}:{}",
            settings.server.bind, settings.server.port
        ));
        for (name, root) in &settings.hosts_resolved {
            output.entry(name, root.display());
        }
        if !settings.has_default_host() {
            output.warning(&format!(
                "No \"{DEFAULT_HOST}\" host configured; unmatched requests will get 404"
            ));
        }
        if settings.watch.enabled {
            output.info(&format!("Watching for changes ({:?})", settings.watch.backend));
        } else {
            output.info("Watching: disabled");
        }

        run_server(settings).await?;
        Ok(())
    }

    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            bind: self.bind.clone(),
            port: self.port,
            watch_backend: self.watch_backend.map(WatchBackend::from),
            watch_enabled: self.no_watch.then_some(false),
        }
    }
}

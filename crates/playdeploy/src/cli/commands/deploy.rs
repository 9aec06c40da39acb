//! Bundle deployment command

use clap::{Args, ValueEnum};
use console::style;
use serde::Serialize;
use std::path::PathBuf;

use playdeploy_store::credentials::SERVICE_ACCOUNT_ENV;
use playdeploy_store::google_play::GooglePlayStore;
use playdeploy_store::{
    deploy, DeployReport, DeployRequest, GooglePlayConfig, ReleaseStatus, ServiceAccountKey,
    Track, RELEASE_NOTE_LOCALES,
};

use crate::cli::{output, Cli, OutputFormat};

/// Release track accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrackArg {
    Internal,
    Alpha,
    Beta,
    Production,
}

impl From<TrackArg> for Track {
    fn from(arg: TrackArg) -> Self {
        match arg {
            TrackArg::Internal => Track::Internal,
            TrackArg::Alpha => Track::Alpha,
            TrackArg::Beta => Track::Beta,
            TrackArg::Production => Track::Production,
        }
    }
}

/// Upload an App Bundle and assign it to a track
#[derive(Debug, Args)]
pub struct DeployCommand {
    /// Path to the App Bundle (.aab)
    #[arg(long)]
    pub bundle: PathBuf,

    /// Package name (e.g. com.example.app)
    #[arg(long)]
    pub package_name: String,

    /// Release track
    #[arg(long, value_enum, default_value = "internal")]
    pub track: TrackArg,

    /// Release notes, attached for ja-JP and en-US
    #[arg(long)]
    pub release_notes: Option<String>,

    /// Service account key JSON or path to it
    #[arg(long, env = SERVICE_ACCOUNT_ENV, hide_env_values = true, value_name = "JSON|PATH")]
    pub service_account_key: Option<String>,

    /// Resumable upload chunk size in MiB
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u32).range(1..=1024))]
    pub chunk_size_mib: u32,

    /// Dry run - check configuration and the bundle but don't upload
    #[arg(long)]
    pub dry_run: bool,
}

/// What a dry run would deploy
#[derive(Debug, Serialize)]
struct DeployPlan<'a> {
    package_name: &'a str,
    bundle: String,
    bundle_size: u64,
    track: Track,
    status: ReleaseStatus,
    release_note_locales: Vec<&'a str>,
    service_account: &'a str,
}

impl DeployCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        // Configuration comes first: nothing remote happens without a key
        let key = ServiceAccountKey::from_setting(
            SERVICE_ACCOUNT_ENV,
            self.service_account_key.as_deref(),
        )?;

        let request = self.request();
        let bundle_size = request.validate()?;

        if self.dry_run {
            return self.print_plan(cli, &request, &key, bundle_size);
        }

        let config = GooglePlayConfig {
            upload_chunk_size: self.chunk_size_mib as usize * 1024 * 1024,
            ..Default::default()
        };
        let store = GooglePlayStore::new(key, config)?;

        if !cli.quiet && cli.format == OutputFormat::Text {
            output::info(&format!(
                "Uploading {} to Google Play ({})",
                style(self.bundle.display()).bold(),
                request.track
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let report = runtime.block_on(deploy(&store, &request))?;

        print_report(cli, &report)
    }

    fn request(&self) -> DeployRequest {
        DeployRequest {
            package_name: self.package_name.clone(),
            bundle_path: self.bundle.clone(),
            track: self.track.into(),
            release_notes: self.release_notes.clone(),
        }
    }

    fn print_plan(
        &self,
        cli: &Cli,
        request: &DeployRequest,
        key: &ServiceAccountKey,
        bundle_size: u64,
    ) -> anyhow::Result<()> {
        let has_notes = request
            .release_notes
            .as_deref()
            .is_some_and(|notes| !notes.is_empty());

        let plan = DeployPlan {
            package_name: &request.package_name,
            bundle: request.bundle_path.display().to_string(),
            bundle_size,
            track: request.track,
            status: ReleaseStatus::for_track(request.track),
            release_note_locales: if has_notes {
                RELEASE_NOTE_LOCALES.to_vec()
            } else {
                Vec::new()
            },
            service_account: &key.client_email,
        };

        match cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
            OutputFormat::Text if !cli.quiet => {
                println!("{}", output::header("Dry run - nothing will be uploaded"));
                println!("{}", output::key_value("Package", plan.package_name));
                println!(
                    "{}",
                    output::key_value("Bundle", &format!("{} ({} bytes)", plan.bundle, plan.bundle_size))
                );
                println!("{}", output::key_value("Track", plan.track.as_str()));
                println!("{}", output::key_value("Status", &plan.status.to_string()));
                if !plan.release_note_locales.is_empty() {
                    println!(
                        "{}",
                        output::key_value("Release notes", &plan.release_note_locales.join(", "))
                    );
                }
                println!("{}", output::key_value("Service account", plan.service_account));
            }
            OutputFormat::Text => {}
        }

        Ok(())
    }
}

fn print_report(cli: &Cli, report: &DeployReport) -> anyhow::Result<()> {
    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text if !cli.quiet => {
            output::success("Published to Google Play");
            println!("{}", output::key_value("Package", &report.package_name));
            println!(
                "{}",
                output::key_value(
                    "Version code",
                    &style(report.version_code).cyan().to_string()
                )
            );
            println!("{}", output::key_value("Track", report.track.as_str()));
            println!("{}", output::key_value("Status", &report.status.to_string()));
            println!("{}", output::key_value("Console", &report.console_url));
        }
        OutputFormat::Text => {}
    }

    Ok(())
}

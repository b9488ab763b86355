use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use ekascribe_lib::clients::EkaClient;
use ekascribe_lib::config::Settings;
use ekascribe_lib::protocol::{AdditionalData, OutputTemplate, TranscriptionRequest};
use ekascribe_lib::{logging, Workflow, WorkflowError, WorkflowRequest};
use log::{error, info};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

const EXIT_TIMED_OUT: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "ekascribe")]
#[command(about = "Transcribe medical audio with EkaScribe", long_about = None)]
struct Cli {
    /// Settings file (default: ./ekascribe.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Seconds between status checks
    #[arg(long, global = true)]
    poll_interval: Option<u64>,

    /// Seconds to wait for the outputs before giving up
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload audio files and wait for their transcription
    Run(RunArgs),

    /// Resume waiting for a transaction whose polling timed out
    Resume {
        /// Transaction id printed by the timed-out run
        transaction_id: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Audio files, uploaded in the given order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output template id (repeatable)
    #[arg(short, long = "template", default_value = "transcript_template")]
    templates: Vec<String>,

    /// Request codification for every template
    #[arg(long)]
    codify: bool,

    #[arg(long, default_value = "dictation")]
    mode: String,

    #[arg(long, default_value = "pro")]
    model_type: String,

    /// Input language (repeatable)
    #[arg(short, long = "input-language", default_value = "en-IN")]
    input_languages: Vec<String>,

    #[arg(short, long, default_value = "en-IN")]
    output_language: String,

    #[arg(short, long)]
    speciality: Option<String>,

    /// JSON object passed through to the service unmodified
    #[arg(long, value_parser = parse_additional_data)]
    additional_data: Option<AdditionalData>,
}

impl RunArgs {
    fn transcription(self) -> TranscriptionRequest {
        TranscriptionRequest {
            mode: self.mode,
            model_type: self.model_type,
            input_languages: self.input_languages,
            output_language: self.output_language,
            speciality: self.speciality,
            output_templates: self
                .templates
                .into_iter()
                .map(|id| OutputTemplate {
                    codification_needed: self.codify,
                    ..OutputTemplate::new(id)
                })
                .collect(),
            additional_data: self.additional_data,
            ..Default::default()
        }
    }
}

fn parse_additional_data(raw: &str) -> Result<AdditionalData, String> {
    serde_json::from_str(raw).map_err(|e| format!("expected a JSON object: {}", e))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, cancelling");
            watcher.cancel();
        }
    });

    match run(cli, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            match e.downcast_ref::<WorkflowError>() {
                Some(e) if e.is_timed_out() => {
                    if let Some(txn) = &e.transaction_id {
                        eprintln!("Still processing; resume with: ekascribe resume {}", txn);
                    }
                    ExitCode::from(EXIT_TIMED_OUT)
                }
                Some(e) if e.is_cancelled() => ExitCode::from(EXIT_CANCELLED),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(cli: Cli, cancel: &CancellationToken) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(secs) = cli.poll_interval.filter(|s| *s > 0) {
        settings.poll.interval = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.timeout.filter(|s| *s > 0) {
        settings.poll.max_duration = Duration::from_secs(secs);
    }

    let client = EkaClient::new(settings.client.clone(), settings.credentials.clone())?;
    let workflow = Workflow::new(client);

    match cli.command {
        Commands::Run(args) => {
            let request = WorkflowRequest {
                files: args.files.clone(),
                action: settings.upload_action.clone(),
                transcription: args.transcription(),
                poll: settings.poll,
            };
            let result = workflow
                .login_and_run(settings.sharing_key.as_deref(), &request, cancel)
                .await?;
            print_json(&result)
        }
        Commands::Resume { transaction_id } => {
            let session = workflow
                .client()
                .login(settings.sharing_key.as_deref())
                .await?;
            let (_, outputs) = workflow
                .poll_and_decode(&session, &transaction_id, &settings.poll, cancel)
                .await?;
            print_json(&outputs)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

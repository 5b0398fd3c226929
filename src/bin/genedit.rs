//! CLI for genedit - edit photos with a text instruction.

use clap::{Args, Parser, Subcommand, ValueEnum};
use genedit::image::{ImageFormat, DOWNLOAD_FILE_NAME};
use genedit::{
    EditClient, EditError, GeminiClient, GeminiModel, UploadedImage, WorkflowController,
    WorkflowState,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "genedit")]
#[command(about = "Edit photos with natural-language instructions via Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Gemini model to use
    #[arg(short, long, value_enum, global = true, default_value = "flash")]
    model: ModelArg,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply one edit instruction to an image
    Edit(EditArgs),

    /// Interactive session: open, prompt, generate, save
    Session,

    /// Verify the API key and model are usable
    Check,
}

#[derive(Args)]
struct EditArgs {
    /// Image to edit (PNG, JPEG or WebP)
    input: PathBuf,

    /// Description of the edit
    #[arg(short, long)]
    prompt: String,

    /// Where to save the edited image
    #[arg(short, long, default_value = DOWNLOAD_FILE_NAME)]
    output: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    Flash,
    Pro,
}

impl From<ModelArg> for GeminiModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Flash => GeminiModel::FlashImage,
            ModelArg::Pro => GeminiModel::ProImage,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_logging();
    let cli = Cli::parse();

    // Missing API key is fatal before any command runs.
    let client = GeminiClient::builder().model(cli.model.into()).build()?;

    match cli.command {
        Commands::Edit(args) => edit_image(client, args, cli.json).await,
        Commands::Session => run_session(client).await,
        Commands::Check => check(client, cli.json).await,
    }
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Warns when the sniffed or declared type is not one the upload accepts.
fn unsupported_warning(image: &UploadedImage) -> Option<String> {
    let accepted: Vec<&str> = ImageFormat::ACCEPTED.iter().map(|f| f.mime_type()).collect();
    if accepted.contains(&image.mime_type()) {
        return None;
    }
    Some(format!(
        "warning: {} ({}) is not one of {}",
        image.file_name(),
        image.mime_type(),
        accepted.join(", ")
    ))
}

/// Loads, edits and saves one image; the error is the message shown to the user.
async fn run_edit(client: GeminiClient, args: &EditArgs) -> Result<(), String> {
    let image = UploadedImage::load(&args.input)
        .await
        .map_err(|e| e.user_message())?;
    if let Some(warning) = unsupported_warning(&image) {
        eprintln!("{warning}");
    }

    let controller = WorkflowController::new(client);
    controller.select_image(image);
    controller.set_prompt(args.prompt.as_str());

    let edited = match controller.generate().await {
        Ok(edited) => edited,
        Err(e) => {
            return Err(controller
                .state()
                .last_error
                .unwrap_or_else(|| e.user_message()))
        }
    };

    edited
        .save(&args.output)
        .map_err(|e| format!("Could not save {}: {e}", args.output.display()))
}

async fn edit_image(
    client: GeminiClient,
    args: EditArgs,
    json_output: bool,
) -> anyhow::Result<ExitCode> {
    let outcome = run_edit(client, &args).await;

    if json_output {
        let output = serde_json::json!({
            "success": outcome.is_ok(),
            "output": outcome.as_ref().ok().map(|_| args.output.display().to_string()),
            "error": outcome.as_ref().err(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        match outcome {
            Ok(()) => println!("Edited image saved to {}", args.output.display()),
            Err(ref message) => eprintln!("{message}"),
        }
    }

    Ok(if outcome.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn check(client: GeminiClient, json_output: bool) -> anyhow::Result<ExitCode> {
    let model = client.model().as_str();
    let healthy = client.health_check().await;

    if json_output {
        let output = serde_json::json!({
            "provider": client.name(),
            "model": model,
            "ok": healthy.is_ok(),
            "error": healthy.as_ref().err().map(EditError::user_message),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        match healthy {
            Ok(()) => println!("{} ({model}) is reachable", client.name()),
            Err(ref e) => eprintln!("{}", e.user_message()),
        }
    }

    Ok(if healthy.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

const SESSION_HELP: &str = "\
Commands:
  open <path>      select an image
  prompt <text>    set the edit instruction
  generate         run the edit (in the background)
  save [path]      write the last result (default: generated-image.png)
  status           show the current state
  help             show this help
  quit             leave the session";

async fn run_session(client: GeminiClient) -> anyhow::Result<ExitCode> {
    let controller = Arc::new(WorkflowController::new(client));

    // Observer: report loading and outcome transitions as they happen.
    let mut updates = controller.subscribe();
    let observer = tokio::spawn(async move {
        let mut last = WorkflowState::default();
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            for line in transition_messages(&last, &state) {
                println!("{line}");
            }
            last = state;
        }
    });

    println!("{SESSION_HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" => {}
            "open" if !rest.is_empty() => match UploadedImage::load(rest).await {
                Ok(image) => {
                    if let Some(warning) = unsupported_warning(&image) {
                        println!("{warning}");
                    }
                    println!("Selected {} ({})", image.file_name(), image.mime_type());
                    controller.select_image(image);
                }
                Err(e) => println!("{}", e.user_message()),
            },
            "prompt" => controller.set_prompt(rest),
            "generate" => {
                let controller = Arc::clone(&controller);
                tokio::spawn(async move {
                    match controller.generate().await {
                        Err(EditError::Busy) => println!("Still generating, please wait."),
                        Err(EditError::Superseded) => {
                            tracing::debug!("previous edit superseded")
                        }
                        _ => {}
                    }
                });
            }
            "save" => {
                let path = if rest.is_empty() {
                    PathBuf::from(DOWNLOAD_FILE_NAME)
                } else {
                    PathBuf::from(rest)
                };
                match controller.state().last_result {
                    Some(image) => match image.save(&path) {
                        Ok(()) => println!("Saved {}", path.display()),
                        Err(e) => println!("Could not save: {e}"),
                    },
                    None => println!("No generated image yet."),
                }
            }
            "status" => println!("{}", serde_json::to_string_pretty(&status(&controller.state()))?),
            "help" => println!("{SESSION_HELP}"),
            "quit" | "exit" => break,
            _ => println!("Unknown command. Type 'help'."),
        }
    }

    observer.abort();
    Ok(ExitCode::SUCCESS)
}

/// Lines to print when the observed state moves from `prev` to `next`.
///
/// Outcomes are keyed on the outcome counter, so a failure identical to the
/// previous one is still reported.
fn transition_messages(prev: &WorkflowState, next: &WorkflowState) -> Vec<String> {
    let mut lines = Vec::new();
    if next.is_loading && !prev.is_loading {
        lines.push("Generating...".to_string());
    }
    if next.outcomes != prev.outcomes {
        if let Some(ref message) = next.last_error {
            lines.push(message.clone());
        }
        if let Some(ref image) = next.last_result {
            let size = image.decode().map(|b| b.len()).unwrap_or(0);
            lines.push(format!(
                "Generated image ready ({size} bytes). Type 'save' to download."
            ));
        }
    }
    lines
}

fn status(state: &WorkflowState) -> serde_json::Value {
    serde_json::json!({
        "image": state.image_name,
        "has_prompt": state.has_prompt,
        "is_loading": state.is_loading,
        "can_generate": state.can_generate(),
        "error": state.last_error,
        "has_result": state.last_result.is_some(),
    })
}

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use docqa::commands::{self, AppContext};
use docqa::config::{self, Config};

/// Ask questions about documents uploaded to a conversation.
#[derive(Parser, Debug)]
#[command(name = "docqa", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new conversation and print its name.
    New,
    /// List conversations, newest first.
    List,
    /// Upload files into a conversation and index them.
    Upload {
        conversation: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List the files uploaded to a conversation.
    Files { conversation: String },
    /// Ask a question against a conversation's documents.
    Ask {
        conversation: String,
        question: String,
        /// Print the answer as it is generated.
        #[arg(long)]
        stream: bool,
        /// Skip printing the retrieved sources.
        #[arg(long)]
        no_sources: bool,
    },
    /// Show the effective settings with API keys masked.
    Settings,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    if let Command::Settings = cli.command {
        for (key, value) in commands::settings::settings_view(&config) {
            println!("{key}={value}");
        }
        return Ok(());
    }

    let ctx = AppContext::open(config)?;
    match cli.command {
        Command::New => {
            let conversation = commands::conversation::create_conversation(&ctx)?;
            println!("{}", conversation.name);
        }
        Command::List => {
            for conversation in commands::conversation::list_conversations(&ctx)? {
                println!("{}\t{}", conversation.name, conversation.created_at);
            }
        }
        Command::Upload {
            conversation,
            files,
        } => {
            let reports = commands::knowledge::upload_files(&ctx, &conversation, &files).await?;
            for report in reports {
                println!(
                    "{}: {} segments, {} chunks, {} indexed",
                    report.file_path, report.segments, report.chunks, report.indexed
                );
            }
        }
        Command::Files { conversation } => {
            for name in commands::conversation::list_files(&ctx, &conversation)? {
                println!("{name}");
            }
        }
        Command::Ask {
            conversation,
            question,
            stream,
            no_sources,
        } => {
            let print_delta = |delta: &str| {
                let mut out = std::io::stdout().lock();
                let _ = out.write_all(delta.as_bytes());
                let _ = out.flush();
            };
            let on_delta: Option<&(dyn for<'s> Fn(&'s str) + Send + Sync)> =
                if stream { Some(&print_delta) } else { None };

            let answer = commands::chat::ask(&ctx, &conversation, &question, on_delta).await?;
            if stream {
                println!();
            } else {
                println!("{}", answer.answer);
            }
            if !no_sources && !answer.sources.is_empty() {
                println!("\nSources:");
                for chunk in &answer.sources {
                    println!("  {}", chunk.metadata.id);
                }
            }
        }
        Command::Settings => {}
    }
    Ok(())
}

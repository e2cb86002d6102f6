//! Mentorgraph CLI: command-line interface for the question-answering service
//!
//! Talks to a running server over its HTTP API.

mod client;

use clap::{Parser, Subcommand};
use client::RemoteClient;
use comfy_table::{ContentArrangement, Table};
use serde_json::json;

#[derive(Parser)]
#[command(name = "mentorgraph", version, about = "Ask questions about the mentorship graph")]
struct Cli {
    /// Server HTTP URL
    #[arg(long, default_value = "http://localhost:8000", global = true, env = "MENTORGRAPH_URL")]
    url: String,

    /// Model backend
    #[arg(long, default_value = "llama", global = true)]
    model: Model,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Model {
    Llama,
    Openai,
}

impl Model {
    fn as_str(self) -> &'static str {
        match self {
            Model::Llama => "llama",
            Model::Openai => "openai",
        }
    }
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question
    Ask {
        question: String,

        /// Rephrase into a canonical question first
        #[arg(long)]
        rephrase: bool,
    },
    /// Show the canonical form of a question
    Rephrase { question: String },
    /// Load the seed data
    Populate,
    /// Delete all data
    Reset,
    /// Get server status
    Status,
    /// Start an interactive question loop
    Chat,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let client = RemoteClient::new(&cli.url);
    let model = cli.model.as_str();

    let result = match cli.command {
        Commands::Ask { question, rephrase } => {
            run_ask(&client, &question, model, rephrase.then_some(true), &cli.format).await
        }
        Commands::Rephrase { question } => run_rephrase(&client, &question, model, &cli.format).await,
        Commands::Populate => run_admin(&client, true, &cli.format).await,
        Commands::Reset => run_admin(&client, false, &cli.format).await,
        Commands::Status => run_status(&client, &cli.format).await,
        Commands::Chat => run_chat(&client, model, &cli.format).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_ask(
    client: &RemoteClient,
    question: &str,
    model: &str,
    rephrase: Option<bool>,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let answer = client.ask(question, model, rephrase).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json!({ "response": answer }))?),
        OutputFormat::Table => println!("{}", answer),
    }
    Ok(())
}

async fn run_rephrase(
    client: &RemoteClient,
    question: &str,
    model: &str,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let rephrased = client.rephrase(question, model).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json!({ "response": rephrased }))?),
        OutputFormat::Table => println!("{}", rephrased),
    }
    Ok(())
}

async fn run_admin(client: &RemoteClient, populate: bool, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let schema = if populate {
        client.populate().await?
    } else {
        client.reset().await?
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json!({ "result": schema }))?),
        OutputFormat::Table => print!("{}", schema),
    }
    Ok(())
}

async fn run_status(client: &RemoteClient, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let status = client.status().await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        OutputFormat::Table => {
            println!("Status:  {}", status.status);
            println!("Version: {}", status.version);
            println!("Models:  {}", status.models.join(", "));

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Kind", "Name"]);
            for label in &status.graph.labels {
                table.add_row(vec!["label", label.as_str()]);
            }
            for rel_type in &status.graph.relationship_types {
                table.add_row(vec!["relationship", rel_type.as_str()]);
            }

            if status.graph.labels.is_empty() && status.graph.relationship_types.is_empty() {
                println!("(graph is empty)");
            } else {
                println!("{}", table);
            }
        }
    }

    Ok(())
}

async fn run_chat(client: &RemoteClient, model: &str, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("Mentorgraph chat ({})", model);
    println!("Ask a question, or :help for commands. :quit to exit.\n");

    let stdin = std::io::stdin();
    let mut line = String::new();
    let mut rephrase = false;

    loop {
        eprint!("you> ");

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match trimmed {
            ":quit" | ":exit" | ":q" => break,
            ":help" | ":h" => {
                println!("Commands:");
                println!("  :status    Show server status");
                println!("  :rephrase  Toggle rephrasing before answering");
                println!("  :quit      Exit chat");
                println!("  <question> Ask a question");
            }
            ":status" => {
                if let Err(e) = run_status(client, format).await {
                    eprintln!("Error: {}", e);
                }
            }
            ":rephrase" => {
                rephrase = !rephrase;
                println!("Rephrasing {}", if rephrase { "on" } else { "off" });
            }
            question => match client.ask(question, model, Some(rephrase)).await {
                Ok(answer) => println!("bot> {}", answer),
                Err(e) => eprintln!("Error: {}", e),
            },
        }
    }

    println!("Bye!");
    Ok(())
}

use anyhow::Context;
use chrono::{Local, Utc};
use clap::{Args, Parser, Subcommand};
use docqa_core::{
    discover_documents, load_documents, Answer, ChatSession, Chunker, PipelineCache, QaConfig,
    Role,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docqa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML file holding the prompt template and pipeline settings
    #[arg(long, env = "DOCQA_CONFIG", default_value = "config/rag.toml", global = true)]
    config: PathBuf,

    /// Ollama base URL (overrides the config file)
    #[arg(long, env = "DOCQA_OLLAMA_URL", global = true)]
    ollama_url: Option<String>,

    /// Model name served by Ollama (overrides the config file)
    #[arg(long, env = "DOCQA_MODEL", global = true)]
    model: Option<String>,
}

#[derive(Args)]
struct Sources {
    /// Document to load; repeat for several files.
    #[arg(long = "file", required_unless_present = "folder")]
    files: Vec<PathBuf>,

    /// Folder scanned recursively for .pdf, .txt and .md files.
    #[arg(long, conflicts_with = "files")]
    folder: Option<PathBuf>,
}

impl Sources {
    fn resolve(&self) -> anyhow::Result<Vec<PathBuf>> {
        match &self.folder {
            Some(folder) => Ok(discover_documents(folder)?),
            None => Ok(self.files.clone()),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Answer one question and exit.
    Ask {
        #[command(flatten)]
        sources: Sources,
        /// Question to answer.
        #[arg(long)]
        question: String,
        /// Print the retrieved passages under the answer.
        #[arg(long, default_value_t = false)]
        show_sources: bool,
    },
    /// Interactive question answering on stdin.
    Chat {
        #[command(flatten)]
        sources: Sources,
        /// Print the retrieved passages under each answer.
        #[arg(long, default_value_t = false)]
        show_sources: bool,
    },
    /// Print document and chunk statistics, optionally with the prompt for a question.
    Inspect {
        #[command(flatten)]
        sources: Sources,
        /// Show the retrieved context and filled prompt without calling the model.
        #[arg(long)]
        question: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "docqa boot"
    );

    let mut config = QaConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    if let Some(url) = cli.ollama_url {
        config.llm.base_url = url;
    }
    if let Some(model) = cli.model {
        config.llm.model = model;
    }

    let cache = PipelineCache::new();

    match cli.command {
        Command::Ask {
            sources,
            question,
            show_sources,
        } => {
            let paths = sources.resolve()?;
            let pipeline = cache
                .get_or_setup(&paths, &config)
                .await
                .context("setting up the pipeline")?;
            let answer = pipeline.ask_with_sources(&question).await?;
            print_answer(&answer, show_sources);
        }
        Command::Chat {
            sources,
            show_sources,
        } => {
            let paths = sources.resolve()?;
            run_chat(&cache, &paths, &config, show_sources).await?;
        }
        Command::Inspect { sources, question } => {
            let paths = sources.resolve()?;
            let chunker = Chunker::from_config(config.chunking)?;
            let documents = load_documents(&paths)?;

            for document in &documents {
                let chunks = chunker.chunk_documents(std::slice::from_ref(document));
                println!(
                    "{} pages={} chunks={} sha256={}",
                    document.fingerprint.source_path,
                    document.pages.len(),
                    chunks.len(),
                    document.fingerprint.checksum
                );
            }

            if let Some(question) = question {
                let pipeline = cache.get_or_setup(&paths, &config).await?;
                let (prompt, hits) = pipeline.prepare_prompt(&question).await?;
                for hit in &hits {
                    println!(
                        "[score={:.4}] {} p.{} #{}",
                        hit.score, hit.chunk.source_path, hit.chunk.page, hit.chunk.chunk_index
                    );
                }
                println!("--- prompt ---\n{prompt}");
            }
        }
    }

    Ok(())
}

async fn run_chat(
    cache: &PipelineCache,
    paths: &[PathBuf],
    config: &QaConfig,
    show_sources: bool,
) -> anyhow::Result<()> {
    let mut session = ChatSession::new();
    eprintln!("preparing documents...");

    match cache.get_or_setup(paths, config).await {
        Ok(pipeline) => session.attach(pipeline),
        Err(error) => {
            eprintln!("setup failed: {error}");
            return Err(error.into());
        }
    }

    if let Some(greeting) = session.transcript().turns().last() {
        println!("assistant> {}", greeting.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();

        match question {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("(history cleared)");
                continue;
            }
            "/history" => {
                for turn in session.transcript().turns() {
                    let who = match turn.role {
                        Role::User => "you",
                        Role::Assistant => "assistant",
                    };
                    let at = turn.timestamp.with_timezone(&Local).format("%H:%M:%S");
                    println!("[{at}] {who}> {}", turn.content);
                }
                continue;
            }
            _ => {}
        }

        match session.ask(question).await {
            Ok(answer) => print_answer(&answer, show_sources),
            Err(error) => {
                warn!(error = %error, "question failed");
                println!("assistant> sorry, I could not answer that: {error}");
            }
        }
    }

    Ok(())
}

fn print_answer(answer: &Answer, show_sources: bool) {
    println!("assistant> {}", answer.text);
    if show_sources {
        for hit in &answer.sources {
            println!(
                "  source={} page={} score={:.4}",
                hit.chunk.source_path, hit.chunk.page, hit.score
            );
            println!("    {}", hit.chunk.text);
        }
    }
}

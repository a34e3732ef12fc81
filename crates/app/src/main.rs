use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use docqa_core::{
    discover_files, read_upload, ChatConfig, ChunkingConfig, EmbeddingBackend, EmbeddingConfig,
    IndexMode, LocalVectorIndex, PipelineConfig, ProcessReport, Reply, Session, UploadedFile,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docqa", version, about = "Ask questions answered only from your documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory that receives copies of uploaded files
    #[arg(long, env = "DOCQA_UPLOAD_DIR", default_value = "data")]
    upload_dir: PathBuf,

    /// Directory holding the persisted vector index
    #[arg(long, env = "DOCQA_INDEX_DIR", default_value = "vector_db")]
    index_dir: PathBuf,

    /// Maximum characters per chunk
    #[arg(long, env = "DOCQA_CHUNK_SIZE", default_value = "400")]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, env = "DOCQA_CHUNK_OVERLAP", default_value = "80")]
    chunk_overlap: usize,

    /// Number of chunks retrieved per question
    #[arg(long, env = "DOCQA_TOP_K", default_value = "3")]
    top_k: usize,

    /// Embedding backend
    #[arg(long, env = "DOCQA_EMBEDDER", value_enum, default_value_t = EmbedderArg::Hashed)]
    embedder: EmbedderArg,

    /// Base URL of an OpenAI-compatible embeddings service
    #[arg(long, env = "EMBEDDING_URL")]
    embedding_url: Option<String>,

    /// Embedding model identifier
    #[arg(
        long,
        env = "EMBEDDING_MODEL",
        default_value = "sentence-transformers/all-MiniLM-L6-v2"
    )]
    embedding_model: String,

    /// API key for the embeddings service
    #[arg(long, env = "EMBEDDING_API_KEY", hide_env_values = true)]
    embedding_api_key: Option<String>,

    /// Base URL of an OpenAI-compatible chat-completions service
    #[arg(long, env = "CHAT_URL", default_value = "https://api.groq.com/openai/v1")]
    chat_url: String,

    /// Chat model identifier
    #[arg(long, env = "CHAT_MODEL", default_value = "llama-3.1-8b-instant")]
    chat_model: String,

    /// API key for the chat-completions service
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    chat_api_key: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderArg {
    /// Offline character-trigram hashing
    Hashed,
    /// OpenAI-compatible embeddings endpoint
    Http,
}

#[derive(Subcommand)]
enum Command {
    /// Load files or folders, then build and persist the index.
    Process {
        /// Files, or folders searched recursively for .pdf and .txt files.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Add to the existing index instead of replacing it.
        #[arg(long, default_value_t = false)]
        append: bool,
    },
    /// Answer one question from the persisted index.
    Ask {
        /// Question to answer
        #[arg(long)]
        question: String,
    },
    /// Interactive session that starts with an empty index.
    Chat,
}

impl Cli {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let config = PipelineConfig {
            upload_dir: self.upload_dir.clone(),
            index_dir: self.index_dir.clone(),
            chunking: ChunkingConfig::new(self.chunk_size, self.chunk_overlap)?,
            top_k: self.top_k,
        };
        config.validate()?;
        Ok(config)
    }

    fn embedding_config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            backend: match self.embedder {
                EmbedderArg::Hashed => EmbeddingBackend::Hashed,
                EmbedderArg::Http => EmbeddingBackend::Http,
            },
            base_url: self.embedding_url.clone(),
            model: self.embedding_model.clone(),
            api_key: self.embedding_api_key.clone(),
            ..EmbeddingConfig::default()
        }
    }

    fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            base_url: self.chat_url.clone(),
            model: self.chat_model.clone(),
            api_key: self.chat_api_key.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Every setting the command needs is checked before any file is touched.
    let pipeline = cli.pipeline_config()?;
    let embedder = cli.embedding_config().build()?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        embedding_model = %embedder.model(),
        "docqa boot"
    );

    match cli.command {
        Command::Process { ref paths, append } => {
            let mode = if append {
                IndexMode::Append
            } else {
                IndexMode::Rebuild
            };
            let index = LocalVectorIndex::open(&pipeline.index_dir, mode)?;
            let mut session = Session::new(pipeline, embedder, Box::new(index))?;
            let uploads = read_uploads(paths)?;

            let report = session.process(&uploads, mode).await?;
            print_report(&report);
        }
        Command::Ask { ref question } => {
            let chat_model = cli.chat_config().build()?;
            let index = LocalVectorIndex::load(&pipeline.index_dir)?;
            let session =
                Session::new(pipeline, embedder, Box::new(index))?.with_chat_model(chat_model);

            let reply = session.ask(question).await?;
            print_reply(&reply);
        }
        Command::Chat => {
            let chat_model = cli.chat_config().build()?;
            let index = LocalVectorIndex::new(&pipeline.index_dir);
            let mut session =
                Session::new(pipeline, embedder, Box::new(index))?.with_chat_model(chat_model);
            run_chat(&mut session).await?;
        }
    }

    Ok(())
}

fn read_uploads(paths: &[PathBuf]) -> anyhow::Result<Vec<UploadedFile>> {
    let files = discover_files(paths);
    if files.is_empty() {
        anyhow::bail!("no .pdf or .txt files found");
    }

    let mut uploads = Vec::with_capacity(files.len());
    for path in files {
        uploads.push(read_upload(&path)?);
    }
    Ok(uploads)
}

async fn run_chat(session: &mut Session) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("Commands: /process <PATH>... [--append], /quit. Anything else is a question.");

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }

        if let Some(arguments) = line.strip_prefix("/process") {
            let mut mode = IndexMode::Rebuild;
            let mut paths = Vec::new();
            for argument in arguments.split_whitespace() {
                if argument == "--append" {
                    mode = IndexMode::Append;
                } else {
                    paths.push(PathBuf::from(argument));
                }
            }

            if paths.is_empty() {
                println!("usage: /process <PATH>... [--append]");
                continue;
            }

            let result = match read_uploads(&paths) {
                Ok(uploads) => session.process(&uploads, mode).await.map_err(anyhow::Error::from),
                Err(error) => Err(error),
            };
            match result {
                Ok(report) => print_report(&report),
                Err(error) => {
                    warn!(%error, "processing failed");
                    println!("error: {error}");
                }
            }
            continue;
        }

        match session.ask(line).await {
            Ok(reply) => print_reply(&reply),
            Err(error) => {
                warn!(%error, "question failed");
                println!("error: {error}");
            }
        }
    }

    Ok(())
}

fn print_report(report: &ProcessReport) {
    for skipped in &report.skipped {
        println!("skipped {}: {}", skipped.name, skipped.reason);
    }
    println!(
        "{} document(s), {} chunk(s) processed; index holds {} chunk(s) at {}",
        report.documents,
        report.chunks,
        report.indexed,
        Utc::now().to_rfc3339()
    );
}

fn print_reply(reply: &Reply) {
    match reply {
        Reply::NotProcessed => println!("warning: {reply}"),
        Reply::Answer { text, sources, .. } => {
            println!("{text}");
            for hit in sources {
                match hit.metadata.page {
                    Some(page) => println!(
                        "  source={} page={} score={:.4}",
                        hit.metadata.source_id, page, hit.score
                    ),
                    None => println!(
                        "  source={} score={:.4}",
                        hit.metadata.source_id, hit.score
                    ),
                }
            }
        }
    }
}

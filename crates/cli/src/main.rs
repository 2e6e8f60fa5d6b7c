use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use visage_embedder::StubEmbedder;
use visage_server::{ingest_directory, router, AppState};
use visage_vector_store::{JsonFileBackend, VectorStore};

#[derive(Parser)]
#[command(name = "visage")]
#[command(about = "Face similarity registration and search", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the face search HTTP API
    Serve(ServeArgs),

    /// Embed and register every image in the image directory
    Ingest(IngestArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args)]
struct IngestArgs {
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args)]
struct StoreArgs {
    /// Path to the persisted collection file
    #[arg(long, default_value = "faces.json")]
    db: PathBuf,

    /// Directory holding registered face images
    #[arg(long, default_value = "db")]
    image_dir: PathBuf,

    /// Embedding dimension used by the stub embedder
    #[arg(long, default_value_t = 512)]
    dimension: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Ingest(args) => ingest(args).await,
    }
}

async fn open_state(args: &StoreArgs) -> Result<AppState> {
    tokio::fs::create_dir_all(&args.image_dir).await?;
    let backend = Arc::new(JsonFileBackend::new(&args.db));
    let store = VectorStore::open(backend).await?;
    let embedder = StubEmbedder::new(args.dimension);
    Ok(AppState::new(
        store,
        Box::new(embedder),
        args.image_dir.clone(),
    ))
}

async fn serve(args: ServeArgs) -> Result<()> {
    let state = Arc::new(open_state(&args.store).await?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    println!("Serving face search API on http://{}", args.bind);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ingest(args: IngestArgs) -> Result<()> {
    let state = open_state(&args.store).await?;
    let report = ingest_directory(&state.store, state.embedder.as_ref(), &state.image_dir).await?;
    println!(
        "Ingested {} images ({} skipped)",
        report.ingested, report.skipped
    );
    Ok(())
}

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use log::info;
use pothole_map::commands::{
    export_map, parse_gps_file, predict_potholes, process_folder, write_map, AppContext,
};
use pothole_map::PipelineConfig;
use std::path::PathBuf;

/// Dashcam pothole mapper
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON config file (defaults apply to anything it leaves out)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Split every video in a folder into clips and tag them with GPS
    Process {
        /// Folder with source .mp4 files
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Folder receiving the clips
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the pothole classifier over stored clips
    Predict,

    /// Export clip markers for the map as JSON
    ExportMap {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Embed each clip as a base64 data URL
        #[arg(long)]
        embed_video: bool,
    },

    /// Parse GPS records from a metadata text dump
    ParseGps {
        /// File holding exiftool output
        file: PathBuf,
    },

    /// List stored clips as JSON
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::ParseGps { file } => {
            let records = parse_gps_file(&file)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::Process { input, output } => {
            let input = input.unwrap_or_else(|| config.input_dir.clone());
            let output = output.unwrap_or_else(|| config.output_dir.clone());
            let ctx = AppContext::open(config).await?;

            let summary = process_folder(&ctx, &input, &output).await?;
            info!(
                "{} files processed, {} failed",
                summary.files_processed, summary.files_failed
            );
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Predict => {
            let ctx = AppContext::open(config).await?;
            let summary = predict_potholes(&ctx).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::ExportMap { out, embed_video } => {
            let ctx = AppContext::open(config).await?;
            let map = export_map(&ctx, embed_video).await?;
            match out {
                Some(path) => write_map(&map, &path)?,
                None => println!("{}", serde_json::to_string_pretty(&map)?),
            }
        }
        Commands::List => {
            let ctx = AppContext::open(config).await?;
            let clips = ctx.db.list_clips().await?;
            println!("{}", serde_json::to_string_pretty(&clips)?);
        }
    }

    Ok(())
}

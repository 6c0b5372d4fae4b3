//! Voxdial - grammar-cached voice dialing
//!
//! CLI driver for one recognition session: load contacts, reuse or
//! rebuild the name grammar, recognize, and print the candidate actions.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use voxdial::audio::{AudioSource, FileAudioSource, MicrophoneSource};
use voxdial::config::Config;
use voxdial::contacts::FileContactSource;
use voxdial::engine::{EngineSettings, Outcome, RecognitionEngine, SessionParams};
use voxdial::srec::{Codec, ScriptedRecognizer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Contacts file, one name per line (defaults to the configured path)
    #[arg(short, long)]
    contacts: Option<PathBuf>,

    /// Recognize from an audio file instead of the microphone
    #[arg(short, long)]
    audio: Option<PathBuf>,

    /// JSON hypothesis script for the scripted recognizer backend
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Capture codec, e.g. "PCM/16bit/8KHz" (defaults to the configured one)
    #[arg(long)]
    codec: Option<String>,

    /// Write per-session diagnostic logs
    #[arg(long)]
    log_sessions: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("voxdial v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    let settings = EngineSettings::from_config(&config)?;
    let codec = match &args.codec {
        Some(s) => s.parse::<Codec>()?,
        None => settings.codec,
    };

    let recognizer = match &args.script {
        Some(path) => ScriptedRecognizer::from_file(path)?,
        None => ScriptedRecognizer::new(Vec::new()),
    };
    let mut engine = RecognitionEngine::new(Box::new(recognizer), settings);

    if args.log_sessions {
        engine.session_logger().enable()?;
        info!("session logging enabled");
    }

    let contacts_path = args
        .contacts
        .unwrap_or_else(|| PathBuf::from(&config.contacts_path));
    let audio: Box<dyn AudioSource> = match &args.audio {
        Some(path) => {
            info!("recognizing audio file {}", path.display());
            Box::new(FileAudioSource::new(path))
        }
        None => Box::new(MicrophoneSource::new(codec.sample_rate())),
    };

    let params = SessionParams::new(Box::new(FileContactSource::new(contacts_path)), audio)
        .with_codec(codec);

    engine.start(params)?;
    match engine.run().await {
        Outcome::Success(actions) => {
            info!("{} candidate action(s):", actions.len());
            for action in &actions {
                println!("{action}");
            }
        }
        Outcome::Failure(reason) => {
            info!("no result: {reason}");
        }
        Outcome::Canceled => {
            info!("canceled");
        }
        Outcome::Error(e) => {
            return Err(e.into());
        }
    }

    Ok(())
}

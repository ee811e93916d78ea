mod error;
mod network;

use chirplink_core::{
    Callbacks, Credentials, Payload, Session, SessionConfig, SessionState, BUFFER_SIZE,
};
use clap::{Args, Parser, Subcommand};
use error::{CliError, Result};
use hound::{SampleFormat, WavSpec};
use network::{Analytics, LicenceClient, DEFAULT_ANALYTICS_URL, DEFAULT_LICENCE_URL};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chirplink")]
#[command(version, about = "Send and receive data over sound")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CredentialArgs {
    /// Application key
    #[arg(value_name = "KEY")]
    key: String,

    /// Application secret
    #[arg(value_name = "SECRET")]
    secret: String,

    /// Licence to request from the licence service (default: the first one)
    #[arg(long, value_name = "NAME")]
    licence_name: Option<String>,

    /// Licence service base URL
    #[arg(long, env = "CHIRP_LICENCE_URL", default_value = DEFAULT_LICENCE_URL)]
    licence_url: String,
}

#[derive(Args)]
struct SessionArgs {
    #[command(flatten)]
    credentials: CredentialArgs,

    /// Read the licence from a file instead of the licence service
    #[arg(short = 'l', long, value_name = "FILE")]
    licence_file: Option<PathBuf>,

    /// Session configuration (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Analytics base URL
    #[arg(long, env = "CHIRP_ANALYTICS_URL", default_value = DEFAULT_ANALYTICS_URL)]
    analytics_url: String,

    /// Do not send usage analytics
    #[arg(long)]
    no_telemetry: bool,
}

#[derive(Args)]
struct PayloadArgs {
    /// ASCII string used to generate the payload
    #[arg(short = 'A', long, conflicts_with = "hex")]
    ascii: Option<String>,

    /// Hex string used to generate the payload
    #[arg(short = 'H', long)]
    hex: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a .wav file containing a chirp (random payload by default)
    Write {
        #[command(flatten)]
        session: SessionArgs,

        #[command(flatten)]
        payload: PayloadArgs,

        /// Output WAV file (default: <payload hex>.wav)
        #[arg(short, long, value_name = "OUTPUT.WAV")]
        output: Option<PathBuf>,
    },

    /// Decode every chirp found in a .wav file
    Read {
        #[command(flatten)]
        session: SessionArgs,

        /// Input WAV file (mono, 16-bit)
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,
    },

    /// Send a payload and receive it back by feeding the output into the input
    Loopback {
        #[command(flatten)]
        session: SessionArgs,

        #[command(flatten)]
        payload: PayloadArgs,

        /// Give up after this many seconds of audio
        #[arg(long, default_value = "10")]
        max_seconds: u64,
    },

    /// Fetch a licence from the licence service
    Licence {
        #[command(flatten)]
        credentials: CredentialArgs,

        /// Save the licence to a file instead of printing it
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
    },
}

/// Prints session events and forwards received payloads
struct ConsoleCallbacks {
    verbose: bool,
    received: mpsc::Sender<Payload>,
    analytics: Option<Analytics>,
}

impl Callbacks for ConsoleCallbacks {
    fn on_state_changed(&mut self, previous: SessionState, current: SessionState) {
        if self.verbose {
            println!("State changed from {} to {}", previous, current);
        }
    }

    fn on_sending(&mut self, payload: &Payload) {
        if self.verbose {
            println!("Sending: {}", payload);
        }
    }

    fn on_sent(&mut self, payload: &Payload) {
        if self.verbose {
            println!("Sent data");
        }
        if let Some(analytics) = &self.analytics {
            analytics.send(payload.len());
        }
    }

    fn on_receiving(&mut self) {
        if self.verbose {
            println!("Receiving data");
        }
    }

    fn on_received(&mut self, payload: &Payload) {
        // A zero-length payload is a failed decode
        if payload.is_empty() {
            println!("Decode failed!");
        } else {
            println!("Received: {}", payload);
        }
        if let Some(analytics) = &self.analytics {
            analytics.receive(payload.len());
        }
        let _ = self.received.send(payload.clone());
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Write {
            session,
            payload,
            output,
        } => write_command(&session, &payload, output).await,
        Commands::Read { session, input } => read_command(&session, &input).await,
        Commands::Loopback {
            session,
            payload,
            max_seconds,
        } => loopback_command(&session, &payload, max_seconds).await,
        Commands::Licence { credentials, save } => licence_command(&credentials, save).await,
    }
}

fn load_config(args: &SessionArgs) -> Result<SessionConfig> {
    match &args.config {
        Some(path) => Ok(SessionConfig::from_json(&std::fs::read_to_string(path)?)?),
        None => Ok(SessionConfig::default()),
    }
}

async fn load_licence(args: &SessionArgs) -> Result<String> {
    match &args.licence_file {
        Some(path) => Ok(std::fs::read_to_string(path)?.trim().to_string()),
        None => {
            let credentials = &args.credentials;
            LicenceClient::new(&credentials.licence_url)?
                .fetch(
                    &credentials.key,
                    &credentials.secret,
                    credentials.licence_name.as_deref(),
                )
                .await
        }
    }
}

/// Build a session with console callbacks; received payloads arrive on the
/// returned channel
async fn open_session(
    args: &SessionArgs,
    config: SessionConfig,
    verbose: bool,
) -> Result<(Session, mpsc::Receiver<Payload>)> {
    let licence = load_licence(args).await?;
    let credentials = Credentials::new(&args.credentials.key, &args.credentials.secret);
    let mut session = Session::new(credentials, &licence, config)?;
    println!("{}", session);

    let analytics = if args.no_telemetry {
        None
    } else {
        let analytics = Analytics::new(
            &args.analytics_url,
            &args.credentials.key,
            &args.credentials.secret,
            session.protocol().clone(),
            Handle::current(),
        )?;
        analytics.instantiate();
        Some(analytics)
    };

    let (tx, rx) = mpsc::channel();
    session.set_callbacks(Box::new(ConsoleCallbacks {
        verbose,
        received: tx,
        analytics,
    }))?;

    Ok((session, rx))
}

fn choose_payload(session: &Session, args: &PayloadArgs) -> Result<Payload> {
    let payload = if let Some(text) = &args.ascii {
        session.payload_from_ascii(text)?
    } else if let Some(hex) = &args.hex {
        session.payload_from_hex(hex)?
    } else {
        session.random_payload()?
    };

    if payload.is_empty() {
        return Err(CliError::InvalidArgument("payload must not be empty".to_string()));
    }
    Ok(payload)
}

async fn write_command(args: &SessionArgs, payload_args: &PayloadArgs, output: Option<PathBuf>) -> Result<()> {
    let (mut session, _received) = open_session(args, load_config(args)?, false).await?;
    session.start(true, false)?;

    let payload = choose_payload(&session, payload_args)?;
    let output = output.unwrap_or_else(|| PathBuf::from(payload.default_filename()));

    let spec = WavSpec {
        channels: 1,
        sample_rate: session.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&output, spec)?;

    tracing::info!(payload = %payload, "encoding payload");
    session.send(payload)?;

    let mut buffer = vec![0i16; BUFFER_SIZE];
    let mut written = 0;
    while session.state() == SessionState::Sending {
        session.process_shorts_output(&mut buffer)?;
        for &sample in &buffer {
            writer.write_sample(sample)?;
        }
        written += buffer.len();
    }
    writer.finalize()?;

    tracing::debug!(samples = written, "audio written");
    println!("Wrote audio to output: {}", output.display());

    session.stop()?;
    session.close();
    Ok(())
}

async fn read_command(args: &SessionArgs, input: &Path) -> Result<()> {
    let mut reader = hound::WavReader::open(input)?;
    let spec = reader.spec();
    if spec.channels != 1 || spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
        return Err(CliError::UnsupportedWav(format!(
            "{} channel(s), {}-bit {:?}; expected mono 16-bit integer PCM",
            spec.channels, spec.bits_per_sample, spec.sample_format
        )));
    }
    println!(
        "Read WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    // Decode at the file's own sample rate
    let config = load_config(args)?.with_sample_rate(spec.sample_rate);
    let (mut session, received) = open_session(args, config, false).await?;
    session.start(false, true)?;

    let samples = reader.samples::<i16>().collect::<std::result::Result<Vec<i16>, _>>()?;
    for chunk in samples.chunks(BUFFER_SIZE) {
        session.process_shorts_input(chunk)?;
    }

    let payloads: Vec<Payload> = received.try_iter().collect();
    if payloads.is_empty() {
        println!("No chirps found in {}", input.display());
    } else {
        let decoded = payloads.iter().filter(|p| !p.is_empty()).count();
        tracing::info!(decoded, total = payloads.len(), "finished reading");
    }

    session.stop()?;
    session.close();
    Ok(())
}

async fn loopback_command(args: &SessionArgs, payload_args: &PayloadArgs, max_seconds: u64) -> Result<()> {
    let (mut session, received) = open_session(args, load_config(args)?, true).await?;
    session.start(true, true)?;

    let payload = choose_payload(&session, payload_args)?;
    session.send(payload.clone())?;

    let max_buffers = (max_seconds as usize * session.sample_rate() as usize).div_ceil(BUFFER_SIZE);
    let mut buffer = vec![0i16; BUFFER_SIZE];
    let mut result = None;

    for _ in 0..max_buffers {
        session.process_shorts_output(&mut buffer)?;
        session.process_shorts_input(&buffer)?;
        if let Ok(payload) = received.try_recv() {
            result = Some(payload);
            break;
        }
    }

    session.stop()?;
    session.close();

    match result {
        Some(received) if received == payload => {
            println!("Loopback OK");
            Ok(())
        }
        Some(received) => Err(CliError::Loopback(format!(
            "loopback mismatch: sent {} but received '{}'",
            payload, received
        ))),
        None => Err(CliError::Loopback(format!(
            "no payload received within {} s of audio",
            max_seconds
        ))),
    }
}

async fn licence_command(args: &CredentialArgs, save: Option<PathBuf>) -> Result<()> {
    let licence = LicenceClient::new(&args.licence_url)?
        .fetch(&args.key, &args.secret, args.licence_name.as_deref())
        .await?;

    match save {
        Some(path) => {
            std::fs::write(&path, &licence)?;
            println!("Saved licence to {}", path.display());
        }
        None => println!("{}", licence),
    }
    Ok(())
}

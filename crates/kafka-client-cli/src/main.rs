//! kafka-client CLI - produce, consume and bridge Kafka topics.

use clap::{Args, Parser, Subcommand, ValueEnum};
use kafka_client::config::parse_duration;
use kafka_client::core::MessageReceiver;
use kafka_client::stream::describe;
use kafka_client::{
    create_output, open_input, ClientError, Config, FileSink, FileSource, Format, KafkaCluster,
    KafkaSink, KafkaSource, Pacer, Pipeline, Reporter, Sink, Source,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "kafka-client")]
#[command(about = "Command line client for Kafka")]
#[command(
    long_about = "Command line Kafka consumer and producer which can be used to save raw messages \
                  to a file, replay them to a topic, or bridge two topics."
)]
#[command(version)]
struct Cli {
    /// Config file (default is $HOME/.kafka-client.yaml)
    #[arg(long, global = true, env = "KAFKA_CLIENT_CONFIG")]
    config: Option<PathBuf>,

    /// Client ID sent to Kafka [default: kafka-client]
    #[arg(short = 'c', long, global = true, env = "KAFKA_CLIENT_CLIENT_ID")]
    client_id: Option<String>,

    /// Time to run before exiting, e.g. 30s or 5m
    #[arg(short, long, global = true, value_parser = duration_arg, env = "KAFKA_CLIENT_DURATION")]
    duration: Option<Duration>,

    /// Only log errors and the final summary
    #[arg(
        short,
        long,
        global = true,
        env = "KAFKA_CLIENT_QUIET",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    quiet: bool,

    /// Log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, global = true, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Produces messages to a Kafka topic
    #[command(after_help = "Example: kafka-client produce localhost:9092 my_topic")]
    Produce(ProduceArgs),

    /// Consumes messages from a Kafka topic
    #[command(after_help = "Example: kafka-client consume localhost:9092 my_topic")]
    Consume(ConsumeArgs),

    /// Bridges messages from a Kafka topic to another Kafka topic
    #[command(
        after_help = "Example: kafka-client bridge localhost:9092 from_topic localhost:9092 to_topic"
    )]
    Bridge(BridgeArgs),
}

#[derive(Args)]
struct FormatArgs {
    /// Raw length-prefixed records (default if a file is given)
    #[arg(short, long)]
    raw: bool,

    /// One value per line (default if no file is given)
    #[arg(short, long)]
    text: bool,
}

#[derive(Args)]
struct ProduceArgs {
    /// Broker list or cluster alias
    bootstrap_servers: String,

    topic: String,

    /// Read from file instead of stdin
    #[arg(short, long)]
    input: Option<PathBuf>,

    #[command(flatten)]
    format: FormatArgs,

    /// Time to wait between producing two messages
    #[arg(short, long, value_parser = duration_arg)]
    period: Option<Duration>,
}

#[derive(Args)]
struct ConsumeArgs {
    /// Broker list or cluster alias
    bootstrap_servers: String,

    topic: String,

    /// Write to file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    format: FormatArgs,
}

#[derive(Args)]
struct BridgeArgs {
    /// Broker list or cluster alias of the source cluster
    source_bootstrap_servers: String,

    source_topic: String,

    /// Broker list or cluster alias of the destination cluster
    destination_bootstrap_servers: String,

    destination_topic: String,

    /// Time to wait between producing two messages
    #[arg(short, long, value_parser = duration_arg)]
    period: Option<Duration>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), ClientError> {
    let cli = Cli::parse();

    // Logs go to stderr so consumed records own stdout
    setup_logging(&cli.verbosity, cli.log_format);

    let mut config = Config::discover(cli.config.as_deref())?;
    if let Some(client_id) = cli.client_id {
        config.client_id = client_id;
    }
    if let Some(duration) = cli.duration {
        config.duration = duration;
    }
    config.quiet |= cli.quiet;
    config.validate()?;

    match cli.command {
        Commands::Produce(args) => produce(config, args).await,
        Commands::Consume(args) => consume(config, args).await,
        Commands::Bridge(args) => bridge(config, args).await,
    }
}

async fn produce(mut config: Config, args: ProduceArgs) -> Result<(), ClientError> {
    if let Some(period) = args.period {
        config.period = period;
    }
    let format = Format::select(args.format.raw, args.format.text, args.input.is_some())?;
    let input = open_input(args.input.as_deref()).await?;

    let brokers = config.brokers(&args.bootstrap_servers)?;
    let cluster = KafkaCluster::connect(&brokers, &config.client_settings()).await?;
    cluster.ensure_topic(&args.topic, "")?;

    let mut source = Box::new(FileSource::new(format.reader(input)));
    let sink = Box::new(KafkaSink::new(
        take_messages(source.as_mut())?,
        Arc::new(cluster.producer()?),
        args.topic.clone(),
        Pacer::new(config.period),
    ));

    let from = match &args.input {
        Some(path) => format!(" from {}", describe(Some(path.as_path()), "stdin")),
        None => String::new(),
    };
    info!(
        "producing messages{} to cluster {} topic {}{}",
        from,
        cluster.brokers(),
        args.topic,
        every(config.period)
    );

    run_pipeline(&config, source, sink).await
}

async fn consume(config: Config, args: ConsumeArgs) -> Result<(), ClientError> {
    let format = Format::select(args.format.raw, args.format.text, args.output.is_some())?;

    let brokers = config.brokers(&args.bootstrap_servers)?;
    let cluster = KafkaCluster::connect(&brokers, &config.client_settings()).await?;
    cluster.ensure_topic(&args.topic, "")?;

    let partitions = cluster.partitions(&args.topic)?;
    let consumer = Arc::new(cluster.consumer(&args.topic)?);
    let mut source = Box::new(KafkaSource::new(consumer, partitions));

    // Only truncate the output once the topic is known to exist
    let output = create_output(args.output.as_deref()).await?;
    let sink = Box::new(FileSink::new(
        take_messages(source.as_mut())?,
        format.writer(output),
    ));

    let to = match &args.output {
        Some(path) => format!(" to {}", describe(Some(path.as_path()), "stdout")),
        None => String::new(),
    };
    info!(
        "consuming messages from cluster {} topic '{}'{}",
        cluster.brokers(),
        args.topic,
        to
    );

    run_pipeline(&config, source, sink).await
}

async fn bridge(mut config: Config, args: BridgeArgs) -> Result<(), ClientError> {
    if let Some(period) = args.period {
        config.period = period;
    }
    let settings = config.client_settings();

    let source_brokers = config.brokers(&args.source_bootstrap_servers)?;
    let source_cluster = KafkaCluster::connect(&source_brokers, &settings).await?;
    source_cluster.ensure_topic(&args.source_topic, "source")?;

    let destination_brokers = config.brokers(&args.destination_bootstrap_servers)?;
    let destination_cluster = KafkaCluster::connect(&destination_brokers, &settings).await?;
    destination_cluster.ensure_topic(&args.destination_topic, "destination")?;

    let partitions = source_cluster.partitions(&args.source_topic)?;
    let consumer = Arc::new(source_cluster.consumer(&args.source_topic)?);
    let mut source = Box::new(KafkaSource::new(consumer, partitions));
    let sink = Box::new(KafkaSink::new(
        take_messages(source.as_mut())?,
        Arc::new(destination_cluster.producer()?),
        args.destination_topic.clone(),
        Pacer::new(config.period),
    ));

    info!(
        "bridging messages from cluster {} topic {} to cluster {} topic {}{}",
        source_cluster.brokers(),
        args.source_topic,
        destination_cluster.brokers(),
        args.destination_topic,
        every(config.period)
    );

    run_pipeline(&config, source, sink).await
}

async fn run_pipeline(
    config: &Config,
    source: Box<dyn Source>,
    sink: Box<dyn Sink>,
) -> Result<(), ClientError> {
    let shutdown = setup_signal_handler()?;
    info!("press ctrl-c to exit");

    Pipeline::new(source, sink, Reporter::new(config.reporting_period()))
        .with_duration(config.run_duration())
        .run(shutdown)
        .await?;
    Ok(())
}

fn take_messages(source: &mut dyn Source) -> Result<MessageReceiver, ClientError> {
    let name = source.name();
    source
        .messages()
        .ok_or_else(|| ClientError::task(name, "message queue already taken"))
}

fn every(period: Duration) -> String {
    if period.is_zero() {
        String::new()
    } else {
        format!(" every {:?}", period)
    }
}

fn duration_arg(value: &str) -> Result<Duration, String> {
    parse_duration(value)
}

fn setup_logging(verbosity: &str, format: LogFormat) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, ClientError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => eprintln!("\nReceived SIGINT. Shutting down..."),
            _ = sigterm.recv() => eprintln!("\nReceived SIGTERM. Shutting down..."),
        }
        token.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, ClientError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Shutting down...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}

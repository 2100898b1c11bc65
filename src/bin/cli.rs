//! River CLI Client
//!
//! Command-line interface for inspecting and exercising a River store.

use std::collections::BTreeMap;

use clap::{Parser, Subcommand};
use river::store::StreamInfo;
use river::{
    ClientConfig, Connection, ReadResult, RiverError, SpikeRecord, StreamReader, StreamSchema,
    StreamWriter,
};
use tracing_subscriber::{fmt, EnvFilter};

/// River CLI
#[derive(Parser, Debug)]
#[command(name = "river-cli")]
#[command(about = "CLI for the River stream store")]
struct Args {
    /// Server host
    #[arg(short, long, default_value = "127.0.0.1")]
    server: String,

    /// Server port
    #[arg(short, long, default_value = "6379")]
    port: u16,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the server
    Ping,

    /// Show one stream's state
    Info {
        /// The stream name
        stream: String,
    },

    /// List every stream
    List,

    /// Create a stream from a JSON schema
    Create {
        /// The stream name
        stream: String,

        /// Schema as JSON, e.g. {"field_definitions":[{"name":"x","type":"DOUBLE","size":8}]}
        schema: String,

        /// Metadata entries as key=value
        #[arg(short, long = "meta")]
        metadata: Vec<String>,
    },

    /// Read spikes until the stream ends
    Read {
        /// The stream name
        stream: String,

        /// How long to wait for the stream to appear (milliseconds)
        #[arg(long, default_value = "10000")]
        wait_ms: u64,

        /// Per-read timeout (milliseconds)
        #[arg(long, default_value = "1000")]
        timeout_ms: u64,

        /// Buffer capacity in records
        #[arg(long, default_value = "256")]
        capacity: usize,
    },

    /// Write synthetic spikes to a new stream
    WriteSpikes {
        /// The stream name
        stream: String,

        /// Number of spikes to write
        count: usize,

        /// Leave the stream open instead of ending it
        #[arg(long)]
        keep_open: bool,
    },

    /// Mark a stream ended
    End {
        /// The stream name
        stream: String,
    },

    /// Delete a stream
    Delete {
        /// The stream name
        stream: String,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();
    let config = ClientConfig::builder()
        .host(&args.server)
        .port(args.port)
        .build();

    if let Err(e) = run(config, args.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(config: ClientConfig, command: Commands) -> Result<(), RiverError> {
    let connection = Connection::with_config(config)?;

    match command {
        Commands::Ping => {
            connection.ping()?;
            println!("PONG");
        }
        Commands::Info { stream } => print_info(&connection.stream_info(&stream)?)?,
        Commands::List => {
            let streams = connection.list_streams()?;
            if streams.is_empty() {
                println!("(no streams)");
            }
            for info in &streams {
                print_info(info)?;
            }
        }
        Commands::Create {
            stream,
            schema,
            metadata,
        } => {
            let schema = StreamSchema::from_json(&schema)?;
            let info = connection.create_stream(&stream, schema, parse_metadata(&metadata)?)?;
            print_info(&info)?;
        }
        Commands::Read {
            stream,
            wait_ms,
            timeout_ms,
            capacity,
        } => read_spikes(connection.clone(), &stream, wait_ms, timeout_ms, capacity)?,
        Commands::WriteSpikes {
            stream,
            count,
            keep_open,
        } => write_spikes(connection.clone(), &stream, count, keep_open)?,
        Commands::End { stream } => {
            connection.end_stream(&stream)?;
            println!("OK");
        }
        Commands::Delete { stream } => {
            connection.delete_stream(&stream)?;
            println!("OK");
        }
    }

    connection.close()
}

fn read_spikes(
    connection: Connection,
    stream: &str,
    wait_ms: u64,
    timeout_ms: u64,
    capacity: usize,
) -> Result<(), RiverError> {
    let mut reader = StreamReader::<SpikeRecord>::new(connection);
    let mut scope = reader.scope()?;
    scope.initialize(stream, wait_ms)?;

    let mut buffer = scope.new_buffer(capacity);
    loop {
        match scope.read(&mut buffer, timeout_ms)? {
            ReadResult::Filled(count) => {
                for spike in buffer.filled(count) {
                    println!(
                        "Spike on electrode {} unit {} at {}",
                        spike.channel_index, spike.unit_index, spike.sample_number
                    );
                }
            }
            ReadResult::Empty => continue,
            ReadResult::EndOfStream => {
                println!("EOF encountered for stream");
                break;
            }
        }
    }
    Ok(())
}

fn write_spikes(
    connection: Connection,
    stream: &str,
    count: usize,
    keep_open: bool,
) -> Result<(), RiverError> {
    let mut writer = StreamWriter::<SpikeRecord>::new(connection);
    writer.initialize(stream, BTreeMap::new())?;

    let spikes: Vec<SpikeRecord> = (0..count)
        .map(|i| SpikeRecord::new((i % 32) as i32, (i % 4) as i32, (i as i64) * 30))
        .collect();
    writer.write(&spikes)?;

    if !keep_open {
        writer.stop()?;
    }
    println!("Wrote {} spikes to '{}'", writer.total_samples_written(), stream);
    Ok(())
}

fn parse_metadata(entries: &[String]) -> Result<BTreeMap<String, String>, RiverError> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => Ok((key.to_string(), value.to_string())),
            None => Err(RiverError::InvalidArgument(format!(
                "metadata '{}' is not key=value",
                entry
            ))),
        })
        .collect()
}

fn print_info(info: &StreamInfo) -> Result<(), RiverError> {
    let schema = match &info.schema {
        Some(schema) => schema.to_json()?,
        None => "-".to_string(),
    };
    println!(
        "{}  state={:?}  length={}  ended={}  schema={}",
        info.name, info.state, info.length, info.ended, schema
    );
    for (key, value) in &info.metadata {
        println!("    {} = {}", key, value);
    }
    Ok(())
}

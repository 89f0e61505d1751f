//! Command-line meter reader.

use clap::{Parser, Subcommand};
use iec62056_rs::{
    list_ports, logging, ConnectionKind, ConnectionParams, EventSink, EventStream, MeterError,
    MeterSession, Password, ProfileRange, SessionEvent,
};

#[derive(Parser)]
#[command(name = "iec62056-cli")]
#[command(about = "IEC 62056-21 Mode C meter reader", long_about = None)]
struct Cli {
    /// Serial device path or host:port for TCP gateways
    #[arg(short, long, global = true, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Link type: optical, rs485 or tcp
    #[arg(short, long, global = true, default_value = "optical")]
    kind: String,

    /// Initial baud rate; 0 probes automatically
    #[arg(short, long, global = true, default_value_t = 0)]
    baud: u32,

    /// Response timeout in milliseconds
    #[arg(short, long, global = true, default_value_t = 2000)]
    timeout: u64,

    /// Device address for the identification request
    #[arg(short, long, global = true)]
    address: Option<String>,

    /// Print protocol traffic while running
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List serial ports
    Ports,
    /// Probe the meter identity
    Ident,
    /// Abbreviated billing readout
    Short,
    /// Full readout: snapshot, months, events, outages
    Full,
    /// Read individual registers from a full readout
    Obis {
        /// OBIS codes, e.g. 1.8.0 0.9.1
        codes: Vec<String>,
    },
    /// Download a load profile (requires the meter password)
    Profile {
        #[arg(long, default_value_t = 1)]
        number: u8,
        /// Meter password, 8 digits
        #[arg(long)]
        password: String,
    },
    /// Set the meter clock to the host clock (requires the meter password)
    SyncTime {
        /// Meter password, 8 digits
        #[arg(long)]
        password: String,
    },
}

fn parse_kind(kind: &str) -> Result<ConnectionKind, MeterError> {
    match kind {
        "optical" => Ok(ConnectionKind::Optical),
        "rs485" => Ok(ConnectionKind::Rs485),
        "tcp" => Ok(ConnectionKind::Tcp),
        other => Err(MeterError::Other(format!("unknown link type: {other}"))),
    }
}

fn spawn_event_printer(mut stream: EventStream, verbose: bool) {
    tokio::spawn(async move {
        while let Some(event) = stream.events.recv().await {
            match event {
                SessionEvent::Progress(p) => {
                    eprintln!("[{}/{}] {}", p.step, p.total, p.message);
                }
                SessionEvent::Log(l) if verbose => {
                    eprintln!("  {} {:?}: {}", l.timestamp, l.level, l.message);
                }
                SessionEvent::Log(_) => {}
            }
        }
    });
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), MeterError> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| MeterError::Other(e.to_string()))?;
    println!("{json}");
    Ok(())
}

async fn run(cli: Cli) -> Result<(), MeterError> {
    if let Command::Ports = cli.command {
        for port in list_ports()? {
            println!("{}\t{}", port.name, port.description);
        }
        return Ok(());
    }

    let kind = parse_kind(&cli.kind)?;
    let mut params = ConnectionParams::new(kind, &cli.port);
    params.baud_rate = cli.baud;
    params.timeout_ms = cli.timeout;
    params.address = cli.address.clone();

    let (sink, stream) = EventSink::channel();
    spawn_event_printer(stream, cli.verbose);

    if kind == ConnectionKind::Tcp {
        let mut session = MeterSession::open_tcp(params, sink).await?;
        let result = dispatch(&cli.command, &mut session).await;
        session.disconnect().await;
        result
    } else {
        let mut session = MeterSession::open_serial(params, sink)?;
        let result = dispatch(&cli.command, &mut session).await;
        session.disconnect().await;
        result
    }
}

async fn dispatch<P: iec62056_rs::MeterPort>(
    command: &Command,
    session: &mut MeterSession<P>,
) -> Result<(), MeterError> {
    match command {
        Command::Ports => Ok(()),
        Command::Ident => {
            let identity = session.connect().await?;
            print_json(&identity)
        }
        Command::Short => {
            let data = session.read_short().await?;
            print_json(&data)
        }
        Command::Full => {
            let data = session.read_full().await?;
            print_json(&data)
        }
        Command::Obis { codes } => {
            let refs: Vec<&str> = codes.iter().map(String::as_str).collect();
            let values = session.read_obis_batch(&refs).await?;
            for (code, value) in values {
                match value {
                    Some(v) => println!("{code}\t{v}"),
                    None => println!("{code}\t<absent>"),
                }
            }
            Ok(())
        }
        Command::Profile { number, password } => {
            let password = Password::new(password)?;
            session.authenticate(&password).await?;
            let data = session
                .read_load_profile(*number, ProfileRange::default())
                .await?;
            print_json(&data)
        }
        Command::SyncTime { password } => {
            let password = Password::new(password)?;
            session.authenticate(&password).await?;
            session.sync_time().await?;
            println!("clock synchronized");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logger();
    let cli = Cli::parse();
    run(cli).await?;
    Ok(())
}

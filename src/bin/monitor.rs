//! Diagnostic tail for a serial port.
//!
//! Opens a port, registers it, and prints every chunk the reader delivers
//! until Ctrl-C. Read failures are logged and the stream keeps going.

use clap::Parser;
use futures::StreamExt;
use serial_stream::driver::NativeDriver;
use serial_stream::reader::SerialPortReader;
use serial_stream::registry;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial-monitor",
    version,
    about = "Tail a serial port as chunked hex or text output."
)]
struct Args {
    /// Serial port path (e.g. /dev/ttyUSB0 or COM3).
    path: String,

    /// Baud rate.
    #[arg(short, long, default_value_t = 115_200)]
    baud: u32,

    /// Read timeout in milliseconds.
    #[arg(short, long, default_value_t = 500)]
    timeout_ms: u64,

    /// Print chunks as raw text instead of hex.
    #[arg(long)]
    text: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let driver = NativeDriver::open(&args.path, args.baud)?;
    let port = registry::register(driver);
    info!(%port, path = %args.path, baud = args.baud, "port opened");

    let reader = SerialPortReader::with_timeout(port, Duration::from_millis(args.timeout_ms));
    let mut stream = reader.stream();

    loop {
        tokio::select! {
            item = stream.next() => match item {
                Some(Ok(chunk)) => print_chunk(&chunk, args.text),
                Some(Err(e)) => error!(error = %e, "read failure"),
                None => break,
            },
            _ = shutdown_signal() => {
                info!("signal received, closing reader");
                reader.close();
            }
        }
    }

    if let Some(driver) = registry::deregister(port) {
        driver.lock().close();
    }
    info!("port closed");
    Ok(())
}

fn print_chunk(chunk: &[u8], text: bool) {
    if text {
        use std::io::Write;
        print!("{}", String::from_utf8_lossy(chunk));
        let _ = std::io::stdout().flush();
    } else {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        println!("[{:>4} bytes] {}", chunk.len(), hex.join(" "));
    }
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

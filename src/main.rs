use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tailreader::{Options, TailingReader};
use tokio::io::AsyncWriteExt;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tailreader")]
#[command(version, about = "Follow a file as it grows and copy its new bytes to stdout", long_about = None)]
struct Arguments {
    /// File to tail
    path: PathBuf,

    /// Wait for the file to appear, up to this many seconds (0 waits indefinitely)
    #[arg(long, value_name = "SECS")]
    wait_for_file: Option<u64>,

    /// Stop waiting for new data after this many seconds (0 waits indefinitely)
    #[arg(long, value_name = "SECS", default_value_t = 0)]
    idle_timeout: u64,

    /// End when the file is deleted or renamed
    #[arg(long)]
    close_on_delete: bool,

    /// End when the file is truncated
    #[arg(long)]
    close_on_truncate: bool,

    /// Exit successfully instead of failing when a timeout is reached
    #[arg(long)]
    timeouts_as_eof: bool,

    #[arg(long, default_value_t = 1024)]
    buffer_size: usize,
}

impl Arguments {
    fn options(&self) -> Options {
        Options::new()
            .with_wait_for_file(
                self.wait_for_file.is_some(),
                Duration::from_secs(self.wait_for_file.unwrap_or(0)),
            )
            .with_idle_timeout(Duration::from_secs(self.idle_timeout))
            .with_close_on_delete(self.close_on_delete)
            .with_close_on_truncate(self.close_on_truncate)
            .with_timeouts_as_eof(self.timeouts_as_eof)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Arguments::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut reader = match TailingReader::with_options(&args.path, args.options()) {
        Ok(reader) => reader,
        Err(e) => {
            error!("Error setting up file watcher: {}", e);
            return ExitCode::from(1);
        }
    };

    let mut stdout = tokio::io::stdout();
    let mut buf = vec![0u8; args.buffer_size.max(1)];
    let outcome = loop {
        match reader.read(&mut buf).await {
            Ok(0) => break Ok(()),
            Ok(n) => {
                if let Err(e) = stdout.write_all(&buf[..n]).await {
                    break Err(e.to_string());
                }
                if let Err(e) = stdout.flush().await {
                    break Err(e.to_string());
                }
            }
            Err(e) => break Err(e.to_string()),
        }
    };

    if let Err(e) = reader.close() {
        error!("Error closing {}: {}", args.path.display(), e);
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error reading {}: {}", args.path.display(), e);
            ExitCode::from(1)
        }
    }
}

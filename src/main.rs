//! Main entry point for the rangecat CLI application.
//!
//! Copies byte ranges of a local file, HTTP URL or S3 object to stdout or a
//! file, reading through a [`SeekableRangeChannel`].

use anyhow::{Result, bail};
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rangeseek::cli::ByteRange;
use rangeseek::{
    ChannelConfig, Cli, HttpRangeSource, LocalFileSource, ObjectStoreSource, RangeSource,
    SeekableRangeChannel,
};

/// Size of the copy buffer handed to the channel
const COPY_CHUNK: usize = 64 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = cli.channel_config();

    if cli.is_s3_url() {
        let source = Arc::new(ObjectStoreSource::from_url(
            &cli.source,
            cli.endpoint.as_deref(),
        )?);
        copy_ranges(source, &cli, config).await?;
    } else if let Some(url) = cli.http_url() {
        let source = Arc::new(HttpRangeSource::new(url.to_string()).await?);
        let transferred_before = source.transferred_bytes();

        copy_ranges(source.clone(), &cli, config).await?;

        if cli.stats {
            let transferred = source.transferred_bytes() - transferred_before;
            eprintln!("Total bytes transferred: {}", format_size(transferred));
        }
    } else {
        let source = Arc::new(LocalFileSource::new(&cli.source));
        copy_ranges(source, &cli, config).await?;
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over `-v`/`-q`
fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Copy every requested range, in order, through a single channel.
async fn copy_ranges<S: RangeSource + 'static>(
    source: Arc<S>,
    cli: &Cli,
    config: ChannelConfig,
) -> Result<()> {
    let mut channel = SeekableRangeChannel::open(source, config).await?;

    let ranges = if cli.ranges.is_empty() {
        vec![ByteRange::WHOLE]
    } else {
        cli.ranges.clone()
    };

    let mut out: Box<dyn AsyncWrite + Unpin + Send> = match &cli.output {
        Some(path) => Box::new(tokio::fs::File::create(path).await?),
        None => Box::new(tokio::io::stdout()),
    };

    let mut buf = vec![0u8; COPY_CHUNK];
    for range in ranges {
        if range.start > channel.size() {
            bail!(
                "Range start {} is beyond the object size {}",
                range.start,
                channel.size()
            );
        }
        let end = range.end(channel.size());

        channel.seek(range.start).await?;
        let mut remaining = end - range.start;
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let n = channel.read(&mut buf[..want]).await?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n]).await?;
            remaining -= n as u64;
        }
        info!("copied [{}, {})", range.start, end);
    }
    out.flush().await?;

    channel.close().await;
    if cli.stats {
        eprintln!("{}", channel.stats());
    }

    Ok(())
}

/// Byte count for the `--stats` report
fn format_size(size: u64) -> String {
    const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];

    if size < 1024 {
        return format!("{} bytes", size);
    }
    let mut value = size as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

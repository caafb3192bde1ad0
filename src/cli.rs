use clap::Parser;

use crate::config::{ChannelConfig, DEFAULT_BUFFER_SIZE};

#[derive(Parser, Debug)]
#[command(name = "rangecat")]
#[command(version)]
#[command(about = "Copy byte ranges of local or remote objects through a seekable range channel", long_about = None)]
#[command(after_help = "Examples:\n  \
  rangecat data.bin -r 5000:1000             copy bytes 5000..6000 of data.bin\n  \
  rangecat https://example.com/a.zip -r 1048000: -s   copy the tail, print statistics\n  \
  rangecat s3://bucket/key --endpoint http://localhost:9000 -o key.bin")]
pub struct Cli {
    /// Object path, HTTP(S) URL or s3://bucket/key
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Byte range to copy as START:LEN, or START: for the rest (repeatable)
    #[arg(short = 'r', long = "range", value_name = "START:LEN", value_parser = parse_range)]
    pub ranges: Vec<ByteRange>,

    /// Write to FILE instead of stdout
    #[arg(short = 'o', value_name = "FILE")]
    pub output: Option<String>,

    /// S3-compatible endpoint for s3:// sources (default: AWS, from AWS_* variables)
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Lookahead buffer and random-access window size in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Bytes to request before the target on random-access opens
    #[arg(long, value_name = "BYTES", default_value_t = 0)]
    pub lookback: u64,

    /// Largest sequential remainder drained instead of aborted (default: buffer size)
    #[arg(long, value_name = "BYTES")]
    pub drain_threshold: Option<u64>,

    /// Print channel statistics to stderr
    #[arg(short = 's', long)]
    pub stats: bool,

    /// Verbose logging (-vv => trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short = 'q')]
    pub quiet: bool,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }

    pub fn is_s3_url(&self) -> bool {
        self.source.starts_with("s3://")
    }

    /// URL for plain HTTP(S) sources
    pub fn http_url(&self) -> Option<&str> {
        self.is_http_url().then_some(self.source.as_str())
    }

    pub fn channel_config(&self) -> ChannelConfig {
        let config = ChannelConfig::default()
            .with_buffer_size(self.buffer_size)
            .with_lookback(self.lookback);
        match self.drain_threshold {
            Some(threshold) => config.with_drain_threshold(threshold),
            None => config,
        }
    }

    /// Default log filter when `RUST_LOG` is not set
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "debug",
            _ => "trace",
        }
    }
}

/// Range given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    /// `None` means up to the end of the object
    pub len: Option<u64>,
}

impl ByteRange {
    pub const WHOLE: ByteRange = ByteRange {
        start: 0,
        len: None,
    };

    /// Exclusive end, clamped to `size`
    pub fn end(&self, size: u64) -> u64 {
        match self.len {
            Some(len) => self.start.saturating_add(len).min(size),
            None => size,
        }
    }
}

pub fn parse_range(s: &str) -> std::result::Result<ByteRange, String> {
    let (start, len) = s
        .split_once(':')
        .ok_or_else(|| format!("expected START:LEN, got '{}'", s))?;
    let start = start
        .trim()
        .parse()
        .map_err(|e| format!("invalid start '{}': {}", start, e))?;
    let len = match len.trim() {
        "" => None,
        len => Some(
            len.parse()
                .map_err(|e| format!("invalid length '{}': {}", len, e))?,
        ),
    };
    Ok(ByteRange { start, len })
}

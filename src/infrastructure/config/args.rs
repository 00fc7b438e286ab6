//! Command-line arguments.

use super::app_config::LogLevel;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments, overriding the configuration file.
#[derive(Debug, Parser)]
#[command(
    name = "media-transfer",
    version,
    about = "Download, compress and upload images against a media server",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Media server root URL.
    #[arg(long, value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// Bearer token for the media server.
    #[arg(long, env = "MEDIA_TRANSFER_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Upload size budget in bytes.
    #[arg(long, value_name = "BYTES", global = true)]
    pub target_size: Option<usize>,

    /// Lowest JPEG quality to try.
    #[arg(long, value_name = "QUALITY", global = true)]
    pub min_quality: Option<f32>,

    /// Action to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level actions.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List images known to the server.
    List,

    /// Download one or more images concurrently.
    Download {
        /// Image URLs or server-relative paths.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Directory to write downloaded files into.
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Compress and upload an image from disk or from a URL.
    Upload {
        /// Local image file.
        #[arg(long, value_name = "PATH", conflicts_with = "url", required_unless_present = "url")]
        file: Option<PathBuf>,

        /// Remote image URL.
        #[arg(long, value_name = "URL")]
        url: Option<String>,

        /// Cache key for a local file, usually the URL it will be listed under.
        /// A unique key is generated when omitted.
        #[arg(long, value_name = "KEY", requires = "file")]
        key: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_file_with_key() {
        let args = CliArgs::parse_from([
            "media-transfer",
            "upload",
            "--file",
            "cat.png",
            "--key",
            "https://example.com/cat.png",
        ]);

        match args.command {
            Command::Upload { file, url, key } => {
                assert_eq!(file, Some(PathBuf::from("cat.png")));
                assert!(url.is_none());
                assert_eq!(key.as_deref(), Some("https://example.com/cat.png"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_key_requires_file() {
        let parsed = CliArgs::try_parse_from([
            "media-transfer",
            "upload",
            "--url",
            "https://example.com/cat.png",
            "--key",
            "k",
        ]);

        assert!(parsed.is_err());
    }
}

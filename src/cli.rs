//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Download a file over HTTP(S) with parallel byte-range workers.
///
/// The file is split into ranges fetched concurrently into part files, which
/// are merged and size-checked. Interrupted downloads resume from the part
/// files left on disk.
#[derive(Parser, Debug)]
#[command(name = "rangedl")]
#[command(author, version, about)]
pub struct Args {
    /// URL of the file to download
    pub url: String,

    /// Directory for the downloaded file [default: current directory]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum parallel range workers (1-16) [default: 8]
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub workers: Option<u8>,

    /// Attempts per range before giving up (1-50) [default: 10]
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=50))]
    pub max_attempts: Option<u32>,

    /// Delay between attempts in milliseconds (max 600000) [default: 2000]
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=600_000))]
    pub retry_delay_ms: Option<u64>,

    /// Config file [default: $XDG_CONFIG_HOME/rangedl/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/file.iso";

    #[test]
    fn test_cli_minimal_args_parse_successfully() {
        let args = Args::try_parse_from(["rangedl", URL]).unwrap();
        assert_eq!(args.url, URL);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.output_dir.is_none());
        assert!(args.workers.is_none());
        assert!(args.max_attempts.is_none());
        assert!(args.retry_delay_ms.is_none());
        assert!(args.config.is_none());
    }

    #[test]
    fn test_cli_url_is_required() {
        let err = Args::try_parse_from(["rangedl"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["rangedl", "-v", URL]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["rangedl", "-vv", URL]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["rangedl", "--quiet", URL]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["rangedl", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_workers_flag() {
        let args = Args::try_parse_from(["rangedl", "-w", "4", URL]).unwrap();
        assert_eq!(args.workers, Some(4));

        let args = Args::try_parse_from(["rangedl", "--workers", "16", URL]).unwrap();
        assert_eq!(args.workers, Some(16));
    }

    #[test]
    fn test_cli_workers_out_of_range_rejected() {
        for value in ["0", "17"] {
            let err = Args::try_parse_from(["rangedl", "-w", value, URL]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn test_cli_max_attempts_flag() {
        let args = Args::try_parse_from(["rangedl", "-r", "3", URL]).unwrap();
        assert_eq!(args.max_attempts, Some(3));

        let err = Args::try_parse_from(["rangedl", "-r", "0", URL]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_retry_delay_and_paths() {
        let args = Args::try_parse_from([
            "rangedl",
            "--retry-delay-ms",
            "250",
            "-o",
            "/tmp/out",
            "--config",
            "/tmp/rangedl.toml",
            URL,
        ])
        .unwrap();
        assert_eq!(args.retry_delay_ms, Some(250));
        assert_eq!(args.output_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/rangedl.toml")));
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["rangedl", "--invalid-flag", URL]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}

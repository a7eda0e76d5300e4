use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gzran")]
#[command(version)]
#[command(about = "Random access into gzip/zlib files through a checkpoint index", long_about = None)]
#[command(after_help = "Examples:\n  \
  gzran index big.log.gz                       write big.log.gz.gzi\n  \
  gzran cat big.log.gz --offset 4G -n 1M       print 1 MiB starting at 4 GiB\n  \
  gzran cat https://example.com/a.gz -i a.gzi --offset 100M -n 4K\n  \
  gzran info -v big.log.gz.gzi                 list checkpoints")]
pub struct Cli {
    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan a compressed file once and write its checkpoint index
    Index(IndexArgs),
    /// Print a decompressed byte range
    Cat(CatArgs),
    /// Show the contents of an index file
    Info(InfoArgs),
}

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Compressed file path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Index output path (default: FILE.gzi)
    #[arg(short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Minimum decompressed distance between checkpoints
    #[arg(short = 's', long, value_name = "SIZE", default_value = "1M", value_parser = parse_size)]
    pub span: u64,
}

#[derive(Args, Debug)]
pub struct CatArgs {
    /// Compressed file path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Index file (default: FILE.gzi for local files, built in memory if missing)
    #[arg(short = 'i', value_name = "PATH")]
    pub index: Option<PathBuf>,

    /// Decompressed offset to start at
    #[arg(long, value_name = "SIZE", default_value = "0", value_parser = parse_size)]
    pub offset: u64,

    /// Number of bytes to print (default: to the end)
    #[arg(short = 'n', long, value_name = "SIZE", value_parser = parse_size)]
    pub length: Option<u64>,

    /// Write to a file instead of stdout
    #[arg(short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Span used when the index has to be built first
    #[arg(short = 's', long, value_name = "SIZE", default_value = "1M", value_parser = parse_size)]
    pub span: u64,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Index file
    #[arg(value_name = "INDEX")]
    pub index: PathBuf,

    /// List every checkpoint
    #[arg(short = 'v')]
    pub verbose: bool,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Default tracing filter for the chosen quietness.
    pub fn log_level(&self) -> &'static str {
        match self.quiet {
            0 => "warn",
            1 => "error",
            _ => "off",
        }
    }
}

pub fn is_http_url(file: &str) -> bool {
    file.starts_with("http://") || file.starts_with("https://")
}

/// Parse a byte count with an optional binary suffix: `512`, `64K`, `1M`, `4G`.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (digits, shift) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => {
            let shift = match c.to_ascii_uppercase() {
                'K' => 10,
                'M' => 20,
                'G' => 30,
                'T' => 40,
                _ => return Err(format!("unknown size suffix '{}'", c)),
            };
            (&s[..i], shift)
        }
        _ => (s, 0),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size '{}'", s))?;
    value
        .checked_mul(1u64 << shift)
        .ok_or_else(|| format!("size '{}' is too large", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_with_suffixes() {
        assert_eq!(parse_size("0"), Ok(0));
        assert_eq!(parse_size("1500"), Ok(1500));
        assert_eq!(parse_size("64K"), Ok(64 * 1024));
        assert_eq!(parse_size("1m"), Ok(1 << 20));
        assert_eq!(parse_size("4G"), Ok(4 << 30));
        assert!(parse_size("12X").is_err());
        assert!(parse_size("K").is_err());
        assert!(parse_size("99999999999T").is_err());
    }

    #[test]
    fn parses_cat_command() {
        let cli = Cli::try_parse_from(["gzran", "-q", "cat", "a.gz", "--offset", "2K", "-n", "10"])
            .unwrap();
        assert!(cli.is_quiet());
        match cli.command {
            Command::Cat(args) => {
                assert_eq!(args.file, "a.gz");
                assert_eq!(args.offset, 2048);
                assert_eq!(args.length, Some(10));
                assert_eq!(args.span, 1 << 20);
                assert!(args.index.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn detects_urls() {
        assert!(is_http_url("https://example.com/a.gz"));
        assert!(is_http_url("http://example.com/a.gz"));
        assert!(!is_http_url("a.gz"));
    }
}

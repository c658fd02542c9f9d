use crate::types::CertFinderError;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "certfinder",
    about = "Subdomain discovery from Certificate Transparency",
    long_about = "certfinder harvests subdomains of a target from the crt.sh aggregator or from a\nlocal store filled by pulling raw Certificate Transparency logs, and can resolve\neach name to an IPv4 address."
)]
pub struct Args {
    /// Target domain
    #[arg(short = 'd', long = "domain", value_name = "DOMAIN")]
    pub domain: Option<String>,

    /// Source to query: crt or db
    #[arg(short = 's', long = "source", value_name = "SOURCE")]
    pub source: Option<String>,

    /// Resolve every subdomain to an IPv4 address
    #[arg(short = 'a', long = "resolve")]
    pub resolve: bool,

    /// Write CSV (to result.csv unless -o is given)
    #[arg(long = "csv")]
    pub csv: bool,

    /// Output file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_file: Option<PathBuf>,

    /// Pull raw CT logs into the local store
    #[arg(short = 'p', long = "pull")]
    pub pull: bool,

    /// Log to pull without prompting: `all` or a catalog index
    #[arg(long = "log", value_name = "SELECTION", requires = "pull")]
    pub log: Option<String>,

    /// Print version and build information, then check for a newer release
    #[arg(long = "version-check")]
    pub version_check: bool,

    /// Configuration file path
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,

    /// Name store location
    #[arg(long = "db", value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Maximum concurrent DNS lookups
    #[arg(long = "concurrency", value_name = "N")]
    pub concurrency: Option<usize>,

    /// Concurrent batch fetchers while pulling logs
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Silent mode (only output results)
    #[arg(long = "silent", conflicts_with = "verbose")]
    pub silent: bool,

    /// Verbose mode
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Args {
    /// A harvesting run needs both a domain and a source. Pulling logs and
    /// the version check need neither.
    pub fn validate(&self) -> Result<(), CertFinderError> {
        if self.pull || self.version_check {
            return Ok(());
        }
        if self.domain.as_deref().map_or(true, |d| d.trim().is_empty()) {
            return Err(CertFinderError::MissingArgument("-d <domain> is required".to_string()));
        }
        if self.source.is_none() {
            return Err(CertFinderError::MissingArgument("-s <crt|db> is required".to_string()));
        }
        Ok(())
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.verbose {
            log::LevelFilter::Debug
        } else if self.silent {
            log::LevelFilter::Warn
        } else {
            log::LevelFilter::Info
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("certfinder").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_harvest_arguments() {
        let args = parse(&["-d", "example.com", "-s", "crt", "-a", "--csv"]);
        assert_eq!(args.domain.as_deref(), Some("example.com"));
        assert_eq!(args.source.as_deref(), Some("crt"));
        assert!(args.resolve);
        assert!(args.csv);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_missing_domain_or_source() {
        assert!(matches!(
            parse(&["-s", "crt"]).validate(),
            Err(CertFinderError::MissingArgument(_))
        ));
        assert!(matches!(
            parse(&["-d", "example.com"]).validate(),
            Err(CertFinderError::MissingArgument(_))
        ));
        assert!(parse(&["-p"]).validate().is_ok());
        assert!(parse(&["--version-check"]).validate().is_ok());
    }

    #[test]
    fn test_log_selection_requires_pull() {
        assert!(Args::try_parse_from(["certfinder", "--log", "all"]).is_err());
        assert_eq!(parse(&["-p", "--log", "3"]).log.as_deref(), Some("3"));
    }

    #[test]
    fn test_log_level() {
        assert_eq!(parse(&["-p"]).log_level(), log::LevelFilter::Info);
        assert_eq!(parse(&["-p", "--silent"]).log_level(), log::LevelFilter::Warn);
        assert_eq!(parse(&["-p", "-v"]).log_level(), log::LevelFilter::Debug);
        assert!(Args::try_parse_from(["certfinder", "-p", "--silent", "-v"]).is_err());
    }
}

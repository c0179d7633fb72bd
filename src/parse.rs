use clap::{ArgAction, CommandFactory, Parser};
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "rev-sampler")]
#[command(
    about = "Retrieve revision ids and timestamps from a MediaWiki site, sampled every 10 million revisions"
)]
#[command(long_about = "Retrieve revision information in a format that can be fed to gnuplot to \
generate a graph showing the increase in the number of revisions over time.")]
#[command(version, disable_help_flag = true)]
pub(crate) struct Args {
    /// FQDN of the wiki from which to retrieve data, e.g. en.wikipedia.org
    #[arg(short, long)]
    pub domain: Option<String>,

    /// Starting revision id
    #[arg(short, long = "startrev", default_value_t = 1)]
    pub start_rev: u64,

    /// Ending revision id (exclusive); defaults to the current maximum revision id
    #[arg(short, long = "endrev")]
    pub end_rev: Option<u64>,

    /// Write the requests that would have been made instead of making them
    #[arg(short = 'D', long = "dryrun")]
    pub dry_run: bool,

    /// Print the resolved configuration and progress messages
    #[arg(short, long)]
    pub verbose: bool,

    /// Delay between requests in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub delay: u64,

    /// Maximum number of retry passes over bad revision ids (unbounded if omitted)
    #[arg(short, long)]
    pub retries: Option<u32>,

    /// Show this help message
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub help: bool,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("The argument 'domain' must be specified and may not be empty.")]
    MissingDomain,

    #[error("The argument 'domain' must be a bare host name, got '{0}'.")]
    InvalidDomain(String),
}

/// Exit status for usage errors, `--help` included.
pub const USAGE_EXIT_STATUS: i32 = 1;

/// Exit status for a clap parse outcome: `--version` succeeds, anything else is a usage error.
pub fn exit_status(error: &clap::Error) -> i32 {
    if error.use_stderr() { USAGE_EXIT_STATUS } else { 0 }
}

fn validate_domain(domain: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidDomain(domain.to_string());
    if domain
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@'))
    {
        return Err(invalid());
    }
    let url = Url::parse(&format!("https://{}/", domain)).map_err(|_| invalid())?;
    match url.host_str() {
        Some(host) if host.eq_ignore_ascii_case(domain) => Ok(()),
        _ => Err(invalid()),
    }
}

/// Validated run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub domain: String,
    pub start_rev: u64,
    pub end_rev: Option<u64>,
    pub dry_run: bool,
    pub verbose: bool,
    pub delay: Duration,
    pub max_retry_passes: Option<u32>,
}

impl Args {
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let domain = self
            .domain
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or(ConfigError::MissingDomain)?;
        validate_domain(&domain)?;

        Ok(Config {
            domain,
            start_rev: self.start_rev,
            end_rev: self.end_rev,
            dry_run: self.dry_run,
            verbose: self.verbose,
            delay: Duration::from_millis(self.delay),
            max_retry_passes: self.retries,
        })
    }
}

/// Print an optional error message followed by the usage text to stderr, then exit with status 1.
pub fn usage(message: Option<&str>) -> ! {
    if let Some(message) = message {
        eprintln!("{}", message);
    }
    eprintln!("{}", Args::command().render_long_help());
    std::process::exit(USAGE_EXIT_STATUS);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("rev-sampler").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--domain", "en.wikipedia.org"])
            .unwrap()
            .into_config()
            .unwrap();

        assert_eq!(config.domain, "en.wikipedia.org");
        assert_eq!(config.start_rev, 1);
        assert_eq!(config.end_rev, None);
        assert!(!config.dry_run);
        assert!(!config.verbose);
        assert_eq!(config.delay, Duration::from_secs(5));
        assert_eq!(config.max_retry_passes, None);
    }

    #[test]
    fn test_short_flags() {
        let config = parse(&["-d", "de.wikipedia.org", "-s", "42", "-e", "1000", "-D", "-v"])
            .unwrap()
            .into_config()
            .unwrap();

        assert_eq!(config.start_rev, 42);
        assert_eq!(config.end_rev, Some(1000));
        assert!(config.dry_run);
        assert!(config.verbose);
    }

    #[test]
    fn test_non_numeric_startrev_rejected() {
        assert!(parse(&["-d", "en.wikipedia.org", "--startrev", "abc"]).is_err());
    }

    #[test]
    fn test_non_numeric_endrev_rejected() {
        assert!(parse(&["-d", "en.wikipedia.org", "--endrev", "12x"]).is_err());
        assert!(parse(&["-d", "en.wikipedia.org", "--endrev", "-5"]).is_err());
    }

    #[test]
    fn test_missing_domain_rejected() {
        let args = parse(&["--startrev", "10"]).unwrap();
        assert_eq!(args.into_config(), Err(ConfigError::MissingDomain));
    }

    #[test]
    fn test_empty_domain_rejected() {
        let args = parse(&["--domain", "  "]).unwrap();
        assert_eq!(args.into_config(), Err(ConfigError::MissingDomain));
    }

    #[test]
    fn test_domain_with_path_or_query_rejected() {
        let args = parse(&["-d", "en.wikipedia.org/evil?x="]).unwrap();
        assert_eq!(
            args.into_config(),
            Err(ConfigError::InvalidDomain("en.wikipedia.org/evil?x=".to_string()))
        );

        for domain in ["bad domain", "user@en.wikipedia.org", "en.wikipedia.org#frag", "en.wikipedia.org:8080"] {
            let args = parse(&["-d", domain]).unwrap();
            assert!(
                matches!(args.into_config(), Err(ConfigError::InvalidDomain(_))),
                "accepted {}",
                domain
            );
        }
    }

    #[test]
    fn test_domain_case_insensitive() {
        let config = parse(&["-d", "EN.Wikipedia.org"]).unwrap().into_config().unwrap();
        assert_eq!(config.domain, "EN.Wikipedia.org");
    }

    #[test]
    fn test_exit_status() {
        let version = parse(&["--version"]).unwrap_err();
        assert_eq!(exit_status(&version), 0);

        let bad_start = parse(&["-d", "en.wikipedia.org", "--startrev", "abc"]).unwrap_err();
        assert_eq!(exit_status(&bad_start), USAGE_EXIT_STATUS);

        let unknown = parse(&["--bogus"]).unwrap_err();
        assert_eq!(exit_status(&unknown), USAGE_EXIT_STATUS);

        assert_eq!(USAGE_EXIT_STATUS, 1);
    }

    #[test]
    fn test_unknown_option_and_positional_rejected() {
        assert!(parse(&["-d", "en.wikipedia.org", "--bogus"]).is_err());
        assert!(parse(&["-d", "en.wikipedia.org", "leftover"]).is_err());
    }

    #[test]
    fn test_help_flag_parses_without_domain() {
        let args = parse(&["-h"]).unwrap();
        assert!(args.help);
    }
}

use crate::session::Session;
use crate::types::{CertFinderError, Config};
use log::{info, warn};
use serde::Deserialize;

const RELEASES_URL: &str = "https://api.github.com/repos/certfinder/certfinder/releases/latest";
const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_TIME: &str = env!("BUILD_TIME");
const GIT_HASH: &str = env!("GIT_HASH");

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
}

/// One line describing this binary.
pub fn version_line() -> String {
    format!("certfinder {} (built {}, commit {})", CURRENT_VERSION, BUILD_TIME, GIT_HASH)
}

/// Print build information, then say whether a newer release exists.
/// Failing to reach the release feed is only a warning.
pub async fn check_version(config: &Config) -> Result<(), CertFinderError> {
    println!("{}", version_line());

    let session = Session::new(config)?;
    match latest_release(&session, RELEASES_URL).await {
        Ok(Some(latest)) => {
            info!("New version available: {} (current: {})", latest, CURRENT_VERSION);
        }
        Ok(None) => {
            info!("certfinder is up to date (version {})", CURRENT_VERSION);
        }
        Err(e) => {
            warn!("Failed to check for updates: {}", e);
        }
    }

    Ok(())
}

/// Newest released version if it is ahead of this build.
pub async fn latest_release(session: &Session, url: &str) -> Result<Option<String>, CertFinderError> {
    let release: GitHubRelease = session.get_json(url).await?;
    let latest = release.tag_name.trim_start_matches('v');

    if is_newer_version(latest, CURRENT_VERSION) {
        Ok(Some(latest.to_string()))
    } else {
        Ok(None)
    }
}

fn is_newer_version(latest: &str, current: &str) -> bool {
    let parse_version = |v: &str| -> Vec<u32> { v.split('.').map(|s| s.parse().unwrap_or(0)).collect() };

    parse_version(latest) > parse_version(current)
}

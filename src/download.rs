//! HTTP downloads, zip extraction and writing results to disk or stdout

use crate::error::{GetterError, Result};
use std::future::Future;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const USER_AGENT: &str = "mtgogetter/0.1";

/// Client with the user agent set, shared by all downloads
pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().user_agent(USER_AGENT).build()?)
}

/// GET a URL and return the response body
pub async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    log::info!("Downloading from {}", url);

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(GetterError::HttpStatus {
            status: response.status(),
            url: url.to_string(),
        });
    }

    let bytes = response.bytes().await?;
    log::debug!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}

/// Run `operation` up to `attempts` times, doubling the delay after each failure
pub async fn with_retry<T, F, Fut>(
    attempts: usize,
    initial_delay: Duration,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut delay = initial_delay;
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                log::warn!(
                    "Attempt {}/{} failed, retrying in {:?}: {}",
                    attempt,
                    attempts,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Extract the first file of a zip archive
pub fn unzip_first_entry(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    if archive.len() == 0 {
        return Err(GetterError::EmptyArchive);
    }

    let mut first = archive.by_index(0)?;
    log::info!("Extracting {}", first.name());

    let mut content = Vec::with_capacity(usize::try_from(first.size()).unwrap_or_default());
    first.read_to_end(&mut content)?;
    Ok(content)
}

/// Where downloaded content ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    /// `stdout` (or `-`) means standard output, anything else is a file path
    pub fn parse(value: &str) -> Self {
        match value {
            "stdout" | "-" => Destination::Stdout,
            path => Destination::File(PathBuf::from(path)),
        }
    }

    /// File in `dir`, or in the current directory if no directory is given
    pub fn in_dir(dir: Option<&Path>, file_name: &str) -> Self {
        match dir {
            Some(dir) => Destination::File(dir.join(file_name)),
            None => Destination::File(PathBuf::from(file_name)),
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Stdout => write!(f, "stdout"),
            Destination::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Write `bytes` to the destination, creating parent directories of a file
pub fn write_output(bytes: &[u8], destination: &Destination) -> Result<()> {
    match destination {
        Destination::Stdout => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
        Destination::File(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, bytes)?;
            log::info!("Wrote {} bytes to {}", bytes.len(), path.display());
        }
    }
    Ok(())
}

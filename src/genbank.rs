use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use tracing::{error, info};

use crate::error::BuildError;
use crate::fs_util;

const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

pub trait GenbankClient {
    /// Returns the FASTA text of one nucleotide record.
    fn fetch_fasta(&self, accession: &str) -> Result<String, BuildError>;
}

#[derive(Clone)]
pub struct EntrezHttpClient {
    client: Client,
    base_url: String,
    email: Option<String>,
    api_key: Option<String>,
}

impl EntrezHttpClient {
    pub fn new(email: Option<String>) -> Result<Self, BuildError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!(
                "nextstrain-autobuild/{}",
                env!("CARGO_PKG_VERSION")
            ))
            .map_err(|err| BuildError::NcbiHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| BuildError::NcbiHttp(err.to_string()))?;

        let api_key = std::env::var("NCBI_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(Self {
            client,
            base_url: EFETCH_URL.to_string(),
            email,
            api_key,
        })
    }
}

impl GenbankClient for EntrezHttpClient {
    fn fetch_fasta(&self, accession: &str) -> Result<String, BuildError> {
        let mut query = vec![
            ("db", "nucleotide"),
            ("id", accession),
            ("rettype", "fasta"),
            ("retmode", "text"),
        ];
        if let Some(email) = &self.email {
            query.push(("email", email.as_str()));
        }
        if let Some(key) = &self.api_key {
            query.push(("api_key", key.as_str()));
        }
        let response = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .map_err(|err| BuildError::NcbiHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "efetch request failed".to_string());
            return Err(BuildError::NcbiStatus { status, message });
        }
        let text = response
            .text()
            .map_err(|err| BuildError::NcbiHttp(err.to_string()))?;
        if !text.trim_start().starts_with('>') {
            return Err(BuildError::EmptyRecord(accession.to_string()));
        }
        Ok(text)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadFailure {
    pub accession: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadSummary {
    pub saved: Vec<PathBuf>,
    pub failed: Vec<DownloadFailure>,
}

pub fn read_accessions<R: BufRead>(reader: R) -> Result<Vec<String>, BuildError> {
    let mut accessions = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|err| BuildError::Filesystem(err.to_string()))?;
        let accession = line.trim();
        if !accession.is_empty() {
            accessions.push(accession.to_string());
        }
    }
    Ok(accessions)
}

/// An accession becomes a file name, so it may not name a path.
pub fn check_accession(accession: &str) -> Result<(), BuildError> {
    let is_path = accession.contains(['/', '\\'])
        || accession.contains("..")
        || accession == ".";
    if accession.is_empty() || is_path {
        return Err(BuildError::InvalidAccession(accession.to_string()));
    }
    Ok(())
}

/// Saves each accession as `<output_dir>/<accession>.fasta`. A failing
/// accession is recorded and the rest still run.
pub fn download_all(
    client: &dyn GenbankClient,
    accessions: &[String],
    output_dir: &Path,
) -> Result<DownloadSummary, BuildError> {
    std::fs::create_dir_all(output_dir)
        .map_err(|err| BuildError::Filesystem(format!("create {}: {err}", output_dir.display())))?;
    let mut summary = DownloadSummary::default();
    for accession in accessions {
        let destination = output_dir.join(format!("{accession}.fasta"));
        let result = check_accession(accession)
            .and_then(|()| client.fetch_fasta(accession))
            .and_then(|fasta| {
                fs_util::write_atomic(&destination, |writer| {
                    writer
                        .write_all(fasta.as_bytes())
                        .map_err(|err| BuildError::Filesystem(err.to_string()))
                })
            });
        match result {
            Ok(()) => {
                info!("downloaded {accession} and saved to {}", destination.display());
                summary.saved.push(destination);
            }
            Err(err) => {
                error!("error downloading {accession}: {err}");
                summary.failed.push(DownloadFailure {
                    accession: accession.clone(),
                    message: err.to_string(),
                });
            }
        }
    }
    Ok(summary)
}

use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dates::{NormalizedDate, normalize_date};
use crate::error::BuildError;
use crate::fs_util;

pub const DEFAULT_SPECIES: &[&str] = &["West Nile virus"];
pub const CSV_OUTPUT: &str = "metadata_filtered.csv";
pub const TSV_OUTPUT: &str = "metadata_filtered.tsv";
pub const COMPLETE_STATUS: &str = "Complete";

/// Header of the tab-separated output, in the column names augur expects.
pub const AUGUR_COLUMNS: [&str; 9] = [
    "strain", "accession", "date", "year", "country", "region", "location", "host", "virus",
];

/// The columns of a genome table that survive projection; anything else in
/// the input is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenomeRecord {
    #[serde(rename = "Genome Name")]
    pub genome_name: String,
    #[serde(rename = "Family", default)]
    pub family: String,
    #[serde(rename = "Genus", default)]
    pub genus: String,
    #[serde(rename = "Species", default)]
    pub species: String,
    #[serde(rename = "Genome Status")]
    pub genome_status: String,
    #[serde(rename = "Strain")]
    pub strain: String,
    #[serde(rename = "GenBank Accessions")]
    pub accession: String,
    #[serde(rename = "Collection Date", default)]
    pub collection_date: String,
    #[serde(rename = "Collection Year")]
    pub collection_year: String,
    #[serde(rename = "Isolation Country")]
    pub country: String,
    #[serde(rename = "Geographic Group", default)]
    pub region: String,
    #[serde(rename = "Geographic Location", default)]
    pub location: String,
    #[serde(rename = "Host Name", default)]
    pub host: String,

    #[serde(skip)]
    pub identifier: Option<String>,
    #[serde(skip)]
    pub date: Option<NormalizedDate>,
}

impl GenomeRecord {
    /// The collection year, or `None` for blanks and `NA`-style markers.
    pub fn year(&self) -> Option<i32> {
        let value = self.collection_year.trim();
        if let Ok(year) = value.parse::<i32>() {
            return Some(year);
        }
        value
            .parse::<f64>()
            .ok()
            .filter(|year| year.is_finite() && year.fract() == 0.0)
            .map(|year| year as i32)
    }

    pub fn is_complete(&self) -> bool {
        !self.strain.trim().is_empty()
            && self.genome_status == COMPLETE_STATUS
            && !self.country.trim().is_empty()
            && self.year().is_some()
    }

    pub fn composite_identifier(&self) -> String {
        format!("{}_{}", self.accession, self.strain)
    }
}

#[derive(Debug, Clone)]
pub struct SpeciesMatcher {
    pattern: Regex,
}

impl SpeciesMatcher {
    /// Case-sensitive match of any of `names` anywhere in the genome name.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self, BuildError> {
        if names.is_empty() {
            return Err(BuildError::InvalidPattern(
                "at least one species name is required".to_string(),
            ));
        }
        let alternation = names
            .iter()
            .map(|name| regex::escape(name.as_ref()))
            .collect::<Vec<_>>()
            .join("|");
        let pattern =
            Regex::new(&alternation).map_err(|err| BuildError::InvalidPattern(err.to_string()))?;
        Ok(Self { pattern })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

/// One filtering or transforming pass over the record set.
#[derive(Debug, Clone)]
pub enum Stage {
    RequireComplete,
    MatchSpecies(SpeciesMatcher),
    DeriveIdentifier,
    DedupByStrain,
    NormalizeDates,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::RequireComplete => "require-complete",
            Stage::MatchSpecies(_) => "match-species",
            Stage::DeriveIdentifier => "derive-identifier",
            Stage::DedupByStrain => "dedup-by-strain",
            Stage::NormalizeDates => "normalize-dates",
        }
    }

    pub fn apply(&self, mut records: Vec<GenomeRecord>) -> Vec<GenomeRecord> {
        match self {
            Stage::RequireComplete => records.retain(GenomeRecord::is_complete),
            Stage::MatchSpecies(matcher) => {
                records.retain(|record| matcher.matches(&record.genome_name))
            }
            Stage::DeriveIdentifier => {
                for record in &mut records {
                    record.identifier = Some(record.composite_identifier());
                }
            }
            Stage::DedupByStrain => {
                let mut seen = HashSet::new();
                records.retain(|record| seen.insert(record.strain.clone()));
            }
            Stage::NormalizeDates => {
                for record in &mut records {
                    record.date = normalize_date(&record.collection_date);
                    if record.date.is_none() && !record.collection_date.trim().is_empty() {
                        debug!(
                            strain = record.strain.as_str(),
                            "unparseable collection date {:?}", record.collection_date
                        );
                    }
                }
            }
        }
        records
    }
}

#[derive(Debug, Clone)]
pub struct MetadataFilter {
    stages: Vec<Stage>,
}

impl MetadataFilter {
    pub fn new<S: AsRef<str>>(species: &[S]) -> Result<Self, BuildError> {
        Ok(Self::with_stages(vec![
            Stage::RequireComplete,
            Stage::MatchSpecies(SpeciesMatcher::new(species)?),
            Stage::DeriveIdentifier,
            Stage::DedupByStrain,
            Stage::NormalizeDates,
        ]))
    }

    pub fn with_stages(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn apply(&self, records: Vec<GenomeRecord>) -> Vec<GenomeRecord> {
        self.stages.iter().fold(records, |records, stage| {
            let before = records.len();
            let records = stage.apply(records);
            debug!(stage = stage.name(), before, after = records.len());
            records
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Delimiter {
    Tab,
    Comma,
}

impl Delimiter {
    /// Tab for `.tsv`/`.txt` (optionally gzipped), comma otherwise.
    pub fn for_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        if name.ends_with(".tsv") || name.ends_with(".txt") {
            Delimiter::Tab
        } else {
            Delimiter::Comma
        }
    }

    pub fn byte(&self) -> u8 {
        match self {
            Delimiter::Tab => b'\t',
            Delimiter::Comma => b',',
        }
    }
}

/// Deserializes every row; the first malformed row aborts the read.
pub fn read_records<R: Read>(reader: R, delimiter: Delimiter) -> Result<Vec<GenomeRecord>, BuildError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter.byte())
        .has_headers(true)
        .from_reader(reader);
    reader
        .deserialize()
        .collect::<Result<Vec<GenomeRecord>, _>>()
        .map_err(|err| BuildError::Metadata(err.to_string()))
}

pub fn read_path(path: &Path, delimiter: Option<Delimiter>) -> Result<Vec<GenomeRecord>, BuildError> {
    let delimiter = delimiter.unwrap_or_else(|| Delimiter::for_path(path));
    let records = read_records(fs_util::open_text(path)?, delimiter)?;
    info!("read {} genome records from {}", records.len(), path.display());
    Ok(records)
}

#[derive(Serialize)]
struct CsvRow<'a> {
    name: &'a str,
    accession: &'a str,
    strain: &'a str,
    genome_name: &'a str,
    family: &'a str,
    genus: &'a str,
    species: &'a str,
    genome_status: &'a str,
    date: Option<&'a NormalizedDate>,
    year: Option<i32>,
    country: &'a str,
    region: &'a str,
    location: &'a str,
    host: &'a str,
}

impl<'a> CsvRow<'a> {
    fn from_record(record: &'a GenomeRecord) -> Self {
        Self {
            name: record.identifier.as_deref().unwrap_or(&record.strain),
            accession: &record.accession,
            strain: &record.strain,
            genome_name: &record.genome_name,
            family: &record.family,
            genus: &record.genus,
            species: &record.species,
            genome_status: &record.genome_status,
            date: record.date.as_ref(),
            year: record.year(),
            country: &record.country,
            region: &record.region,
            location: &record.location,
            host: &record.host,
        }
    }

    fn augur_fields(&self) -> [String; 9] {
        [
            self.name.to_string(),
            self.accession.to_string(),
            self.date.map(ToString::to_string).unwrap_or_default(),
            self.year.map(|year| year.to_string()).unwrap_or_default(),
            self.country.to_string(),
            self.region.to_string(),
            self.location.to_string(),
            self.host.to_string(),
            self.species.to_string(),
        ]
    }
}

pub fn write_csv<W: Write>(writer: W, records: &[GenomeRecord]) -> Result<(), BuildError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_writer(writer);
    for record in records {
        writer
            .serialize(CsvRow::from_record(record))
            .map_err(|err| BuildError::Metadata(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| BuildError::Filesystem(err.to_string()))
}

pub fn write_augur_tsv<W: Write>(writer: W, records: &[GenomeRecord]) -> Result<(), BuildError> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(writer);
    writer
        .write_record(AUGUR_COLUMNS)
        .map_err(|err| BuildError::Metadata(err.to_string()))?;
    for record in records {
        writer
            .write_record(CsvRow::from_record(record).augur_fields())
            .map_err(|err| BuildError::Metadata(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| BuildError::Filesystem(err.to_string()))
}

#[derive(Debug, Clone, Serialize)]
pub struct MetadataOutputs {
    pub csv: PathBuf,
    pub tsv: PathBuf,
    pub rows: usize,
}

pub fn write_outputs(records: &[GenomeRecord], out_dir: &Path) -> Result<MetadataOutputs, BuildError> {
    let csv = out_dir.join(CSV_OUTPUT);
    let tsv = out_dir.join(TSV_OUTPUT);
    fs_util::write_atomic(&csv, |writer| write_csv(writer, records))?;
    fs_util::write_atomic(&tsv, |writer| write_augur_tsv(writer, records))?;
    Ok(MetadataOutputs {
        csv,
        tsv,
        rows: records.len(),
    })
}

//! Reference corpus of precomputed comparator embeddings

use crate::error::{RelativityError, Result};
use crate::processing::element::{EcElement, ElementEmbeddings, ElementTextMap, PerElement};
use crate::processing::embeddings::{embed_with_timeout, EmbeddingService};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One comparator job with its per-element embeddings
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRecord {
    pub job_title: String,
    pub ec_level: String,
    pub department: String,
    pub embeddings: ElementEmbeddings,
}

/// A malformed corpus entry fixed at load time: a zero-vector substitution
/// or a dropped duplicate key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusRepair {
    pub record_index: usize,
    pub job_title: String,
    pub element: EcElement,
    pub reason: String,
}

/// The loaded comparator corpus. Read-only after load.
#[derive(Debug, Clone)]
pub struct Corpus {
    records: Vec<ReferenceRecord>,
    dimensions: usize,
    repairs: Vec<CorpusRepair>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorpusSummary {
    pub record_count: usize,
    pub dimensions: usize,
    pub levels: BTreeMap<String, usize>,
    pub repair_count: usize,
}

impl Corpus {
    pub fn new(records: Vec<ReferenceRecord>, dimensions: usize) -> Self {
        Self {
            records,
            dimensions,
            repairs: Vec::new(),
        }
    }

    pub fn records(&self) -> &[ReferenceRecord] {
        &self.records
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn repairs(&self) -> &[CorpusRepair] {
        &self.repairs
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> CorpusSummary {
        let mut levels = BTreeMap::new();
        for record in &self.records {
            *levels.entry(record.ec_level.clone()).or_insert(0) += 1;
        }
        CorpusSummary {
            record_count: self.records.len(),
            dimensions: self.dimensions,
            levels,
            repair_count: self.repairs.len(),
        }
    }

    /// Build a corpus from stored records, substituting zero vectors for
    /// missing, unknown-length or empty element embeddings.
    pub fn from_stored(stored: Vec<StoredRecord>, fallback_dimensions: usize) -> Self {
        let dimensions = dominant_dimension(&stored).unwrap_or(fallback_dimensions);

        let mut repairs = Vec::new();
        let mut records = Vec::with_capacity(stored.len());

        for (record_index, record) in stored.into_iter().enumerate() {
            let mut by_element: HashMap<EcElement, (String, Vec<f32>)> = HashMap::new();
            for (key, vector) in record.embeddings {
                match EcElement::from_name(&key) {
                    Some(element) => {
                        // The exact element name wins over a differently cased duplicate
                        let (kept, dropped) = match by_element.remove(&element) {
                            Some(previous) if previous.0 == element.name() => (previous, key),
                            Some(previous) => ((key, vector), previous.0),
                            None => {
                                by_element.insert(element, (key, vector));
                                continue;
                            }
                        };
                        log::warn!(
                            "Corpus record {} ('{}'): duplicate key '{}' for {}; keeping '{}'",
                            record_index,
                            record.job_title,
                            dropped,
                            element,
                            kept.0
                        );
                        repairs.push(CorpusRepair {
                            record_index,
                            job_title: record.job_title.clone(),
                            element,
                            reason: format!("duplicate key '{}' ignored", dropped),
                        });
                        by_element.insert(element, kept);
                    }
                    None => log::debug!(
                        "Ignoring unknown element '{}' in corpus record '{}'",
                        key,
                        record.job_title
                    ),
                }
            }

            let vectors = PerElement::from_fn(|element| {
                let reason = match by_element.remove(&element).map(|(_, vector)| vector) {
                    Some(vector) if vector.len() == dimensions => return vector,
                    Some(vector) if vector.is_empty() => "empty embedding".to_string(),
                    Some(vector) => format!("expected {} dimensions, found {}", dimensions, vector.len()),
                    None => "missing embedding".to_string(),
                };
                log::warn!(
                    "Corpus record {} ('{}'): {} for {}; using zero vector",
                    record_index,
                    record.job_title,
                    reason,
                    element
                );
                repairs.push(CorpusRepair {
                    record_index,
                    job_title: record.job_title.clone(),
                    element,
                    reason,
                });
                vec![0.0; dimensions]
            });

            let embeddings = ElementEmbeddings::from_vectors(vectors, dimensions)
                .unwrap_or_else(|_| ElementEmbeddings::zeros(dimensions));

            records.push(ReferenceRecord {
                job_title: record.job_title,
                ec_level: record.ec_level,
                department: record.department,
                embeddings,
            });
        }

        Self {
            records,
            dimensions,
            repairs,
        }
    }
}

/// On-disk shape of a precomputed corpus record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(rename = "Job Title")]
    pub job_title: String,
    #[serde(rename = "EC Level", default)]
    pub ec_level: String,
    #[serde(rename = "Department", default)]
    pub department: String,
    #[serde(default)]
    pub embeddings: BTreeMap<String, Vec<f32>>,
}

/// Raw categorized text for one comparator, input to the corpus builder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusSourceRecord {
    #[serde(rename = "Job Title")]
    pub job_title: String,
    #[serde(rename = "EC Level", default)]
    pub ec_level: String,
    #[serde(rename = "Department", default)]
    pub department: String,
    #[serde(default)]
    pub elements: BTreeMap<String, String>,
}

impl CorpusSourceRecord {
    pub fn text_map(&self) -> ElementTextMap {
        let mut texts = ElementTextMap::new();
        for (key, text) in &self.elements {
            match EcElement::from_name(key) {
                Some(element) => texts.insert(element, text.clone()),
                None => log::debug!("Ignoring unknown element '{}' for '{}'", key, self.job_title),
            }
        }
        texts
    }
}

pub trait CorpusSource {
    fn load_corpus(&self) -> Result<Corpus>;
}

/// Loads a JSON array of `StoredRecord`s, gzip-compressed when the path ends in `.gz`
pub struct FileCorpusSource {
    path: PathBuf,
    fallback_dimensions: usize,
}

impl FileCorpusSource {
    pub fn new(path: impl Into<PathBuf>, fallback_dimensions: usize) -> Self {
        Self {
            path: path.into(),
            fallback_dimensions,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CorpusSource for FileCorpusSource {
    fn load_corpus(&self) -> Result<Corpus> {
        if !self.path.exists() {
            return Err(RelativityError::Corpus(format!(
                "Corpus file does not exist: {}",
                self.path.display()
            )));
        }

        let stored: Vec<StoredRecord> = read_json(&self.path)?;
        log::info!("Loaded {} comparator records from {}", stored.len(), self.path.display());

        let corpus = Corpus::from_stored(stored, self.fallback_dimensions);
        if !corpus.repairs().is_empty() {
            log::warn!(
                "{} element embeddings were missing or malformed and replaced with zero vectors",
                corpus.repairs().len()
            );
        }
        Ok(corpus)
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Read JSON from a plain or gzip-compressed file
pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    let mut content = String::new();
    if is_gzip(path) {
        GzDecoder::new(BufReader::new(file))
            .read_to_string(&mut content)
            .map_err(|e| RelativityError::Corpus(format!("Failed to decompress {}: {}", path.display(), e)))?;
    } else {
        BufReader::new(file).read_to_string(&mut content)?;
    }

    serde_json::from_str(&content)
        .map_err(|e| RelativityError::Corpus(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write records as JSON, gzip-compressed when the path ends in `.gz`
pub fn write_corpus(records: &[StoredRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_vec(records)?;
    let file = BufWriter::new(File::create(path)?);
    if is_gzip(path) {
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&json)?;
        encoder.finish()?.flush()?;
    } else {
        let mut file = file;
        file.write_all(&json)?;
        file.flush()?;
    }
    Ok(())
}

/// Embed raw categorized comparator text into stored records.
///
/// Empty element text becomes a zero vector, matching how user input is embedded.
/// Each call is bounded by `call_timeout`.
pub async fn build_corpus<E: EmbeddingService>(
    sources: &[CorpusSourceRecord],
    embedder: &E,
    call_timeout: Duration,
) -> Result<Vec<StoredRecord>> {
    let dimensions = embedder.dimensions();
    let mut stored = Vec::with_capacity(sources.len());

    for source in sources {
        let texts = source.text_map();
        let mut embeddings = BTreeMap::new();
        for element in EcElement::ALL {
            let vector = match texts.non_empty(element) {
                Some(text) => {
                    let label = format!("{} for '{}'", element, source.job_title);
                    embed_with_timeout(embedder, text, call_timeout, &label).await?
                }
                None => vec![0.0; dimensions],
            };
            embeddings.insert(element.name().to_string(), vector);
        }

        stored.push(StoredRecord {
            job_title: source.job_title.clone(),
            ec_level: source.ec_level.clone(),
            department: source.department.clone(),
            embeddings,
        });
    }

    Ok(stored)
}

/// Most common non-zero vector length; ties go to the length seen first
fn dominant_dimension(stored: &[StoredRecord]) -> Option<usize> {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for len in stored
        .iter()
        .flat_map(|r| r.embeddings.values())
        .map(Vec::len)
        .filter(|len| *len > 0)
    {
        match counts.iter_mut().find(|(l, _)| *l == len) {
            Some((_, count)) => *count += 1,
            None => counts.push((len, 1)),
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for (len, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((len, count));
        }
    }
    best.map(|(len, _)| len)
}

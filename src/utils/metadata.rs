// src/utils/metadata.rs: sample metadata records and qiime map files

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fxhash::FxHashMap;
use log::debug;

use crate::config::defs::{
    BARCODE_COLUMN, GOLAY_12, PipelineError, SAMPLE_ID_COLUMN,
    VARIABLE_LENGTH,
};


/// One row of a map file. The first column is always the sample id.
/// Column names are shared between the records of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    columns: Arc<[String]>,
    values: Vec<String>,
}

impl SampleRecord {
    /// # Returns
    /// Err if `columns` is empty or the value count differs from it.
    pub fn new(columns: Arc<[String]>, values: Vec<String>) -> Result<Self, PipelineError> {
        if columns.is_empty() {
            return Err(PipelineError::InvalidMetadata("no columns".to_string()));
        }
        if columns.len() != values.len() {
            return Err(PipelineError::InvalidMetadata(format!(
                "expected {} fields, found {} in row starting '{}'",
                columns.len(),
                values.len(),
                values.first().map(String::as_str).unwrap_or_default()
            )));
        }
        Ok(SampleRecord { columns, values })
    }

    pub fn sample_id(&self) -> &str {
        &self.values[0]
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| self.values[idx].as_str())
    }

    pub fn barcode(&self) -> Option<&str> {
        self.get(BARCODE_COLUMN)
    }

    /// Copy with `column` set to `value`; unknown columns leave it unchanged.
    pub fn with_value(&self, column: &str, value: impl Into<String>) -> Self {
        let mut record = self.clone();
        if let Some(idx) = self.columns.iter().position(|c| c == column) {
            record.values[idx] = value.into();
        }
        record
    }

    pub fn with_sample_id(&self, sample_id: impl Into<String>) -> Self {
        let mut record = self.clone();
        record.values[0] = sample_id.into();
        record
    }
}


/// Builds records with a single `SampleID` column, one per name.
pub fn records_from_ids<I, S>(ids: I) -> Vec<SampleRecord>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let columns: Arc<[String]> = Arc::from(vec![SAMPLE_ID_COLUMN.to_string()]);
    ids.into_iter()
        .map(|id| SampleRecord {
            columns: Arc::clone(&columns),
            values: vec![id.into()],
        })
        .collect()
}

/// Parses a tab-separated map file. The header line starts with `#`;
/// later lines starting with `#` are comments.
///
/// # Arguments
///
/// * `reader` - Map file contents.
///
/// # Returns
/// Records in file order.
pub fn parse_map<R: Read>(reader: R) -> Result<Vec<SampleRecord>, PipelineError> {
    let mut lines = BufReader::new(reader).lines();

    let header = loop {
        match lines.next() {
            Some(line) => {
                let line = line?;
                if !line.trim().is_empty() {
                    break line;
                }
            }
            None => return Ok(Vec::new()),
        }
    };
    let header = header
        .strip_prefix('#')
        .ok_or_else(|| PipelineError::InvalidMetadata("header line must start with '#'".to_string()))?;
    let columns: Arc<[String]> = header
        .trim_end_matches(['\r', '\n'])
        .split('\t')
        .map(String::from)
        .collect::<Vec<String>>()
        .into();

    let mut body = String::new();
    for line in lines {
        body.push_str(&line?);
        body.push('\n');
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .comment(Some(b'#'))
        .from_reader(body.as_bytes());

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row = row?;
        if row.iter().all(|field| field.is_empty()) {
            continue;
        }
        let values: Vec<String> = row.iter().map(|f| f.trim_end_matches('\r').to_string()).collect();
        records.push(SampleRecord::new(Arc::clone(&columns), values)?);
    }
    Ok(records)
}

pub fn read_map_file(path: &Path) -> Result<Vec<SampleRecord>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingMetadata(path.to_path_buf()));
    }
    let records = parse_map(File::open(path)?)?;
    debug!("Read {} sample records from {}", records.len(), path.display());
    Ok(records)
}

/// Writes records in map-file layout. Values are written verbatim.
pub fn serialize_map<W: Write>(records: &[SampleRecord], writer: W) -> Result<(), PipelineError> {
    let first = records
        .first()
        .ok_or_else(|| PipelineError::InvalidMetadata("no sample records to write".to_string()))?;

    let mut writer = writer;
    writeln!(writer, "#{}", first.columns().join("\t"))?;
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .has_headers(false)
        .from_writer(writer);
    for record in records {
        csv_writer.write_record(record.values())?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_map_file(records: &[SampleRecord], path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    serialize_map(records, File::create(path)?)
}


/// Stable-sorts by sample id, then groups consecutive equal ids.
///
/// # Returns
/// (sample id, members) in ascending id order; members keep their input
/// order.
pub fn group_by_sample_id(records: &[SampleRecord]) -> Vec<(String, Vec<SampleRecord>)> {
    let mut sorted: Vec<&SampleRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.sample_id().cmp(b.sample_id()));

    let mut groups: Vec<(String, Vec<SampleRecord>)> = Vec::new();
    for record in sorted {
        match groups.last_mut() {
            Some((id, members)) if id == record.sample_id() => members.push(record.clone()),
            _ => groups.push((record.sample_id().to_string(), vec![record.clone()])),
        }
    }
    groups
}

/// Derives the demultiplexer's barcode-type value from the group's barcode
/// lengths: the common length, `golay_12` for twelve, or `variable_length`.
///
/// # Returns
/// Err if the group is empty or a record has no barcode column.
pub fn determine_barcode_type(group: &[SampleRecord]) -> Result<String, PipelineError> {
    let mut histogram: FxHashMap<usize, usize> = FxHashMap::default();
    for record in group {
        let barcode = record.barcode().ok_or_else(|| {
            PipelineError::InvalidMetadata(format!(
                "sample {} has no {} column",
                record.sample_id(),
                BARCODE_COLUMN
            ))
        })?;
        *histogram.entry(barcode.chars().count()).or_insert(0) += 1;
    }

    match histogram.len() {
        0 => Err(PipelineError::InvalidMetadata("empty sample group".to_string())),
        1 => {
            let length = histogram.keys().next().copied().unwrap_or_default();
            if length == 12 {
                Ok(GOLAY_12.to_string())
            } else {
                Ok(length.to_string())
            }
        }
        _ => Ok(VARIABLE_LENGTH.to_string()),
    }
}


fn or_unfiltered<T: Clone>(filtered: Vec<T>, all: &[T]) -> Vec<T> {
    if filtered.is_empty() {
        all.to_vec()
    } else {
        filtered
    }
}

/// Files whose path contains the `key` column of any sample in the group.
/// Falls back to every file when nothing matches or the column is missing.
pub fn filter_files_for_sample(files: &[PathBuf], group: &[SampleRecord], key: &str) -> Vec<PathBuf> {
    let needles: Vec<&str> = group.iter().filter_map(|s| s.get(key)).collect();
    if needles.is_empty() {
        return files.to_vec();
    }
    let filtered = files
        .iter()
        .filter(|f| {
            let name = f.to_string_lossy();
            needles.iter().any(|n| name.contains(n))
        })
        .cloned()
        .collect();
    or_unfiltered(filtered, files)
}

/// Pair version of [`filter_files_for_sample`], matched on the forward read.
pub fn filter_pairs_for_sample(
    pairs: &[(PathBuf, PathBuf)],
    group: &[SampleRecord],
    key: &str,
) -> Vec<(PathBuf, PathBuf)> {
    let needles: Vec<&str> = group.iter().filter_map(|s| s.get(key)).collect();
    if needles.is_empty() {
        return pairs.to_vec();
    }
    let filtered = pairs
        .iter()
        .filter(|(r1, _)| {
            let name = r1.to_string_lossy();
            needles.iter().any(|n| name.contains(n))
        })
        .cloned()
        .collect();
    or_unfiltered(filtered, pairs)
}

/// Samples whose id appears in `file`; every sample when none does.
pub fn filter_samples_for_file(group: &[SampleRecord], file: &Path) -> Vec<SampleRecord> {
    let name = file.to_string_lossy();
    let filtered = group
        .iter()
        .filter(|s| name.contains(s.sample_id()))
        .cloned()
        .collect();
    or_unfiltered(filtered, group)
}

/// Where a pipeline gets its sample metadata from.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleMetadataSource {
    File(PathBuf),
    Records(Vec<SampleRecord>),
}

impl SampleMetadataSource {
    /// Loads the records, reading the map file when needed.
    ///
    /// # Returns
    /// Err on a missing or unreadable file, or when no records result.
    pub fn resolve(&self) -> Result<Vec<SampleRecord>, PipelineError> {
        let records = match self {
            SampleMetadataSource::File(path) => read_map_file(path)?,
            SampleMetadataSource::Records(records) => records.clone(),
        };
        if records.is_empty() {
            return Err(PipelineError::InvalidMetadata(
                "unable to read sample metadata: no records".to_string(),
            ));
        }
        Ok(records)
    }

    /// Like [`SampleMetadataSource::resolve`] but uses `default` when the
    /// source holds no records.
    pub fn resolve_or_else<F>(&self, default: F) -> Result<Vec<SampleRecord>, PipelineError>
    where
        F: FnOnce() -> Vec<SampleRecord>,
    {
        let records = match self {
            SampleMetadataSource::File(path) => read_map_file(path)?,
            SampleMetadataSource::Records(records) => records.clone(),
        };
        if records.is_empty() {
            Ok(default())
        } else {
            Ok(records)
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MAP: &str = "#SampleID\tBarcodeSequence\tLinkerPrimerSequence\tDescription\n\
                       S2\tAACCGGTTAACC\tGTGCCAGC\tgut\n\
                       # a comment\n\
                       S1\tTTGGCCAAGGTT\tGTGCCAGC\tskin\n\
                       S2\tACGTACGTACGT\tGTGCCAGC\tgut rerun\n";

    #[test]
    fn test_parse_map() {
        let records = parse_map(MAP.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].sample_id(), "S2");
        assert_eq!(records[1].barcode(), Some("TTGGCCAAGGTT"));
        assert_eq!(records[2].get("Description"), Some("gut rerun"));
        assert_eq!(records[0].columns()[0], "SampleID");
    }

    #[test]
    fn test_parse_map_rejects_missing_header() {
        assert!(parse_map("S1\tAAAA\n".as_bytes()).is_err());
    }

    #[test]
    fn test_parse_map_rejects_short_rows() {
        let text = "#SampleID\tBarcodeSequence\nS1\n";
        assert!(matches!(parse_map(text.as_bytes()), Err(PipelineError::InvalidMetadata(_))));
    }

    #[test]
    fn test_map_file_roundtrip_preserves_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub").join("map.txt");
        let records = parse_map(MAP.as_bytes()).unwrap();
        write_map_file(&records, &path).unwrap();
        let reread = read_map_file(&path).unwrap();
        assert_eq!(reread, records);
    }

    #[test]
    fn test_group_by_sample_id() {
        let records = parse_map(MAP.as_bytes()).unwrap();
        let groups = group_by_sample_id(&records);
        let ids: Vec<&str> = groups.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2"]);
        let s2_barcodes: Vec<&str> = groups[1].1.iter().filter_map(|r| r.barcode()).collect();
        assert_eq!(s2_barcodes, vec!["AACCGGTTAACC", "ACGTACGTACGT"]);
    }

    fn with_barcodes(barcodes: &[&str]) -> Vec<SampleRecord> {
        let columns: Arc<[String]> = Arc::from(vec!["SampleID".to_string(), "BarcodeSequence".to_string()]);
        barcodes
            .iter()
            .map(|b| SampleRecord::new(Arc::clone(&columns), vec!["S".to_string(), b.to_string()]).unwrap())
            .collect()
    }

    #[test]
    fn test_determine_barcode_type() {
        let twelve = "ACGTACGTACGT";
        assert_eq!(determine_barcode_type(&with_barcodes(&[twelve, twelve, twelve])).unwrap(), "golay_12");
        assert_eq!(determine_barcode_type(&with_barcodes(&["ACGTACGT", twelve])).unwrap(), "variable_length");
        assert_eq!(determine_barcode_type(&with_barcodes(&["ACGTAC", "TTTTTT"])).unwrap(), "6");
        assert!(determine_barcode_type(&[]).is_err());
        assert!(determine_barcode_type(&records_from_ids(["x"])).is_err());
    }

    #[test]
    fn test_filters_fall_back_to_input() {
        let columns: Arc<[String]> = Arc::from(vec!["SampleID".to_string(), "Run_accession".to_string()]);
        let group = vec![SampleRecord::new(columns, vec!["S1".to_string(), "SRR100".to_string()]).unwrap()];
        let files = vec![PathBuf::from("raw/SRR100.fastq"), PathBuf::from("raw/SRR200.fastq")];

        assert_eq!(filter_files_for_sample(&files, &group, "Run_accession"), vec![PathBuf::from("raw/SRR100.fastq")]);
        assert_eq!(filter_files_for_sample(&files[1..], &group, "Run_accession"), files[1..].to_vec());
        assert_eq!(filter_files_for_sample(&files, &group, "Missing"), files);

        let samples = records_from_ids(["A", "B"]);
        assert_eq!(filter_samples_for_file(&samples, Path::new("out/B_merged.fastq"))[0].sample_id(), "B");
        assert_eq!(filter_samples_for_file(&samples, Path::new("zzz.fastq")).len(), 2);
    }

    #[test]
    fn test_pair_filter_matches_forward_read() {
        let columns: Arc<[String]> = Arc::from(vec!["SampleID".to_string(), "Run_accession".to_string()]);
        let group = vec![SampleRecord::new(columns, vec!["S1".to_string(), "SRR100".to_string()]).unwrap()];
        let pair = |r1: &str, r2: &str| (PathBuf::from(r1), PathBuf::from(r2));
        let pairs = vec![
            pair("raw/SRR100_R1.fastq", "raw/SRR100_R2.fastq"),
            pair("raw/SRR200_R1.fastq", "raw/SRR200_R2.fastq"),
        ];

        assert_eq!(filter_pairs_for_sample(&pairs, &group, "Run_accession"), pairs[..1].to_vec());
        assert_eq!(filter_pairs_for_sample(&pairs[1..], &group, "Run_accession"), pairs[1..].to_vec());
        assert_eq!(filter_pairs_for_sample(&pairs, &group, "Missing"), pairs);

        // only the forward read is matched
        let reverse_only = vec![pair("raw/lane1_R1.fastq", "raw/SRR100_R2.fastq"), pairs[1].clone()];
        assert_eq!(filter_pairs_for_sample(&reverse_only, &group, "Run_accession"), reverse_only);
    }

    #[test]
    fn test_source_resolve() {
        let missing = SampleMetadataSource::File(PathBuf::from("/definitely/not/here/map.txt"));
        assert!(matches!(missing.resolve(), Err(PipelineError::MissingMetadata(_))));

        let empty = SampleMetadataSource::Records(Vec::new());
        assert!(empty.resolve().is_err());
        let fallback = empty.resolve_or_else(|| records_from_ids(["a.fastq"])).unwrap();
        assert_eq!(fallback[0].sample_id(), "a.fastq");
    }
}

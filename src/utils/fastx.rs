// src/utils/fastx.rs: read-pair inference from file names

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;

use crate::utils::file::{is_compressed, rm_ext};

lazy_static! {
    /// Orientation token: optional r/R then 1 or 2, bounded by a delimiter
    /// (or the start of the name) on the left and a delimiter on the right.
    static ref ORIENTATION_TOKEN: Regex =
        Regex::new(r"(?:^|[-._ ])[rR]?([12])[-._ ]").expect("orientation regex is valid");

    static ref ORIENTATION_REWRITE: Regex =
        Regex::new(r"^(.*[-._ ]|)[rR]?[12]([-._ ].*)$").expect("rewrite regex is valid");
}


/// A raw sequence input: one file, or a forward/reverse pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeqInput {
    Single(PathBuf),
    Pair(PathBuf, PathBuf),
}

impl SeqInput {
    pub fn files(&self) -> Vec<&Path> {
        match self {
            SeqInput::Single(f) => vec![f.as_path()],
            SeqInput::Pair(r1, r2) => vec![r1.as_path(), r2.as_path()],
        }
    }

    /// The file naming the input: the single file, or the forward read.
    pub fn first(&self) -> &Path {
        match self {
            SeqInput::Single(f) => f,
            SeqInput::Pair(r1, _) => r1,
        }
    }
}


fn file_name_str(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Sorts each file into read-1, read-2 or neither by its orientation token.
/// Only the file name component is inspected. Input order is kept inside
/// each group.
///
/// # Arguments
///
/// * `files` - Candidate sequence files.
///
/// # Returns
/// (read 1 files, read 2 files, unmatched files)
pub fn regex_filter(files: &[PathBuf]) -> (Vec<PathBuf>, Vec<PathBuf>, Vec<PathBuf>) {
    let mut one = Vec::new();
    let mut two = Vec::new();
    let mut not_paired = Vec::new();

    for file in files {
        let name = file_name_str(file);
        match ORIENTATION_TOKEN.captures(&name).and_then(|c| c.get(1)) {
            Some(m) if m.as_str() == "1" => one.push(file.clone()),
            Some(m) if m.as_str() == "2" => two.push(file.clone()),
            _ => not_paired.push(file.clone()),
        }
    }
    (one, two, not_paired)
}

/// Pairs forward and reverse read files.
///
/// Pairing is all-or-nothing: if the read-1 and read-2 counts differ, every
/// matched file is demoted to unpaired. Otherwise both lists are sorted
/// lexicographically and zipped.
///
/// # Arguments
///
/// * `files` - Sequence files in any order.
///
/// # Returns
/// (pairs, unpaired)
pub fn infer_pairs(files: &[PathBuf]) -> (Vec<(PathBuf, PathBuf)>, Vec<PathBuf>) {
    let (mut one, mut two, mut not_paired) = regex_filter(files);

    if one.len() != two.len() {
        if !one.is_empty() || !two.is_empty() {
            warn!(
                "Found {} read 1 files but {} read 2 files; treating all {} as unpaired",
                one.len(),
                two.len(),
                one.len() + two.len()
            );
        }
        not_paired.extend(one);
        not_paired.extend(two);
        return (Vec::new(), not_paired);
    }

    one.sort_by_key(|p| p.to_string_lossy().into_owned());
    two.sort_by_key(|p| p.to_string_lossy().into_owned());
    let pairs: Vec<(PathBuf, PathBuf)> = one.into_iter().zip(two).collect();
    debug!("Inferred {} read pairs, {} unpaired files", pairs.len(), not_paired.len());
    (pairs, not_paired)
}

/// Pairing result as a single list: pairs first, then singles.
pub fn infer_inputs(files: &[PathBuf]) -> Vec<SeqInput> {
    let (pairs, singles) = infer_pairs(files);
    pairs
        .into_iter()
        .map(|(r1, r2)| SeqInput::Pair(r1, r2))
        .chain(singles.into_iter().map(SeqInput::Single))
        .collect()
}

/// Separates pairs from single files.
pub fn split_pairs(inputs: &[SeqInput]) -> (Vec<(PathBuf, PathBuf)>, Vec<PathBuf>) {
    let mut pairs = Vec::new();
    let mut singles = Vec::new();
    for input in inputs {
        match input {
            SeqInput::Pair(r1, r2) => pairs.push((r1.clone(), r2.clone())),
            SeqInput::Single(f) => singles.push(f.clone()),
        }
    }
    (pairs, singles)
}

/// Replaces the orientation token of a read file name with `tag`,
/// dropping a trailing compression extension.
/// `koji_R1.fastq` -> `koji_merged.fastq`, `2.fastq` -> `stitched.fastq`.
///
/// # Arguments
///
/// * `path` - Read file; only the file name is rewritten.
/// * `tag` - Replacement for the token, e.g. `merged` or `stitched`.
///
/// # Returns
/// The rewritten path. Names without a token are returned unchanged apart
/// from the compression extension.
pub fn to_merged(path: impl AsRef<Path>, tag: &str) -> PathBuf {
    let path = path.as_ref();
    let name = file_name_str(path);
    let rewritten = ORIENTATION_REWRITE
        .replace(&name, |caps: &regex::Captures| format!("{}{}{}", &caps[1], tag, &caps[2]))
        .into_owned();

    let merged = path.with_file_name(rewritten);
    if is_compressed(&merged) {
        rm_ext(&merged)
    } else {
        merged
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_regex_filter_bare_digits() {
        let files = paths(&["1.fastq", "2.fastq"]);
        let (one, two, rest) = regex_filter(&files);
        assert_eq!(one, paths(&["1.fastq"]));
        assert_eq!(two, paths(&["2.fastq"]));
        assert!(rest.is_empty());
    }

    #[test]
    fn test_regex_filter_mixed_delimiters() {
        let files = paths(&[
            "sample.a.r1.fastq",
            "sample_b.R2.fastq",
            "sample.c.r1.fastq",
            "sample-b.r1.fastq",
            "sample_c.r2.fastq",
            "sample-a.R2.fastq",
        ]);
        let (one, two, rest) = regex_filter(&files);
        assert_eq!(one, paths(&["sample.a.r1.fastq", "sample.c.r1.fastq", "sample-b.r1.fastq"]));
        assert_eq!(two, paths(&["sample_b.R2.fastq", "sample_c.r2.fastq", "sample-a.R2.fastq"]));
        assert!(rest.is_empty());
    }

    #[test]
    fn test_infer_pairs_case_insensitive() {
        let (pairs, rest) = infer_pairs(&paths(&["r1.fastq", "R2.fastq"]));
        assert_eq!(pairs, vec![(PathBuf::from("r1.fastq"), PathBuf::from("R2.fastq"))]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_infer_pairs_sorted_zip() {
        let files = paths(&[
            "sample_a.r1.fastq",
            "sample_b.r2.fastq",
            "sample_c.r1.fastq",
            "sample_b.r1.fastq",
            "sample_c.r2.fastq",
            "sample_a.r2.fastq",
        ]);
        let (pairs, rest) = infer_pairs(&files);
        assert!(rest.is_empty());
        assert_eq!(
            pairs,
            vec![
                (PathBuf::from("sample_a.r1.fastq"), PathBuf::from("sample_a.r2.fastq")),
                (PathBuf::from("sample_b.r1.fastq"), PathBuf::from("sample_b.r2.fastq")),
                (PathBuf::from("sample_c.r1.fastq"), PathBuf::from("sample_c.r2.fastq")),
            ]
        );
    }

    #[test]
    fn test_infer_pairs_unbalanced_demotes_everything() {
        let files = paths(&["a_r1.fastq", "b_r1.fastq", "c_r2.fastq", "notes.fastq"]);
        let (pairs, mut rest) = infer_pairs(&files);
        assert!(pairs.is_empty());
        rest.sort();
        let mut expected = files.clone();
        expected.sort();
        assert_eq!(rest, expected);
    }

    #[test]
    fn test_directory_names_are_ignored() {
        let files = paths(&["run_1/reads.fastq", "run_2/reads.fastq"]);
        let (pairs, rest) = infer_pairs(&files);
        assert!(pairs.is_empty());
        assert_eq!(rest, files);
    }

    #[test]
    fn test_to_merged() {
        assert_eq!(to_merged("koji_R1.fastq", "foo"), PathBuf::from("koji_foo.fastq"));
        assert_eq!(to_merged("koji_R1.fastq", "merged"), PathBuf::from("koji_merged.fastq"));
        assert_eq!(to_merged("2.fastq", "stitched"), PathBuf::from("stitched.fastq"));
        assert_eq!(to_merged("raw/s_1.fastq.gz", "align"), PathBuf::from("raw/s_align.fastq"));
        assert_eq!(to_merged("plain.fastq", "merged"), PathBuf::from("plain.fastq"));
    }

    #[test]
    fn test_split_pairs() {
        let inputs = vec![
            SeqInput::Pair(PathBuf::from("a_1.fq"), PathBuf::from("a_2.fq")),
            SeqInput::Single(PathBuf::from("b.fq")),
        ];
        let (pairs, singles) = split_pairs(&inputs);
        assert_eq!(pairs.len(), 1);
        assert_eq!(singles, vec![PathBuf::from("b.fq")]);
    }
}

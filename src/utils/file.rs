// src/utils/file.rs: filename derivation and extension-based guessing
//
// Nothing here touches the filesystem; every function is pure string work on
// paths so it can run at graph-construction time.

use std::path::{Path, PathBuf};

use crate::config::defs::{
    BAM_EXTS, BAM_TAG, BZIP2_EXTS, FASTA_EXTS, FASTA_TAG, FASTQ_EXTS, FASTQ_TAG, GZIP_EXTS,
    SAM_EXTS, SAM_TAG, SFF_EXTS, SFF_TAG,
};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
}


/// Places `name` (its file name only) inside `basedir`.
pub fn new_file(name: impl AsRef<Path>, basedir: &Path) -> PathBuf {
    match name.as_ref().file_name() {
        Some(file_name) => basedir.join(file_name),
        None => basedir.join(name.as_ref()),
    }
}

/// Builds a new path from `path`, optionally relocating it into `dir` and
/// decorating the stem (everything before the last extension).
///
/// # Arguments
///
/// * `path` - Source path.
/// * `dir` - Directory to resolve relative paths against.
/// * `prefix` - Text put before the stem, joined with `delimiter`.
/// * `suffix` - Text put after the stem, joined with `delimiter`.
/// * `delimiter` - Joiner between stem and decorations.
///
/// # Returns
/// PathBuf with the decorated file name.
pub fn file_path_manipulator(
    path: &Path,
    dir: Option<&Path>,
    prefix: Option<&str>,
    suffix: Option<&str>,
    delimiter: &str,
) -> PathBuf {
    let path = match dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    };
    if prefix.is_none() && suffix.is_none() {
        return path;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = split_last_ext(&file_name);

    let mut new_name = String::new();
    if let Some(prefix) = prefix {
        new_name.push_str(prefix);
        new_name.push_str(delimiter);
    }
    new_name.push_str(stem);
    if let Some(suffix) = suffix {
        new_name.push_str(delimiter);
        new_name.push_str(suffix);
    }
    if let Some(ext) = ext {
        new_name.push('.');
        new_name.push_str(ext);
    }

    path.with_file_name(new_name)
}

/// `dir/base.ext` -> `dir/base_tag.ext`.
pub fn add_tag(path: impl AsRef<Path>, tag: &str) -> PathBuf {
    file_path_manipulator(path.as_ref(), None, None, Some(tag), "_")
}

/// `name` -> `name.ext`
pub fn add_ext(path: impl AsRef<Path>, ext: &str) -> PathBuf {
    let mut name = path.as_ref().as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Removes the last extension only.
pub fn rm_ext(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    match path.file_name().map(|n| n.to_string_lossy().into_owned()) {
        Some(file_name) => {
            let (stem, _) = split_last_ext(&file_name);
            path.with_file_name(stem)
        }
        None => path.to_path_buf(),
    }
}

/// Strips every extension.
///
/// # Returns
/// The bare path and the removed extensions, outermost last
/// (`reads.fastq.gz` -> (`reads`, ["fastq", "gz"])).
pub fn extension_remover(path: &Path) -> (PathBuf, Vec<String>) {
    let file_name = match path.file_name() {
        Some(n) => n.to_string_lossy().into_owned(),
        None => return (path.to_path_buf(), Vec::new()),
    };

    let mut parts = file_name.split('.');
    let stem = parts.next().unwrap_or_default().to_string();
    let extensions: Vec<String> = parts.filter(|p| !p.is_empty()).map(String::from).collect();

    // dotfiles keep their name
    if stem.is_empty() {
        return (path.to_path_buf(), Vec::new());
    }
    (path.with_file_name(stem), extensions)
}

fn split_last_ext(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => (&file_name[..idx], Some(&file_name[idx + 1..])),
        _ => (file_name, None),
    }
}

fn last_ext(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase())
}

pub fn compression_of(path: impl AsRef<Path>) -> Option<Compression> {
    let ext = last_ext(path.as_ref())?;
    if GZIP_EXTS.contains(&ext.as_str()) {
        Some(Compression::Gzip)
    } else if BZIP2_EXTS.contains(&ext.as_str()) {
        Some(Compression::Bzip2)
    } else {
        None
    }
}

/// Extension-based compression check.
pub fn is_compressed(path: impl AsRef<Path>) -> bool {
    compression_of(path).is_some()
}

/// Guesses the sequence format from the extension, ignoring a trailing
/// compression extension.
///
/// # Returns
/// One of `fasta`, `fastq`, `sff`, `bam`, `sam`, or None when unknown.
pub fn guess_seq_filetype(path: impl AsRef<Path>) -> Option<&'static str> {
    let path = path.as_ref();
    let inner = if is_compressed(path) { rm_ext(path) } else { path.to_path_buf() };
    let ext = last_ext(&inner)?;

    let table: [(&[&str], &'static str); 5] = [
        (FASTQ_EXTS, FASTQ_TAG),
        (FASTA_EXTS, FASTA_TAG),
        (SFF_EXTS, SFF_TAG),
        (BAM_EXTS, BAM_TAG),
        (SAM_EXTS, SAM_TAG),
    ];
    table
        .iter()
        .find(|(exts, _)| exts.contains(&ext.as_str()))
        .map(|(_, tag)| *tag)
}

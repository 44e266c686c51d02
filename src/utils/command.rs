/// Functions and structs for working with creating command-line arguments

use std::fmt::Display;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};


/// Ordered option-name -> value map handed to a wrapped tool.
///
/// Keys carry no dashes; the dash prefix is inferred from the key length when
/// the flags are rendered. An empty value renders a bare boolean switch.
/// Insertion order is kept so the rendered command line is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolOptions(IndexMap<String, String>);

impl ToolOptions {
    pub fn new() -> Self {
        ToolOptions(IndexMap::new())
    }

    /// Sets `key`, replacing an existing value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    /// Builder form of [`ToolOptions::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    pub fn flag(mut self, key: impl Into<String>) -> Self {
        self.set(key, "");
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.shift_remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merges `self` over `defaults`: caller keys win, defaults keep their
    /// position, new caller keys are appended.
    pub fn merged_over(&self, defaults: &ToolOptions) -> ToolOptions {
        let mut merged = defaults.clone();
        for (key, value) in self.iter() {
            merged.set(key, value);
        }
        merged
    }
}

impl<K, V> FromIterator<(K, V)> for ToolOptions
where
    K: Into<String>,
    V: ToString,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut opts = ToolOptions::new();
        for (key, value) in iter {
            opts.set(key, value);
        }
        opts
    }
}


/// Renders options as command-line flags.
/// One-character keys get `-x value`, longer keys get `--long-name value`,
/// and empty values produce a bare flag.
///
/// Values are not quoted or escaped.
///
/// # Arguments
///
/// * `opts` - Options in the order they should appear.
///
/// # Returns
/// String of space-separated flags.
pub fn to_cmd_opts(opts: &ToolOptions) -> String {
    opts.iter()
        .map(|(key, value)| {
            let dashes = if key.chars().count() == 1 { "-" } else { "--" };
            render_flag(dashes, key, value)
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Renders options with a single dash regardless of key length, the flag
/// style of usearch (`-fastq_truncqual 10`).
pub fn to_single_dash_opts(opts: &ToolOptions) -> String {
    opts.iter()
        .map(|(key, value)| render_flag("-", key, value))
        .collect::<Vec<String>>()
        .join(" ")
}

fn render_flag(dashes: &str, key: &str, value: &str) -> String {
    if value.is_empty() {
        format!("{}{}", dashes, key)
    } else {
        format!("{}{} {}", dashes, key, value)
    }
}


/// Joins paths with `sep`, e.g. the comma lists qiime expects.
pub fn join_paths<P: AsRef<Path>>(paths: &[P], sep: &str) -> String {
    paths
        .iter()
        .map(|p| p.as_ref().to_string_lossy().into_owned())
        .collect::<Vec<String>>()
        .join(sep)
}


/// Shell command line under construction: program, arguments, rendered
/// flags and optional redirection.
#[derive(Debug, Clone)]
pub struct CommandLine {
    args_vec: Vec<String>,
    stdin: Option<String>,
    stdout: Option<String>,
}

impl CommandLine {
    pub fn new(program: &str) -> Self {
        CommandLine {
            args_vec: vec![program.to_string()],
            stdin: None,
            stdout: None,
        }
    }

    pub fn arg(mut self, arg: impl Display) -> Self {
        let arg = arg.to_string();
        if !arg.is_empty() {
            self.args_vec.push(arg);
        }
        self
    }

    pub fn path(self, path: &Path) -> Self {
        self.arg(path.display())
    }

    pub fn paths<P: AsRef<Path>>(mut self, paths: &[P]) -> Self {
        for p in paths {
            self.args_vec.push(p.as_ref().to_string_lossy().into_owned());
        }
        self
    }

    /// `--name value` pair with the name given verbatim.
    pub fn opt(self, name: &str, value: impl Display) -> Self {
        self.arg(name).arg(value)
    }

    pub fn opts(self, opts: &ToolOptions) -> Self {
        self.arg(to_cmd_opts(opts))
    }

    pub fn single_dash_opts(self, opts: &ToolOptions) -> Self {
        self.arg(to_single_dash_opts(opts))
    }

    pub fn stdin_from(mut self, path: &Path) -> Self {
        self.stdin = Some(path.display().to_string());
        self
    }

    pub fn stdout_to(mut self, path: &Path) -> Self {
        self.stdout = Some(path.display().to_string());
        self
    }

    pub fn build(&self) -> String {
        let mut cmd = self.args_vec.join(" ");
        if let Some(stdin) = &self.stdin {
            cmd.push_str(" < ");
            cmd.push_str(stdin);
        }
        if let Some(stdout) = &self.stdout {
            cmd.push_str(" > ");
            cmd.push_str(stdout);
        }
        cmd
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn reparse(flags: &str) -> Vec<(String, String)> {
        let mut parsed: Vec<(String, String)> = Vec::new();
        for token in flags.split_whitespace() {
            if let Some(key) = token.strip_prefix("--").or_else(|| token.strip_prefix('-')) {
                parsed.push((key.to_string(), String::new()));
            } else if let Some(last) = parsed.last_mut() {
                if !last.1.is_empty() {
                    last.1.push(' ');
                }
                last.1.push_str(token);
            }
        }
        parsed
    }

    #[test]
    fn test_dash_prefix_by_key_length() {
        let opts = ToolOptions::new()
            .with("M", 2)
            .with("barcode-type", "golay_12")
            .flag("f");
        assert_eq!(to_cmd_opts(&opts), "-M 2 --barcode-type golay_12 -f");
    }

    #[test]
    fn test_flags_reparse_to_original_pairs() {
        let opts = ToolOptions::new()
            .with("input_fp", "seqs.fna")
            .with("o", "out")
            .flag("force")
            .with("t", "KO")
            .with("with_confidence", "");
        let parsed = reparse(&to_cmd_opts(&opts));
        let original: Vec<(String, String)> = opts
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_single_dash_opts() {
        let opts = ToolOptions::new()
            .with("fastq_truncqual", 10)
            .with("fastq_maxdiffs", 3);
        assert_eq!(
            to_single_dash_opts(&opts),
            "-fastq_truncqual 10 -fastq_maxdiffs 3"
        );
    }

    #[test]
    fn test_merge_caller_wins_and_keeps_order() {
        let defaults = ToolOptions::new()
            .with("taxonomy_fp", "tax.txt")
            .with("reference_fp", "ref.fasta");
        let caller = ToolOptions::new()
            .with("reference_fp", "custom.fasta")
            .with("a", "");
        let merged = caller.merged_over(&defaults);
        let keys: Vec<&str> = merged.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["taxonomy_fp", "reference_fp", "a"]);
        assert_eq!(merged.get("reference_fp"), Some("custom.fasta"));
    }

    #[test]
    fn test_command_line_redirection() {
        let cmd = CommandLine::new("sequence_convert")
            .opt("--format", "fasta")
            .arg("-r")
            .path(&PathBuf::from("in.fna"))
            .stdout_to(&PathBuf::from("out.fna"))
            .build();
        assert_eq!(cmd, "sequence_convert --format fasta -r in.fna > out.fna");
    }

    #[test]
    fn test_empty_opts_add_nothing() {
        let cmd = CommandLine::new("biom").arg("convert").opts(&ToolOptions::new()).build();
        assert_eq!(cmd, "biom convert");
    }
}

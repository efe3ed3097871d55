//! Short unique labels for sets of paths
//!
//! Concurrent builds interleave their output, so every line is tagged with a
//! label naming the source tree, branch and flavor it came from. Labels are
//! derived in two phases:
//!
//! 1. Walk each path upward one directory at a time until every path has a
//!    directory name no other undecided path shares at that level.
//! 2. Scan the resulting names column by column to find where each one first
//!    differs from the rest, and keep three characters from there.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::{Error, Result};

/// Length of an abbreviation produced by the prefix phase
const ABBREV_LEN: usize = 3;

/// Injective mapping from paths to short display labels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbbreviationMap {
    entries: BTreeMap<Utf8PathBuf, String>,
}

impl AbbreviationMap {
    /// Resolve a label for every path in the set.
    ///
    /// Duplicate paths are collapsed. A single path resolves to its own
    /// directory name.
    pub fn resolve<P: AsRef<Utf8Path>>(paths: &[P]) -> Result<Self> {
        let paths: BTreeSet<Utf8PathBuf> =
            paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
        if paths.is_empty() {
            return Err(Error::abbreviation(
                "Cannot abbreviate an empty set of paths",
                "At least one path is required",
            ));
        }
        let paths: Vec<Utf8PathBuf> = paths.into_iter().collect();

        let labels = unique_basenames(&paths)?;
        if paths.len() == 1 {
            return Ok(Self {
                entries: paths.into_iter().zip(labels).collect(),
            });
        }

        let starts = unique_prefixes(&labels)?;
        let abbrevs: Vec<String> = labels
            .iter()
            .zip(&starts)
            .map(|(label, &start)| label.chars().skip(start).take(ABBREV_LEN).collect())
            .collect();

        // Strings distinguished at different columns can still truncate to
        // the same three characters
        let distinct: HashSet<&String> = abbrevs.iter().collect();
        let chosen = if distinct.len() == abbrevs.len() {
            abbrevs
        } else {
            tracing::debug!(
                ?labels,
                ?abbrevs,
                "Abbreviations collide, falling back to full directory names"
            );
            labels
        };

        Ok(Self {
            entries: paths.into_iter().zip(chosen).collect(),
        })
    }

    /// Label for a path, if it was part of the resolved set
    pub fn get(&self, path: &Utf8Path) -> Option<&str> {
        self.entries.get(path).map(|s| s.as_str())
    }

    /// Iterate over (path, label) pairs in path order
    pub fn iter(&self) -> impl Iterator<Item = (&Utf8Path, &str)> {
        self.entries
            .iter()
            .map(|(path, label)| (path.as_path(), label.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Directory names of a path from the innermost outward
fn name_chain(path: &Utf8Path) -> Vec<String> {
    let names: Vec<String> = path
        .components()
        .rev()
        .filter_map(|c| match c {
            camino::Utf8Component::Normal(name) => Some(name.to_string()),
            _ => None,
        })
        .collect();

    if names.is_empty() {
        vec![path.to_string()]
    } else {
        names
    }
}

/// Phase one: find, for each path, the first directory level (walking
/// upward from the basename) where its name is unique among the paths not
/// yet labelled. Labels are returned in input order.
pub fn unique_basenames(paths: &[Utf8PathBuf]) -> Result<Vec<String>> {
    let chains: Vec<Vec<String>> = paths.iter().map(|p| name_chain(p)).collect();

    if chains.len() == 1 {
        return Ok(vec![chains[0][0].clone()]);
    }

    let mut labels: Vec<Option<String>> = vec![None; paths.len()];
    let mut assigned: HashSet<String> = HashSet::new();
    let mut undecided: Vec<usize> = (0..paths.len()).collect();
    let mut level = 0;

    while !undecided.is_empty() {
        if let Some(&exhausted) = undecided.iter().find(|&&i| chains[i].len() <= level) {
            return Err(Error::abbreviation(
                format!("No unique label for {}", paths[exhausted]),
                "Every source tree must differ from the others in at least one directory name",
            ));
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for &i in &undecided {
            *counts.entry(chains[i][level].as_str()).or_default() += 1;
        }

        let mut still_undecided = Vec::new();
        for &i in &undecided {
            let name = &chains[i][level];
            if counts[name.as_str()] == 1 && !assigned.contains(name) {
                assigned.insert(name.clone());
                labels[i] = Some(name.clone());
            } else {
                still_undecided.push(i);
            }
        }

        undecided = still_undecided;
        level += 1;
    }

    Ok(labels.into_iter().flatten().collect())
}

/// Phase two: for each of a set of distinct strings, find the first column
/// at which its character occurs in no other remaining string.
///
/// Columns past the end of a string do not count for or against it. Once a
/// single string remains it starts at column zero.
pub fn unique_prefixes(labels: &[String]) -> Result<Vec<usize>> {
    let chars: Vec<Vec<char>> = labels.iter().map(|l| l.chars().collect()).collect();
    let max_len = chars.iter().map(Vec::len).max().unwrap_or(0);

    let mut starts: Vec<Option<usize>> = vec![None; labels.len()];
    let mut remaining: Vec<usize> = (0..labels.len()).collect();

    while !remaining.is_empty() {
        if let [last] = remaining[..] {
            starts[last] = Some(0);
            break;
        }

        let mut resolved = Vec::new();
        for col in 0..max_len {
            let mut counts: HashMap<char, usize> = HashMap::new();
            for &i in &remaining {
                if let Some(&c) = chars[i].get(col) {
                    *counts.entry(c).or_default() += 1;
                }
            }

            resolved = remaining
                .iter()
                .copied()
                .filter(|&i| chars[i].get(col).is_some_and(|c| counts[c] == 1))
                .collect();

            if !resolved.is_empty() {
                for &i in &resolved {
                    starts[i] = Some(col);
                }
                break;
            }
        }

        if resolved.is_empty() {
            let names: Vec<&str> = remaining.iter().map(|&i| labels[i].as_str()).collect();
            return Err(Error::abbreviation(
                format!("No unique prefix among {:?}", names),
                "Rename the source trees or branches so their names differ in some position",
            ));
        }
        remaining.retain(|i| !resolved.contains(i));
    }

    Ok(starts.into_iter().flatten().collect())
}

//! Deterministic, lexically sortable checkpoint file names.
//!
//! - domain file: `<prefix><name>_<cycle>/domain_<rank>.<ext>`
//! - root file: `<prefix><name>_<cycle>.root`
//!
//! Cycle and rank are zero-padded to configurable widths.

use std::path::PathBuf;

use crate::io::Protocol;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileLayout {
    pub prefix_path: String,
    pub name: String,
    pub pad_digits_cycle: usize,
    pub pad_digits_rank: usize,
}

impl FileLayout {
    pub fn new(prefix_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            prefix_path: prefix_path.into(),
            name: name.into(),
            pad_digits_cycle: 5,
            pad_digits_rank: 5,
        }
    }

    fn stem(&self, cycle: u64) -> String {
        format!(
            "{}{}_{:0width$}",
            self.prefix_path,
            self.name,
            cycle,
            width = self.pad_digits_cycle
        )
    }

    /// Directory holding every domain file of `cycle`.
    pub fn directory(&self, cycle: u64) -> PathBuf {
        PathBuf::from(self.stem(cycle))
    }

    pub fn domain_file(&self, cycle: u64, domain_id: usize, protocol: Protocol) -> PathBuf {
        PathBuf::from(format!(
            "{}/domain_{:0width$}.{}",
            self.stem(cycle),
            domain_id,
            protocol.name(),
            width = self.pad_digits_rank
        ))
    }

    pub fn root_file(&self, cycle: u64) -> PathBuf {
        PathBuf::from(format!("{}.root", self.stem(cycle)))
    }

    /// printf-style pattern of the domain files, parameterized by the
    /// zero-padded domain id.
    pub fn file_pattern(&self, cycle: u64, protocol: Protocol) -> String {
        format!(
            "{}/domain_%0{}d.{}",
            self.stem(cycle),
            self.pad_digits_rank,
            protocol.name()
        )
    }
}

//! Histogram files: the input store and the persisted output snapshots
//!
//! A histogram file maps each category (directory) to its named histograms.
//! Files whose name ends in `.json` are stored as JSON, which is convenient
//! for hand-made inputs, and any other file is a compact binary snapshot.

use crate::{histogram::Histogram, numeric::Float, Result};

use eyre::WrapErr;
use serde::{Deserialize, Serialize};

use std::{collections::BTreeMap, fs, path::Path};

/// Source of named input histograms
pub trait HistogramSource {
    /// Fetch the histogram `name` of category `category`, if it exists
    fn fetch(&self, category: &str, name: &str) -> Result<Option<Histogram>>;
}

/// Serialized form of a histogram
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HistogramRecord {
    /// Bin edges
    pub edges: Vec<Float>,

    /// Bin contents
    pub content: Vec<Float>,

    /// Bin uncertainties
    pub uncertainty: Vec<Float>,
}
//
impl From<&Histogram> for HistogramRecord {
    fn from(hist: &Histogram) -> Self {
        Self {
            edges: hist.edges().to_vec(),
            content: hist.contents().iter().copied().collect(),
            uncertainty: hist.uncertainties().iter().copied().collect(),
        }
    }
}

/// On-disk encoding of a histogram file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Encoding {
    Json,
    Binary,
}
//
impl Encoding {
    /// Pick the encoding of a file from its extension
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::Json,
            _ => Self::Binary,
        }
    }
}

/// In-memory content of a histogram file
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HistogramFile(BTreeMap<String, BTreeMap<String, HistogramRecord>>);
//
impl HistogramFile {
    /// Read a histogram file
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .wrap_err_with(|| format!("Could not read histogram file {}", path.display()))?;
        let decoded = match Encoding::of(path) {
            Encoding::Json => serde_json::from_slice(&bytes).map_err(eyre::Report::from),
            Encoding::Binary => bincode::deserialize(&bytes).map_err(eyre::Report::from),
        };
        decoded.wrap_err_with(|| format!("Could not decode histogram file {}", path.display()))
    }

    /// Write this histogram file to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = match Encoding::of(path) {
            Encoding::Json => serde_json::to_vec_pretty(self).map_err(eyre::Report::from),
            Encoding::Binary => bincode::serialize(self).map_err(eyre::Report::from),
        }
        .wrap_err("Could not encode histograms")?;
        fs::write(path, bytes)
            .wrap_err_with(|| format!("Could not write histogram file {}", path.display()))?;
        tracing::info!(path = %path.display(), "histograms written");
        Ok(())
    }

    /// Store a histogram of a category under its name, replacing any
    /// previous histogram of the same name
    pub fn insert(&mut self, category: &str, hist: &Histogram) {
        self.0
            .entry(category.to_owned())
            .or_default()
            .insert(hist.name().to_owned(), hist.into());
    }

    /// Names of the histograms of a category
    pub fn names(&self, category: &str) -> Vec<&str> {
        self.0
            .get(category)
            .map(|hists| hists.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}
//
impl HistogramSource for HistogramFile {
    fn fetch(&self, category: &str, name: &str) -> Result<Option<Histogram>> {
        let Some(record) = self.0.get(category).and_then(|hists| hists.get(name)) else {
            return Ok(None);
        };
        Histogram::from_parts(
            name,
            record.edges.clone(),
            record.content.clone(),
            record.uncertainty.clone(),
        )
        .wrap_err_with(|| format!("Malformed histogram {}/{}", category, name))
        .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::tests::hist;

    fn sample_file() -> HistogramFile {
        let mut file = HistogramFile::default();
        file.insert("muTau_vbf", &hist("ZTT", 10., &[1., 2., 3.], &[0.1, 0.2, 0.3]));
        file.insert("muTau_vbf", &hist("data_obs", 10., &[1., 0., 4.], &[1., 0., 2.]));
        file
    }

    #[test]
    fn fetches_by_category_and_name() {
        let file = sample_file();
        let ztt = file.fetch("muTau_vbf", "ZTT").unwrap().unwrap();
        assert_eq!(ztt.name(), "ZTT");
        assert_eq!(ztt.contents().as_slice(), &[1., 2., 3.]);
        assert!(file.fetch("muTau_vbf", "QCD").unwrap().is_none());
        assert!(file.fetch("muTau_btag", "ZTT").unwrap().is_none());
        assert_eq!(file.names("muTau_vbf"), ["ZTT", "data_obs"]);
    }

    #[test]
    fn malformed_records_are_errors() {
        let json = r#"{"cat": {"bad": {"edges": [0.0, 1.0], "content": [], "uncertainty": []}}}"#;
        let file: HistogramFile = serde_json::from_str(json).unwrap();
        assert!(file.fetch("cat", "bad").is_err());
    }

    #[test]
    fn json_and_binary_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = sample_file();
        for name in ["hists.json", "hists.bin"] {
            let path = dir.path().join(name);
            file.save(&path).unwrap();
            assert_eq!(HistogramFile::open(&path).unwrap(), file);
        }
        let json = fs::read_to_string(dir.path().join("hists.json")).unwrap();
        assert!(json.contains("\"muTau_vbf\""));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nothing.bin");
        let err = HistogramFile::open(&path).unwrap_err();
        assert!(err.to_string().contains("nothing.bin"));
    }
}

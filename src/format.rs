use std::path::Path;

use serde::{Deserialize, Serialize};

/// Interchange formats known to the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Fit,
    Tcx,
    Zwift,
    Krd,
}

impl Format {
    /// Detect a format from a file extension (`fit`, `tcx`, `zwo`, `json`, `krd`).
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "fit" => Some(Format::Fit),
            "tcx" => Some(Format::Tcx),
            "zwo" => Some(Format::Zwift),
            "json" | "krd" => Some(Format::Krd),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Whether payloads of this format are text rather than bytes.
    pub fn is_text(&self) -> bool {
        !matches!(self, Format::Fit)
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Format::Fit => "FIT",
            Format::Tcx => "TCX",
            Format::Zwift => "Zwift",
            Format::Krd => "KRD",
        })
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zwift" => Ok(Format::Zwift),
            other => {
                Format::from_extension(other).ok_or_else(|| format!("Invalid format: {}", s))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_path(Path::new("ride.FIT")), Some(Format::Fit));
        assert_eq!(Format::from_path(Path::new("a/b/w.zwo")), Some(Format::Zwift));
        assert_eq!(Format::from_path(Path::new("w.json")), Some(Format::Krd));
        assert_eq!(Format::from_path(Path::new("w.gpx")), None);
        assert_eq!("zwift".parse::<Format>().unwrap(), Format::Zwift);
        assert!("gpx".parse::<Format>().is_err());
    }
}

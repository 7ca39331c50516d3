//! Reader and writer seams shared by the format adapters.
//!
//! Every adapter turns its own payload type into a [`Krd`] and back. The
//! round-trip validator and the command-line tool only talk to these traits.

use std::path::Path;

use crate::error::Result;
use crate::fit::{FitReader, FitWriter};
use crate::format::Format;
use crate::schema::Krd;
use crate::tcx::{TcxReader, TcxWriter};
use crate::zwift::{ZwiftReader, ZwiftWriter};

/// Decodes a format payload into the canonical model
pub trait KrdReader {
    /// Raw bytes for FIT, UTF-8 text for the XML formats
    type Payload;

    fn format(&self) -> Format;

    fn read(&self, payload: &Self::Payload) -> Result<Krd>;

    /// Check if this reader handles the given file, by extension
    fn can_read(&self, path: &Path) -> bool {
        Format::from_path(path) == Some(self.format())
    }
}

/// Encodes the canonical model into a format payload
pub trait KrdWriter {
    type Payload;

    fn format(&self) -> Format;

    fn write(&self, krd: &Krd) -> Result<Self::Payload>;
}

impl KrdReader for FitReader {
    type Payload = Vec<u8>;

    fn format(&self) -> Format {
        Format::Fit
    }

    fn read(&self, payload: &Vec<u8>) -> Result<Krd> {
        self.read_to_krd(payload)
    }
}

impl KrdWriter for FitWriter {
    type Payload = Vec<u8>;

    fn format(&self) -> Format {
        Format::Fit
    }

    fn write(&self, krd: &Krd) -> Result<Vec<u8>> {
        FitWriter::write(self, krd)
    }
}

impl KrdReader for TcxReader {
    type Payload = String;

    fn format(&self) -> Format {
        Format::Tcx
    }

    fn read(&self, payload: &String) -> Result<Krd> {
        self.read_to_krd(payload)
    }
}

impl KrdWriter for TcxWriter {
    type Payload = String;

    fn format(&self) -> Format {
        Format::Tcx
    }

    fn write(&self, krd: &Krd) -> Result<String> {
        TcxWriter::write(self, krd)
    }
}

impl KrdReader for ZwiftReader {
    type Payload = String;

    fn format(&self) -> Format {
        Format::Zwift
    }

    fn read(&self, payload: &String) -> Result<Krd> {
        self.read_to_krd(payload)
    }
}

impl KrdWriter for ZwiftWriter {
    type Payload = String;

    fn format(&self) -> Format {
        Format::Zwift
    }

    fn write(&self, krd: &Krd) -> Result<String> {
        ZwiftWriter::write(self, krd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_read_by_extension() {
        assert!(FitReader::new().can_read(Path::new("morning.fit")));
        assert!(TcxReader::new().can_read(Path::new("plan.TCX")));
        assert!(ZwiftReader::new().can_read(Path::new("ftp.zwo")));
        assert!(!ZwiftReader::new().can_read(Path::new("ftp.tcx")));
    }

    #[test]
    fn test_writer_formats() {
        assert_eq!(KrdWriter::format(&FitWriter::new()), Format::Fit);
        assert_eq!(KrdWriter::format(&TcxWriter::new()), Format::Tcx);
        assert_eq!(KrdWriter::format(&ZwiftWriter::new()), Format::Zwift);
    }
}

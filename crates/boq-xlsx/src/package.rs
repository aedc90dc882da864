use std::collections::BTreeSet;
use std::io::Cursor;
use std::sync::Mutex;

use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::zip_util::{
    read_entry_bytes_with_budget, ZipInflateBudget, DEFAULT_MAX_ENTRY_BYTES,
    DEFAULT_MAX_TOTAL_BYTES,
};

/// Size limits enforced while a [`Package`] inflates entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageLimits {
    /// Maximum allowed uncompressed bytes for any single entry.
    pub max_part_bytes: u64,
    /// Maximum allowed uncompressed bytes across the whole package.
    pub max_total_bytes: u64,
}

impl Default for PackageLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: DEFAULT_MAX_ENTRY_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The input is not a readable ZIP container (garbage, or a truncated central directory).
    #[error("corrupt spreadsheet archive: {0}")]
    CorruptArchive(#[source] zip::result::ZipError),
    /// One entry could not be inflated (bad deflate stream, checksum mismatch, unsupported
    /// compression). The rest of the package stays readable.
    #[error("corrupt package entry {part}: {source}")]
    CorruptEntry {
        part: String,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("missing package entry: {0}")]
    EntryNotFound(String),
    #[error("package entry is not valid utf-8: {0}")]
    NonUtf8Entry(String),
    #[error(
        "package entry is too large to load safely: {part} is {size} bytes (max {max} bytes)"
    )]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error("package is too large to load safely: {total} bytes uncompressed (max {max})")]
    PackageTooLarge { total: u64, max: u64 },
}

struct PackageReader<'a> {
    zip: ZipArchive<Cursor<&'a [u8]>>,
    budget: ZipInflateBudget,
}

/// An opened spreadsheet container.
///
/// Opening only reads the central directory. Entries are inflated on demand by
/// [`Package::read_entry`], each under [`PackageLimits::max_part_bytes`] and all of them
/// together under [`PackageLimits::max_total_bytes`], so a damaged or oversized entry only
/// affects the callers that ask for it.
///
/// Lookups are exact and case-sensitive. Directory entries are not listed.
pub struct Package<'a> {
    names: BTreeSet<String>,
    limits: PackageLimits,
    reader: Mutex<PackageReader<'a>>,
}

impl<'a> Package<'a> {
    pub fn open(bytes: &'a [u8]) -> Result<Self, ExtractError> {
        Self::open_limited(bytes, PackageLimits::default())
    }

    pub fn open_limited(bytes: &'a [u8], limits: PackageLimits) -> Result<Self, ExtractError> {
        let zip = ZipArchive::new(Cursor::new(bytes)).map_err(ExtractError::CorruptArchive)?;
        let names = zip
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect();

        Ok(Self {
            names,
            limits,
            reader: Mutex::new(PackageReader {
                zip,
                budget: ZipInflateBudget::new(limits.max_total_bytes),
            }),
        })
    }

    pub fn contains_entry(&self, path: &str) -> bool {
        self.names.contains(path)
    }

    /// Inflate one entry.
    ///
    /// Fails with [`ExtractError::EntryNotFound`] for unknown names,
    /// [`ExtractError::CorruptEntry`] when the entry's data is damaged, and
    /// [`ExtractError::PartTooLarge`] / [`ExtractError::PackageTooLarge`] when a limit would be
    /// exceeded. None of these poison the package for other entries.
    pub fn read_entry(&self, path: &str) -> Result<Vec<u8>, ExtractError> {
        if !self.names.contains(path) {
            return Err(ExtractError::EntryNotFound(path.to_string()));
        }

        let mut reader = self.reader.lock().expect("package reader mutex poisoned");
        let PackageReader { zip, budget } = &mut *reader;
        let mut file = match zip.by_name(path) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => {
                return Err(ExtractError::EntryNotFound(path.to_string()))
            }
            Err(source) => {
                return Err(ExtractError::CorruptEntry {
                    part: path.to_string(),
                    source,
                })
            }
        };

        let declared_size = file.size();
        read_entry_bytes_with_budget(
            &mut file,
            declared_size,
            path,
            self.limits.max_part_bytes,
            budget,
        )
    }

    pub fn read_entry_text(&self, path: &str) -> Result<String, ExtractError> {
        let bytes = self.read_entry(path)?;
        String::from_utf8(bytes).map_err(|_| ExtractError::NonUtf8Entry(path.to_string()))
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl std::fmt::Debug for Package<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("entries", &self.names.len())
            .field("limits", &self.limits)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn build_package(entries: &[(&str, &[u8])]) -> Vec<u8> {
        build_package_with(entries, CompressionMethod::Deflated)
    }

    fn build_package_with(entries: &[(&str, &[u8])], method: CompressionMethod) -> Vec<u8> {
        let cursor = Cursor::new(Vec::new());
        let mut zip = ZipWriter::new(cursor);
        let options = FileOptions::<()>::default().compression_method(method);
        for (name, bytes) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn read_entry_is_exact_and_case_sensitive() {
        let bytes = build_package(&[("xl/media/image1.png", b"png")]);
        let pkg = Package::open(&bytes).unwrap();

        assert_eq!(pkg.read_entry("xl/media/image1.png").unwrap(), b"png");
        assert!(matches!(
            pkg.read_entry("XL/media/image1.png"),
            Err(ExtractError::EntryNotFound(path)) if path == "XL/media/image1.png"
        ));
        assert!(matches!(
            pkg.read_entry("/xl/media/image1.png"),
            Err(ExtractError::EntryNotFound(_))
        ));
    }

    #[test]
    fn directory_entries_are_not_listed() {
        let cursor = Cursor::new(Vec::new());
        let mut zip = ZipWriter::new(cursor);
        let options = FileOptions::<()>::default();
        zip.add_directory("xl/media/", options).unwrap();
        zip.start_file("xl/media/image1.png", options).unwrap();
        zip.write_all(b"png").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let pkg = Package::open(&bytes).unwrap();
        assert_eq!(pkg.entry_names().collect::<Vec<_>>(), vec!["xl/media/image1.png"]);
        assert!(matches!(
            pkg.read_entry("xl/media/"),
            Err(ExtractError::EntryNotFound(_))
        ));
    }

    #[test]
    fn read_entry_text_rejects_invalid_utf8() {
        let bytes = build_package(&[("xl/drawings/drawing1.xml", b"\xFF\xFE<x/>")]);
        let pkg = Package::open(&bytes).unwrap();
        assert!(matches!(
            pkg.read_entry_text("xl/drawings/drawing1.xml"),
            Err(ExtractError::NonUtf8Entry(_))
        ));
    }

    #[test]
    fn garbage_bytes_are_a_corrupt_archive() {
        let err = Package::open(b"definitely not a zip file").unwrap_err();
        assert!(matches!(err, ExtractError::CorruptArchive(_)), "{err:?}");
    }

    #[test]
    fn truncated_archive_is_corrupt() {
        let bytes = build_package(&[("xl/media/image1.png", b"png bytes")]);
        let truncated = &bytes[..bytes.len() / 2];
        let err = Package::open(truncated).unwrap_err();
        assert!(matches!(err, ExtractError::CorruptArchive(_)), "{err:?}");
    }

    #[test]
    fn damaged_entry_fails_only_its_own_read() {
        let mut bytes = build_package_with(
            &[
                ("xl/worksheets/sheet1.xml", b"<worksheet>SHEET-DATA</worksheet>"),
                ("xl/media/image1.png", b"png bytes"),
            ],
            CompressionMethod::Stored,
        );
        let pos = bytes
            .windows(b"SHEET-DATA".len())
            .position(|w| w == b"SHEET-DATA")
            .unwrap();
        bytes[pos] ^= 0xFF;

        let pkg = Package::open(&bytes).expect("central directory is intact");
        let err = pkg.read_entry("xl/worksheets/sheet1.xml").unwrap_err();
        assert!(
            matches!(&err, ExtractError::CorruptEntry { part, .. } if part == "xl/worksheets/sheet1.xml"),
            "{err:?}"
        );
        assert_eq!(pkg.read_entry("xl/media/image1.png").unwrap(), b"png bytes");
    }

    #[test]
    fn total_limit_is_shared_across_reads() {
        let bytes = build_package(&[("a.bin", b"0123456789"), ("b.bin", b"0123456789")]);
        let limits = PackageLimits {
            max_part_bytes: 10,
            max_total_bytes: 10,
        };
        let pkg = Package::open_limited(&bytes, limits).expect("open is lazy");

        assert_eq!(pkg.read_entry("a.bin").unwrap(), b"0123456789");
        match pkg.read_entry("b.bin") {
            Err(ExtractError::PackageTooLarge { total, max }) => {
                assert_eq!(max, 10);
                assert!(total > max, "expected reported total ({total}) to exceed max ({max})");
            }
            other => panic!("expected PackageTooLarge error, got {other:?}"),
        }
    }

    #[test]
    fn oversized_part_fails_only_its_own_read() {
        let bytes = build_package(&[
            ("xl/media/too-big.png", b"0123456789A"),
            ("xl/media/small.png", b"small"),
        ]);
        let limits = PackageLimits {
            max_part_bytes: 10,
            max_total_bytes: 100,
        };
        let pkg = Package::open_limited(&bytes, limits).expect("open is lazy");

        match pkg.read_entry("xl/media/too-big.png") {
            Err(ExtractError::PartTooLarge { part, size, max }) => {
                assert_eq!(part, "xl/media/too-big.png");
                assert_eq!(size, 11);
                assert_eq!(max, 10);
            }
            other => panic!("expected PartTooLarge error, got {other:?}"),
        }
        assert_eq!(pkg.read_entry("xl/media/small.png").unwrap(), b"small");
    }
}

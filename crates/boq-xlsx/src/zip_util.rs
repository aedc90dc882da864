use std::io::Read;

use crate::ExtractError;

/// Default maximum uncompressed size permitted for any single ZIP entry inflated into memory.
///
/// This is a defense-in-depth guardrail against ZIP bombs (tiny compressed size, huge uncompressed
/// size) and forged ZIP metadata (e.g. an incorrect `uncompressed_size` field).
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 256 * 1024 * 1024; // 256MiB

/// Default maximum total uncompressed bytes permitted across a whole package.
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 512 * 1024 * 1024; // 512MiB

#[derive(Debug, Clone)]
pub(crate) struct ZipInflateBudget {
    max_total_bytes: u64,
    used_bytes: u64,
}

impl ZipInflateBudget {
    pub(crate) fn new(max_total_bytes: u64) -> Self {
        Self {
            max_total_bytes,
            used_bytes: 0,
        }
    }

    fn remaining_bytes(&self) -> u64 {
        self.max_total_bytes.saturating_sub(self.used_bytes)
    }

    fn consume(&mut self, bytes: u64) -> Result<(), ExtractError> {
        self.used_bytes = self.used_bytes.checked_add(bytes).unwrap_or(u64::MAX);
        if self.used_bytes > self.max_total_bytes {
            return Err(ExtractError::PackageTooLarge {
                total: self.used_bytes,
                max: self.max_total_bytes,
            });
        }
        Ok(())
    }
}

/// Inflate one ZIP entry into memory under both a per-entry limit and the package budget.
///
/// This helper does **not** trust ZIP metadata alone. It:
/// - checks the declared uncompressed size as a fast-path;
/// - reads via `Read::take(max + 1)` to guard against forged metadata;
/// - and errors deterministically if more than the effective limit is observed.
///
/// I/O errors while inflating (bad deflate stream, CRC mismatch) mean this entry is damaged and
/// surface as [`ExtractError::CorruptEntry`].
pub(crate) fn read_entry_bytes_with_budget(
    reader: impl Read,
    declared_size: u64,
    part: &str,
    max_part_bytes: u64,
    budget: &mut ZipInflateBudget,
) -> Result<Vec<u8>, ExtractError> {
    fn add_or_max(a: u64, b: u64) -> u64 {
        a.checked_add(b).unwrap_or(u64::MAX)
    }

    let used_before = budget.used_bytes;
    let effective_max = max_part_bytes.min(budget.remaining_bytes());
    let limit_is_total = effective_max < max_part_bytes;

    // Fast-path: reject based on declared uncompressed size.
    if declared_size > max_part_bytes {
        return Err(ExtractError::PartTooLarge {
            part: part.to_string(),
            size: declared_size,
            max: max_part_bytes,
        });
    }
    if limit_is_total && declared_size > effective_max {
        return Err(ExtractError::PackageTooLarge {
            total: add_or_max(used_before, declared_size),
            max: budget.max_total_bytes,
        });
    }

    let mut buf = Vec::new();
    let read_limit = effective_max.checked_add(1).unwrap_or(u64::MAX);
    reader
        .take(read_limit)
        .read_to_end(&mut buf)
        .map_err(|err| ExtractError::CorruptEntry {
            part: part.to_string(),
            source: zip::result::ZipError::Io(err),
        })?;

    let observed = buf.len() as u64;
    if observed > effective_max {
        if limit_is_total {
            return Err(ExtractError::PackageTooLarge {
                total: add_or_max(used_before, observed),
                max: budget.max_total_bytes,
            });
        }
        return Err(ExtractError::PartTooLarge {
            part: part.to_string(),
            size: observed,
            max: max_part_bytes,
        });
    }

    budget.consume(observed)?;
    Ok(buf)
}

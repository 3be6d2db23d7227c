//! Error taxonomy for HDF5 format operations
//!
//! Errors are classified by category: structural decode failures, semantic
//! inconsistencies between structures, missed lookups, capacity limits,
//! deliberately unsupported format features and backend I/O failures.
//! Every variant carries a static context string naming the structure (and
//! where useful the field) that produced it.

use core::fmt;

/// Errors that can occur while decoding, encoding or mutating the on-disk
/// structures of an HDF5 file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A magic signature did not match the named structure.
    BadSignature(&'static str),
    /// The file does not start with the HDF5 format signature at any of
    /// the candidate superblock offsets.
    NotAnHdf5File,
    /// A version byte this engine does not understand.
    UnsupportedVersion {
        structure: &'static str,
        version: u8,
    },
    /// Input ended before the named structure or field was complete.
    Truncated(&'static str),
    /// A stored checksum did not match the recomputed value.
    ChecksumMismatch(&'static str),
    /// A field value falls outside its declared range.
    FieldOutOfRange(&'static str),
    /// An address or reference is null or UNDEF where a real one is
    /// required, or points at a structure of the wrong kind.
    InvalidAddress(&'static str),
    /// Cross-structure bookkeeping does not add up (record counts,
    /// heap-id types, object ids).
    Inconsistent(&'static str),
    /// A named attribute, link or object does not exist.
    NotFound(&'static str),
    /// An encoded image would exceed the space reserved for it.
    CapacityExceeded(&'static str),
    /// A feature of the format this engine deliberately does not
    /// implement (SZIP, virtual layout, write-side continuations, ...).
    Unsupported(&'static str),
    /// The underlying byte source or sink failed.
    Backend(&'static str),
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Signatures, versions, truncation, checksums, field ranges
    Structural,
    /// Cross-structure consistency and reference validity
    Semantic,
    /// Lookups by name or address that found nothing
    NotFound,
    /// Images or fields that no longer fit their reserved space
    Capacity,
    /// Format features outside the engine's scope
    Unsupported,
    /// Underlying I/O
    Backend,
}

impl FormatError {
    /// Get the error category for this error
    pub const fn category(&self) -> ErrorCategory {
        match self {
            FormatError::BadSignature(_)
            | FormatError::NotAnHdf5File
            | FormatError::UnsupportedVersion { .. }
            | FormatError::Truncated(_)
            | FormatError::ChecksumMismatch(_)
            | FormatError::FieldOutOfRange(_) => ErrorCategory::Structural,
            FormatError::InvalidAddress(_) | FormatError::Inconsistent(_) => {
                ErrorCategory::Semantic
            }
            FormatError::NotFound(_) => ErrorCategory::NotFound,
            FormatError::CapacityExceeded(_) => ErrorCategory::Capacity,
            FormatError::Unsupported(_) => ErrorCategory::Unsupported,
            FormatError::Backend(_) => ErrorCategory::Backend,
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::BadSignature(ctx) => write!(f, "bad signature in {ctx}"),
            FormatError::NotAnHdf5File => write!(f, "not an HDF5 file"),
            FormatError::UnsupportedVersion { structure, version } => {
                write!(f, "unsupported {structure} version {version}")
            }
            FormatError::Truncated(ctx) => write!(f, "truncated input while reading {ctx}"),
            FormatError::ChecksumMismatch(ctx) => write!(f, "checksum mismatch in {ctx}"),
            FormatError::FieldOutOfRange(ctx) => write!(f, "field out of range: {ctx}"),
            FormatError::InvalidAddress(ctx) => write!(f, "invalid address: {ctx}"),
            FormatError::Inconsistent(ctx) => write!(f, "inconsistent structure: {ctx}"),
            FormatError::NotFound(ctx) => write!(f, "not found: {ctx}"),
            FormatError::CapacityExceeded(ctx) => write!(f, "capacity exceeded: {ctx}"),
            FormatError::Unsupported(ctx) => write!(f, "unsupported feature: {ctx}"),
            FormatError::Backend(ctx) => write!(f, "backend error: {ctx}"),
        }
    }
}

impl core::error::Error for FormatError {}

/// Result type for format operations
pub type Result<T> = core::result::Result<T, FormatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            FormatError::BadSignature("superblock").category(),
            ErrorCategory::Structural
        );
        assert_eq!(
            FormatError::InvalidAddress("root group").category(),
            ErrorCategory::Semantic
        );
        assert_eq!(
            FormatError::NotFound("attribute").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            FormatError::CapacityExceeded("object header chunk 0").category(),
            ErrorCategory::Capacity
        );
        assert_eq!(
            FormatError::Unsupported("szip").category(),
            ErrorCategory::Unsupported
        );
        assert_eq!(
            FormatError::Backend("read").category(),
            ErrorCategory::Backend
        );
    }

    #[test]
    fn test_display_carries_context() {
        use alloc::string::ToString;
        let msg = FormatError::Truncated("fractal heap header").to_string();
        assert!(msg.contains("fractal heap header"));
    }
}

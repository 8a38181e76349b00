pub mod checksum;
pub mod spamsum;

pub use checksum::document_checksum;
pub use spamsum::SpamSum;

/// A similarity-preserving digest over raw bytes.
///
/// `compare` must be total: malformed digests score 0 instead of failing.
pub trait FuzzyHasher: Send + Sync {
    fn hash(&self, data: &[u8]) -> String;

    /// Similarity of two digests in `0..=100`.
    fn compare(&self, a: &str, b: &str) -> u32;
}

//! Context-triggered piecewise hashing in the spamsum/ssdeep family.
//!
//! A rolling hash over a 7-byte window decides where to cut the input into
//! chunks; each chunk contributes one base64 character of an FNV-style hash.
//! A local edit only changes the characters of the chunks it touches, so the
//! edit distance between two digests tracks how much the inputs differ.
//!
//! Digest format: `<block_size>:<signature>:<double_block_signature>`.

use ahash::AHashSet;

use super::FuzzyHasher;

const ROLLING_WINDOW: usize = 7;
const MIN_BLOCKSIZE: u64 = 3;
const SPAMSUM_LENGTH: usize = 64;
const HASH_PRIME: u32 = 0x0100_0193;
const HASH_INIT: u32 = 0x2802_1967;
const MAX_SEQUENCE: usize = 3;

const B64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

#[derive(Debug, Clone, Copy, Default)]
pub struct SpamSum;

impl SpamSum {
    pub fn new() -> Self {
        SpamSum
    }
}

impl FuzzyHasher for SpamSum {
    fn hash(&self, data: &[u8]) -> String {
        digest(data)
    }

    fn compare(&self, a: &str, b: &str) -> u32 {
        compare(a, b)
    }
}

struct RollingHash {
    window: [u8; ROLLING_WINDOW],
    h1: u32,
    h2: u32,
    h3: u32,
    n: usize,
}

impl RollingHash {
    fn new() -> Self {
        Self {
            window: [0; ROLLING_WINDOW],
            h1: 0,
            h2: 0,
            h3: 0,
            n: 0,
        }
    }

    fn update(&mut self, c: u8) {
        let slot = self.n % ROLLING_WINDOW;
        self.h2 = self.h2.wrapping_sub(self.h1);
        self.h2 = self
            .h2
            .wrapping_add((ROLLING_WINDOW as u32).wrapping_mul(c as u32));
        self.h1 = self.h1.wrapping_add(c as u32);
        self.h1 = self.h1.wrapping_sub(self.window[slot] as u32);
        self.window[slot] = c;
        self.n = self.n.wrapping_add(1);
        self.h3 = (self.h3 << 5) ^ c as u32;
    }

    fn sum(&self) -> u32 {
        self.h1.wrapping_add(self.h2).wrapping_add(self.h3)
    }
}

fn sum_hash(c: u8, h: u32) -> u32 {
    h.wrapping_mul(HASH_PRIME) ^ c as u32
}

fn b64(h: u32) -> char {
    B64[(h % 64) as usize] as char
}

/// Hash `data` into a digest string.
pub fn digest(data: &[u8]) -> String {
    let mut block_size = MIN_BLOCKSIZE;
    while block_size * (SPAMSUM_LENGTH as u64) < data.len() as u64 {
        block_size *= 2;
    }

    loop {
        let (sig1, sig2) = signatures(data, block_size);
        if block_size > MIN_BLOCKSIZE && sig1.len() < SPAMSUM_LENGTH / 2 {
            block_size /= 2;
            continue;
        }
        return format!("{}:{}:{}", block_size, sig1, sig2);
    }
}

fn signatures(data: &[u8], block_size: u64) -> (String, String) {
    let mut roll = RollingHash::new();
    let mut h1 = HASH_INIT;
    let mut h2 = HASH_INIT;
    let mut sig1 = String::with_capacity(SPAMSUM_LENGTH);
    let mut sig2 = String::with_capacity(SPAMSUM_LENGTH / 2);

    for &c in data {
        h1 = sum_hash(c, h1);
        h2 = sum_hash(c, h2);
        roll.update(c);
        let r = roll.sum() as u64;

        if r % block_size == block_size - 1 && sig1.len() < SPAMSUM_LENGTH - 1 {
            sig1.push(b64(h1));
            h1 = HASH_INIT;
        }
        if r % (block_size * 2) == block_size * 2 - 1 && sig2.len() < SPAMSUM_LENGTH / 2 - 1 {
            sig2.push(b64(h2));
            h2 = HASH_INIT;
        }
    }

    // The trailing partial chunk is always emitted unless the input ended on
    // a zero rolling sum, which matches ssdeep's digests byte for byte.
    if roll.sum() != 0 {
        sig1.push(b64(h1));
        sig2.push(b64(h2));
    }
    (sig1, sig2)
}

struct ParsedDigest {
    block_size: u64,
    sig1: Vec<u8>,
    sig2: Vec<u8>,
}

fn parse(digest: &str) -> Option<ParsedDigest> {
    let mut parts = digest.splitn(3, ':');
    let block_size = parts.next()?.parse::<u64>().ok()?;
    let sig1 = parts.next()?;
    let sig2 = parts.next()?;
    if block_size < MIN_BLOCKSIZE {
        return None;
    }
    Some(ParsedDigest {
        block_size,
        sig1: eliminate_sequences(sig1.as_bytes()),
        sig2: eliminate_sequences(sig2.as_bytes()),
    })
}

/// Collapse runs longer than three identical characters; they carry little
/// information and inflate scores for low-entropy inputs.
fn eliminate_sequences(sig: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(sig.len());
    for (i, &c) in sig.iter().enumerate() {
        if i >= MAX_SEQUENCE && sig[i - 1] == c && sig[i - 2] == c && sig[i - 3] == c {
            continue;
        }
        out.push(c);
    }
    out
}

/// Similarity of two digests in `0..=100`. Malformed digests score 0.
pub fn compare(a: &str, b: &str) -> u32 {
    let (a, b) = match (parse(a), parse(b)) {
        (Some(a), Some(b)) => (a, b),
        _ => return 0,
    };

    let (bs1, bs2) = (a.block_size, b.block_size);
    if bs1 != bs2 && bs1 != bs2.saturating_mul(2) && bs2 != bs1.saturating_mul(2) {
        return 0;
    }

    if bs1 == bs2 && a.sig1 == b.sig1 {
        return 100;
    }

    if bs1 == bs2 {
        let single = score_strings(&a.sig1, &b.sig1, bs1);
        let double = score_strings(&a.sig2, &b.sig2, bs1.saturating_mul(2));
        single.max(double)
    } else if bs1 == bs2.saturating_mul(2) {
        score_strings(&a.sig1, &b.sig2, bs1)
    } else {
        score_strings(&a.sig2, &b.sig1, bs2)
    }
}

fn score_strings(s1: &[u8], s2: &[u8], block_size: u64) -> u32 {
    if s1.len() > SPAMSUM_LENGTH || s2.len() > SPAMSUM_LENGTH {
        return 0;
    }
    if !has_common_substring(s1, s2) {
        return 0;
    }

    let distance = edit_distance(s1, s2) as u64;
    let scaled = distance * SPAMSUM_LENGTH as u64 / (s1.len() + s2.len()) as u64;
    let scaled = 100 * scaled / SPAMSUM_LENGTH as u64;
    if scaled >= 100 {
        return 0;
    }
    let mut score = 100 - scaled;

    // Small block sizes mean short inputs; don't let them claim a near-perfect match.
    let cap_from = (99 + ROLLING_WINDOW as u64) / ROLLING_WINDOW as u64 * MIN_BLOCKSIZE;
    if block_size < cap_from {
        let cap = block_size / MIN_BLOCKSIZE * s1.len().min(s2.len()) as u64;
        score = score.min(cap);
    }
    score as u32
}

fn has_common_substring(s1: &[u8], s2: &[u8]) -> bool {
    if s1.len() < ROLLING_WINDOW || s2.len() < ROLLING_WINDOW {
        return false;
    }
    let windows: AHashSet<&[u8]> = s1.windows(ROLLING_WINDOW).collect();
    s2.windows(ROLLING_WINDOW).any(|w| windows.contains(w))
}

/// Levenshtein distance with insert/delete cost 1 and substitution cost 2.
fn edit_distance(s1: &[u8], s2: &[u8]) -> usize {
    let mut prev: Vec<usize> = (0..=s2.len()).collect();
    let mut curr = vec![0usize; s2.len() + 1];

    for (i, &c1) in s1.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &c2) in s2.iter().enumerate() {
            let substitution = prev[j] + if c1 == c2 { 0 } else { 2 };
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[s2.len()]
}

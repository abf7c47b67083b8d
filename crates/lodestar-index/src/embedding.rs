//! Feature-hashing embeddings.
//!
//! Text is split into lowercase identifier-like tokens, each token is hashed
//! with 32-bit FNV-1a into one of `dim` buckets with a sign taken from the
//! hash's top bit, and the resulting vector is L2-normalized. No model, no
//! network: the same text always produces the same bits.
//!
//! The hash function is part of the on-disk contract. Changing it (or the
//! tokenizer) invalidates every stored vector.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Minimum token length kept by [`tokenize`].
pub const MIN_TOKEN_LEN: usize = 2;

/// Split text into lowercase runs of ASCII alphanumerics and `_`.
///
/// Runs shorter than [`MIN_TOKEN_LEN`] are dropped. Non-ASCII characters act
/// as separators, so the result does not depend on the process locale.
///
/// # Examples
///
/// ```
/// use lodestar_index::embedding::tokenize;
///
/// assert_eq!(tokenize("fn parseRequest(x: u8)"), vec!["fn", "parserequest", "u8"]);
/// assert!(tokenize("  a . b ").is_empty());
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            current.push(c.to_ascii_lowercase());
        } else if !current.is_empty() {
            if current.len() >= MIN_TOKEN_LEN {
                tokens.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.len() >= MIN_TOKEN_LEN {
        tokens.push(current);
    }

    tokens
}

/// 32-bit FNV-1a over the UTF-8 bytes of `token`.
///
/// Stable across processes, platforms, and releases.
///
/// # Examples
///
/// ```
/// use lodestar_index::embedding::stable_hash;
///
/// assert_eq!(stable_hash(""), 0x811c9dc5);
/// assert_eq!(stable_hash("a"), 0xe40c292c);
/// ```
pub fn stable_hash(token: &str) -> u32 {
    token.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Embed `text` into a unit-length vector of `dim` components.
///
/// Empty or whitespace-only text (anything without tokens) yields the zero
/// vector. `dim == 0` yields an empty vector.
///
/// # Examples
///
/// ```
/// use lodestar_index::embedding::{embed_text, l2_norm};
///
/// let v = embed_text("fn connect_database()", 64);
/// assert_eq!(v.len(), 64);
/// assert!((l2_norm(&v) - 1.0).abs() < 1e-5);
///
/// assert!(embed_text("   ", 64).iter().all(|x| *x == 0.0));
/// ```
pub fn embed_text(text: &str, dim: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dim];
    if dim == 0 {
        return vector;
    }

    for token in tokenize(text) {
        let h = stable_hash(&token);
        let bucket = (h as usize) % dim;
        let sign = if h & 0x8000_0000 != 0 { -1.0 } else { 1.0 };
        vector[bucket] += sign;
    }

    let norm = l2_norm(&vector);
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }

    vector
}

/// Euclidean length of `v`.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity of two **unit-normalized** vectors.
///
/// # Precondition
///
/// Both inputs must already have unit length (as produced by [`embed_text`]).
/// This function computes only the dot product over the first
/// `min(a.len(), b.len())` components and does not normalize; passing
/// unnormalized vectors gives meaningless results.
///
/// # Examples
///
/// ```
/// use lodestar_index::embedding::{cosine, embed_text};
///
/// let v = embed_text("http request parser", 128);
/// assert!((cosine(&v, &v) - 1.0).abs() < 1e-5);
/// ```
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_keeps_underscores() {
        assert_eq!(
            tokenize("Parse_Request HTTP2 x"),
            vec!["parse_request", "http2"]
        );
    }

    #[test]
    fn tokenize_treats_non_ascii_as_separator() {
        assert_eq!(tokenize("größe_max"), vec!["gr", "e_max"]);
    }

    #[test]
    fn tokenize_empty_and_whitespace() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" \t\n ").is_empty());
    }

    #[test]
    fn stable_hash_matches_fnv1a_reference_values() {
        // Published FNV-1a 32-bit test vectors.
        assert_eq!(stable_hash("a"), 0xe40c_292c);
        assert_eq!(stable_hash("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn embed_is_bit_identical_across_calls() {
        let text = "impl Store { fn upsert_file(&mut self) }";
        let a = embed_text(text, 256);
        let b = embed_text(text, 256);
        let a_bits: Vec<u32> = a.iter().map(|x| x.to_bits()).collect();
        let b_bits: Vec<u32> = b.iter().map(|x| x.to_bits()).collect();
        assert_eq!(a_bits, b_bits);
    }

    #[test]
    fn embed_is_unit_length_for_non_empty_text() {
        for text in ["a bb ccc", "fn main() {}", "SELECT path FROM files"] {
            let v = embed_text(text, 128);
            assert!((l2_norm(&v) - 1.0).abs() < 1e-5, "norm off for {text:?}");
        }
    }

    #[test]
    fn embed_of_tokenless_text_is_zero() {
        let v = embed_text("  ! ? ", 32);
        assert_eq!(v.len(), 32);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn embed_zero_dimension_is_empty() {
        assert!(embed_text("anything here", 0).is_empty());
    }

    #[test]
    fn embed_bucket_and_sign_follow_hash() {
        let dim = 97;
        let h = stable_hash("token");
        let v = embed_text("token", dim);
        let bucket = (h as usize) % dim;
        let expected = if h & 0x8000_0000 != 0 { -1.0 } else { 1.0 };
        assert_eq!(v[bucket], expected);
        assert_eq!(v.iter().filter(|x| **x != 0.0).count(), 1);
    }

    #[test]
    fn cosine_of_self_is_one() {
        let v = embed_text("database connection pool", 256);
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_of_disjoint_tokens_is_zero() {
        let dim = 4096;
        let left = ["alpha", "beta"];
        let right = ["gamma", "delta"];
        let buckets = |words: &[&str]| -> Vec<usize> {
            words
                .iter()
                .map(|w| stable_hash(w) as usize % dim)
                .collect()
        };
        let (lb, rb) = (buckets(&left), buckets(&right));
        assert!(lb.iter().all(|b| !rb.contains(b)), "test tokens collide");

        let a = embed_text(&left.join(" "), dim);
        let b = embed_text(&right.join(" "), dim);
        assert!(cosine(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_uses_shorter_length() {
        assert_eq!(cosine(&[1.0, 0.0, 5.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine(&[], &[1.0]), 0.0);
    }
}

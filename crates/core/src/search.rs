//! Byte subsequence search.
//!
//! Both searches are naive `O(haystack * needle)` scans. Needles here are
//! short (the 2-byte JPEG SOI marker, or a multipart delimiter of a few
//! dozen bytes) and haystacks are at most one read chunk.

/// Index of the leftmost occurrence of `needle` in `haystack`.
///
/// Returns `None` for an empty needle or one longer than the haystack.
///
/// ```
/// use mjpeg::search::find_forward;
///
/// assert_eq!(find_forward(b"ab--xab--", b"--"), Some(2));
/// assert_eq!(find_forward(b"abc", b"d"), None);
/// ```
pub fn find_forward(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }

    let first = needle[0];
    (0..=haystack.len() - needle.len())
        .find(|&start| haystack[start] == first && &haystack[start..start + needle.len()] == needle)
}

/// Index of the rightmost occurrence of `needle` in `haystack`, scanning
/// from the end.
///
/// ```
/// use mjpeg::search::find_backward;
///
/// assert_eq!(find_backward(b"ab--xab--", b"--"), Some(7));
/// assert_eq!(find_backward(b"--", b"--"), Some(0));
/// ```
pub fn find_backward(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }

    let first = needle[0];
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&start| haystack[start] == first && &haystack[start..start + needle.len()] == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
        if needle.is_empty() {
            return Vec::new();
        }
        haystack
            .windows(needle.len())
            .enumerate()
            .filter(|(_, w)| *w == needle)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn forward_finds_leftmost() {
        assert_eq!(find_forward(&[0x00, 0xFF, 0xD8, 0xFF, 0xD8], &[0xFF, 0xD8]), Some(1));
    }

    #[test]
    fn backward_finds_rightmost() {
        assert_eq!(find_backward(&[0x00, 0xFF, 0xD8, 0xFF, 0xD8], &[0xFF, 0xD8]), Some(3));
    }

    #[test]
    fn match_at_both_edges() {
        let data = b"--frame--";
        assert_eq!(find_forward(data, b"--"), Some(0));
        assert_eq!(find_backward(data, b"--"), Some(7));
    }

    #[test]
    fn needle_equal_to_haystack() {
        assert_eq!(find_forward(b"--x", b"--x"), Some(0));
        assert_eq!(find_backward(b"--x", b"--x"), Some(0));
    }

    #[test]
    fn absent_needle() {
        assert_eq!(find_forward(b"hello", b"xyz"), None);
        assert_eq!(find_backward(b"hello", b"xyz"), None);
    }

    #[test]
    fn empty_and_oversized_needles() {
        assert_eq!(find_forward(b"abc", b""), None);
        assert_eq!(find_backward(b"abc", b""), None);
        assert_eq!(find_forward(b"ab", b"abc"), None);
        assert_eq!(find_backward(b"", b"a"), None);
    }

    #[test]
    fn partial_prefix_does_not_match() {
        assert_eq!(find_forward(b"--bounda", b"--boundary"), None);
        assert_eq!(find_forward(b"--boun--boundary", b"--boundary"), Some(6));
    }

    #[test]
    fn agrees_with_oracle() {
        // Small alphabet so matches and near-misses are frequent.
        let haystacks: Vec<Vec<u8>> = (0u32..200)
            .map(|seed| {
                (0..(seed % 23))
                    .map(|i| (seed.wrapping_mul(31).wrapping_add(i * 7) % 3) as u8)
                    .collect()
            })
            .collect();
        let needles: [&[u8]; 5] = [&[0], &[1, 2], &[0, 0], &[2, 1, 0], &[1, 1, 1, 1]];

        for hay in &haystacks {
            for needle in needles {
                let hits = oracle(hay, needle);
                assert_eq!(find_forward(hay, needle), hits.first().copied(), "{hay:?} {needle:?}");
                assert_eq!(find_backward(hay, needle), hits.last().copied(), "{hay:?} {needle:?}");
            }
        }
    }
}

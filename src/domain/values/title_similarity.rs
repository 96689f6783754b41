//! Ratcliff/Obershelp similarity between short texts.
//!
//! `ratio = 2·M / T` where `M` is the number of characters in the matching
//! blocks found by recursively taking the longest common substring, and `T`
//! is the combined length of both inputs. Symmetric up to tie-breaking on
//! equal-length blocks, and always within [0, 1].

/// Similarity ratio in [0, 1]. Two empty strings are identical (1.0).
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut stack = vec![(0, a.len(), 0, b.len())];
    let mut total = 0;
    while let Some((alo, ahi, blo, bhi)) = stack.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        total += k;
        if alo < i && blo < j {
            stack.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            stack.push((i + k, ahi, j + k, bhi));
        }
    }
    total
}

/// Longest common substring of `a[alo..ahi]` and `b[blo..bhi]`, earliest in `a` on ties.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo + 1;
    let mut best = (alo, blo, 0);
    let mut prev = vec![0usize; width];
    let mut cur = vec![0usize; width];
    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo + 1;
            if a[i] == b[j] {
                let len = prev[col - 1] + 1;
                cur[col] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            } else {
                cur[col] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

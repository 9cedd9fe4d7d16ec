//! Approximate key completion
//!
//! Scores candidates with the Ratcliff/Obershelp "gestalt" ratio:
//! `2 * M / T`, where `M` counts characters in matching blocks found by
//! recursively taking the longest common block, and `T` is the total length
//! of both strings. A score of 1.0 means identical, 0.0 nothing in common.

/// Minimum score a candidate needs to complete a key
pub const ACCEPTANCE_THRESHOLD: f64 = 0.43;

/// Similarity ratio of two strings in `[0.0, 1.0]`
///
/// Two empty strings are identical (1.0).
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// Best candidate for `key` scoring at least `cutoff`
///
/// Ties go to the lexicographically greatest candidate.
pub fn best_match<'a, I>(key: &str, candidates: I, cutoff: f64) -> Option<(&'a str, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, f64)> = None;

    for candidate in candidates {
        let score = ratio(candidate, key);
        if score < cutoff {
            continue;
        }
        best = match best {
            Some((name, s)) if s > score || (s == score && name >= candidate) => Some((name, s)),
            _ => Some((candidate, score)),
        };
    }

    best
}

/// Total size of all matching blocks between `a` and `b`
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut pending = vec![(0, a.len(), 0, b.len())];
    let mut total = 0;

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        total += k;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }

    total
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, len)`
///
/// Among equally long blocks the one starting earliest in `a`, then in `b`,
/// wins.
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
    // prev[j - blo + 1]: length of the common block ending at a[i - 1], b[j]
    let mut prev = vec![0usize; width];
    let mut curr = vec![0usize; width];

    for i in alo..ahi {
        curr.iter_mut().for_each(|c| *c = 0);
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = prev[j - blo] + 1;
                curr[j - blo + 1] = k;
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn identical_strings_score_one() {
        assert!(approx(ratio("user_name", "user_name"), 1.0));
        assert!(approx(ratio("", ""), 1.0));
    }

    #[test]
    fn disjoint_strings_score_zero() {
        assert!(approx(ratio("xyz123", "user_name"), 0.0));
        assert!(approx(ratio("abc", ""), 0.0));
    }

    #[test]
    fn prefix_ratio() {
        // "user" is a 4-char block of "user_name": 2 * 4 / 13
        assert!(approx(ratio("user_name", "user"), 8.0 / 13.0));
    }

    #[test]
    fn counts_blocks_on_both_sides() {
        // "abcd" vs "bcda": longest block "bcd", then nothing left/right that pairs
        assert!(approx(ratio("abcd", "bcda"), 6.0 / 8.0));
        // "date_of_birth" vs "user": 'e' then 'r' to its right
        assert!(approx(ratio("date_of_birth", "user"), 4.0 / 17.0));
    }

    #[test]
    fn completes_above_threshold() {
        let pool = ["user_name", "date_of_birth"];
        let found = best_match("user", pool, ACCEPTANCE_THRESHOLD);
        assert_eq!(found.map(|(name, _)| name), Some("user_name"));
    }

    #[test]
    fn rejects_below_threshold() {
        let pool = ["user_name", "date_of_birth"];
        assert!(best_match("xyz123", pool, ACCEPTANCE_THRESHOLD).is_none());
    }

    #[test]
    fn tie_prefers_greatest_candidate() {
        // Both score 2 * 2 / 5
        let found = best_match("ab", ["abx", "aby"], 0.1);
        assert_eq!(found.map(|(name, _)| name), Some("aby"));
    }

    #[test]
    fn empty_pool_yields_nothing() {
        assert!(best_match("age", Vec::<&str>::new(), 0.0).is_none());
    }
}

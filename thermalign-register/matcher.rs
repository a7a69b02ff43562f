use rayon::prelude::*;
use thermalign_core::{Descriptor, MatchCandidate};

/// Number of differing bits between two descriptors
#[inline]
pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Brute-force Hamming matcher with mutual nearest-neighbour filtering.
///
/// `query` descriptors come from the reference (visible) image and `train`
/// descriptors from the source (thermal) image.
#[derive(Debug, Clone, Copy)]
pub struct HammingMatcher {
    /// Fraction of the distance-sorted matches to keep
    pub keep_fraction: f64,
}

impl Default for HammingMatcher {
    fn default() -> Self {
        Self { keep_fraction: 0.15 }
    }
}

impl HammingMatcher {
    pub fn new(keep_fraction: f64) -> Self {
        Self { keep_fraction }
    }

    /// Cross-checked matches sorted by distance, truncated to the kept fraction
    pub fn match_descriptors(&self, query: &[Descriptor], train: &[Descriptor]) -> Vec<MatchCandidate> {
        let mut matches = cross_check_matches(query, train);
        retain_best(&mut matches, self.keep_fraction);
        matches
    }
}

/// Nearest neighbour of every row of `from` among `to`; ties go to the lowest index
fn nearest_neighbours(from: &[Descriptor], to: &[Descriptor]) -> Vec<(usize, u32)> {
    from.par_iter()
        .map(|d| {
            let mut best = (0usize, u32::MAX);
            for (j, other) in to.iter().enumerate() {
                let dist = hamming_distance(d, other);
                if dist < best.1 {
                    best = (j, dist);
                }
            }
            best
        })
        .collect()
}

/// Pairs `(i, j)` where `j` is the nearest neighbour of `i` and vice versa,
/// in ascending query order.
pub fn cross_check_matches(query: &[Descriptor], train: &[Descriptor]) -> Vec<MatchCandidate> {
    if query.is_empty() || train.is_empty() {
        return Vec::new();
    }

    let forward = nearest_neighbours(query, train);
    let backward = nearest_neighbours(train, query);

    forward
        .iter()
        .enumerate()
        .filter(|&(i, &(j, _))| backward[j].0 == i)
        .map(|(i, &(j, distance))| MatchCandidate {
            query_idx: i,
            train_idx: j,
            distance,
        })
        .collect()
}

/// Stable-sort by distance and keep the first `floor(len * fraction)` entries
pub fn retain_best(matches: &mut Vec<MatchCandidate>, fraction: f64) {
    matches.sort_by_key(|m| m.distance);
    let fraction = fraction.clamp(0.0, 1.0);
    let keep = (matches.len() as f64 * fraction).floor() as usize;
    matches.truncate(keep);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ranked_matches(n: u32) -> Vec<MatchCandidate> {
        (0..n)
            .rev()
            .map(|d| MatchCandidate {
                query_idx: d as usize,
                train_idx: d as usize,
                distance: d,
            })
            .collect()
    }

    fn descriptor(fill: u8) -> Descriptor {
        [fill; 32]
    }

    fn with_bits_flipped(base: &Descriptor, bits: usize) -> Descriptor {
        let mut d = *base;
        for b in 0..bits {
            d[b / 8] ^= 1 << (b % 8);
        }
        d
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(&descriptor(0), &descriptor(0)), 0);
        assert_eq!(hamming_distance(&descriptor(0), &descriptor(0xff)), 256);
        assert_eq!(hamming_distance(&descriptor(0), &with_bits_flipped(&descriptor(0), 13)), 13);
    }

    #[test]
    fn test_empty_input_gives_no_matches() {
        let some = vec![descriptor(1)];
        assert!(cross_check_matches(&[], &some).is_empty());
        assert!(cross_check_matches(&some, &[]).is_empty());
        assert!(HammingMatcher::default().match_descriptors(&[], &[]).is_empty());
    }

    #[test]
    fn test_planted_nearest_neighbour_is_found() {
        let a = descriptor(0x00);
        let b = descriptor(0xff);
        let c = descriptor(0x0f);
        let query = vec![a, b, c];
        // Train set is a shuffled, lightly perturbed copy of the query set
        let train = vec![
            with_bits_flipped(&c, 2),
            with_bits_flipped(&a, 3),
            with_bits_flipped(&b, 1),
        ];

        let matches = cross_check_matches(&query, &train);
        let pairs: Vec<_> = matches.iter().map(|m| (m.query_idx, m.train_idx, m.distance)).collect();
        assert_eq!(pairs, vec![(0, 1, 3), (1, 2, 1), (2, 0, 2)]);
    }

    #[test]
    fn test_one_sided_match_is_rejected() {
        // Both query rows prefer train[0]; train[0] only prefers query[0]
        let query = vec![descriptor(0x00), with_bits_flipped(&descriptor(0x00), 4)];
        let train = vec![descriptor(0x00), descriptor(0xff)];
        let matches = cross_check_matches(&query, &train);
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].query_idx, matches[0].train_idx), (0, 0));
    }

    #[test]
    fn test_ties_go_to_lowest_index() {
        let query = vec![descriptor(0x00)];
        let train = vec![descriptor(0x00), descriptor(0x00)];
        let matches = cross_check_matches(&query, &train);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].train_idx, 0);
    }

    #[test]
    fn test_retain_best_keeps_floor_of_fraction() {
        let mut matches = ranked_matches(20);
        retain_best(&mut matches, 0.15);
        assert_eq!(matches.len(), 3);
        assert_eq!(matches.iter().map(|m| m.distance).collect::<Vec<_>>(), vec![0, 1, 2]);

        let mut few = matches.clone();
        retain_best(&mut few, 0.15);
        assert!(few.is_empty());
    }

    #[test]
    fn test_retain_best_keeps_whole_products() {
        for (n, fraction, expected) in [(20, 0.35, 7), (10, 0.7, 7), (20, 0.5, 10), (7, 1.0, 7)] {
            let mut matches = ranked_matches(n);
            retain_best(&mut matches, fraction);
            assert_eq!(matches.len(), expected, "n={} fraction={}", n, fraction);
        }
    }

    #[test]
    fn test_matcher_uses_configured_fraction() {
        let query: Vec<_> = (0..20u8).map(|i| with_bits_flipped(&descriptor(0), i as usize * 12)).collect();
        let all = cross_check_matches(&query, &query);
        assert_eq!(all.len(), 20);
        assert_eq!(HammingMatcher::new(0.35).match_descriptors(&query, &query).len(), 7);
    }

    fn arb_descriptor() -> impl Strategy<Value = Descriptor> {
        prop::array::uniform32(any::<u8>())
    }

    proptest! {
        #[test]
        fn prop_cross_check_pairs_are_mutual(
            query in prop::collection::vec(arb_descriptor(), 0..40),
            train in prop::collection::vec(arb_descriptor(), 0..40),
        ) {
            let matches = cross_check_matches(&query, &train);
            let mut seen_train = std::collections::HashSet::new();
            for m in &matches {
                prop_assert!(seen_train.insert(m.train_idx));
                prop_assert_eq!(m.distance, hamming_distance(&query[m.query_idx], &train[m.train_idx]));
                // No train row is strictly closer to the query, and vice versa
                prop_assert!(train.iter().all(|t| hamming_distance(&query[m.query_idx], t) >= m.distance));
                prop_assert!(query.iter().all(|q| hamming_distance(q, &train[m.train_idx]) >= m.distance));
            }
        }

        #[test]
        fn prop_match_descriptors_is_sorted_and_bounded(
            query in prop::collection::vec(arb_descriptor(), 0..40),
            train in prop::collection::vec(arb_descriptor(), 0..40),
            fraction in 0.0f64..=1.0,
        ) {
            let all = cross_check_matches(&query, &train);
            let kept = HammingMatcher::new(fraction).match_descriptors(&query, &train);
            prop_assert!(kept.len() <= all.len());
            prop_assert_eq!(kept.len(), (all.len() as f64 * fraction).floor() as usize);
            prop_assert!(kept.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
    }
}

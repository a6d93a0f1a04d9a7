use std::ops::Range;

/// Split `0..n` into `steps` contiguous ranges for fanning work out over a pool.
///
/// Every index is covered exactly once. Each range holds `n / steps` items and
/// the last one also collects the remainder. `steps == 0` yields no ranges;
/// when `steps > n` the leading ranges are empty.
pub fn split(n: usize, steps: usize) -> Vec<Range<usize>> {
    if steps == 0 {
        return Vec::new();
    }

    let per_step = n / steps;
    (0..steps)
        .map(|s| {
            let start = s * per_step;
            let end = if s == steps - 1 { n } else { start + per_step };
            start..end
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split() {
        assert_eq!(split(9, 3), vec![0..3, 3..6, 6..9]);
    }

    #[test]
    fn last_range_collects_remainder() {
        assert_eq!(split(10, 3), vec![0..3, 3..6, 6..10]);
    }

    #[test]
    fn covers_every_index_once() {
        for n in 0..40 {
            for steps in 1..9 {
                let covered: Vec<usize> = split(n, steps).into_iter().flatten().collect();
                assert_eq!(covered, (0..n).collect::<Vec<_>>(), "n={n} steps={steps}");
            }
        }
    }

    #[test]
    fn more_steps_than_items() {
        let ranges = split(2, 4);
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[3], 0..2);
        assert!(ranges[..3].iter().all(|r| r.is_empty()));
    }

    #[test]
    fn zero_steps() {
        assert!(split(5, 0).is_empty());
    }
}

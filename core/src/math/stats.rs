pub struct StatsHelper;

impl StatsHelper {
    /// Index and value of the largest sample at or after `skip`.
    /// The index is relative to the full slice.
    pub fn peak(samples: &[f32], skip: usize) -> Option<(usize, f32)> {
        samples
            .iter()
            .copied()
            .enumerate()
            .skip(skip)
            .fold(None, |best: Option<(usize, f32)>, (idx, value)| match best {
                Some((_, top)) if top >= value => best,
                _ => Some((idx, value)),
            })
    }

    pub fn bounds(samples: &[f32]) -> Option<(f32, f32)> {
        let mut iter = samples.iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

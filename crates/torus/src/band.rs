use core::ops::Range;

/// A contiguous half-open row range `[start, end)` owned by one worker for
/// one generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Band {
    pub start: usize,
    pub end: usize,
}

impl Band {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of rows in the band.
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn rows(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Whether the band is a non-empty row range inside a grid of `height`
    /// rows.
    pub const fn fits(&self, height: usize) -> bool {
        self.start < self.end && self.end <= height
    }
}

/// Splits `[0, height)` into `parts` contiguous bands.
///
/// Band `i` covers `[i * height / parts, (i + 1) * height / parts)`, so the
/// bands are disjoint, ordered, and cover every row exactly once. When
/// `parts <= height` no band is empty; rows left over by the integer division
/// are spread across the bands rather than piled onto one of them.
///
/// Returns an empty vector when `parts` is zero.
///
/// ```
/// use torus::{Band, partition};
///
/// assert_eq!(
///     partition(10, 3),
///     vec![Band::new(0, 3), Band::new(3, 6), Band::new(6, 10)]
/// );
/// ```
pub fn partition(height: usize, parts: usize) -> Vec<Band> {
    (0..parts)
        .map(|i| Band::new(i * height / parts, (i + 1) * height / parts))
        .collect()
}

/// Clamps a requested worker count to what can actually be used.
///
/// The result never exceeds the number of reachable workers nor the number of
/// rows (a band must own at least one row), and is never below one.
pub fn effective_workers(requested: usize, available: usize, height: usize) -> usize {
    requested.min(available).min(height).max(1)
}

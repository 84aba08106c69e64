//! Decomposition of an N-D box into 1-D scan lines.
//!
//! A [`LinePlan`] fixes one processing dimension and enumerates every line
//! along it, tracking the offset of the line start in each participating
//! array (each array has its own strides; broadcast dimensions have stride 0).

use std::ops::Range;

use crate::Result;

/// Pick the dimension to run scan lines along.
///
/// Prefers the dimension with the smallest stride (memory order), unless it
/// is short (< 64) and another dimension is at least four times longer.
pub fn optimal_processing_dim(sizes: &[usize], strides: &[isize]) -> usize {
    let mut best: Option<usize> = None;
    for (d, (&s, &st)) in sizes.iter().zip(strides.iter()).enumerate() {
        if s <= 1 {
            continue;
        }
        match best {
            Some(b) if strides[b].unsigned_abs() <= st.unsigned_abs() => {}
            _ => best = Some(d),
        }
    }
    let Some(best) = best else {
        return 0;
    };
    let (longest, &longest_size) = sizes
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
        .unwrap_or((best, &sizes[best]));
    if sizes[best] < 64 && longest_size >= 4 * sizes[best] {
        longest
    } else {
        best
    }
}

/// Enumeration of the lines along one dimension of a box, for several arrays
/// sharing that box.
#[derive(Debug, Clone)]
pub(crate) struct LinePlan {
    length: usize,
    rank: usize,
    loop_dims: Vec<usize>,
    loop_sizes: Vec<usize>,
    loop_strides: Vec<Vec<isize>>,
    line_strides: Vec<isize>,
    lines: usize,
}

impl LinePlan {
    /// `strides[k]` are the strides of array `k`, one per dimension of `sizes`.
    pub(crate) fn new(sizes: &[usize], dim: usize, strides: &[&[isize]]) -> Self {
        debug_assert!(dim < sizes.len());
        debug_assert!(strides.iter().all(|s| s.len() == sizes.len()));
        let loop_dims: Vec<usize> = (0..sizes.len()).filter(|&d| d != dim).collect();
        let loop_sizes: Vec<usize> = loop_dims.iter().map(|&d| sizes[d]).collect();
        let loop_strides = strides
            .iter()
            .map(|s| loop_dims.iter().map(|&d| s[d]).collect())
            .collect();
        let line_strides = strides.iter().map(|s| s[dim]).collect();
        let lines = if sizes[dim] == 0 {
            0
        } else {
            loop_sizes.iter().product()
        };
        Self {
            length: sizes[dim],
            rank: sizes.len(),
            loop_dims,
            loop_sizes,
            loop_strides,
            line_strides,
            lines,
        }
    }

    pub(crate) fn length(&self) -> usize {
        self.length
    }

    pub(crate) fn lines(&self) -> usize {
        self.lines
    }

    /// Stride along the line for array `k`.
    pub(crate) fn line_stride(&self, k: usize) -> isize {
        self.line_strides[k]
    }

    /// Call `f(position, offsets)` for lines `range`, in order.
    ///
    /// `position` is the full coordinate of the line start (0 along the
    /// processing dimension); `offsets[k]` is its offset in array `k`.
    pub(crate) fn for_each_line<F>(&self, range: Range<usize>, mut f: F) -> Result<()>
    where
        F: FnMut(&[usize], &[isize]) -> Result<()>,
    {
        if range.is_empty() {
            return Ok(());
        }
        let arrays = self.line_strides.len();
        let mut counter = vec![0usize; self.loop_sizes.len()];
        let mut rest = range.start;
        for (c, &s) in counter.iter_mut().zip(self.loop_sizes.iter()) {
            *c = rest % s;
            rest /= s;
        }
        let mut offsets: Vec<isize> = (0..arrays)
            .map(|k| {
                counter
                    .iter()
                    .zip(self.loop_strides[k].iter())
                    .map(|(&c, &st)| c as isize * st)
                    .sum()
            })
            .collect();
        let mut position = vec![0usize; self.rank];
        for (i, &d) in self.loop_dims.iter().enumerate() {
            position[d] = counter[i];
        }

        for _ in range {
            f(&position, &offsets)?;
            for i in 0..counter.len() {
                let d = self.loop_dims[i];
                counter[i] += 1;
                position[d] = counter[i];
                for (k, off) in offsets.iter_mut().enumerate() {
                    *off += self.loop_strides[k][i];
                }
                if counter[i] < self.loop_sizes[i] {
                    break;
                }
                for (k, off) in offsets.iter_mut().enumerate() {
                    *off -= self.loop_strides[k][i] * counter[i] as isize;
                }
                counter[i] = 0;
                position[d] = 0;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_dim_prefers_memory_order() {
        assert_eq!(optimal_processing_dim(&[100, 100], &[1, 100]), 0);
        assert_eq!(optimal_processing_dim(&[100, 100], &[100, 1]), 1);
        // Dimension 0 is singleton, skip it.
        assert_eq!(optimal_processing_dim(&[1, 50], &[1, 1]), 1);
    }

    #[test]
    fn test_processing_dim_avoids_short_lines() {
        assert_eq!(optimal_processing_dim(&[4, 1000], &[1, 4]), 1);
        assert_eq!(optimal_processing_dim(&[1, 1], &[1, 1]), 0);
    }

    #[test]
    fn test_line_plan_offsets() {
        let sizes = [3, 4, 2];
        let a = [1isize, 3, 12];
        let b = [8isize, 2, 0];
        let plan = LinePlan::new(&sizes, 1, &[&a, &b]);
        assert_eq!(plan.lines(), 6);
        assert_eq!(plan.length(), 4);
        assert_eq!(plan.line_stride(0), 3);
        assert_eq!(plan.line_stride(1), 2);

        let mut seen = Vec::new();
        plan.for_each_line(0..6, |pos, off| {
            seen.push((pos.to_vec(), off.to_vec()));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen[0], (vec![0, 0, 0], vec![0, 0]));
        assert_eq!(seen[1], (vec![1, 0, 0], vec![1, 8]));
        assert_eq!(seen[3], (vec![0, 0, 1], vec![12, 0]));
        assert_eq!(seen[5], (vec![2, 0, 1], vec![14, 16]));
    }

    #[test]
    fn test_line_plan_partial_range_matches_full() {
        let sizes = [5, 3, 4];
        let s = [1isize, 5, 15];
        let plan = LinePlan::new(&sizes, 0, &[&s]);
        let mut full = Vec::new();
        plan.for_each_line(0..plan.lines(), |_, off| {
            full.push(off[0]);
            Ok(())
        })
        .unwrap();
        let mut part = Vec::new();
        plan.for_each_line(4..9, |_, off| {
            part.push(off[0]);
            Ok(())
        })
        .unwrap();
        assert_eq!(&full[4..9], part.as_slice());
    }
}

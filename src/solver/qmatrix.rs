//! Q-matrix providers for the dual problems
//!
//! Every formulation solves `min ½aᵀQa + pᵀa`; they differ in how `Q` is
//! derived from the kernel matrix. Rows are produced on demand and kept in a
//! [`KernelCache`].

use crate::cache::KernelCache;
use crate::kernel::{Kernel, KernelFunction};
use std::sync::Arc;

/// Row access to the quadratic term of a dual problem
pub trait QMatrix {
    /// Number of dual variables
    fn len(&self) -> usize;

    /// Row `i` of Q
    fn row(&mut self, i: usize) -> Arc<[f64]>;

    /// Diagonal of Q
    fn diagonal(&self) -> &[f64];

    /// Fraction of row requests served from the kernel cache
    fn cache_hit_rate(&self) -> f64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `Q_ij = y_i y_j K(x_i, x_j)` for two-class training
pub struct SvcQ<'a> {
    kernel: &'a Kernel,
    points: Vec<&'a [f64]>,
    y: Vec<f64>,
    diagonal: Vec<f64>,
    cache: KernelCache,
}

impl<'a> SvcQ<'a> {
    pub fn new(kernel: &'a Kernel, points: Vec<&'a [f64]>, y: Vec<f64>, cache_size: usize) -> Self {
        let diagonal = points.iter().map(|x| kernel.compute(x, x)).collect();
        let cache = KernelCache::with_memory_limit(cache_size, points.len());
        Self {
            kernel,
            points,
            y,
            diagonal,
            cache,
        }
    }
}

impl QMatrix for SvcQ<'_> {
    fn len(&self) -> usize {
        self.points.len()
    }

    fn row(&mut self, i: usize) -> Arc<[f64]> {
        let (kernel, points, y) = (self.kernel, &self.points, &self.y);
        self.cache.get_or_insert_with(i, || {
            points
                .iter()
                .zip(y)
                .map(|(x, y_j)| y[i] * y_j * kernel.compute(points[i], x))
                .collect()
        })
    }

    fn diagonal(&self) -> &[f64] {
        &self.diagonal
    }

    fn cache_hit_rate(&self) -> f64 {
        self.cache.hit_rate()
    }
}

/// `Q_ij = K(x_i, x_j)` for one-class training
pub struct OneClassQ<'a> {
    kernel: &'a Kernel,
    points: Vec<&'a [f64]>,
    diagonal: Vec<f64>,
    cache: KernelCache,
}

impl<'a> OneClassQ<'a> {
    pub fn new(kernel: &'a Kernel, points: Vec<&'a [f64]>, cache_size: usize) -> Self {
        let diagonal = points.iter().map(|x| kernel.compute(x, x)).collect();
        let cache = KernelCache::with_memory_limit(cache_size, points.len());
        Self {
            kernel,
            points,
            diagonal,
            cache,
        }
    }
}

impl QMatrix for OneClassQ<'_> {
    fn len(&self) -> usize {
        self.points.len()
    }

    fn row(&mut self, i: usize) -> Arc<[f64]> {
        let (kernel, points) = (self.kernel, &self.points);
        self.cache.get_or_insert_with(i, || {
            points
                .iter()
                .map(|x| kernel.compute(points[i], x))
                .collect()
        })
    }

    fn diagonal(&self) -> &[f64] {
        &self.diagonal
    }

    fn cache_hit_rate(&self) -> f64 {
        self.cache.hit_rate()
    }
}

/// Regression doubles the variables: `a_i` for the upper and `a*_i` for
/// the lower side of the tube. Variable `k` refers to example `k mod l`
/// with sign +1 for `k < l` and -1 otherwise.
///
/// Signed rows of length `2l` are cached; row `k` and row `k ± l` differ
/// only in sign, so a miss on one is served from the other.
pub struct SvrQ<'a> {
    kernel: &'a Kernel,
    points: Vec<&'a [f64]>,
    diagonal: Vec<f64>,
    cache: KernelCache,
}

impl<'a> SvrQ<'a> {
    pub fn new(kernel: &'a Kernel, points: Vec<&'a [f64]>, cache_size: usize) -> Self {
        let base: Vec<f64> = points.iter().map(|x| kernel.compute(x, x)).collect();
        let diagonal = base.iter().chain(base.iter()).copied().collect();
        let cache = KernelCache::with_memory_limit(cache_size, 2 * points.len());
        Self {
            kernel,
            points,
            diagonal,
            cache,
        }
    }
}

impl QMatrix for SvrQ<'_> {
    fn len(&self) -> usize {
        2 * self.points.len()
    }

    fn row(&mut self, i: usize) -> Arc<[f64]> {
        let l = self.points.len();
        let (real, sign) = if i < l { (i, 1.0) } else { (i - l, -1.0) };
        let mirror = self.cache.peek(if i < l { i + l } else { i - l });
        let (kernel, points) = (self.kernel, &self.points);

        self.cache.get_or_insert_with(i, || match mirror {
            Some(row) => row.iter().map(|q| -q).collect(),
            None => {
                let base: Vec<f64> = points
                    .iter()
                    .map(|x| sign * kernel.compute(points[real], x))
                    .collect();
                base.iter().copied().chain(base.iter().map(|q| -q)).collect()
            }
        })
    }

    fn diagonal(&self) -> &[f64] {
        &self.diagonal
    }

    fn cache_hit_rate(&self) -> f64 {
        self.cache.hit_rate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> Vec<Vec<f64>> {
        vec![vec![1.0, 0.0], vec![0.0, 2.0], vec![1.0, 1.0]]
    }

    #[test]
    fn test_svc_q_applies_label_signs() {
        let kernel = Kernel::linear();
        let data = points();
        let refs: Vec<&[f64]> = data.iter().map(|x| x.as_slice()).collect();
        let mut q = SvcQ::new(&kernel, refs, vec![1.0, -1.0, 1.0], 1 << 20);

        assert_eq!(q.len(), 3);
        assert_eq!(&*q.row(0), &[1.0, 0.0, 1.0]);
        assert_eq!(&*q.row(1), &[0.0, 4.0, -2.0]);
        assert_eq!(q.diagonal(), &[1.0, 4.0, 2.0]);
    }

    #[test]
    fn test_one_class_q_is_kernel_matrix() {
        let kernel = Kernel::linear();
        let data = points();
        let refs: Vec<&[f64]> = data.iter().map(|x| x.as_slice()).collect();
        let mut q = OneClassQ::new(&kernel, refs, 1 << 20);

        assert_eq!(&*q.row(2), &[1.0, 2.0, 2.0]);
        q.row(2);
        assert_eq!(q.cache_hit_rate(), 0.5);
    }

    #[test]
    fn test_svr_q_doubles_variables() {
        let kernel = Kernel::linear();
        let data = points();
        let refs: Vec<&[f64]> = data.iter().map(|x| x.as_slice()).collect();
        let mut q = SvrQ::new(&kernel, refs, 1 << 20);

        assert_eq!(q.len(), 6);
        assert_eq!(q.diagonal(), &[1.0, 4.0, 2.0, 1.0, 4.0, 2.0]);
        assert_eq!(&*q.row(0), &[1.0, 0.0, 1.0, -1.0, 0.0, -1.0]);
        assert_eq!(&*q.row(5), &[-1.0, -2.0, -2.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_svr_q_reuses_cached_rows() {
        let kernel = Kernel::linear();
        let data = points();
        let refs: Vec<&[f64]> = data.iter().map(|x| x.as_slice()).collect();
        let mut q = SvrQ::new(&kernel, refs, 1 << 20);

        let upper = q.row(1);
        let lower = q.row(4);
        assert_eq!(&*lower, &[0.0, -4.0, -2.0, 0.0, 4.0, 2.0]);
        assert!(upper.iter().zip(lower.iter()).all(|(a, b)| *a == -b));

        let again = q.row(1);
        assert!(Arc::ptr_eq(&upper, &again));
        assert_eq!(q.cache_hit_rate(), 1.0 / 3.0);
    }
}

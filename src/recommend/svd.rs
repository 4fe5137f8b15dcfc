//! Truncated singular value decomposition.
//!
//! One-sided Jacobi (Hestenes): columns of a working copy of `A` are rotated
//! pairwise until they are mutually orthogonal. Their norms are then the
//! singular values, the normalized columns are `U`, and the accumulated
//! rotations are `V`. Borrow matrices are small and dense enough that this
//! is both simple and accurate.

use ndarray::{Array1, Array2, Axis, s};

use crate::constants::recommend::{MAX_SWEEPS, TOLERANCE};

/// Leading `k` singular triplets of a matrix.
#[derive(Debug, Clone)]
pub struct TruncatedSvd {
    /// `m x k`, orthonormal columns
    pub u: Array2<f64>,
    /// Descending, length `k`
    pub sigma: Array1<f64>,
    /// `n x k`, orthonormal columns
    pub v: Array2<f64>,
}

impl TruncatedSvd {
    /// Decompose `a` and keep the `k` largest singular values.
    ///
    /// `k` is clamped to `min(m, n)`.
    pub fn compute(a: &Array2<f64>, k: usize) -> Self {
        let (m, n) = a.dim();
        if m < n {
            // Work on the tall orientation and swap the factors back
            let t = Self::compute(&a.t().to_owned(), k);
            return Self {
                u: t.v,
                sigma: t.sigma,
                v: t.u,
            };
        }

        let k = k.min(n);
        let mut work = a.clone();
        let mut rot = Array2::<f64>::eye(n);

        for sweep in 0..MAX_SWEEPS {
            let mut rotated = false;
            for p in 0..n {
                for q in (p + 1)..n {
                    let alpha = work.column(p).dot(&work.column(p));
                    let beta = work.column(q).dot(&work.column(q));
                    let gamma = work.column(p).dot(&work.column(q));
                    if gamma.abs() <= TOLERANCE * (alpha * beta).sqrt() {
                        continue;
                    }
                    rotated = true;

                    let zeta = (beta - alpha) / (2.0 * gamma);
                    let t = zeta.signum() / (zeta.abs() + (1.0 + zeta * zeta).sqrt());
                    let c = 1.0 / (1.0 + t * t).sqrt();
                    let s = c * t;
                    rotate_columns(&mut work, p, q, c, s);
                    rotate_columns(&mut rot, p, q, c, s);
                }
            }
            if !rotated {
                tracing::trace!("Jacobi SVD converged after {} sweeps", sweep + 1);
                break;
            }
        }

        let norms: Vec<f64> = (0..n)
            .map(|j| work.column(j).dot(&work.column(j)).sqrt())
            .collect();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&i, &j| norms[j].total_cmp(&norms[i]).then(i.cmp(&j)));
        order.truncate(k);

        let mut u = Array2::<f64>::zeros((m, k));
        let mut v = Array2::<f64>::zeros((n, k));
        let mut sigma = Array1::<f64>::zeros(k);
        for (dst, &src) in order.iter().enumerate() {
            let norm = norms[src];
            sigma[dst] = norm;
            if norm > TOLERANCE {
                u.column_mut(dst).assign(&(&work.column(src) / norm));
            }
            v.column_mut(dst).assign(&rot.column(src));
        }

        Self { u, sigma, v }
    }

    /// `U_k * diag(sigma_k) * V_kᵀ`
    pub fn reconstruct(&self) -> Array2<f64> {
        let scaled = &self.u * &self.sigma.view().insert_axis(Axis(0));
        scaled.dot(&self.v.t())
    }

    /// One row of the reconstruction, without building the whole matrix.
    pub fn reconstruct_row(&self, row: usize) -> Array1<f64> {
        let weighted = &self.u.slice(s![row, ..]) * &self.sigma;
        self.v.dot(&weighted)
    }
}

fn rotate_columns(m: &mut Array2<f64>, p: usize, q: usize, c: f64, s: f64) {
    for i in 0..m.nrows() {
        let xp = m[[i, p]];
        let xq = m[[i, q]];
        m[[i, p]] = c * xp - s * xq;
        m[[i, q]] = s * xp + c * xq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    fn assert_close(a: &Array2<f64>, b: &Array2<f64>, eps: f64) {
        assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < eps, "{} vs {}\n{}\n{}", x, y, a, b);
        }
    }

    #[test]
    fn test_full_rank_reconstruction_is_exact() {
        let a = array![[1.0, 1.0, 0.0], [1.0, 1.0, 1.0], [0.0, 0.0, 0.0], [0.0, 1.0, 1.0]];
        let svd = TruncatedSvd::compute(&a, 3);
        assert_close(&svd.reconstruct(), &a, 1e-9);
    }

    #[test]
    fn test_singular_values_are_sorted() {
        let a = array![[3.0, 0.0], [0.0, 5.0], [0.0, 0.0]];
        let svd = TruncatedSvd::compute(&a, 2);
        assert!((svd.sigma[0] - 5.0).abs() < 1e-12);
        assert!((svd.sigma[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_wide_matrix_is_transposed() {
        let a = array![[1.0, 0.0, 2.0, 0.0], [0.0, 1.0, 0.0, 3.0]];
        let svd = TruncatedSvd::compute(&a, 2);
        assert_eq!(svd.u.dim(), (2, 2));
        assert_eq!(svd.v.dim(), (4, 2));
        assert_close(&svd.reconstruct(), &a, 1e-9);
    }

    #[test]
    fn test_rank_one_truncation() {
        // rows: alice {1,2}, bob {1,2,3}, carol {4}
        let a = array![
            [1.0, 1.0, 0.0, 0.0],
            [1.0, 1.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0]
        ];
        let svd = TruncatedSvd::compute(&a, 1);
        assert_eq!(svd.sigma.len(), 1);
        assert_eq!(svd.u.dim(), (3, 1));

        let alice = svd.reconstruct_row(0);
        // unborrowed book 3 gets positive affinity, unrelated book 4 none
        assert!(alice[2] > 0.4 && alice[2] < 0.6, "{}", alice);
        assert!(alice[3].abs() < 1e-9);

        let full = svd.reconstruct();
        for j in 0..4 {
            assert!((full[[0, j]] - alice[j]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_matrix() {
        let a = Array2::<f64>::zeros((3, 2));
        let svd = TruncatedSvd::compute(&a, 2);
        assert!(svd.sigma.iter().all(|s| *s == 0.0));
        assert_close(&svd.reconstruct(), &a, 1e-12);
    }

    proptest! {
        #[test]
        fn prop_binary_matrices_reconstruct(
            (rows, cols, cells) in (1usize..6, 1usize..6)
                .prop_flat_map(|(r, c)| (Just(r), Just(c), proptest::collection::vec(any::<bool>(), r * c)))
        ) {
            let a = Array2::from_shape_vec(
                (rows, cols),
                cells.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
            ).unwrap();
            let svd = TruncatedSvd::compute(&a, rows.min(cols));
            let back = svd.reconstruct();
            for (x, y) in back.iter().zip(a.iter()) {
                prop_assert!((x - y).abs() < 1e-8);
            }
            for w in svd.sigma.as_slice().unwrap().windows(2) {
                prop_assert!(w[0] >= w[1]);
            }
        }
    }
}

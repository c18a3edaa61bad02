//! Hand-rolled sparse linear algebra on [`CsMat`], kept deliberately small:
//! the only operations backward induction needs are matrix-matrix product
//! (composing per-basin transition operators), transpose matrix-vector
//! product (propagating the value function backward), and column sums
//! (detecting probability mass lost at the grid boundary).

use ndarray::Array1;
use sprs::{CsMat, TriMatI};

/// `A * B`, both taken as `CsMat<f64>` of compatible shape.
pub fn spmatmul(a: &CsMat<f64>, b: &CsMat<f64>) -> CsMat<f64> {
    let rows = a.rows();
    let cols = b.cols();
    let a_csc = a.to_csc();
    let b_csc = b.to_csc();

    let mut tri = TriMatI::<f64, usize>::new((rows, cols));
    let mut acc = vec![0.0f64; rows];
    let mut touched: Vec<usize> = Vec::new();

    for k in 0..cols {
        touched.clear();
        if let Some(col_b) = b_csc.outer_view(k) {
            for (&j, &wb) in col_b.indices().iter().zip(col_b.data().iter()) {
                if wb == 0.0 {
                    continue;
                }
                if let Some(col_a) = a_csc.outer_view(j) {
                    for (&i, &wa) in col_a.indices().iter().zip(col_a.data().iter()) {
                        if acc[i] == 0.0 {
                            touched.push(i);
                        }
                        acc[i] += wa * wb;
                    }
                }
            }
        }
        touched.sort_unstable();
        for &i in &touched {
            if acc[i] != 0.0 {
                tri.add_triplet(i, k, acc[i]);
            }
            acc[i] = 0.0;
        }
    }
    tri.to_csr()
}

/// `A^T * x`.
pub fn transpose_matvec(a: &CsMat<f64>, x: &Array1<f64>) -> Array1<f64> {
    let cols = a.cols();
    let a_csc = a.to_csc();
    Array1::from_shape_fn(cols, |j| match a_csc.outer_view(j) {
        Some(col) => col.indices().iter().zip(col.data().iter()).map(|(&i, &v)| v * x[i]).sum(),
        None => 0.0,
    })
}

/// The sum of each column of `a`.
pub fn column_sums(a: &CsMat<f64>) -> Array1<f64> {
    let cols = a.cols();
    let a_csc = a.to_csc();
    Array1::from_shape_fn(cols, |j| match a_csc.outer_view(j) {
        Some(col) => col.data().iter().sum(),
        None => 0.0,
    })
}

/// The `n x n` identity matrix.
pub fn identity(n: usize) -> CsMat<f64> {
    let mut tri = TriMatI::<f64, usize>::new((n, n));
    for i in 0..n {
        tri.add_triplet(i, i, 1.0);
    }
    tri.to_csr()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(a: &CsMat<f64>) -> Vec<Vec<f64>> {
        let (rows, cols) = (a.rows(), a.cols());
        let mut out = vec![vec![0.0; cols]; rows];
        for (val, (i, j)) in a.iter() {
            out[i][j] += *val;
        }
        out
    }

    #[test]
    fn identity_times_identity_is_identity() {
        let id = identity(4);
        let prod = spmatmul(&id, &id);
        assert_eq!(dense(&prod), dense(&id));
    }

    #[test]
    fn matmul_matches_manual_computation() {
        let mut a = TriMatI::<f64, usize>::new((2, 2));
        a.add_triplet(0, 0, 1.0);
        a.add_triplet(0, 1, 2.0);
        a.add_triplet(1, 1, 3.0);
        let a = a.to_csr();

        let mut b = TriMatI::<f64, usize>::new((2, 2));
        b.add_triplet(0, 0, 1.0);
        b.add_triplet(1, 0, 1.0);
        b.add_triplet(1, 1, 1.0);
        let b = b.to_csr();

        // a*b = [[1,2],[0,3]] * [[1,0],[1,1]] = [[3,2],[3,3]]
        let prod = dense(&spmatmul(&a, &b));
        assert_eq!(prod, vec![vec![3.0, 2.0], vec![3.0, 3.0]]);
    }

    #[test]
    fn column_sums_of_identity_are_one() {
        let id = identity(5);
        let sums = column_sums(&id);
        assert!(sums.iter().all(|&s| float_cmp::approx_eq!(f64, s, 1.0, epsilon = 1e-12)));
    }

    #[test]
    fn transpose_matvec_matches_manual_computation() {
        let mut a = TriMatI::<f64, usize>::new((2, 2));
        a.add_triplet(0, 0, 2.0);
        a.add_triplet(1, 0, 3.0);
        a.add_triplet(1, 1, 4.0);
        let a = a.to_csr();
        let x = Array1::from(vec![1.0, 10.0]);
        // a^T = [[2,3],[0,4]]; a^T * x = [2*1+3*10, 4*10] = [32, 40]
        let out = transpose_matvec(&a, &x);
        assert_eq!(out.to_vec(), vec![32.0, 40.0]);
    }
}

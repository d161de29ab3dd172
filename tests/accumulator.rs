//! Integration tests for accumulators

use halo_csr::accumulator::{create_accumulator, multiply_row, Accumulator, DenseAccumulator, SortAccumulator};
use halo_csr::SparseMatrixCSR;

/// A = [1 2 0; 0 3 4; 5 0 6], B = [7 0 0; 0 8 0; 0 0 9]
fn operands() -> (SparseMatrixCSR<f64>, SparseMatrixCSR<f64>) {
    let a = SparseMatrixCSR::new(
        3,
        3,
        vec![0, 2, 4, 6],
        vec![0, 1, 1, 2, 0, 2],
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
    )
    .unwrap();
    let b = SparseMatrixCSR::new(3, 3, vec![0, 1, 2, 3], vec![0, 1, 2], vec![7.0, 8.0, 9.0]).unwrap();
    (a, b)
}

fn product_rows(acc: &mut dyn Accumulator<f64>) -> (Vec<usize>, Vec<f64>) {
    let (a, b) = operands();
    let mut cols = Vec::new();
    let mut vals = Vec::new();
    for i in 0..a.n_rows {
        multiply_row(i, &a, &b, acc, &mut cols, &mut vals);
    }
    (cols, vals)
}

#[test]
fn test_dense_accumulator_with_sparse_matrices() {
    // C = [7 16 0; 0 24 36; 35 0 54]
    let mut acc = DenseAccumulator::new(3);
    let (cols, vals) = product_rows(&mut acc);
    assert_eq!(cols, vec![0, 1, 1, 2, 0, 2]);
    assert_eq!(vals, vec![7.0, 16.0, 24.0, 36.0, 35.0, 54.0]);
}

#[test]
fn test_sort_accumulator_with_sparse_matrices() {
    let mut acc = SortAccumulator::new(4);
    let (cols, vals) = product_rows(&mut acc);
    assert_eq!(cols, vec![0, 1, 1, 2, 0, 2]);
    assert_eq!(vals, vec![7.0, 16.0, 24.0, 36.0, 35.0, 54.0]);
}

#[test]
fn test_accumulator_selection_by_width() {
    // Duplicate columns collapse either way
    for threshold in [0, 1024] {
        let mut acc = create_accumulator::<f64>(512, threshold);
        for &(c, v) in &[(300, 1.0), (5, 2.0), (300, 0.5), (511, -1.0)] {
            acc.accumulate(c, v);
        }
        let mut cols = Vec::new();
        let mut vals = Vec::new();
        acc.drain_into(&mut cols, &mut vals);
        assert_eq!(cols, vec![5, 300, 511]);
        assert_eq!(vals, vec![2.0, 1.5, -1.0]);

        // Reusable after draining
        acc.accumulate(1, 1.0);
        cols.clear();
        vals.clear();
        acc.drain_into(&mut cols, &mut vals);
        assert_eq!(cols, vec![1]);
    }
}

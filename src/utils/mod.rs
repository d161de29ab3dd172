//! Utility functions and helpers

pub mod formats;

/// Computes an exclusive prefix sum (scan) for a vector
///
/// The result has one more element than the input; its last element is the
/// total, so `result[p]..result[p + 1]` is the slice belonging to `input[p]`.
pub fn exclusive_scan(input: &[usize]) -> Vec<usize> {
    let mut result = Vec::with_capacity(input.len() + 1);
    let mut sum = 0;

    result.push(0); // First element is always 0

    for &val in input {
        sum += val;
        result.push(sum);
    }

    result
}

/// Splits `data` into consecutive chunks of the given lengths
pub fn split_by_counts<D: Clone>(data: &[D], counts: &[usize]) -> Vec<Vec<D>> {
    let mut out = Vec::with_capacity(counts.len());
    let mut start = 0;
    for &count in counts {
        out.push(data[start..start + count].to_vec());
        start += count;
    }
    out
}

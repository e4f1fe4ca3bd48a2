//! Principal component extraction via power iteration, ported directly from
//! the reference `pca.c`: a max-component-normalized power iteration over
//! the column covariance matrix of amplitude rows, not a vector-norm
//! normalization. This is a deliberate fidelity choice — see DESIGN.md.

use crate::error::{RadarError, Result};

const ITRS_MAX: usize = 30;
const PRECISION: f32 = 1e-4;

/// Computes the symmetric column covariance matrix of `matrix` (row-major,
/// `rows` rows of `cols` columns), normalized by `rows * cols`.
fn compute_cov(matrix: &[f32], rows: usize, cols: usize) -> Vec<f32> {
	let mut cov = vec![0f32; cols * cols];
	let zoom_out = (rows * cols) as f32;

	for i in 0..cols {
		for j in 0..=i {
			let mut acc = 0f32;
			for k in 0..rows {
				acc += matrix[k * cols + i] * matrix[k * cols + j];
			}
			acc /= zoom_out;
			cov[i * cols + j] = acc;
			if i != j {
				cov[j * cols + i] = acc;
			}
		}
	}
	cov
}

/// Power iteration over a square matrix, normalized each step by the
/// maximum component of `M v` rather than its Euclidean norm.
fn power_method_eigen(matrix: &[f32], n: usize) -> Result<Vec<f32>> {
	let mut eigenvector = vec![1f32; n];
	let mut eigenvalue = 1f64;
	let mut eigenvalue_last = 0f64;
	let mut iterate = 0;
	let mut next = vec![0f32; n];

	while (eigenvalue - eigenvalue_last).abs() > PRECISION as f64 && iterate < ITRS_MAX {
		eigenvalue_last = eigenvalue;
		eigenvalue = 0f64;

		for i in 0..n {
			let mut acc = 0f32;
			for j in 0..n {
				acc += matrix[i * n + j] * eigenvector[j];
			}
			next[i] = acc;
			if acc as f64 > eigenvalue {
				eigenvalue = acc as f64;
			}
		}

		for i in 0..n {
			eigenvector[i] = next[i] / eigenvalue as f32;
		}

		iterate += 1;
	}

	if iterate == ITRS_MAX {
		return Err(RadarError::PcaDivergence);
	}
	Ok(eigenvector)
}

/// Runs PCA over the concatenation of two wraparound-aware amplitude-matrix
/// slices (`data_0` then `data_1`, each a flat `rows * cols` row-major
/// buffer), returning one output value per sub-carrier column.
pub fn pca(cols: usize, data_0: &[f32], rows_0: usize, data_1: &[f32], rows_1: usize) -> Result<Vec<f32>> {
	let column = rows_0 + rows_1;
	// Transpose into a cols x column matrix: matrix[i][j] = row j's i-th amplitude.
	let mut matrix = vec![0f32; cols * column];
	for i in 0..cols {
		for j in 0..rows_0 {
			matrix[i * column + j] = data_0[j * cols + i];
		}
		for j in 0..rows_1 {
			matrix[i * column + (j + rows_0)] = data_1[j * cols + i];
		}
	}

	let cov = compute_cov(&matrix, cols, column);
	let eigenvector = power_method_eigen(&cov, column)?;

	let mut output = vec![0f32; cols];
	for i in 0..cols {
		let mut acc = 0f32;
		for j in 0..column {
			acc += matrix[i * column + j] * eigenvector[j];
		}
		output[i] = acc / column as f32;
	}
	Ok(output)
}

/// Pearson correlation exactly as the reference `corr()` computes it:
/// `cov_sum / sqrt(var_sum_a * var_sum_b)`, where `cov_sum`/`var_sum_*` are
/// raw sums of centered products (not divided by `n`) — the `n` cancels
/// between numerator and denominator of the textbook formula, so this is
/// algebraically equivalent, not an approximation.
pub fn pearson_corr(a: &[f32], b: &[f32]) -> f32 {
	debug_assert_eq!(a.len(), b.len());
	let n = a.len() as f32;
	let mean_a = a.iter().sum::<f32>() / n;
	let mean_b = b.iter().sum::<f32>() / n;

	let mut cov_sum = 0f32;
	let mut var_sum_a = 0f32;
	let mut var_sum_b = 0f32;
	for i in 0..a.len() {
		let da = a[i] - mean_a;
		let db = b[i] - mean_b;
		cov_sum += da * db;
		var_sum_a += da * da;
		var_sum_b += db * db;
	}

	cov_sum / (var_sum_a * var_sum_b).sqrt()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn correlation_is_idempotent() {
		let v = [1.0f32, 2.0, 5.0, 3.0, 9.0];
		assert!((pearson_corr(&v, &v) - 1.0).abs() < 1e-5);
	}

	#[test]
	fn pca_recovers_a_parallel_direction() {
		// All rows are scalar multiples of a single known direction; the
		// leading eigenvector of the covariance matrix should be parallel
		// to it, up to the power iteration's max-component normalization.
		let direction = [1.0f32, 2.0, 3.0, 4.0];
		let cols = direction.len();
		let rows_0 = 4;
		let mut data_0 = vec![0f32; rows_0 * cols];
		for r in 0..rows_0 {
			let scale = (r + 1) as f32;
			for c in 0..cols {
				data_0[r * cols + c] = direction[c] * scale;
			}
		}
		let out = pca(cols, &data_0, rows_0, &[], 0).unwrap();
		let ratio_first = out[1] / out[0];
		let ratio_expected = direction[1] / direction[0];
		assert!((ratio_first - ratio_expected).abs() < 1e-2);
	}

	#[test]
	fn wraparound_split_matches_single_contiguous_input() {
		// Splitting the same rows across data_0/data_1 (the ring buffer's
		// wraparound slicing) must give the same PCA output as one contiguous
		// slice, since pca() only ever concatenates them column-wise.
		let direction = [2.0f32, -1.0, 0.5];
		let cols = direction.len();
		let mut all = vec![0f32; 6 * cols];
		for r in 0..6 {
			let scale = (r + 1) as f32;
			for c in 0..cols {
				all[r * cols + c] = direction[c] * scale;
			}
		}
		let whole = pca(cols, &all, 6, &[], 0).unwrap();
		let split = pca(cols, &all[..4 * cols], 4, &all[4 * cols..], 2).unwrap();
		for i in 0..cols {
			assert!((whole[i] - split[i]).abs() < 1e-3);
		}
	}
}

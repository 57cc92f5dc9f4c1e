//! Minimal dense linear algebra for the KKT systems of the LCQP solver.

/// Row-major dense matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn diagonal(values: &[f64]) -> Self {
        let mut m = Self::zeros(values.len(), values.len());
        for (i, v) in values.iter().enumerate() {
            m.set(i, i, *v);
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] += value;
    }

    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        (0..self.rows)
            .map(|r| {
                self.data[r * self.cols..(r + 1) * self.cols]
                    .iter()
                    .zip(x)
                    .map(|(a, b)| a * b)
                    .sum()
            })
            .collect()
    }

    /// Largest absolute entry.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |m, v| m.max(v.abs()))
    }
}

/// Solve `a · x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` when a pivot falls below `1e-14` times the largest
/// entry of `a`, or when the solution is not finite.
pub fn solve(a: &Matrix, b: &[f64]) -> Option<Vec<f64>> {
    let n = a.rows();
    if a.cols() != n || b.len() != n {
        return None;
    }
    let scale = a.max_abs().max(f64::MIN_POSITIVE);
    let threshold = scale * 1e-14;

    let mut m = a.clone();
    let mut rhs = b.to_vec();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| m.get(i, col).abs().total_cmp(&m.get(j, col).abs()))?;
        if m.get(pivot, col).abs() <= threshold {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                let tmp = m.get(col, k);
                m.set(col, k, m.get(pivot, k));
                m.set(pivot, k, tmp);
            }
            rhs.swap(col, pivot);
        }
        let diag = m.get(col, col);
        for row in col + 1..n {
            let factor = m.get(row, col) / diag;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m.add(row, k, -factor * m.get(col, k));
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| m.get(row, k) * x[k]).sum();
        x[row] = (rhs[row] - tail) / m.get(row, row);
    }
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn norm_inf(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solve_small_system() {
        let mut a = Matrix::zeros(3, 3);
        let entries = [[2.0, 1.0, -1.0], [-3.0, -1.0, 2.0], [-2.0, 1.0, 2.0]];
        for (r, row) in entries.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                a.set(r, c, *v);
            }
        }
        let x = solve(&a, &[8.0, -11.0, -3.0]).unwrap();
        assert_relative_eq!(x[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 3.0, epsilon = 1e-12);
        assert_relative_eq!(x[2], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_matrix_detected() {
        let mut a = Matrix::zeros(2, 2);
        a.set(0, 0, 1.0);
        a.set(0, 1, 2.0);
        a.set(1, 0, 2.0);
        a.set(1, 1, 4.0);
        assert!(solve(&a, &[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_mul_vec() {
        let m = Matrix::diagonal(&[1.0, 2.0, 3.0]);
        assert_eq!(m.mul_vec(&[1.0, 1.0, 1.0]), vec![1.0, 2.0, 3.0]);
        assert_eq!(norm_inf(&[-4.0, 2.0]), 4.0);
        assert_eq!(dot(&[1.0, 2.0], &[3.0, 4.0]), 11.0);
    }
}

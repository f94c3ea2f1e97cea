// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A 4x4 complex matrix acting on the four correlations (XX, XY, YX, YY) of a
//! visibility.

use std::ops::{Index, IndexMut, Mul};

use marlu::{c64, Jones};
use num_traits::{One, Zero};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Mueller(pub [c64; 16]);

impl Mueller {
    pub fn identity() -> Mueller {
        Mueller::from_diagonal([c64::one(); 4])
    }

    pub fn from_diagonal(d: [c64; 4]) -> Mueller {
        let mut m = Mueller::default();
        for (i, d) in d.into_iter().enumerate() {
            m[(i, i)] = d;
        }
        m
    }

    /// Multiply the correlation 4-vector of `v` by this matrix.
    pub fn apply(&self, v: Jones<f64>) -> Jones<f64> {
        let mut out = [c64::zero(); 4];
        for (i, out) in out.iter_mut().enumerate() {
            for j in 0..4 {
                *out += self[(i, j)] * v[j];
            }
        }
        Jones::from(out)
    }

    /// Invert this matrix with Gauss-Jordan elimination. `None` is returned if
    /// the matrix is singular.
    pub fn inv(&self) -> Option<Mueller> {
        let mut a = *self;
        let mut inv = Mueller::identity();
        for col in 0..4 {
            // Partial pivoting.
            let pivot = (col..4).max_by(|&r1, &r2| {
                a[(r1, col)]
                    .norm()
                    .total_cmp(&a[(r2, col)].norm())
            })?;
            if a[(pivot, col)].norm() == 0.0 {
                return None;
            }
            if pivot != col {
                for j in 0..4 {
                    a.0.swap(pivot * 4 + j, col * 4 + j);
                    inv.0.swap(pivot * 4 + j, col * 4 + j);
                }
            }

            let p = a[(col, col)];
            for j in 0..4 {
                a[(col, j)] /= p;
                inv[(col, j)] /= p;
            }
            for row in (0..4).filter(|&r| r != col) {
                let factor = a[(row, col)];
                if factor == c64::default() {
                    continue;
                }
                for j in 0..4 {
                    let (a_cj, inv_cj) = (a[(col, j)], inv[(col, j)]);
                    a[(row, j)] -= factor * a_cj;
                    inv[(row, j)] -= factor * inv_cj;
                }
            }
        }

        if inv.0.iter().any(|e| !e.re.is_finite() || !e.im.is_finite()) {
            None
        } else {
            Some(inv)
        }
    }
}

impl Index<(usize, usize)> for Mueller {
    type Output = c64;

    fn index(&self, (row, col): (usize, usize)) -> &c64 {
        &self.0[row * 4 + col]
    }
}

impl IndexMut<(usize, usize)> for Mueller {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut c64 {
        &mut self.0[row * 4 + col]
    }
}

impl Mul for Mueller {
    type Output = Mueller;

    fn mul(self, rhs: Mueller) -> Mueller {
        let mut out = Mueller::default();
        for i in 0..4 {
            for j in 0..4 {
                for k in 0..4 {
                    out[(i, j)] += self[(i, k)] * rhs[(k, j)];
                }
            }
        }
        out
    }
}

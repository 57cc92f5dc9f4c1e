/// Result of a bracketing root search: the best point found, which is
/// an exact root only when the function is continuous there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Root {
    pub x: f64,
    pub value: f64,
    pub iterations: usize,
}

/// Brent–Dekker root finder combining bisection, secant and inverse
/// quadratic interpolation. Falls back to bisection whenever the
/// interpolated step misbehaves, so it also narrows down jumps of a
/// discontinuous function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrentRootFinder {
    max_iterations: usize,
    accuracy: f64,
}

impl BrentRootFinder {
    /// `accuracy` is the absolute residual at which the search stops.
    pub fn new(max_iterations: usize, accuracy: f64) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            accuracy: accuracy.max(0.0),
        }
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Root of `f` in `[a, b]`. `None` when `f(a)` and `f(b)` have the
    /// same strict sign.
    pub fn find_root<F>(&self, mut f: F, a: f64, b: f64) -> Option<Root>
    where
        F: FnMut(f64) -> f64,
    {
        let fa = f(a);
        let fb = f(b);
        self.find_root_from(&mut f, (a, fa), (b, fb))
    }

    /// Same as [`find_root`](Self::find_root) when both end values are
    /// already known.
    pub fn find_root_from<F>(&self, f: &mut F, left: (f64, f64), right: (f64, f64)) -> Option<Root>
    where
        F: FnMut(f64) -> f64,
    {
        let (mut a, mut fa) = left;
        let (mut b, mut fb) = right;
        if fa.abs() <= self.accuracy {
            return Some(Root { x: a, value: fa, iterations: 0 });
        }
        if fb.abs() <= self.accuracy {
            return Some(Root { x: b, value: fb, iterations: 0 });
        }
        if fa.signum() == fb.signum() {
            return None;
        }

        let (mut c, mut fc) = (b, fb);
        let mut d = b - a;
        let mut e = d;

        for iteration in 1..=self.max_iterations {
            if fb.signum() == fc.signum() {
                c = a;
                fc = fa;
                d = b - a;
                e = d;
            }
            if fc.abs() < fb.abs() {
                a = b;
                b = c;
                c = a;
                fa = fb;
                fb = fc;
                fc = fa;
            }

            let tol = 2.0 * f64::EPSILON * b.abs() + 0.5e-15;
            let xm = 0.5 * (c - b);
            if fb.abs() <= self.accuracy || xm.abs() <= tol {
                return Some(Root { x: b, value: fb, iterations: iteration });
            }

            if e.abs() >= tol && fa.abs() > fb.abs() {
                let s = fb / fa;
                let (mut p, mut q);
                if a == c {
                    p = 2.0 * xm * s;
                    q = 1.0 - s;
                } else {
                    let qa = fa / fc;
                    let r = fb / fc;
                    p = s * (2.0 * xm * qa * (qa - r) - (b - a) * (r - 1.0));
                    q = (qa - 1.0) * (r - 1.0) * (s - 1.0);
                }
                if p > 0.0 {
                    q = -q;
                }
                p = p.abs();
                let bound = (3.0 * xm * q - (tol * q).abs()).min((e * q).abs());
                if 2.0 * p < bound {
                    e = d;
                    d = p / q;
                } else {
                    d = xm;
                    e = d;
                }
            } else {
                d = xm;
                e = d;
            }

            a = b;
            fa = fb;
            b += if d.abs() > tol { d } else { tol.copysign(xm) };
            fb = f(b);
        }

        Some(Root {
            x: b,
            value: fb,
            iterations: self.max_iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_finds_cubic_root() {
        let root = BrentRootFinder::new(100, 1e-14)
            .find_root(|x| x * x * x - 2.0, 0.0, 2.0)
            .unwrap();
        assert_abs_diff_eq!(root.x, 2.0_f64.cbrt(), epsilon = 1e-12);
        assert!(root.iterations < 50);
    }

    #[test]
    fn test_no_sign_change() {
        assert!(BrentRootFinder::new(100, 1e-12)
            .find_root(|x| x * x + 1.0, -1.0, 1.0)
            .is_none());
    }

    #[test]
    fn test_discontinuity_is_narrowed_down() {
        let root = BrentRootFinder::new(200, 1e-12)
            .find_root(|x| if x < 0.3 { 1.0 } else { -1.0 }, 0.0, 1.0)
            .unwrap();
        assert_abs_diff_eq!(root.x, 0.3, epsilon = 1e-12);
        assert_eq!(root.value.abs(), 1.0);
    }

    #[test]
    fn test_iteration_cap_respected() {
        let root = BrentRootFinder::new(3, 0.0)
            .find_root(|x| x.exp() - 10.0, 0.0, 10.0)
            .unwrap();
        assert_eq!(root.iterations, 3);
    }
}

//! One-dimensional minimization: Brent's method on a bracket, with
//! golden-ratio bracket expansion for unbounded searches.

use crate::solver::bounds::Bounds;

const GOLDEN_SECTION: f64 = 0.381_966_011_250_105_1;
const GOLDEN_RATIO: f64 = 1.618_033_988_749_895;
const MAX_BRACKET_STEPS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMinimum {
    pub x: f64,
    pub value: f64,
    pub iterations: usize,
    pub evaluations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrentLineSearch {
    relative_tolerance: f64,
    absolute_tolerance: f64,
    max_iterations: usize,
}

impl Default for BrentLineSearch {
    fn default() -> Self {
        Self {
            relative_tolerance: f64::EPSILON.sqrt(),
            absolute_tolerance: 1e-14,
            max_iterations: 200,
        }
    }
}

impl BrentLineSearch {
    pub fn new(relative_tolerance: f64, absolute_tolerance: f64, max_iterations: usize) -> Self {
        Self {
            relative_tolerance,
            absolute_tolerance,
            max_iterations: max_iterations.max(1),
        }
    }

    /// Minimize `f` on `[a, b]`.
    ///
    /// Both endpoints are evaluated and compared exactly with the
    /// interior result, so a function decreasing towards an endpoint
    /// returns that endpoint itself.
    pub fn minimize_bounded<F>(&self, mut f: F, a: f64, b: f64) -> LineMinimum
    where
        F: FnMut(f64) -> f64,
    {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        if lo == hi {
            return LineMinimum {
                x: lo,
                value: f(lo),
                iterations: 0,
                evaluations: 1,
            };
        }
        let mut best = self.brent(&mut f, lo, hi);
        for endpoint in [lo, hi] {
            let value = f(endpoint);
            best.evaluations += 1;
            if value <= best.value {
                best.x = endpoint;
                best.value = value;
            }
        }
        best
    }

    /// Minimize `f` without bounds, starting at `start` with a first
    /// trial step of `step`.
    pub fn minimize<F>(&self, mut f: F, start: f64, step: f64) -> LineMinimum
    where
        F: FnMut(f64) -> f64,
    {
        let step = if step == 0.0 { 1.0 } else { step };
        let (a, b, evaluations) = bracket(&mut f, start, start + step);
        let mut result = self.brent(&mut f, a.min(b), a.max(b));
        result.evaluations += evaluations;
        result
    }

    /// Minimize `f(x + t·direction)` over `t`, keeping the point inside
    /// `bounds`. Returns the minimum in terms of `t`.
    pub fn minimize_along<F>(
        &self,
        mut f: F,
        x: &[f64],
        direction: &[f64],
        bounds: &Bounds,
    ) -> LineMinimum
    where
        F: FnMut(&[f64]) -> f64,
    {
        let mut point = x.to_vec();
        let mut along = |t: f64| {
            for (i, p) in point.iter_mut().enumerate() {
                *p = x[i] + t * direction[i];
            }
            bounds.project(&mut point);
            f(&point)
        };

        let (low, high) = bounds.step_range(x, direction);
        if low.is_finite() && high.is_finite() {
            return self.minimize_bounded(along, low, high);
        }
        let mut result = self.minimize(&mut along, 0.0, 1.0);
        let clamped = result.x.clamp(low, high);
        if clamped != result.x {
            result.x = clamped;
            result.value = along(clamped);
            result.evaluations += 1;
        }
        result
    }

    // Brent's parabolic interpolation with golden-section fallback.
    fn brent<F>(&self, f: &mut F, lo: f64, hi: f64) -> LineMinimum
    where
        F: FnMut(f64) -> f64,
    {
        let (mut a, mut b) = (lo, hi);
        let mut x = a + GOLDEN_SECTION * (b - a);
        let (mut w, mut v) = (x, x);
        let mut fx = f(x);
        let (mut fw, mut fv) = (fx, fx);
        let mut d: f64 = 0.0;
        let mut e: f64 = 0.0;
        let mut evaluations = 1;
        let mut iterations = 0;

        while iterations < self.max_iterations {
            let xm = 0.5 * (a + b);
            let tol1 = self.relative_tolerance * x.abs() + self.absolute_tolerance;
            let tol2 = 2.0 * tol1;
            if (x - xm).abs() <= tol2 - 0.5 * (b - a) {
                break;
            }
            iterations += 1;

            let mut golden = true;
            if e.abs() > tol1 {
                let r = (x - w) * (fx - fv);
                let mut q = (x - v) * (fx - fw);
                let mut p = (x - v) * q - (x - w) * r;
                q = 2.0 * (q - r);
                if q > 0.0 {
                    p = -p;
                } else {
                    q = -q;
                }
                let previous = e;
                if p.abs() < (0.5 * q * previous).abs() && p > q * (a - x) && p < q * (b - x) {
                    e = d;
                    d = p / q;
                    let u = x + d;
                    if u - a < tol2 || b - u < tol2 {
                        d = tol1.copysign(xm - x);
                    }
                    golden = false;
                }
            }
            if golden {
                e = if x >= xm { a - x } else { b - x };
                d = GOLDEN_SECTION * e;
            }

            let u = if d.abs() >= tol1 {
                x + d
            } else {
                x + tol1.copysign(d)
            };
            let fu = f(u);
            evaluations += 1;

            if fu <= fx {
                if u >= x {
                    a = x;
                } else {
                    b = x;
                }
                v = w;
                fv = fw;
                w = x;
                fw = fx;
                x = u;
                fx = fu;
            } else {
                if u < x {
                    a = u;
                } else {
                    b = u;
                }
                if fu <= fw || w == x {
                    v = w;
                    fv = fw;
                    w = u;
                    fw = fu;
                } else if fu <= fv || v == x || v == w {
                    v = u;
                    fv = fu;
                }
            }
        }

        LineMinimum {
            x,
            value: fx,
            iterations,
            evaluations,
        }
    }
}

/// Expand `[a, b]` downhill by the golden ratio until it brackets a
/// minimum. Returns the outer points and the number of evaluations.
fn bracket<F>(f: &mut F, mut a: f64, mut b: f64) -> (f64, f64, usize)
where
    F: FnMut(f64) -> f64,
{
    let mut fa = f(a);
    let mut fb = f(b);
    let mut evaluations = 2;
    if fb > fa {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }
    let mut c = b + GOLDEN_RATIO * (b - a);
    let mut fc = f(c);
    evaluations += 1;

    let mut steps = 0;
    while fc < fb && steps < MAX_BRACKET_STEPS && c.is_finite() {
        a = b;
        b = c;
        fb = fc;
        c = b + GOLDEN_RATIO * (b - a);
        fc = f(c);
        evaluations += 1;
        steps += 1;
    }
    (a, c, evaluations)
}

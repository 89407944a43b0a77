//! Semirings: the pair `(add, multiply)` the caller supplies. Only these two operations
//! are invoked over matrix values anywhere in the core (see DESIGN.md decision 4 on why a
//! single value type is used end to end instead of independent `MapTypeA`/`MapTypeB`/
//! `ReduceType` parameters).

use std::ops::{Add, Mul};

/// A semiring over `T`: `add` must be commutative and associative with identity `zero()`;
/// `multiply` distributes over `add`. Only these two operations and `zero` are ever
/// invoked by the core.
pub trait Semiring<T> {
    fn add(&self, a: T, b: T) -> T;
    fn multiply(&self, a: T, b: T) -> T;
    fn zero(&self) -> T;
}

/// The ordinary arithmetic semiring: `add = +`, `multiply = *`, `zero = T::default()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlusTimes;

impl<T> Semiring<T> for PlusTimes
where
    T: Copy + Add<Output = T> + Mul<Output = T> + Default,
{
    fn add(&self, a: T, b: T) -> T {
        a + b
    }

    fn multiply(&self, a: T, b: T) -> T {
        a * b
    }

    fn zero(&self) -> T {
        T::default()
    }
}

/// Shortest-path style semiring over `f64`: `add = min`, `multiply = +`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinPlus;

impl Semiring<f64> for MinPlus {
    fn add(&self, a: f64, b: f64) -> f64 {
        a.min(b)
    }

    fn multiply(&self, a: f64, b: f64) -> f64 {
        a + b
    }

    fn zero(&self) -> f64 {
        f64::INFINITY
    }
}

/// Boolean semiring: `add = ||`, `multiply = &&`. Useful for reachability-style products.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrAnd;

impl Semiring<bool> for OrAnd {
    fn add(&self, a: bool, b: bool) -> bool {
        a || b
    }

    fn multiply(&self, a: bool, b: bool) -> bool {
        a && b
    }

    fn zero(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_times_matches_arithmetic() {
        let s = PlusTimes;
        assert_eq!(Semiring::<f64>::add(&s, 2.0, 3.0), 5.0);
        assert_eq!(Semiring::<f64>::multiply(&s, 2.0, 3.0), 6.0);
    }

    #[test]
    fn min_plus_identity_is_infinity() {
        let s = MinPlus;
        assert_eq!(s.add(s.zero(), 4.0), 4.0);
        assert_eq!(s.multiply(2.0, 3.0), 5.0);
    }

    #[test]
    fn or_and_is_boolean_semiring() {
        let s = OrAnd;
        assert!(s.add(false, true));
        assert!(!s.multiply(true, false));
    }
}

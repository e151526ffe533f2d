//! Operator boilerplate for transparent newtypes over an integer amount.

/// Implements a binary arithmetic trait for a single-field tuple struct by forwarding to the
/// inner value.
#[macro_export]
macro_rules! op {
    (binary $t:ty, $op:ident, $f:ident) => {
        impl std::ops::$op for $t {
            type Output = Self;

            fn $f(self, rhs: Self) -> Self::Output {
                Self(std::ops::$op::$f(self.0, rhs.0))
            }
        }
    };
}

//! Named business-rule guards over aggregate state.

/// A named predicate over aggregate state, evaluated before a command
/// handler runs.
///
/// Invariants are declarative: the executor evaluates every invariant
/// registered for a command, in order, against the folded state. The first
/// failing invariant aborts the command with
/// [`CommandError::InvariantViolation`](crate::error::CommandError) — nothing
/// is emitted, state is unchanged (all-or-nothing).
///
/// # Examples
///
/// ```
/// use emporium_core::invariant::Invariant;
///
/// struct CartState { status: String }
///
/// const MUST_BE_OPEN: Invariant<CartState> = Invariant {
///     description: "Cart must be open",
///     valid: |state| state.status == "Open",
/// };
///
/// let open = CartState { status: "Open".to_string() };
/// assert!((MUST_BE_OPEN.valid)(&open));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Invariant<S> {
    /// Human-readable rule, surfaced verbatim in the violation error.
    pub description: &'static str,
    /// The predicate; `false` rejects the command.
    pub valid: fn(&S) -> bool,
}

impl<S> Invariant<S> {
    /// Evaluate the invariant against a state.
    #[must_use]
    pub fn holds(&self, state: &S) -> bool {
        (self.valid)(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        count: u32,
    }

    const NOT_EMPTY: Invariant<Counter> = Invariant {
        description: "counter must be non-zero",
        valid: |c| c.count > 0,
    };

    #[test]
    fn holds_evaluates_predicate() {
        assert!(!NOT_EMPTY.holds(&Counter { count: 0 }));
        assert!(NOT_EMPTY.holds(&Counter { count: 3 }));
    }

    #[test]
    fn description_is_stable() {
        assert_eq!(NOT_EMPTY.description, "counter must be non-zero");
    }
}

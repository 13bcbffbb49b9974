//! Shared proptest strategies for schema tests.

use proptest::prelude::*;

/// Strategy for generating dotted unit identifiers (e.g. `com.acme.Widget`).
pub fn arb_unit() -> impl Strategy<Value = String> {
    "[a-z]{1,6}\\.[a-z]{1,6}\\.[A-Z][a-zA-Z0-9]{0,9}"
}

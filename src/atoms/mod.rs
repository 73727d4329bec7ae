//! Built-in atoms
//!
//! Small demonstration atoms for exercising storage, caching and wiring.
//! Connectors to external sources live outside this crate and register
//! themselves into an [`AtomRegistry`] the same way.

pub mod csv_load;
pub mod filter;
pub mod numeric;
pub mod print;

use crate::atom::AtomRegistry;

/// Register every built-in atom
pub fn register_builtin(registry: &mut AtomRegistry) {
    registry.register(numeric::generate_random_series());
    registry.register(numeric::list_prime_factors());
    registry.register(numeric::count_items());
    registry.register(numeric::divisible_by_n());
    registry.register(numeric::most_common());
    registry.register(print::print_field());
    registry.register(print::print_string());
    registry.register(filter::filter_below_n());
    registry.register(csv_load::read_csv());
}

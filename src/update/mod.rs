//! Update compilation: [`UpdateOperations`] accumulates field directives and
//! renders the update document.

mod numeric;
mod ops;
mod push_options;

pub use ops::{UpdateOperations, UpdateOperator};
pub use push_options::{PushOptions, PushSort};

//! Service layer: wires the pure engines to the store and the optimistic
//! mutation coordinator. Everything the hosting shell calls lives here.

pub mod goals;
pub mod transfer;

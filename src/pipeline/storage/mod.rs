// Pipeline storage: CSV artifacts and the relational places table

pub mod artifacts;
pub mod tabular_store;

pub use tabular_store::TabularStore;

//! SeaORM entities describing the storage representation of the schema.

pub mod prelude;

pub mod task;

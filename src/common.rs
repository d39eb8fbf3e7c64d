pub mod dates;
pub mod error;
pub mod periods;
pub mod status_sets;

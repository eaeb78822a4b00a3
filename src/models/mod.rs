pub mod context;
pub mod result_set;

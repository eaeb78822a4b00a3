pub mod config;
pub mod csv_export;
pub mod db_external;
pub mod db_internal;
pub mod llm;
pub mod utils;

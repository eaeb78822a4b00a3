pub mod charts;
pub mod clause_normalizer;
pub mod map_render;
pub mod materializer;
pub mod sql_agent;
pub mod sql_extractor;
pub mod summarizer;

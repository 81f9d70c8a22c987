pub mod checkpoint;
pub mod chunking_strategy;
pub mod embedding_pipeline;
pub mod search;
pub mod vector_index;

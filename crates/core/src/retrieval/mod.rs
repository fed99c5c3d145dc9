pub mod bm25;
pub mod vector;

pub use bm25::{Bm25Index, Bm25Parameters, Bm25Retrieval};
pub use vector::VectorRetrieval;

pub mod cluster;

pub use cluster::{cluster_hashes, find_similar_pages, Cluster};

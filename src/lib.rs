//! Load electromagnetic-impedance (EMI) sensor sweeps from hierarchical
//! stores, merge the per-specimen groups into aligned feature and label
//! arrays, and prepare them for compressive-strength regression.

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;

pub use data::loader::ReadMode;
pub use data::merge::{check_alignment, extract_features, layout_features, merge, MergedDataset};
pub use data::model::FeatureLayout;
pub use data::{load_dataset, LoadedDataset};
pub use error::{EmiError, Result};

pub mod anomalies;
pub mod catalog;
pub mod dataset;
pub mod error;
pub mod extremes;
pub mod granger;
pub mod impact;
pub mod summary;
pub mod tools;

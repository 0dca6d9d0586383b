//! Descriptive statistics for the statistics panel and reports.

mod boxplot;
mod correlation;
mod descriptive;
mod histogram;

pub use boxplot::BoxStats;
pub use correlation::{correlation_matrix, pearson};
pub(crate) use descriptive::sorted;
pub use descriptive::{finite, mean, quantile, quantile_sorted, std_dev, Summary};
pub use histogram::{auto_bins, gaussian_kde, histogram, Histogram};

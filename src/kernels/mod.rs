pub mod cumsum;
pub mod distance;
pub mod knn;
pub mod regression;

pub use cumsum::{cumulative_sum, integrated_profile, CumSumError, CumSumOutput};
pub use distance::{euclidean_distance, squared_distance_q15, squared_to_real, DistanceError};
pub use knn::{nearest_neighbors, KnnError, Neighbor};
pub use regression::{linear_regression, Regression};

mod metric;
mod user;

pub use metric::{MetricType, QualityFlag, TrendDirection};
pub use user::{UserResponse, UserRole, UserRow};

pub mod expectations;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod schema;

pub use crate::domain::model::{ApiResponse, HttpMethod, ResponseBody};
pub use crate::domain::ports::ApiTransport;
pub use crate::utils::error::Result;

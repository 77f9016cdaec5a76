//! Connection configuration and REST mapping

mod config;
mod mapper;

pub use config::RestConfig;
pub use mapper::{MapperError, RestMapper, RestMapping, StaticRestMapper};

pub mod db;
pub mod error;
pub mod plays;
pub(crate) mod schema;

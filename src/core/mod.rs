pub mod category;
pub mod error;
pub mod money;
pub mod product;
pub mod query;
pub mod validate;

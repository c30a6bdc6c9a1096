// Core modules implementing the dataset contract, both backends, and error modeling.
pub mod error;
pub mod flatfile;
pub mod metadata;
pub mod sql;
pub mod store;
pub mod value;

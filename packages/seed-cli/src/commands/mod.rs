pub mod aggregate;
pub mod info;
pub mod labels;
pub mod regressor;
pub mod validate;

//! Concrete configuration stores

pub mod env;
pub mod properties;
pub mod tree;

pub use env::EnvSource;
pub use properties::PropertiesSource;
pub use tree::TreeSource;

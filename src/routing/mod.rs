pub mod node;
pub mod registry;
pub mod route;
pub mod tree;

// Collaborator contracts consumed by the workspace engine

pub mod project;
pub mod sandbox;
pub mod store;

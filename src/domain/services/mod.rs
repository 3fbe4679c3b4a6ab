// Domain services contain business logic that doesn't naturally fit in entities
// They orchestrate between entities and use ports to interact with infrastructure

pub mod knock_engine;

pub use knock_engine::*;

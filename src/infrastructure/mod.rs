// Infrastructure layer - concrete implementations of domain ports
// This layer contains adapters that connect domain logic to external systems

// Core adapters organized by technology/responsibility
pub mod capture;        // tshark field-output event source
pub mod fanout;         // One capture feeding several engines
pub mod process;        // Interface listing and privilege checks
pub mod trigger;        // Console, log and command completion actions
pub mod validation;     // Concrete validation implementations

// Factories for creating adapter instances
pub mod factories;

// Re-export commonly used adapters
pub use capture::*;
pub use fanout::*;
pub use process::*;
pub use trigger::*;
pub use validation::*;
pub use factories::*;

pub mod capture;       // Knock event sources
pub mod trigger;       // Actions fired on completed sequences
pub mod process;       // Host/system lookups
pub mod validation;    // Configuration validation

pub use capture::*;
pub use trigger::*;
pub use process::*;
pub use validation::*;

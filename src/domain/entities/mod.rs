pub mod capture;
pub mod knock;
pub mod knocker;

pub use capture::*;
pub use knock::*;
pub use knocker::*;

pub mod clock;
pub mod messages;
pub mod types;

// Re-export important types
pub use clock::*;
pub use messages::*;
pub use types::*;

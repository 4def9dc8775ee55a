mod debates;
mod health;
pub mod sse;

pub use debates::*;
pub use health::*;

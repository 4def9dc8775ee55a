mod debate;
mod metrics;
mod participant;
mod state;
mod turn;

pub use debate::*;
pub use metrics::*;
pub use participant::*;
pub use state::*;
pub use turn::*;

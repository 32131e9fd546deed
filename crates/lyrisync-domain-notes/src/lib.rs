pub mod extract;
pub mod fallback;
pub mod model;
pub mod tempo;

pub use extract::*;
pub use model::*;
pub use tempo::*;

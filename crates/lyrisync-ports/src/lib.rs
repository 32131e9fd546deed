pub mod font;
pub mod render;
pub mod settings;
pub mod types;
pub mod video;

pub use font::*;
pub use render::*;
pub use settings::*;
pub use types::*;
pub use video::*;

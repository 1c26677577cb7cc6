pub mod regime;
pub mod stability;
pub mod timeline;
pub mod dashboard;

pub use timeline::*;
pub use dashboard::*;

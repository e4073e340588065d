// ferrous_core: tipos básicos y utilidades compartidas por el baker

// scratch memory with checkpoint/revert semantics
pub mod arena;

// integer placement rects and normalized texture rects
pub mod rect;

pub use arena::{Arena, Marker};
pub use rect::{PixelRect, UvRect};

// re-export glam so downstream crates agree on the vector types
pub use glam;

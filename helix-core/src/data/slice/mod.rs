//! 2D 横切面的提取、叠加与持久化.

mod extract;
mod save;

pub use extract::{extract_slice, extract_slice_windowed, Slice};

pub use save::ImgWriteVis;

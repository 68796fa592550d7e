//! 账本数据模型

mod entry;
mod enums;

pub use entry::*;
pub use enums::*;

//! 输出目标

use std::path::Path;

use anyhow::Result;

use super::record::Record;

mod dot;
mod ini;
pub use dot::Dot;
pub use ini::Ini;

/// 输出目标
pub trait Target {
    /// 将记录写入流。
    fn write(f: impl std::io::Write, records: &[Record]) -> Result<()>;

    /// 将记录写入文件。
    fn write_to_file(filename: impl AsRef<Path>, records: &[Record]) -> Result<()> {
        let mut f = std::fs::File::create(filename)?;
        Self::write(&mut f, records)
    }
}

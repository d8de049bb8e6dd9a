//! 编译与运行选项。

/// 编译与运行选项。
#[derive(Clone, Debug)]
pub struct Options {
    /// 反编译输出每层缩进的空格数。
    pub indent: usize,
    /// 跟踪求值过程。
    pub trace: bool,
    /// 求值时的随机数种子。
    pub seed: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            indent: 4,
            trace: false,
            seed: 4869,
        }
    }
}

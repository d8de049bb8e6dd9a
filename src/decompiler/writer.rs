//! 带缩进的文本输出。

/// 按层级缩进的文本输出
pub struct TabbedWriter {
    buffer: String,
    width: usize,
    level: usize,
    line_start: bool,
}

impl TabbedWriter {
    /// 每层缩进 `width` 个空格。
    pub fn new(width: usize) -> Self {
        Self {
            buffer: String::new(),
            width,
            level: 0,
            line_start: true,
        }
    }

    /// 增加一层缩进。
    pub fn indent(&mut self) {
        self.level += 1;
    }

    /// 减少一层缩进。
    pub fn unindent(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    /// 追加文本，不换行。
    pub fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.line_start {
            self.buffer
                .extend(std::iter::repeat(' ').take(self.width * self.level));
            self.line_start = false;
        }
        self.buffer.push_str(text);
    }

    /// 追加文本并换行。空行不带缩进。
    pub fn append_line(&mut self, text: &str) {
        self.append(text);
        self.buffer.push('\n');
        self.line_start = true;
    }

    /// 取出全部文本。
    pub fn finish(self) -> String {
        self.buffer
    }
}

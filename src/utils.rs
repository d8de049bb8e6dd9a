use std::{fmt::Display, ops::Deref};

use annotate_snippets::snippet::{AnnotationType, Slice, SourceAnnotation};

/// 带位置信息的值
#[derive(Debug, Clone, PartialEq)]
pub struct Span<T> {
    inner: T,
    /// 行号
    pub line: usize,
    /// 列号
    pub column: usize,
}

impl<T: Display> Display for Span<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl<T> Deref for Span<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> AsRef<T> for Span<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}

impl<T> Span<T> {
    /// 创建一个新的 `Span`。
    pub fn new(inner: T, line: usize, column: usize) -> Self {
        Self {
            inner,
            line,
            column,
        }
    }

    /// 转换为内部类型。
    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// 所在行的信息
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinesInfo<'a> {
    /// 文件名
    pub filename: &'a str,
    /// 出错的那一行
    pub source: String,
    /// 行号
    pub line_start: usize,
    /// 标注在 source 中的字符区间
    pub range: (usize, usize),
}

impl<'a> LinesInfo<'a> {
    /// 定位 `line`:`column` 所在的行。
    pub fn at(filename: &'a str, source: &str, line: usize, column: usize) -> Option<Self> {
        let text = source.lines().nth(line.checked_sub(1)?)?;
        let mut text = text.trim_end_matches('\r').to_string();
        let len = text.chars().count();
        let start = column.saturating_sub(1).min(len);
        if start == len {
            // 指向行尾时补一个空格，让标注有地方落下
            text.push(' ');
        }
        Some(LinesInfo {
            filename,
            source: text,
            line_start: line,
            range: (start, start + 1),
        })
    }

    pub fn as_annotation<'b>(
        &'b self,
        message: &'b str,
        annotation_type: AnnotationType,
    ) -> Slice<'b> {
        Slice {
            source: &self.source,
            line_start: self.line_start,
            origin: Some(self.filename),
            annotations: vec![SourceAnnotation {
                range: self.range,
                label: message,
                annotation_type,
            }],
            fold: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_column() {
        let info = LinesInfo::at("a.vs", "weight 1;\nweight x;\n", 2, 8).unwrap();
        assert_eq!(info.source, "weight x;");
        assert_eq!(info.line_start, 2);
        assert_eq!(info.range, (7, 8));
    }

    #[test]
    fn end_of_line_gets_padding() {
        let info = LinesInfo::at("a.vs", "weight 1", 1, 9).unwrap();
        assert_eq!(info.source, "weight 1 ");
        assert_eq!(info.range, (8, 9));
    }

    #[test]
    fn missing_line() {
        assert!(LinesInfo::at("a.vs", "weight 1;", 3, 1).is_none());
    }
}

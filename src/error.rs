//! 编译与反编译错误。

use annotate_snippets::{
    display_list::{DisplayList, FormatOptions},
    snippet::{Annotation, AnnotationType, Snippet},
};
use thiserror::Error;

use crate::backend::NodeId;
use crate::utils::LinesInfo;

/// 编译错误，带有出错位置。
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{source_name}:{line}:{column}: {message}")]
pub struct CompileError {
    /// 源文件名
    pub source_name: String,
    /// 行号，从 1 开始
    pub line: usize,
    /// 列号，从 1 开始
    pub column: usize,
    /// 错误信息
    pub message: String,
}

impl CompileError {
    /// 创建一个新的 `CompileError`。
    pub fn new(
        source_name: impl Into<String>,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            line,
            column,
            message: message.into(),
        }
    }

    /// 渲染为带源码片段的诊断信息。
    pub fn to_snippet(&self, source: &str) -> String {
        let lines = LinesInfo::at(&self.source_name, source, self.line, self.column);
        let snippet = Snippet {
            title: Some(Annotation {
                id: None,
                label: Some("compile error"),
                annotation_type: AnnotationType::Error,
            }),
            footer: vec![],
            slices: lines
                .iter()
                .map(|lines| lines.as_annotation(&self.message, AnnotationType::Error))
                .collect(),
            opt: FormatOptions {
                color: true,
                ..Default::default()
            },
        };
        DisplayList::from(snippet).to_string()
    }
}

/// 反编译错误。
#[allow(missing_docs)]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecompileError {
    #[error("no start node (expected node {0})")]
    NoStartNode(NodeId),

    #[error("duplicate node {0}")]
    DuplicateNode(NodeId),

    #[error("cannot find node {child} (child of node {parent})")]
    MissingNode { parent: NodeId, child: NodeId },

    #[error("invalid branch node {0}: first child has no offer_group")]
    InvalidBranch(NodeId),

    #[error("decision node {id} has {count} children, expected 2")]
    DecisionArity { id: NodeId, count: usize },

    #[error("unknown record kind `{0}`")]
    UnknownKind(String),

    #[error("record {id}: invalid `{entry}` entry: {message}")]
    InvalidEntry {
        id: NodeId,
        entry: String,
        message: String,
    },

    #[error("node {0} is part of a cycle")]
    Cycle(NodeId),
}

/// INI 文本解析错误。
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: {message}")]
pub struct IniError {
    /// 行号，从 1 开始
    pub line: usize,
    /// 错误信息
    pub message: String,
}

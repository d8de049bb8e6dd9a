//! A compiler and decompiler for Vignette Script.
//!
//! Vignette Script describes the node graphs that drive randomly generated
//! missions. The compiler lowers a script into a shared-node graph and emits
//! it as flat node records; the decompiler recovers a readable script from
//! those records, and the runtime walks a graph the way the game would.

#![deny(missing_docs)]

pub mod backend;
pub mod decompiler;
pub mod error;
pub mod frontend;
pub mod options;
pub mod runtime;
pub mod schema;
pub(crate) mod utils;

use anyhow::Result;
use backend::record::{self, GraphSource, Record};
use backend::target::{Ini, Target};
use backend::Tree;
use error::{CompileError, DecompileError};
use options::Options;
use runtime::{Parameters, VignetteInfo};

/// 编译源代码为节点图
pub fn compile_tree(source: &str, source_name: &str) -> std::result::Result<Tree, CompileError> {
    let module = frontend::parser::parse(source, source_name)?;
    frontend::check::check_module(&module, source_name)?;
    backend::builder::build(module, source_name)
}

/// 编译源代码为节点记录
pub fn compile(source: &str, source_name: &str) -> std::result::Result<Vec<Record>, CompileError> {
    let tree = compile_tree(source, source_name)?;
    Ok(record::to_records(&tree))
}

/// 以默认选项反编译节点记录
pub fn decompile<S: GraphSource + ?Sized>(source: &S) -> std::result::Result<String, DecompileError> {
    decompiler::decompile(source, &Options::default())
}

/// 编译器上下文
#[derive(Default)]
pub struct Context {
    records: Vec<Record>,
    options: Options,
}

impl Context {
    /// 创建一个新的上下文。
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置选项。
    pub fn set_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// 编译源代码，结果替换当前的记录。
    pub fn add_file(mut self, filename: &str, source: &str) -> Result<Self> {
        self.records = match compile(source, filename) {
            Ok(records) => records,
            Err(e) => anyhow::bail!("{}", e.to_snippet(source)),
        };
        Ok(self)
    }

    /// 读入 INI 格式的节点记录。
    pub fn add_records(mut self, source: &str) -> Result<Self> {
        self.records = Ini::read(source)?;
        Ok(self)
    }

    /// 当前的节点记录。
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// 反编译当前的记录。
    pub fn decompile(&self) -> Result<String> {
        Ok(decompiler::decompile(&self.records, &self.options)?)
    }

    /// 输出到流。
    pub fn output_stream<T: Target>(&self, output: impl std::io::Write) -> Result<()> {
        T::write(output, &self.records)
    }

    /// 输出到文件。
    pub fn output_file<T: Target>(&self, output: impl AsRef<std::path::Path>) -> Result<()> {
        T::write_to_file(output, &self.records)
    }

    /// 运行。
    pub fn run(&self, params: &Parameters) -> Result<VignetteInfo> {
        let tree = record::load(&self.records)?;
        Ok(runtime::run(&tree, params, &self.options)?)
    }
}

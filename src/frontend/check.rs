//! 语义检查。

use std::collections::{HashMap, HashSet};

use colorized::{Color, Colors};

use crate::error::CompileError;
use crate::frontend::ast::{Condition, Field, Module, Statement};
use crate::utils::Span;

type Result<T> = std::result::Result<T, CompileError>;

/// 依次访问所有语句，包括条件分支内部的语句。
fn walk<'a>(statements: &'a [Span<Statement>], f: &mut impl FnMut(&'a Span<Statement>)) {
    for statement in statements {
        f(statement);
        match &**statement {
            Statement::Sub(sub) => walk(&sub.body, f),
            Statement::If(if_else) => {
                for block in &if_else.blocks {
                    walk(&block.body, f);
                }
            }
            _ => {}
        }
    }
}

fn error<T>(source_name: &str, at: &Span<T>, message: String) -> CompileError {
    CompileError::new(source_name, at.line, at.column, message)
}

/// 势力组与子程序不能重名
pub fn check_declarations(module: &Module, source_name: &str) -> Result<()> {
    let mut groups = HashSet::new();
    let mut subs = HashSet::new();
    for statement in &module.statements {
        match &**statement {
            Statement::Group(group) if !groups.insert(group.name.as_str()) => {
                return Err(error(
                    source_name,
                    statement,
                    format!("Duplicate group '{}'", group.name),
                ));
            }
            Statement::Sub(sub) if !subs.insert(sub.name.as_str()) => {
                return Err(error(
                    source_name,
                    statement,
                    format!("Duplicate sub '{}'", sub.name),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

/// 引用的势力组与子程序必须已声明
pub fn check_references(module: &Module, source_name: &str) -> Result<()> {
    let mut groups = HashSet::new();
    let mut subs = HashSet::new();
    for statement in &module.statements {
        match &**statement {
            Statement::Group(group) => {
                groups.insert(group.name.as_str());
            }
            Statement::Sub(sub) => {
                subs.insert(sub.name.as_str());
            }
            _ => {}
        }
    }

    let mut result = Ok(());
    walk(&module.statements, &mut |statement| {
        if result.is_err() {
            return;
        }
        let unknown_group = |name: &str| {
            (!groups.contains(name)).then(|| format!("Unknown group '{}'", name))
        };
        let message = match &**statement {
            Statement::Call(name) if !subs.contains(name.as_str()) => {
                Some(format!("Unknown sub '{}'", name))
            }
            Statement::Field(Field::OfferGroup(name) | Field::HostileGroup(name)) => {
                unknown_group(name)
            }
            Statement::If(if_else) => if_else.blocks.iter().find_map(|block| {
                match &block.condition {
                    Condition::Group(name) => unknown_group(name),
                    _ => None,
                }
            }),
            _ => None,
        };
        if let Some(message) = message {
            result = Err(error(source_name, statement, message));
        }
    });
    result
}

fn calls_in(statements: &[Span<Statement>]) -> Vec<&Span<Statement>> {
    let mut calls = vec![];
    walk(statements, &mut |statement| {
        if let Statement::Call(_) = &**statement {
            calls.push(statement);
        }
    });
    calls
}

/// 子程序不能直接或间接调用自身
pub fn check_recursion(module: &Module, source_name: &str) -> Result<()> {
    let subs = module
        .statements
        .iter()
        .filter_map(|statement| match &**statement {
            Statement::Sub(sub) => Some((sub.name.as_str(), calls_in(&sub.body))),
            _ => None,
        })
        .collect::<HashMap<_, _>>();

    fn visit<'a>(
        name: &'a str,
        subs: &HashMap<&'a str, Vec<&'a Span<Statement>>>,
        stack: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
        source_name: &str,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        stack.push(name);
        for call in subs.get(name).into_iter().flatten() {
            let Statement::Call(target) = &***call else {
                continue;
            };
            if stack.contains(&target.as_str()) {
                return Err(error(
                    source_name,
                    *call,
                    format!("Recursive call to sub '{}'", target),
                ));
            }
            visit(target, subs, stack, done, source_name)?;
        }
        stack.pop();
        done.insert(name);
        Ok(())
    }

    let mut names = subs.keys().copied().collect::<Vec<_>>();
    names.sort_unstable();
    let mut done = HashSet::new();
    for name in names {
        visit(name, &subs, &mut vec![], &mut done, source_name)?;
    }
    Ok(())
}

/// 从未被调用的子程序
pub fn unused_subs(module: &Module) -> Vec<&str> {
    let mut called = HashSet::new();
    walk(&module.statements, &mut |statement| {
        if let Statement::Call(name) = &**statement {
            called.insert(name.as_str());
        }
    });
    module
        .statements
        .iter()
        .filter_map(|statement| match &**statement {
            Statement::Sub(sub) if !called.contains(sub.name.as_str()) => Some(sub.name.as_str()),
            _ => None,
        })
        .collect()
}

/// 检查整个脚本，并对未使用的子程序给出警告
pub fn check_module(module: &Module, source_name: &str) -> Result<()> {
    check_declarations(module, source_name)?;
    check_references(module, source_name)?;
    check_recursion(module, source_name)?;
    for name in unused_subs(module) {
        eprintln!(
            "{}: sub `{}` is never called",
            "warning".color(Colors::YellowFg),
            name
        );
    }
    Ok(())
}

//! 语法解析器。

use crate::error::CompileError;
use crate::frontend::ast::{self, Condition, Field, IfBlock, Statement};
use crate::frontend::lexer::{Lexer, Token, TokenKind};
use crate::schema::{
    CommSequence, CommSource, CommTarget, ObjectiveText, OfferText, OfferTextItem, OfferTextOp,
    Plurality, VignetteString,
};
use crate::utils::Span;

type Result<T> = std::result::Result<T, CompileError>;

/// 从文本生成抽象语法树
pub fn parse(source: &str, filename: &str) -> Result<ast::Module> {
    ModuleParser {
        lexer: Lexer::new(source, filename),
    }
    .parse_module()
}

struct ModuleParser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> ModuleParser<'a> {
    fn parse_module(mut self) -> Result<ast::Module> {
        let mut statements = vec![];
        while self.lexer.current()?.kind != TokenKind::EndOfFile {
            statements.push(self.parse_statement(true)?);
        }
        Ok(ast::Module { statements })
    }

    fn parse_statement(&mut self, top_level: bool) -> Result<Span<Statement>> {
        let def = self.lexer.current()?.clone();
        match def.kind {
            TokenKind::Identifier => {}
            TokenKind::EndOfFile => return Err(self.lexer.error("Unexpected end of file")),
            _ => return Err(self.lexer.error(format!("Unexpected '{}'", def.text))),
        }

        let statement = match def.text.as_str() {
            "sub" | "group" if !top_level => {
                return Err(self
                    .lexer
                    .error(format!("'{}' can only appear in the top level", def.text)))
            }
            "sub" => Statement::Sub(self.parse_sub()?),
            "group" => Statement::Group(self.parse_group()?),
            "if" => Statement::If(self.parse_if()?),
            "call" => {
                self.lexer.next()?;
                let target = self.identifier()?;
                self.expect(TokenKind::Semicolon)?;
                Statement::Call(target)
            }
            "err_unimplemented" => {
                self.lexer.next()?;
                self.expect(TokenKind::Semicolon)?;
                Statement::Unimplemented
            }
            "doc" => {
                self.lexer.next()?;
                let doc = self.identifier()?;
                self.expect(TokenKind::Semicolon)?;
                Statement::Doc(doc)
            }
            _ => Statement::Field(self.parse_field(&def)?),
        };
        Ok(Span::new(statement, def.line, def.column))
    }

    fn parse_field(&mut self, def: &Token) -> Result<Field> {
        let field = match def.text.as_str() {
            "comm_sequence" => {
                self.lexer.next()?;
                Field::CommSequence(self.parse_comm_sequence()?)
            }
            "failure_text" => {
                self.lexer.next()?;
                Field::FailureText(self.parse_string()?)
            }
            "reward_text" => {
                self.lexer.next()?;
                Field::RewardText(self.parse_string()?)
            }
            "objective_text" => {
                self.lexer.next()?;
                let target = self.identifier()?;
                self.expect(TokenKind::Comma)?;
                let text = self.parse_string()?;
                Field::ObjectiveText(ObjectiveText { target, text })
            }
            "offer_text" => {
                self.lexer.next()?;
                Field::OfferText(self.parse_offer_text()?)
            }
            "difficulty" => {
                self.lexer.next()?;
                let min = self.number()?;
                self.expect(TokenKind::Comma)?;
                let max = self.number()?;
                Field::Difficulty(min, max)
            }
            "weight" => {
                self.lexer.next()?;
                Field::Weight(self.integer()?)
            }
            "allowable_zone_types" => {
                self.lexer.next()?;
                Field::AllowableZoneTypes(self.identifier_list()?)
            }
            "offer_group" => {
                self.lexer.next()?;
                Field::OfferGroup(self.identifier()?)
            }
            "hostile_group" => {
                self.lexer.next()?;
                Field::HostileGroup(self.identifier()?)
            }
            other => return Err(self.lexer.error(format!("Unexpected '{}'", other))),
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(field)
    }

    fn parse_sub(&mut self) -> Result<ast::Sub> {
        self.lexer.next()?;
        let name = self.identifier()?;
        let mut body = vec![];
        while !self.lexer.is_identifier("end", false)? {
            if self.lexer.current()?.kind == TokenKind::EndOfFile {
                return Err(self.lexer.error("Unexpected end of file, expected 'end'"));
            }
            body.push(self.parse_statement(false)?);
        }
        self.lexer.next()?;
        Ok(ast::Sub { name, body })
    }

    fn parse_group(&mut self) -> Result<ast::Group> {
        self.lexer.next()?;
        let name = self.identifier()?;
        let factions = self.identifier_list()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(ast::Group { name, factions })
    }

    fn parse_if(&mut self) -> Result<ast::IfElse> {
        let mut blocks = vec![self.parse_block(true)?];
        while !self.lexer.is_identifier("end", false)? {
            let block = self.parse_block(false)?;
            let is_else = block.condition == Condition::Else;
            blocks.push(block);
            if is_else {
                break;
            }
        }
        if !self.lexer.is_identifier("end", false)? {
            return Err(self.lexer.error("Expected 'end'"));
        }
        if blocks.len() == 1 {
            return Err(self.lexer.error("if expecting elif or else"));
        }
        if let Some(IfBlock {
            condition: Condition::Named(name),
            ..
        }) = blocks.last()
        {
            let message = format!("if expecting else or elif group(...) after elif {}", name);
            return Err(self.lexer.error(message));
        }
        self.lexer.next()?;
        Ok(ast::IfElse { blocks })
    }

    fn parse_block(&mut self, is_if: bool) -> Result<IfBlock> {
        let token = self.expect_kind(TokenKind::Identifier)?;
        let condition = if !is_if && self.lexer.is_identifier("else", false)? {
            self.lexer.next()?;
            Condition::Else
        } else if (is_if && token.text == "if") || (!is_if && token.text == "elif") {
            self.lexer.next()?;
            if self.lexer.is_identifier("group", false)? {
                self.lexer.next()?;
                self.expect(TokenKind::LeftParen)?;
                let name = self.identifier()?;
                self.expect(TokenKind::RightParen)?;
                Condition::Group(name)
            } else {
                Condition::Named(self.identifier()?)
            }
        } else {
            return Err(self.lexer.error("Expected 'elif', 'else' or 'end'"));
        };

        let mut body = vec![];
        loop {
            if self.lexer.is_identifier("end", false)?
                || self.lexer.is_identifier("else", false)?
                || self.lexer.is_identifier("elif", false)?
            {
                break;
            }
            if self.lexer.current()?.kind == TokenKind::EndOfFile {
                return Err(self.lexer.error("Unexpected end of file, expected 'end'"));
            }
            body.push(self.parse_statement(false)?);
        }
        Ok(IfBlock { condition, body })
    }

    fn parse_comm_sequence(&mut self) -> Result<CommSequence> {
        let event = self.identifier()?;
        self.expect(TokenKind::Comma)?;
        let target = self.keyword::<CommTarget>("comm_sequence target")?;
        self.expect(TokenKind::Comma)?;
        let a = self.number()?;
        self.expect(TokenKind::Comma)?;
        let b = self.number()?;
        self.expect(TokenKind::Comma)?;
        let c = self.number()?;
        self.expect(TokenKind::Comma)?;
        let source = self.keyword::<CommSource>("comm_sequence source")?;
        self.expect(TokenKind::Comma)?;
        let comm = self.identifier()?;
        Ok(CommSequence {
            event,
            target,
            floats: (a, b, c),
            source,
            comm,
        })
    }

    /// `INT ("," IDENT)*`
    fn parse_string(&mut self) -> Result<VignetteString> {
        let message_id = self.integer()?;
        let mut args = vec![];
        while self.eat(TokenKind::Comma)? {
            args.push(self.identifier()?);
        }
        Ok(VignetteString { message_id, args })
    }

    fn parse_offer_text(&mut self) -> Result<Vec<OfferText>> {
        self.expect(TokenKind::LeftParen)?;
        let mut entries = vec![];
        loop {
            let op = self.keyword::<OfferTextOp>("'append' or 'replace'")?;
            self.expect(TokenKind::LeftParen)?;
            let mut items = vec![];
            loop {
                items.push(self.parse_offer_item()?);
                if self.lexer.current()?.kind == TokenKind::RightParen {
                    break;
                }
            }
            self.expect(TokenKind::RightParen)?;
            entries.push(OfferText { op, items });
            if !self.eat(TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RightParen)?;
        Ok(entries)
    }

    /// 解析一项；之后的逗号若不引出参数，则属于下一项。
    fn parse_offer_item(&mut self) -> Result<OfferTextItem> {
        let plurality = if self.lexer.is_identifier("singular", true)? {
            Plurality::Singular
        } else if self.lexer.is_identifier("plural", true)? {
            Plurality::Plural
        } else {
            Plurality::None
        };
        if plurality != Plurality::None {
            self.lexer.next()?;
            self.expect(TokenKind::Comma)?;
        }
        let message_id = self.integer()?;
        let mut args = vec![];
        while self.eat(TokenKind::Comma)? {
            let is_arg = self.lexer.current()?.kind == TokenKind::Identifier
                && !self.lexer.is_identifier("singular", true)?
                && !self.lexer.is_identifier("plural", true)?;
            if !is_arg {
                break;
            }
            args.push(self.identifier()?);
        }
        Ok(OfferTextItem {
            message_id,
            plurality,
            args,
        })
    }

    /// `IDENT ("," IDENT)*`
    fn identifier_list(&mut self) -> Result<Vec<String>> {
        let mut names = vec![self.identifier()?];
        while self.eat(TokenKind::Comma)? {
            names.push(self.identifier()?);
        }
        Ok(names)
    }

    fn identifier(&mut self) -> Result<String> {
        Ok(self.expect(TokenKind::Identifier)?.text)
    }

    fn integer(&mut self) -> Result<i32> {
        let token = self.expect_kind(TokenKind::Integer)?;
        let value = token.text.parse().map_err(|_| {
            self.lexer
                .error_at(token.line, token.column, "Integer out of range")
        })?;
        self.lexer.next()?;
        Ok(value)
    }

    fn number(&mut self) -> Result<f32> {
        let token = self.expect_kind(TokenKind::Float)?;
        let value = token.text.parse().map_err(|_| {
            self.lexer
                .error_at(token.line, token.column, format!("Invalid number '{}'", token.text))
        })?;
        self.lexer.next()?;
        Ok(value)
    }

    fn keyword<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self.expect_kind(TokenKind::Identifier)?;
        match token.text.parse::<T>() {
            Ok(value) => {
                self.lexer.next()?;
                Ok(value)
            }
            Err(_) => Err(self.lexer.error(format!("Expected {}", what))),
        }
    }

    /// 检查当前词法单元的种类，不前进。`Float` 同时接受整数。
    fn expect_kind(&mut self, kind: TokenKind) -> Result<Token> {
        let token = self.lexer.current()?.clone();
        let matches = match kind {
            TokenKind::Float => matches!(token.kind, TokenKind::Integer | TokenKind::Float),
            _ => token.kind == kind,
        };
        if matches {
            Ok(token)
        } else if token.kind == TokenKind::EndOfFile {
            Err(self
                .lexer
                .error(format!("Expected {}, found end of file", kind)))
        } else {
            Err(self
                .lexer
                .error(format!("Expected {}, found '{}'", kind, token.text)))
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        let token = self.expect_kind(kind)?;
        self.lexer.next()?;
        Ok(token)
    }

    fn eat(&mut self, kind: TokenKind) -> Result<bool> {
        if self.lexer.current()?.kind == kind {
            self.lexer.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

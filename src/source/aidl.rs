//! Built-in reader for `.aidl` declaration files.
//!
//! AIDL is a small language: a `package` line, `import` lines and one or more top-level
//! declarations, each an `interface`, a `parcelable`, an `enum` or a `union`. The reader only
//! keeps what matters for Parcel layout:
//!
//! - interface methods in declaration order, with `oneway`, direction keywords and explicit
//!   transaction codes (`void ping() = 3;`)
//! - parcelable and union fields in declaration order; default values and constants are skipped
//! - the `@Backing(type="...")` annotation of enums
//! - forward declarations (`parcelable Foo;`), which have no layout of their own
//!
//! Nested declarations become separate [`DeclUnit`]s named `Outer.Inner`.

use std::path::Path;

use crate::{
    schema::{ImportDef, QualifiedName},
    source::{DeclUnit, FieldDecl, MethodDecl, Modifiers, ParamDecl, SourceParser, TypeRef, UnitKind},
    Error, Result,
};

/// [`SourceParser`] for AIDL text.
#[derive(Debug, Default, Clone, Copy)]
pub struct AidlParser;

impl SourceParser for AidlParser {
    fn extension(&self) -> &'static str {
        "aidl"
    }

    fn parse(&self, path: &Path, text: &str) -> Result<Vec<DeclUnit>> {
        let tokens = lex(path, text)?;
        AidlReader {
            tokens: &tokens,
            pos: 0,
            path,
        }
        .document()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    Punct(char),
}

#[derive(Debug, Clone)]
struct Lexed {
    token: Token,
    line: usize,
}

fn lex(path: &Path, text: &str) -> Result<Vec<Lexed>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            line += 1;
            i += 1;
        } else if c.is_whitespace() {
            i += 1;
        } else if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            let start_line = line;
            i += 2;
            loop {
                match chars.get(i) {
                    None => {
                        return Err(syntax(path, start_line, "unterminated comment"));
                    }
                    Some('*') if chars.get(i + 1) == Some(&'/') => {
                        i += 2;
                        break;
                    }
                    Some('\n') => line += 1,
                    Some(_) => {}
                }
                i += 1;
            }
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '$')) {
                i += 1;
            }
            tokens.push(Lexed {
                token: Token::Ident(chars[start..i].iter().collect()),
                line,
            });
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                i += 1;
            }
            tokens.push(Lexed {
                token: Token::Number(chars[start..i].iter().collect()),
                line,
            });
        } else if c == '"' || c == '\'' {
            let start_line = line;
            let mut value = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None | Some('\n') => {
                        return Err(syntax(path, start_line, "unterminated literal"));
                    }
                    Some('\\') => {
                        if let Some(escaped) = chars.get(i + 1) {
                            value.push(*escaped);
                        }
                        i += 2;
                    }
                    Some(q) if *q == c => {
                        i += 1;
                        break;
                    }
                    Some(other) => {
                        value.push(*other);
                        i += 1;
                    }
                }
            }
            tokens.push(Lexed {
                token: Token::Str(value),
                line: start_line,
            });
        } else {
            tokens.push(Lexed {
                token: Token::Punct(c),
                line,
            });
            i += 1;
        }
    }

    Ok(tokens)
}

fn syntax(path: &Path, line: usize, message: impl Into<String>) -> Error {
    Error::Syntax {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}

fn parse_number(text: &str) -> Option<u32> {
    let text = text.trim_end_matches(['l', 'L']);
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

const DECLARATION_KEYWORDS: [&str; 4] = ["interface", "parcelable", "enum", "union"];

/// Annotations and modifiers in front of a declaration or member.
#[derive(Default)]
struct Prefix {
    annotations: Vec<String>,
    modifiers: Modifiers,
    backing: Option<String>,
}

struct AidlReader<'t> {
    tokens: &'t [Lexed],
    pos: usize,
    path: &'t Path,
}

impl AidlReader<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|lexed| &lexed.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |lexed| lexed.line)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        syntax(self.path, self.line(), message)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek().cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_punct(&self, c: char) -> bool {
        self.peek() == Some(&Token::Punct(c))
    }

    fn at_ident(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(ident)) if ident == keyword)
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.at_punct(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<()> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{c}'")))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        let ident = match self.peek() {
            Some(Token::Ident(ident)) => ident.clone(),
            _ => return Err(self.error("expected an identifier")),
        };
        self.pos += 1;
        Ok(ident)
    }

    /// `a.b.c`, optionally ending in `.*` when `wildcard` is allowed.
    fn qualified(&mut self, wildcard: bool) -> Result<(String, bool)> {
        let mut name = self.expect_ident()?;
        while self.at_punct('.') {
            self.pos += 1;
            if wildcard && self.eat_punct('*') {
                return Ok((name, true));
            }
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }
        Ok((name, false))
    }

    /// Skip a balanced `open ... close` group, the cursor on `open`.
    fn skip_group(&mut self, open: char, close: char) -> Result<Vec<Token>> {
        self.expect_punct(open)?;
        let mut depth = 1;
        let mut inner = Vec::new();
        while depth > 0 {
            let Some(token) = self.next() else {
                return Err(self.error(format!("unbalanced '{open}'")));
            };
            match token {
                Token::Punct(c) if c == open => depth += 1,
                Token::Punct(c) if c == close => depth -= 1,
                _ => {}
            }
            if depth > 0 {
                inner.push(token);
            }
        }
        Ok(inner)
    }

    /// Skip to the `;` ending the current statement, without consuming it.
    fn skip_statement(&mut self) -> Result<()> {
        let mut depth = 0_usize;
        loop {
            match self.peek() {
                None => return Err(self.error("expected ';'")),
                Some(Token::Punct(';')) if depth == 0 => return Ok(()),
                Some(Token::Punct('(' | '{' | '[')) => depth += 1,
                Some(Token::Punct(')' | '}' | ']')) => depth = depth.saturating_sub(1),
                Some(_) => {}
            }
            self.pos += 1;
        }
    }

    fn prefix(&mut self) -> Result<Prefix> {
        let mut prefix = Prefix::default();
        loop {
            if self.eat_punct('@') {
                let (name, _) = self.qualified(false)?;
                if self.at_punct('(') {
                    let args = self.skip_group('(', ')')?;
                    if name == "Backing" {
                        prefix.backing = backing_type(&args);
                    }
                }
                prefix.annotations.push(name);
                continue;
            }

            let modifier = match self.peek() {
                Some(Token::Ident(ident)) => Modifiers::from_keyword(ident),
                _ => None,
            };
            match modifier {
                Some(modifier) => {
                    prefix.modifiers |= modifier;
                    self.pos += 1;
                }
                None => return Ok(prefix),
            }
        }
    }

    fn type_ref(&mut self) -> Result<TypeRef> {
        let (name, _) = self.qualified(false)?;
        let mut ty = TypeRef::simple(name);
        if self.eat_punct('<') {
            loop {
                ty.args.push(self.type_ref()?);
                if self.eat_punct('>') {
                    break;
                }
                self.expect_punct(',')?;
            }
        }
        while self.eat_punct('[') {
            if matches!(self.peek(), Some(Token::Number(_) | Token::Ident(_))) {
                self.pos += 1;
            }
            self.expect_punct(']')?;
            ty.dims += 1;
        }
        Ok(ty)
    }

    fn document(mut self) -> Result<Vec<DeclUnit>> {
        let mut package = String::new();
        let mut imports = Vec::new();

        if self.at_ident("package") {
            self.pos += 1;
            package = self.qualified(false)?.0;
            self.expect_punct(';')?;
        }

        while self.at_ident("import") {
            self.pos += 1;
            if self.at_ident("static") {
                self.skip_statement()?;
                self.expect_punct(';')?;
                continue;
            }
            let (path, wildcard) = self.qualified(true)?;
            self.expect_punct(';')?;
            imports.push(ImportDef {
                path: QualifiedName::new(path),
                wildcard,
            });
        }

        let mut units = Vec::new();
        while self.peek().is_some() {
            if self.eat_punct(';') {
                continue;
            }
            let prefix = self.prefix()?;
            self.declaration(prefix, "", &package, &mut units)?;
        }

        for unit in &mut units {
            unit.imports.clone_from(&imports);
            unit.path = self.path.to_path_buf();
        }
        Ok(units)
    }

    fn declaration(
        &mut self,
        prefix: Prefix,
        enclosing: &str,
        package: &str,
        units: &mut Vec<DeclUnit>,
    ) -> Result<()> {
        let keyword = self.expect_ident()?;
        if !DECLARATION_KEYWORDS.contains(&keyword.as_str()) {
            self.pos -= 1;
            return Err(self.error(format!("unexpected '{keyword}'")));
        }

        let simple = self.expect_ident()?;
        let name = if enclosing.is_empty() {
            simple
        } else {
            format!("{enclosing}.{simple}")
        };
        if self.at_punct('<') {
            self.skip_group('<', '>')?;
        }

        let kind = match keyword.as_str() {
            "interface" => UnitKind::Interface,
            "parcelable" => UnitKind::Parcelable { structured: true },
            "union" => UnitKind::Union,
            _ => UnitKind::Enum {
                backing: TypeRef::simple(prefix.backing.as_deref().unwrap_or("byte")),
            },
        };

        let mut unit = DeclUnit::new(package, name.clone(), kind);
        unit.annotations = prefix.annotations;
        unit.modifiers = prefix.modifiers;

        let mut nested = Vec::new();
        if !self.at_punct('{') {
            // Forward declaration, possibly with backend header clauses
            if !matches!(unit.kind, UnitKind::Parcelable { .. }) {
                return Err(self.error(format!("expected a body for {keyword} {name}")));
            }
            unit.kind = UnitKind::Parcelable { structured: false };
            self.skip_statement()?;
            self.expect_punct(';')?;
        } else if matches!(unit.kind, UnitKind::Enum { .. }) {
            self.skip_group('{', '}')?;
        } else {
            self.expect_punct('{')?;
            while !self.eat_punct('}') {
                if self.peek().is_none() {
                    return Err(self.error(format!("unterminated body of {name}")));
                }
                if self.eat_punct(';') {
                    continue;
                }
                self.member(&mut unit, &name, package, &mut nested)?;
            }
        }

        units.push(unit);
        units.append(&mut nested);
        Ok(())
    }

    fn member(
        &mut self,
        unit: &mut DeclUnit,
        enclosing: &str,
        package: &str,
        nested: &mut Vec<DeclUnit>,
    ) -> Result<()> {
        let prefix = self.prefix()?;

        let is_declaration = matches!(
            self.peek(),
            Some(Token::Ident(ident)) if DECLARATION_KEYWORDS.contains(&ident.as_str())
        );
        if is_declaration {
            return self.declaration(prefix, enclosing, package, nested);
        }
        if prefix.modifiers.contains(Modifiers::CONST) {
            self.skip_statement()?;
            return self.expect_punct(';');
        }

        let ty = self.type_ref()?;
        let name = self.expect_ident()?;

        if matches!(unit.kind, UnitKind::Interface) {
            unit.methods.push(self.method(prefix, ty, name)?);
            return Ok(());
        }

        if self.eat_punct('=') {
            self.skip_statement()?;
        }
        self.expect_punct(';')?;
        unit.fields.push(FieldDecl {
            name,
            ty,
            modifiers: prefix.modifiers,
        });
        Ok(())
    }

    fn method(&mut self, prefix: Prefix, ret: TypeRef, name: String) -> Result<MethodDecl> {
        self.expect_punct('(')?;
        let mut params = Vec::new();
        if !self.eat_punct(')') {
            loop {
                let param_prefix = self.prefix()?;
                let ty = self.type_ref()?;
                let param_name = self.expect_ident()?;
                params.push(ParamDecl {
                    name: param_name,
                    ty,
                    modifiers: param_prefix.modifiers,
                    annotations: param_prefix.annotations,
                });
                if self.eat_punct(')') {
                    break;
                }
                self.expect_punct(',')?;
            }
        }

        let mut code = None;
        if self.eat_punct('=') {
            code = match self.peek() {
                Some(Token::Number(number)) => parse_number(number),
                _ => None,
            };
            if code.is_none() {
                return Err(self.error(format!("invalid transaction code for {name}")));
            }
            self.pos += 1;
        }
        self.expect_punct(';')?;

        Ok(MethodDecl {
            name,
            ret,
            params,
            modifiers: prefix.modifiers,
            code,
            annotations: prefix.annotations,
        })
    }
}

/// `@Backing(type="int")`
fn backing_type(args: &[Token]) -> Option<String> {
    args.windows(3).find_map(|window| match window {
        [Token::Ident(key), Token::Punct('='), Token::Str(value)] if key == "type" => {
            Some(value.clone())
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::schema::Direction;

    fn parse(text: &str) -> Vec<DeclUnit> {
        AidlParser
            .parse(&PathBuf::from("test.aidl"), text)
            .unwrap()
    }

    #[test]
    fn test_interface() {
        let units = parse(
            r#"
            // Copyright header
            package com.example;

            import android.os.Bundle;
            import com.example.types.*;

            /** Docs */
            @VintfStability
            interface IFoo {
                const int VERSION = 3;
                void bar(int x);
                oneway void notify(in Bundle extras, @nullable String tag);
                int query(out int[] results, inout Map<String, Bundle> state) = 7;
            }
            "#,
        );

        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert_eq!(unit.qualified_name().as_str(), "com.example.IFoo");
        assert_eq!(unit.kind, UnitKind::Interface);
        assert_eq!(unit.imports.len(), 2);
        assert!(unit.imports[1].wildcard);
        assert_eq!(unit.annotations, vec!["VintfStability".to_string()]);

        let names: Vec<_> = unit.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["bar", "notify", "query"]);

        let notify = &unit.methods[1];
        assert!(notify.modifiers.contains(Modifiers::ONEWAY));
        assert!(notify.params[0].modifiers.contains(Modifiers::IN));
        assert_eq!(notify.params[1].annotations, vec!["nullable".to_string()]);

        let query = &unit.methods[2];
        assert_eq!(query.code, Some(7));
        assert_eq!(query.ret, TypeRef::simple("int"));
        assert!(query.params[0].modifiers.contains(Modifiers::OUT));
        assert_eq!(query.params[0].ty.dims, 1);
        assert!(query.params[1].modifiers.contains(Modifiers::INOUT));
        assert_eq!(query.params[1].ty.args.len(), 2);
    }

    #[test]
    fn test_oneway_interface() {
        let units = parse("package a; oneway interface ICallback { void done(); }");
        assert!(units[0].modifiers.contains(Modifiers::ONEWAY));
        assert!(units[0].methods[0].params.is_empty());
    }

    #[test]
    fn test_structured_parcelable() {
        let units = parse(
            r#"
            package a.b;
            parcelable Config {
                const int MAX = 10;
                int id = -1;
                @nullable String name;
                long[] stamps = {1, 2};
                Nested child;
                parcelable Nested {
                    boolean enabled;
                }
            }
            "#,
        );

        assert_eq!(units.len(), 2);
        let config = &units[0];
        assert_eq!(config.kind, UnitKind::Parcelable { structured: true });
        let fields: Vec<_> = config.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fields, ["id", "name", "stamps", "child"]);

        assert_eq!(units[1].qualified_name().as_str(), "a.b.Config.Nested");
        assert_eq!(units[1].fields.len(), 1);
    }

    #[test]
    fn test_forward_declarations() {
        let units = parse(
            r#"
            package android.os;
            parcelable Bundle cpp_header "binder/Bundle.h";
            parcelable WorkSource;
            "#,
        );
        assert_eq!(units.len(), 2);
        assert!(units
            .iter()
            .all(|u| u.kind == UnitKind::Parcelable { structured: false }));
    }

    #[test]
    fn test_enum_and_union() {
        let units = parse(
            r#"
            package a;
            @Backing(type="int")
            enum Mode { OFF = 0, ON = 1, }
            enum Small { A, B }
            union Choice { int number; String text; }
            "#,
        );
        assert_eq!(
            units[0].kind,
            UnitKind::Enum {
                backing: TypeRef::simple("int")
            }
        );
        assert_eq!(
            units[1].kind,
            UnitKind::Enum {
                backing: TypeRef::simple("byte")
            }
        );
        assert_eq!(units[2].kind, UnitKind::Union);
        assert_eq!(units[2].fields.len(), 2);
    }

    #[test]
    fn test_hex_codes() {
        let units = parse("package a; interface I { void f() = 0x10; }");
        assert_eq!(units[0].methods[0].code, Some(16));
    }

    #[test]
    fn test_direction_keywords() {
        let units = parse("package a; interface I { void f(in int a, out int b, inout int c); }");
        let directions: Vec<_> = units[0].methods[0]
            .params
            .iter()
            .map(|p| {
                if p.modifiers.contains(Modifiers::OUT) {
                    Direction::Out
                } else if p.modifiers.contains(Modifiers::INOUT) {
                    Direction::InOut
                } else {
                    Direction::In
                }
            })
            .collect();
        assert_eq!(directions, [Direction::In, Direction::Out, Direction::InOut]);
    }

    #[test]
    fn test_syntax_errors() {
        let err = AidlParser
            .parse(
                &PathBuf::from("bad.aidl"),
                "package a;\ninterface I {\n  void f(int);\n}",
            )
            .unwrap_err();
        match err {
            Error::Syntax { line, path, .. } => {
                assert_eq!(line, 3);
                assert_eq!(path, PathBuf::from("bad.aidl"));
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert!(AidlParser
            .parse(&PathBuf::from("x.aidl"), "package a; class Foo {}")
            .is_err());
        assert!(AidlParser
            .parse(&PathBuf::from("x.aidl"), "/* never closed")
            .is_err());
        assert!(AidlParser
            .parse(&PathBuf::from("x.aidl"), "package a; interface I { void f() = x; }")
            .is_err());
    }
}

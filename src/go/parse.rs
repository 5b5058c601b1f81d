//! Recursive-descent parser for Go source declarations.
//!
//! Parses exactly what the schema core consumes: the package clause,
//! imports, type and const declarations, and func declarations (for
//! method sets). Function bodies, var declarations, and constant values
//! are skipped over balanced delimiters without interpretation.

use std::path::{Path, PathBuf};

use crate::error::SourceError;

use super::ast::{
    ConstSpec, Decl, FieldExpr, File, FuncDecl, Import, InterfaceElem, ParamExpr, Receiver,
    SignatureExpr, TypeExpr, TypeSpec,
};
use super::token::{self, Comment, TokKind, Token};

pub fn parse_file(path: impl Into<PathBuf>, src: &str) -> Result<File, SourceError> {
    let path = path.into();
    let lexed = token::lex(src)
        .map_err(|err| SourceError::new(path.clone(), err.line, err.message))?;
    Parser {
        path: &path,
        toks: &lexed.tokens,
        comments: &lexed.comments,
        pos: 0,
        limit: lexed.tokens.len(),
    }
    .file()
    .map(|(package, imports, decls)| File {
        path,
        package,
        imports,
        decls,
    })
}

struct Parser<'a> {
    path: &'a Path,
    toks: &'a [Token],
    comments: &'a [Comment],
    pos: usize,
    limit: usize,
}

impl<'a> Parser<'a> {
    // MARK: Cursor

    // Peeked tokens borrow the token slice, not the parser, so a peeked
    // token stays usable across cursor movement.
    fn peek(&self) -> Option<&'a Token> {
        let toks: &'a [Token] = self.toks;
        toks[..self.limit].get(self.pos)
    }

    fn peek_at(&self, n: usize) -> Option<&'a Token> {
        let toks: &'a [Token] = self.toks;
        toks[..self.limit].get(self.pos + n)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let tok = self.peek()?;
        self.pos += 1;
        Some(tok)
    }

    fn at_punct(&self, text: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(text))
    }

    fn eat_punct(&mut self, text: &str) -> bool {
        if self.at_punct(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn cur_line(&self) -> u32 {
        self.peek()
            .map(|t| t.line)
            .or_else(|| self.toks.last().map(|t| t.line))
            .unwrap_or(1)
    }

    fn prev_line(&self) -> u32 {
        self.toks[..self.pos]
            .last()
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn error(&self, message: impl Into<String>) -> SourceError {
        SourceError::new(self.path, self.cur_line(), message)
    }

    fn expect_punct(&mut self, text: &str) -> Result<(), SourceError> {
        if self.eat_punct(text) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected `{text}`, found {}",
                describe(self.peek())
            )))
        }
    }

    fn expect_ident(&mut self) -> Result<String, SourceError> {
        match self.peek() {
            Some(tok) if tok.kind == TokKind::Ident && !token::is_keyword(&tok.text) => {
                let name = tok.text.clone();
                self.pos += 1;
                Ok(name)
            }
            other => Err(self.error(format!("expected identifier, found {}", describe(other)))),
        }
    }

    fn expect_semi(&mut self) -> Result<(), SourceError> {
        match self.peek() {
            None => Ok(()),
            Some(tok) if tok.kind == TokKind::Semi => {
                self.pos += 1;
                Ok(())
            }
            // A closing delimiter terminates the last element of a group.
            Some(tok) if tok.is_punct(")") || tok.is_punct("}") => Ok(()),
            other => Err(self.error(format!("expected newline or `;`, found {}", describe(other)))),
        }
    }

    fn skip_semis(&mut self) {
        while self.peek().is_some_and(|t| t.kind == TokKind::Semi) {
            self.pos += 1;
        }
    }

    /// Skips over a balanced group; the current token must be `open`.
    fn skip_balanced(&mut self, open: &str, close: &str) -> Result<(), SourceError> {
        self.expect_punct(open)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.bump() {
                Some(tok) if tok.is_punct(open) => depth += 1,
                Some(tok) if tok.is_punct(close) => depth -= 1,
                Some(_) => {}
                None => return Err(self.error(format!("unclosed `{open}`"))),
            }
        }
        Ok(())
    }

    /// Skips tokens until a statement boundary at delimiter depth zero.
    /// Leaves a closing `)`/`}` of an enclosing group unconsumed.
    fn skip_to_semi(&mut self) -> Result<(), SourceError> {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => return Ok(()),
                Some(tok) if tok.kind == TokKind::Semi && depth == 0 => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(tok) if depth == 0 && (tok.is_punct(")") || tok.is_punct("}")) => {
                    return Ok(());
                }
                Some(tok) => {
                    match tok.text.as_str() {
                        "(" | "[" | "{" if tok.kind == TokKind::Punct => depth += 1,
                        ")" | "]" | "}" if tok.kind == TokKind::Punct => {
                            depth = depth.saturating_sub(1)
                        }
                        _ => {}
                    }
                    self.pos += 1;
                }
            }
        }
    }

    // MARK: Comments

    /// The doc block ending directly above `line`: a run of own-line
    /// comments on consecutive lines, with no blank line before the
    /// declaration.
    fn doc_block(&self, line: u32) -> Vec<String> {
        let mut docs = Vec::new();
        let mut want = line.saturating_sub(1);
        for comment in self.comments.iter().rev() {
            if !comment.own_line || comment.line > want {
                continue;
            }
            if comment.line < want {
                break;
            }
            docs.push(comment.text.clone());
            want -= 1;
        }
        docs.reverse();
        docs
    }

    fn trailing_comment(&self, line: u32) -> Option<String> {
        self.comments
            .iter()
            .find(|c| c.line == line && !c.own_line)
            .map(|c| c.text.clone())
    }

    // MARK: File structure

    fn file(&mut self) -> Result<(String, Vec<Import>, Vec<Decl>), SourceError> {
        self.skip_semis();
        match self.peek() {
            Some(tok) if tok.is_ident("package") => self.pos += 1,
            other => {
                return Err(self.error(format!("expected `package`, found {}", describe(other))));
            }
        }
        let package = self.expect_ident()?;
        self.expect_semi()?;

        let mut imports = Vec::new();
        let mut decls = Vec::new();
        loop {
            self.skip_semis();
            let Some(tok) = self.peek() else { break };
            match tok.text.as_str() {
                "import" if tok.kind == TokKind::Ident => self.import_decl(&mut imports)?,
                "type" if tok.kind == TokKind::Ident => self.type_decl(&mut decls)?,
                "const" if tok.kind == TokKind::Ident => self.const_decl(&mut decls)?,
                "var" if tok.kind == TokKind::Ident => self.var_decl()?,
                "func" if tok.kind == TokKind::Ident => decls.push(Decl::Func(self.func_decl()?)),
                _ => {
                    return Err(
                        self.error(format!("unexpected {} at top level", describe(Some(tok))))
                    );
                }
            }
        }
        Ok((package, imports, decls))
    }

    fn import_decl(&mut self, imports: &mut Vec<Import>) -> Result<(), SourceError> {
        self.pos += 1; // import
        if self.eat_punct("(") {
            loop {
                self.skip_semis();
                if self.eat_punct(")") {
                    break;
                }
                imports.push(self.import_spec()?);
                self.expect_semi()?;
            }
        } else {
            imports.push(self.import_spec()?);
        }
        self.expect_semi()
    }

    fn import_spec(&mut self) -> Result<Import, SourceError> {
        let line = self.cur_line();
        let alias = match self.peek() {
            Some(tok) if tok.kind == TokKind::Ident => {
                let alias = tok.text.clone();
                self.pos += 1;
                Some(alias)
            }
            Some(tok) if tok.is_punct(".") => {
                self.pos += 1;
                // Dot imports merge scopes; the loader has no use for
                // them and resolution will fail on first reference.
                None
            }
            _ => None,
        };
        match self.bump() {
            Some(tok) if tok.kind == TokKind::Str => Ok(Import {
                alias: alias.filter(|alias| alias.as_str() != "_"),
                path: tok.text.clone(),
                line,
            }),
            other => Err(self.error(format!("expected import path, found {}", describe(other)))),
        }
    }

    fn type_decl(&mut self, decls: &mut Vec<Decl>) -> Result<(), SourceError> {
        let decl_line = self.cur_line();
        self.pos += 1; // type
        if self.eat_punct("(") {
            loop {
                self.skip_semis();
                if self.eat_punct(")") {
                    break;
                }
                let docs = self.doc_block(self.cur_line());
                decls.push(Decl::Type(self.type_spec(docs)?));
                self.expect_semi()?;
            }
            self.expect_semi()
        } else {
            let docs = self.doc_block(decl_line);
            decls.push(Decl::Type(self.type_spec(docs)?));
            self.expect_semi()
        }
    }

    fn type_spec(&mut self, docs: Vec<String>) -> Result<TypeSpec, SourceError> {
        let line = self.cur_line();
        let name = self.expect_ident()?;
        let type_params = if self.at_punct("[") && self.brackets_are_type_params() {
            self.type_params()?
        } else {
            Vec::new()
        };
        let alias = self.eat_punct("=");
        let expr = self.type_expr()?;
        Ok(TypeSpec {
            docs,
            name,
            type_params,
            alias,
            expr,
            line,
        })
    }

    /// After a declared type name, `[` opens either a type-parameter list
    /// or an array length. `[T any]` and `[K, V any]` are parameters;
    /// `[3]int`, `[N]int`, and `[]int` are types.
    fn brackets_are_type_params(&self) -> bool {
        match (self.peek_at(1), self.peek_at(2)) {
            (Some(first), Some(second)) if first.kind == TokKind::Ident => {
                !second.is_punct("]")
            }
            _ => false,
        }
    }

    fn type_params(&mut self) -> Result<Vec<String>, SourceError> {
        self.expect_punct("[")?;
        let mut params = Vec::new();
        let mut pending = vec![self.expect_ident()?];
        loop {
            if self.eat_punct(",") {
                pending.push(self.expect_ident()?);
                continue;
            }
            if self.eat_punct("]") {
                params.append(&mut pending);
                return Ok(params);
            }
            // A constraint expression; skip it at depth zero.
            let mut depth = 0usize;
            loop {
                match self.peek() {
                    None => return Err(self.error("unclosed type parameter list")),
                    Some(tok) if depth == 0 && (tok.is_punct(",") || tok.is_punct("]")) => break,
                    Some(tok) => {
                        match tok.text.as_str() {
                            "(" | "[" | "{" if tok.kind == TokKind::Punct => depth += 1,
                            ")" | "]" | "}" if tok.kind == TokKind::Punct => {
                                depth = depth.saturating_sub(1)
                            }
                            _ => {}
                        }
                        self.pos += 1;
                    }
                }
            }
            params.append(&mut pending);
            if !self.eat_punct(",") {
                self.expect_punct("]")?;
                return Ok(params);
            }
        }
    }

    fn const_decl(&mut self, decls: &mut Vec<Decl>) -> Result<(), SourceError> {
        self.pos += 1; // const
        let mut specs = Vec::new();
        if self.eat_punct("(") {
            loop {
                self.skip_semis();
                if self.eat_punct(")") {
                    break;
                }
                specs.push(self.const_spec()?);
            }
            self.expect_semi()?;
        } else {
            specs.push(self.const_spec()?);
        }
        decls.push(Decl::Const(specs));
        Ok(())
    }

    fn const_spec(&mut self) -> Result<ConstSpec, SourceError> {
        let line = self.cur_line();
        let mut names = vec![self.expect_ident()?];
        while self.eat_punct(",") {
            names.push(self.expect_ident()?);
        }
        let ty = if self.peek().is_some_and(is_type_start) {
            Some(self.type_expr()?)
        } else {
            None
        };
        let has_value = self.at_punct("=");
        if has_value {
            self.pos += 1;
            self.skip_to_semi()?;
        } else {
            self.expect_semi()?;
        }
        let trailing = self.trailing_comment(self.prev_line());
        Ok(ConstSpec {
            names,
            ty,
            has_value,
            trailing,
            line,
        })
    }

    fn var_decl(&mut self) -> Result<(), SourceError> {
        self.pos += 1; // var
        if self.at_punct("(") {
            self.skip_balanced("(", ")")?;
        } else {
            self.skip_to_semi()?;
        }
        Ok(())
    }

    fn func_decl(&mut self) -> Result<FuncDecl, SourceError> {
        let line = self.cur_line();
        self.pos += 1; // func
        let receiver = if self.at_punct("(") {
            Some(self.receiver()?)
        } else {
            None
        };
        let name = self.expect_ident()?;
        if self.at_punct("[") {
            // Generic function type parameters; irrelevant to method sets.
            self.skip_balanced("[", "]")?;
        }
        let sig = self.signature()?;
        if self.at_punct("{") {
            self.skip_balanced("{", "}")?;
        }
        Ok(FuncDecl {
            receiver,
            name,
            sig,
            line,
        })
    }

    fn receiver(&mut self) -> Result<Receiver, SourceError> {
        self.expect_punct("(")?;
        // Optional receiver name, then optional `*`, then the base type.
        if let (Some(first), Some(second)) = (self.peek(), self.peek_at(1)) {
            if first.kind == TokKind::Ident
                && (second.kind == TokKind::Ident || second.is_punct("*"))
            {
                self.pos += 1;
            }
        }
        let pointer = self.eat_punct("*");
        let type_name = self.expect_ident()?;
        if self.at_punct("[") {
            self.skip_balanced("[", "]")?;
        }
        self.expect_punct(")")?;
        Ok(Receiver { pointer, type_name })
    }

    // MARK: Signatures

    fn signature(&mut self) -> Result<SignatureExpr, SourceError> {
        self.expect_punct("(")?;
        let params = self.param_list()?;
        let results = if self.at_punct("(") {
            self.pos += 1;
            self.param_list()?
        } else if self.peek().is_some_and(is_type_start) {
            vec![ParamExpr {
                name: None,
                ty: self.type_expr()?,
                variadic: false,
            }]
        } else {
            Vec::new()
        };
        Ok(SignatureExpr { params, results })
    }

    /// Parses a parenthesized parameter or result list, resolving Go's
    /// shared-type groups (`a, b int`) into one entry per name. The
    /// opening `(` has already been consumed.
    fn param_list(&mut self) -> Result<Vec<ParamExpr>, SourceError> {
        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut span_start = self.pos;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => return Err(self.error("unclosed parameter list")),
                Some(tok) if depth == 0 && tok.is_punct(")") => {
                    if self.pos > span_start {
                        spans.push((span_start, self.pos));
                    }
                    self.pos += 1;
                    break;
                }
                Some(tok) if depth == 0 && tok.is_punct(",") => {
                    spans.push((span_start, self.pos));
                    self.pos += 1;
                    span_start = self.pos;
                }
                Some(tok) => {
                    match tok.text.as_str() {
                        "(" | "[" | "{" if tok.kind == TokKind::Punct => depth += 1,
                        ")" | "]" | "}" if tok.kind == TokKind::Punct => {
                            depth = depth.saturating_sub(1)
                        }
                        _ => {}
                    }
                    self.pos += 1;
                }
            }
        }
        let end_pos = self.pos;

        let mut raw = Vec::with_capacity(spans.len());
        for &(start, end) in &spans {
            raw.push(self.classify_span(start, end)?);
        }

        // Second pass: if any span carries an explicit name, bare
        // identifiers are names sharing the type of the next named span.
        let any_named = raw.iter().any(|p| matches!(p, RawParam::Named { .. }));
        let mut out = Vec::with_capacity(raw.len());
        if !any_named {
            for param in raw {
                out.push(match param {
                    RawParam::Bare(name) => ParamExpr {
                        name: None,
                        ty: TypeExpr::Name(name),
                        variadic: false,
                    },
                    RawParam::Unnamed { ty, variadic } => ParamExpr {
                        name: None,
                        ty,
                        variadic,
                    },
                    RawParam::Named { .. } => unreachable!(),
                });
            }
        } else {
            let mut pending: Vec<String> = Vec::new();
            for param in raw {
                match param {
                    RawParam::Bare(name) => pending.push(name),
                    RawParam::Named { name, ty, variadic } => {
                        for shared in pending.drain(..) {
                            out.push(ParamExpr {
                                name: Some(shared),
                                ty: ty.clone(),
                                variadic: false,
                            });
                        }
                        out.push(ParamExpr {
                            name: Some(name),
                            ty,
                            variadic,
                        });
                    }
                    RawParam::Unnamed { .. } => {
                        return Err(
                            self.error("mixed named and unnamed parameters in signature")
                        );
                    }
                }
            }
            if !pending.is_empty() {
                return Err(self.error("parameter group is missing a type"));
            }
        }
        self.pos = end_pos;
        Ok(out)
    }

    fn classify_span(&mut self, start: usize, end: usize) -> Result<RawParam, SourceError> {
        let saved = (self.pos, self.limit);
        let restore = |p: &mut Self| {
            p.pos = saved.0;
            p.limit = saved.1;
        };

        // A single identifier is ambiguous until the whole list is seen.
        if end - start == 1 {
            let tok = &self.toks[start];
            if tok.kind == TokKind::Ident && !token::is_keyword(&tok.text) {
                return Ok(RawParam::Bare(tok.text.clone()));
            }
        }

        // `name Type` or `name ...Type`.
        let first = &self.toks[start];
        if first.kind == TokKind::Ident && !token::is_keyword(&first.text) && end - start >= 2 {
            self.pos = start + 1;
            self.limit = end;
            let variadic = self.eat_punct("...");
            if let Ok(ty) = self.type_expr() {
                if self.pos == end {
                    let name = first.text.clone();
                    restore(self);
                    return Ok(RawParam::Named { name, ty, variadic });
                }
            }
            restore(self);
        }

        // A bare type, possibly variadic.
        self.pos = start;
        self.limit = end;
        let variadic = self.eat_punct("...");
        let ty = self.type_expr()?;
        if self.pos != end {
            let err = self.error("malformed parameter");
            restore(self);
            return Err(err);
        }
        restore(self);
        Ok(RawParam::Unnamed { ty, variadic })
    }

    // MARK: Type expressions

    fn type_expr(&mut self) -> Result<TypeExpr, SourceError> {
        let Some(tok) = self.peek() else {
            return Err(self.error("expected type"));
        };
        match (tok.kind, tok.text.as_str()) {
            (TokKind::Punct, "*") => {
                self.pos += 1;
                Ok(TypeExpr::Pointer(Box::new(self.type_expr()?)))
            }
            (TokKind::Punct, "[") => {
                self.pos += 1;
                if self.eat_punct("]") {
                    return Ok(TypeExpr::Slice(Box::new(self.type_expr()?)));
                }
                let mut len = String::new();
                let mut depth = 0usize;
                loop {
                    match self.peek() {
                        None => return Err(self.error("unclosed array length")),
                        Some(tok) if depth == 0 && tok.is_punct("]") => {
                            self.pos += 1;
                            break;
                        }
                        Some(tok) => {
                            match tok.text.as_str() {
                                "(" | "[" | "{" if tok.kind == TokKind::Punct => depth += 1,
                                ")" | "]" | "}" if tok.kind == TokKind::Punct => {
                                    depth = depth.saturating_sub(1)
                                }
                                _ => {}
                            }
                            if !len.is_empty() {
                                len.push(' ');
                            }
                            len.push_str(&tok.text);
                            self.pos += 1;
                        }
                    }
                }
                Ok(TypeExpr::Array(len, Box::new(self.type_expr()?)))
            }
            (TokKind::Ident, "map") => {
                self.pos += 1;
                self.expect_punct("[")?;
                let key = self.type_expr()?;
                self.expect_punct("]")?;
                let value = self.type_expr()?;
                Ok(TypeExpr::Map(Box::new(key), Box::new(value)))
            }
            (TokKind::Ident, "chan") => {
                self.pos += 1;
                self.eat_punct("<-");
                Ok(TypeExpr::Chan(Box::new(self.type_expr()?)))
            }
            (TokKind::Punct, "<-") => {
                self.pos += 1;
                match self.peek() {
                    Some(tok) if tok.is_ident("chan") => self.pos += 1,
                    other => {
                        return Err(
                            self.error(format!("expected `chan`, found {}", describe(other)))
                        );
                    }
                }
                Ok(TypeExpr::Chan(Box::new(self.type_expr()?)))
            }
            (TokKind::Ident, "func") => {
                self.pos += 1;
                Ok(TypeExpr::Func(Box::new(self.signature()?)))
            }
            (TokKind::Ident, "struct") => {
                self.pos += 1;
                self.expect_punct("{")?;
                let mut fields = Vec::new();
                loop {
                    self.skip_semis();
                    if self.eat_punct("}") {
                        break;
                    }
                    fields.push(self.struct_field()?);
                }
                Ok(TypeExpr::Struct(fields))
            }
            (TokKind::Ident, "interface") => {
                self.pos += 1;
                self.expect_punct("{")?;
                let mut elems = Vec::new();
                loop {
                    self.skip_semis();
                    if self.eat_punct("}") {
                        break;
                    }
                    elems.push(self.interface_elem()?);
                }
                Ok(TypeExpr::Interface(elems))
            }
            (TokKind::Punct, "(") => {
                self.pos += 1;
                let inner = self.type_expr()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            (TokKind::Ident, name) if !token::is_keyword(name) => {
                let name = name.to_owned();
                self.pos += 1;
                let base = if self.eat_punct(".") {
                    TypeExpr::Selector(name, self.expect_ident()?)
                } else {
                    TypeExpr::Name(name)
                };
                if self.at_punct("[") {
                    self.pos += 1;
                    let mut args = vec![self.type_expr()?];
                    while self.eat_punct(",") {
                        args.push(self.type_expr()?);
                    }
                    self.expect_punct("]")?;
                    return Ok(TypeExpr::Instance(Box::new(base), args));
                }
                Ok(base)
            }
            _ => Err(self.error(format!("expected type, found {}", describe(Some(tok))))),
        }
    }

    fn struct_field(&mut self) -> Result<FieldExpr, SourceError> {
        let line = self.cur_line();
        let (names, ty, embedded) = if self.at_punct("*") {
            let ty = self.type_expr()?;
            let name = embedded_name(&ty)
                .ok_or_else(|| self.error("embedded field must be a type name"))?;
            (vec![name], ty, true)
        } else {
            let first = self.expect_ident()?;
            let mut names = vec![first];
            while self.eat_punct(",") {
                names.push(self.expect_ident()?);
            }
            if names.len() == 1 {
                if self.at_punct(".") {
                    // Embedded qualified type, `pkg.Type`.
                    self.pos += 1;
                    let sel = self.expect_ident()?;
                    let ty = TypeExpr::Selector(names[0].clone(), sel.clone());
                    (vec![sel], ty, true)
                } else if self.field_ends_here() {
                    let ty = TypeExpr::Name(names[0].clone());
                    (names, ty, true)
                } else if self.at_punct("[") && self.brackets_are_instance_args() {
                    // Embedded generic instance, `Base[T]`.
                    self.pos += 1;
                    let mut args = vec![self.type_expr()?];
                    while self.eat_punct(",") {
                        args.push(self.type_expr()?);
                    }
                    self.expect_punct("]")?;
                    let base = names[0].clone();
                    let ty =
                        TypeExpr::Instance(Box::new(TypeExpr::Name(base.clone())), args);
                    (vec![base], ty, true)
                } else {
                    let ty = self.type_expr()?;
                    (names, ty, false)
                }
            } else {
                let ty = self.type_expr()?;
                (names, ty, false)
            }
        };
        let tag = match self.peek() {
            Some(tok) if matches!(tok.kind, TokKind::Str | TokKind::RawStr) => {
                let tag = tok.text.clone();
                self.pos += 1;
                Some(tag)
            }
            _ => None,
        };
        self.expect_semi()?;
        Ok(FieldExpr {
            names,
            ty,
            tag,
            embedded,
            line,
        })
    }

    fn field_ends_here(&self) -> bool {
        match self.peek() {
            None => true,
            Some(tok) => {
                tok.kind == TokKind::Semi
                    || matches!(tok.kind, TokKind::Str | TokKind::RawStr)
                    || tok.is_punct("}")
            }
        }
    }

    /// After a lone field identifier, `[` opens either an embedded generic
    /// instance (`Base[T]`) or an array/slice field type (`F []int`,
    /// `F [3]int`). Scan to the matching bracket: a type start after it
    /// means the brackets belong to a field type.
    fn brackets_are_instance_args(&self) -> bool {
        let mut depth = 0usize;
        let mut i = self.pos;
        while let Some(tok) = self.toks[..self.limit].get(i) {
            match tok.text.as_str() {
                "[" if tok.kind == TokKind::Punct => depth += 1,
                "]" if tok.kind == TokKind::Punct => {
                    depth -= 1;
                    if depth == 0 {
                        return !self.toks[..self.limit]
                            .get(i + 1)
                            .is_some_and(is_type_start);
                    }
                }
                _ => {}
            }
            i += 1;
        }
        false
    }

    fn interface_elem(&mut self) -> Result<InterfaceElem, SourceError> {
        let line = self.cur_line();
        if let (Some(first), Some(second)) = (self.peek(), self.peek_at(1)) {
            if first.kind == TokKind::Ident
                && !token::is_keyword(&first.text)
                && second.is_punct("(")
            {
                let name = self.expect_ident()?;
                let sig = self.signature()?;
                self.expect_semi()?;
                return Ok(InterfaceElem::Method { name, sig, line });
            }
        }
        // Embedded interface, or a type-set constraint term.
        if self.at_punct("~") {
            self.skip_to_semi()?;
            return Ok(InterfaceElem::Constraint);
        }
        let ty = self.type_expr()?;
        if self.at_punct("|") {
            self.skip_to_semi()?;
            return Ok(InterfaceElem::Constraint);
        }
        self.expect_semi()?;
        Ok(InterfaceElem::Embedded(ty))
    }
}

enum RawParam {
    Bare(String),
    Named {
        name: String,
        ty: TypeExpr,
        variadic: bool,
    },
    Unnamed {
        ty: TypeExpr,
        variadic: bool,
    },
}

fn is_type_start(tok: &Token) -> bool {
    match tok.kind {
        TokKind::Ident => {
            !token::is_keyword(&tok.text)
                || matches!(
                    tok.text.as_str(),
                    "map" | "chan" | "func" | "struct" | "interface"
                )
        }
        TokKind::Punct => matches!(tok.text.as_str(), "*" | "[" | "(" | "<-"),
        _ => false,
    }
}

/// The implicit field name of an embedded type expression.
fn embedded_name(ty: &TypeExpr) -> Option<String> {
    match ty {
        TypeExpr::Name(name) => Some(name.clone()),
        TypeExpr::Selector(_, name) => Some(name.clone()),
        TypeExpr::Pointer(inner) | TypeExpr::Instance(inner, _) => embedded_name(inner),
        _ => None,
    }
}

fn describe(tok: Option<&Token>) -> String {
    match tok {
        None => "end of file".to_owned(),
        Some(tok) => match tok.kind {
            TokKind::Semi => "end of line".to_owned(),
            _ => format!("`{}`", tok.text),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn parse(src: &str) -> File {
        parse_file("test.go", src).unwrap()
    }

    #[test]
    fn parses_package_and_imports() {
        let file = parse(indoc! {r#"
            package proto

            import (
                "context"
                "time"

                uid "github.com/google/uuid"
            )
        "#});
        assert_eq!(file.package, "proto");
        assert_eq!(file.imports.len(), 3);
        assert_eq!(file.import_path("context"), Some("context"));
        assert_eq!(file.import_path("uid"), Some("github.com/google/uuid"));
        assert_eq!(file.import_path("uuid"), None);
    }

    #[test]
    fn parses_struct_with_tags_and_embeds() {
        let file = parse(indoc! {r#"
            package proto

            type Pet struct {
                Base
                *Meta
                ID        int64      `json:"id,string"`
                Name, Alt string
                Tags      []Tag
                Extra     map[string]any
            }
        "#});
        let Decl::Type(spec) = &file.decls[0] else {
            panic!("expected type decl")
        };
        let TypeExpr::Struct(fields) = &spec.expr else {
            panic!("expected struct")
        };
        assert_eq!(fields.len(), 6);
        assert!(fields[0].embedded);
        assert_eq!(fields[0].names, ["Base"]);
        assert!(fields[1].embedded);
        assert_eq!(fields[1].names, ["Meta"]);
        assert_eq!(fields[2].tag.as_deref(), Some(r#"json:"id,string""#));
        assert_eq!(fields[3].names, ["Name", "Alt"]);
        assert!(matches!(fields[4].ty, TypeExpr::Slice(_)));
        assert!(matches!(fields[5].ty, TypeExpr::Map(..)));
    }

    #[test]
    fn parses_interface_methods_with_shared_param_types() {
        let file = parse(indoc! {r#"
            package proto

            type Store interface {
                Get(ctx context.Context, id int64) (pet *Pet, err error)
                Swap(ctx context.Context, a, b string) error
            }
        "#});
        let Decl::Type(spec) = &file.decls[0] else {
            panic!("expected type decl")
        };
        let TypeExpr::Interface(elems) = &spec.expr else {
            panic!("expected interface")
        };
        let InterfaceElem::Method { name, sig, .. } = &elems[1] else {
            panic!("expected method")
        };
        assert_eq!(name, "Swap");
        assert_eq!(sig.params.len(), 3);
        assert_eq!(sig.params[1].name.as_deref(), Some("a"));
        assert_eq!(sig.params[2].name.as_deref(), Some("b"));
        assert!(matches!(&sig.params[2].ty, TypeExpr::Name(n) if n == "string"));
        assert_eq!(sig.results.len(), 1);
    }

    #[test]
    fn doc_blocks_attach_to_declarations() {
        let file = parse(indoc! {r#"
            package proto

            // Old comment, separated by a blank line.

            // Line one.
            //go:webrpc json -out=./api.json
            type API interface {
                Ping(ctx context.Context) error
            }
        "#});
        let Decl::Type(spec) = &file.decls[0] else {
            panic!("expected type decl")
        };
        assert_eq!(
            spec.docs,
            ["// Line one.", "//go:webrpc json -out=./api.json"]
        );
    }

    #[test]
    fn const_specs_keep_trailing_comments() {
        let file = parse(indoc! {r#"
            package proto

            const (
                StatusActive Status = iota // "active"
                StatusClosed               // "closed"
            )
        "#});
        let Decl::Const(specs) = &file.decls[0] else {
            panic!("expected const decl")
        };
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].names, ["StatusActive"]);
        assert!(matches!(&specs[0].ty, Some(TypeExpr::Name(n)) if n == "Status"));
        assert!(specs[0].has_value);
        assert_eq!(specs[0].trailing.as_deref(), Some(r#"// "active""#));
        assert_eq!(specs[1].names, ["StatusClosed"]);
        assert!(specs[1].ty.is_none());
        assert!(!specs[1].has_value);
        assert_eq!(specs[1].trailing.as_deref(), Some(r#"// "closed""#));
    }

    #[test]
    fn func_bodies_and_vars_are_skipped() {
        let file = parse(indoc! {r#"
            package proto

            var defaultTags = []string{"a", "b"}

            func (p *Pet) MarshalText() ([]byte, error) {
                return []byte(p.Name), nil
            }

            func helper(n int) int { return n + 1 }
        "#});
        assert_eq!(file.decls.len(), 2);
        let Decl::Func(method) = &file.decls[0] else {
            panic!("expected func decl")
        };
        assert_eq!(method.name, "MarshalText");
        let recv = method.receiver.as_ref().unwrap();
        assert!(recv.pointer);
        assert_eq!(recv.type_name, "Pet");
        assert!(method.sig.params.is_empty());
        assert_eq!(method.sig.results.len(), 2);
    }

    #[test]
    fn generic_declarations_parse() {
        let file = parse(indoc! {r#"
            package proto

            type Page[T any] struct {
                Items []T
                Next  *Page[T]
            }

            type PetPage Page[Pet]
        "#});
        let Decl::Type(page) = &file.decls[0] else {
            panic!("expected type decl")
        };
        assert_eq!(page.type_params, ["T"]);
        let Decl::Type(alias) = &file.decls[1] else {
            panic!("expected type decl")
        };
        assert!(matches!(&alias.expr, TypeExpr::Instance(..)));
    }

    #[test]
    fn array_type_is_not_type_params() {
        let file = parse("package p\n\ntype Hash [16]byte\n");
        let Decl::Type(spec) = &file.decls[0] else {
            panic!("expected type decl")
        };
        assert!(spec.type_params.is_empty());
        let TypeExpr::Array(len, _) = &spec.expr else {
            panic!("expected array")
        };
        assert_eq!(len, "16");
    }
}

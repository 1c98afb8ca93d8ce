//! Parser for C++ type spellings such as `const N::A<int> *(&)[3]`.
//!
//! The parser produces a [`TypeSpec`] which [`Model::resolve_spec`] turns into
//! an interned type, resolving names against a scope. Names that do not
//! resolve survive as [`TypeKind::Named`](crate::model::TypeKind::Named).

use cppi_abi::QualKind;
use thiserror::Error;

use crate::model::{Builtin, DeclId, DeclKind, FunctionProto, Model, RefQualifier, TypeId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpellingError {
    #[error("unexpected end of type spelling")]
    UnexpectedEnd,
    #[error("unexpected token `{0}` in type spelling")]
    UnexpectedToken(String),
    #[error("type spelling names no type")]
    MissingBase,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Tok {
    Word(String),
    Number(String),
    Punct(String),
}

impl Tok {
    fn text(&self) -> &str {
        match self {
            Self::Word(text) | Self::Number(text) | Self::Punct(text) => text,
        }
    }

    fn is(&self, punct: &str) -> bool {
        matches!(self, Self::Punct(p) if p == punct)
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self, Self::Word(w) if w == word)
    }
}

fn tokenize(text: &str) -> Vec<Tok> {
    let mut toks = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch.is_whitespace() {
            i += 1;
        } else if ch.is_alphabetic() || ch == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            toks.push(Tok::Word(chars[start..i].iter().collect()));
        } else if ch.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '.' || chars[i] == '\'') {
                i += 1;
            }
            toks.push(Tok::Number(chars[start..i].iter().collect()));
        } else {
            let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
            let punct = ["...", "::", "&&"]
                .into_iter()
                .find(|p| rest.starts_with(p))
                .map_or_else(|| ch.to_string(), str::to_string);
            i += punct.chars().count();
            toks.push(Tok::Punct(punct));
        }
    }
    toks
}

/// Joins raw tokens back into canonical spacing.
fn join_tokens(toks: &[Tok]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Tok> = None;
    for tok in toks {
        let text = tok.text();
        let space = match (prev, tok) {
            (None, _) => false,
            (Some(p), _) if p.is(",") => true,
            (Some(Tok::Word(_) | Tok::Number(_)), Tok::Word(_) | Tok::Number(_)) => true,
            (Some(Tok::Word(_)), Tok::Punct(p)) if p == "*" || p == "&" || p == "&&" => true,
            (Some(p), Tok::Word(_)) if p.is("*") || p.is("&") || p.is(">") => true,
            _ => false,
        };
        if space {
            out.push(' ');
        }
        out.push_str(text);
        prev = Some(tok);
    }
    out
}

/// A possibly qualified name; template arguments stay in the segment text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QualifiedName {
    pub global: bool,
    pub segments: Vec<String>,
}

impl QualifiedName {
    pub fn text(&self) -> String {
        let joined = self.segments.join("::");
        if self.global { format!("::{joined}") } else { joined }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BaseSpec {
    Void,
    Builtin(Builtin),
    Complex(Builtin),
    Name(QualifiedName),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclOp {
    Pointer(QualKind),
    LValueReference,
    RValueReference,
    MemberPointer(QualifiedName, QualKind),
    Array(Option<u64>),
    Function {
        params: Vec<TypeSpec>,
        variadic: bool,
        quals: QualKind,
        ref_qual: RefQualifier,
    },
}

/// A parsed type: a base, its qualifiers and declarator operators applied
/// innermost first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeSpec {
    pub base: BaseSpec,
    pub quals: QualKind,
    pub ops: Vec<DeclOp>,
}

const BUILTIN_WORDS: &[&str] = &[
    "signed", "unsigned", "short", "long", "int", "char", "bool", "_Bool", "float", "double",
    "void", "wchar_t", "char8_t", "char16_t", "char32_t", "__int128", "_Complex",
];

const ELABORATED: &[&str] = &["struct", "class", "union", "enum", "typename"];

fn qual_word(word: &str) -> Option<QualKind> {
    match word {
        "const" => Some(QualKind::CONST),
        "volatile" => Some(QualKind::VOLATILE),
        "restrict" | "__restrict" | "__restrict__" => Some(QualKind::RESTRICT),
        _ => None,
    }
}

fn builtin_from_words(words: &[String]) -> Option<BaseSpec> {
    let has = |w: &str| words.iter().any(|x| x == w);
    let count = |w: &str| words.iter().filter(|x| *x == w).count();
    let complex = has("_Complex");
    let unsigned = has("unsigned");
    let signed = has("signed");
    let longs = count("long");

    let builtin = if has("void") {
        return (!complex).then_some(BaseSpec::Void);
    } else if has("bool") || has("_Bool") {
        Builtin::Bool
    } else if has("float") {
        Builtin::Float
    } else if has("double") {
        if longs > 0 { Builtin::LongDouble } else { Builtin::Double }
    } else if has("wchar_t") {
        Builtin::WChar
    } else if has("char8_t") {
        Builtin::Char8
    } else if has("char16_t") {
        Builtin::Char16
    } else if has("char32_t") {
        Builtin::Char32
    } else if has("char") {
        if unsigned {
            Builtin::UChar
        } else if signed {
            Builtin::SChar
        } else {
            Builtin::Char
        }
    } else if has("__int128") {
        if unsigned { Builtin::UInt128 } else { Builtin::Int128 }
    } else if has("short") {
        if unsigned { Builtin::UShort } else { Builtin::Short }
    } else if longs >= 2 {
        if unsigned { Builtin::ULongLong } else { Builtin::LongLong }
    } else if longs == 1 {
        if unsigned { Builtin::ULong } else { Builtin::Long }
    } else if has("int") || unsigned || signed {
        if unsigned { Builtin::UInt } else { Builtin::Int }
    } else if complex {
        Builtin::Double
    } else {
        return None;
    };
    Some(if complex {
        BaseSpec::Complex(builtin)
    } else {
        BaseSpec::Builtin(builtin)
    })
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Tok> {
        self.toks.get(self.pos + offset)
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, punct: &str) -> bool {
        if self.peek().is_some_and(|tok| tok.is(punct)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), SpellingError> {
        match self.bump() {
            Some(tok) if tok.is(punct) => Ok(()),
            Some(tok) => Err(SpellingError::UnexpectedToken(tok.text().to_string())),
            None => Err(SpellingError::UnexpectedEnd),
        }
    }

    fn type_id(&mut self) -> Result<TypeSpec, SpellingError> {
        let (base, quals) = self.decl_specifiers()?;
        let ops = self.declarator()?;
        Ok(TypeSpec { base, quals, ops })
    }

    fn decl_specifiers(&mut self) -> Result<(BaseSpec, QualKind), SpellingError> {
        let mut quals = QualKind::NONE;
        let mut words = Vec::new();
        let mut name = None;
        while let Some(tok) = self.peek().cloned() {
            match &tok {
                Tok::Word(word) => {
                    if let Some(q) = qual_word(word) {
                        quals |= q;
                        self.pos += 1;
                    } else if ELABORATED.contains(&word.as_str()) {
                        self.pos += 1;
                    } else if BUILTIN_WORDS.contains(&word.as_str()) {
                        if name.is_some() {
                            break;
                        }
                        words.push(word.clone());
                        self.pos += 1;
                    } else if name.is_none() && words.is_empty() {
                        name = Some(self.qualified_name()?);
                    } else {
                        break;
                    }
                }
                Tok::Punct(p) if p == "::" && name.is_none() && words.is_empty() => {
                    name = Some(self.qualified_name()?);
                }
                _ => break,
            }
        }
        let base = match name {
            Some(name) => BaseSpec::Name(name),
            None => builtin_from_words(&words).ok_or(SpellingError::MissingBase)?,
        };
        Ok((base, quals))
    }

    fn qualified_name(&mut self) -> Result<QualifiedName, SpellingError> {
        let global = self.eat("::");
        let mut segments = Vec::new();
        loop {
            let Some(Tok::Word(word)) = self.bump() else {
                return Err(SpellingError::UnexpectedEnd);
            };
            let mut segment = word;
            if self.peek().is_some_and(|tok| tok.is("<")) {
                segment.push('<');
                segment.push_str(&self.template_args()?);
                segment.push('>');
            }
            segments.push(segment);
            let continues = self.peek().is_some_and(|tok| tok.is("::"))
                && matches!(self.peek_at(1), Some(Tok::Word(_)));
            if !continues {
                break;
            }
            self.pos += 1;
        }
        Ok(QualifiedName { global, segments })
    }

    /// Consumes `<...>` and returns the normalized argument text.
    fn template_args(&mut self) -> Result<String, SpellingError> {
        self.expect("<")?;
        let mut depth = 0usize;
        let mut args: Vec<Vec<Tok>> = vec![Vec::new()];
        loop {
            let tok = self.bump().ok_or(SpellingError::UnexpectedEnd)?;
            match tok.text() {
                "<" | "(" | "[" => depth += 1,
                ">" if depth == 0 => break,
                ">" | ")" | "]" => depth = depth.saturating_sub(1),
                "," if depth == 0 => {
                    args.push(Vec::new());
                    continue;
                }
                _ => {}
            }
            if let Some(current) = args.last_mut() {
                current.push(tok);
            }
        }
        Ok(args
            .iter()
            .map(|arg| join_tokens(arg))
            .collect::<Vec<_>>()
            .join(", "))
    }

    fn cv(&mut self) -> QualKind {
        let mut quals = QualKind::NONE;
        while let Some(Tok::Word(word)) = self.peek() {
            match qual_word(word) {
                Some(q) => {
                    quals |= q;
                    self.pos += 1;
                }
                None => break,
            }
        }
        quals
    }

    /// True when the tokens from `at` spell `[::] Name [<...>] (:: Name [<...>])* :: *`.
    fn member_pointer_at(&self, mut at: usize) -> bool {
        if self.toks.get(at).is_some_and(|tok| tok.is("::")) {
            at += 1;
        }
        loop {
            if !matches!(self.toks.get(at), Some(Tok::Word(_))) {
                return false;
            }
            at += 1;
            if self.toks.get(at).is_some_and(|tok| tok.is("<")) {
                let mut depth = 0usize;
                while let Some(tok) = self.toks.get(at) {
                    at += 1;
                    if tok.is("<") {
                        depth += 1;
                    } else if tok.is(">") {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                }
            }
            if !self.toks.get(at).is_some_and(|tok| tok.is("::")) {
                return false;
            }
            at += 1;
            if self.toks.get(at).is_some_and(|tok| tok.is("*")) {
                return true;
            }
        }
    }

    fn member_pointer_class(&mut self) -> Result<QualifiedName, SpellingError> {
        let global = self.eat("::");
        let mut segments = Vec::new();
        loop {
            let Some(Tok::Word(word)) = self.bump() else {
                return Err(SpellingError::UnexpectedEnd);
            };
            let mut segment = word;
            if self.peek().is_some_and(|tok| tok.is("<")) {
                segment.push('<');
                segment.push_str(&self.template_args()?);
                segment.push('>');
            }
            segments.push(segment);
            self.expect("::")?;
            if self.eat("*") {
                return Ok(QualifiedName { global, segments });
            }
        }
    }

    fn nested_declarator_at(&self, at: usize) -> bool {
        match self.toks.get(at) {
            Some(tok) if tok.is("*") || tok.is("&") || tok.is("&&") || tok.is("^") => true,
            Some(tok) if tok.is("(") => self.nested_declarator_at(at + 1),
            Some(Tok::Word(_) | Tok::Punct(_)) => self.member_pointer_at(at),
            _ => false,
        }
    }

    fn declarator(&mut self) -> Result<Vec<DeclOp>, SpellingError> {
        let mut ptr_ops = Vec::new();
        loop {
            let Some(tok) = self.peek().cloned() else { break };
            if tok.is("*") || tok.is("^") {
                self.pos += 1;
                ptr_ops.push(DeclOp::Pointer(self.cv()));
            } else if tok.is("&") {
                self.pos += 1;
                self.cv();
                ptr_ops.push(DeclOp::LValueReference);
            } else if tok.is("&&") {
                self.pos += 1;
                self.cv();
                ptr_ops.push(DeclOp::RValueReference);
            } else if (tok.is("::") || matches!(tok, Tok::Word(_))) && self.member_pointer_at(self.pos) {
                let class = self.member_pointer_class()?;
                ptr_ops.push(DeclOp::MemberPointer(class, self.cv()));
            } else {
                break;
            }
        }

        let mut nested = Vec::new();
        if self.peek().is_some_and(|tok| tok.is("(")) && self.nested_declarator_at(self.pos + 1) {
            self.pos += 1;
            nested = self.declarator()?;
            self.expect(")")?;
        } else if matches!(self.peek(), Some(Tok::Word(word)) if qual_word(word).is_none()) {
            // Declarator id, as in `int (*fp)(int)`; the name is irrelevant.
            self.pos += 1;
        }

        let mut suffixes = Vec::new();
        loop {
            if self.eat("[") {
                let len = match self.peek() {
                    Some(Tok::Number(n)) => {
                        let len = n.trim_end_matches(|c: char| c.is_ascii_alphabetic()).parse().ok();
                        self.pos += 1;
                        len
                    }
                    _ => None,
                };
                while !self.eat("]") {
                    self.bump().ok_or(SpellingError::UnexpectedEnd)?;
                }
                suffixes.push(DeclOp::Array(len));
            } else if self.peek().is_some_and(|tok| tok.is("(")) {
                suffixes.push(self.function_suffix()?);
            } else {
                break;
            }
        }

        let mut ops = ptr_ops;
        ops.extend(suffixes.into_iter().rev());
        ops.extend(nested);
        Ok(ops)
    }

    fn function_suffix(&mut self) -> Result<DeclOp, SpellingError> {
        self.expect("(")?;
        let mut params = Vec::new();
        let mut variadic = false;
        if !self.eat(")") {
            loop {
                if self.eat("...") {
                    variadic = true;
                } else {
                    params.push(self.type_id()?);
                }
                if self.eat(")") {
                    break;
                }
                self.expect(",")?;
            }
        }
        if let [single] = params.as_slice() {
            if single.base == BaseSpec::Void && single.ops.is_empty() {
                params.clear();
            }
        }
        let quals = self.cv();
        let mut ref_qual = RefQualifier::None;
        loop {
            if self.eat("&") {
                ref_qual = RefQualifier::LValue;
            } else if self.eat("&&") {
                ref_qual = RefQualifier::RValue;
            } else if self.peek().is_some_and(|tok| tok.is_word("noexcept") || tok.is_word("throw")) {
                self.pos += 1;
                if self.peek().is_some_and(|tok| tok.is("(")) {
                    self.skip_balanced()?;
                }
            } else if self.peek().is_some_and(|tok| tok.is_word("__attribute__")) {
                self.pos += 1;
                self.skip_balanced()?;
            } else {
                break;
            }
        }
        Ok(DeclOp::Function {
            params,
            variadic,
            quals,
            ref_qual,
        })
    }

    fn skip_balanced(&mut self) -> Result<(), SpellingError> {
        self.expect("(")?;
        let mut depth = 1usize;
        while depth > 0 {
            let tok = self.bump().ok_or(SpellingError::UnexpectedEnd)?;
            if tok.is("(") {
                depth += 1;
            } else if tok.is(")") {
                depth -= 1;
            }
        }
        Ok(())
    }
}

/// Parses a complete type spelling.
pub fn parse_type_spelling(text: &str) -> Result<TypeSpec, SpellingError> {
    let mut parser = Parser {
        toks: tokenize(text),
        pos: 0,
    };
    let spec = parser.type_id()?;
    match parser.peek() {
        None => Ok(spec),
        Some(tok) => Err(SpellingError::UnexpectedToken(tok.text().to_string())),
    }
}

/// Parses the spelling of a builtin type, as accepted by `GetType`.
pub fn parse_builtin(text: &str) -> Option<BaseSpec> {
    let words: Vec<String> = tokenize(text)
        .into_iter()
        .map(|tok| match tok {
            Tok::Word(word) if BUILTIN_WORDS.contains(&word.as_str()) => Ok(word),
            _ => Err(()),
        })
        .collect::<Result<_, _>>()
        .ok()?;
    if words.is_empty() {
        return None;
    }
    builtin_from_words(&words)
}

impl Model {
    /// Parses `text` and resolves it as seen from `context`.
    ///
    /// Unparsable text becomes a named type carrying the raw spelling.
    pub fn parse_type(&mut self, text: &str, context: DeclId) -> TypeId {
        match parse_type_spelling(text) {
            Ok(spec) => self.resolve_spec(&spec, context),
            Err(_) => self.named(text.trim()),
        }
    }

    pub fn resolve_spec(&mut self, spec: &TypeSpec, context: DeclId) -> TypeId {
        let base = match &spec.base {
            BaseSpec::Void => self.void(),
            BaseSpec::Builtin(builtin) => self.builtin(*builtin),
            BaseSpec::Complex(builtin) => {
                let element = self.builtin(*builtin);
                self.complex(element)
            }
            BaseSpec::Name(name) => self.resolve_name_type(name, context),
        };
        let mut ty = self.with_quals(base, spec.quals);
        for op in &spec.ops {
            ty = match op {
                DeclOp::Pointer(quals) => {
                    let ptr = self.pointer(ty);
                    self.with_quals(ptr, *quals)
                }
                DeclOp::LValueReference => self.lvalue_reference(ty),
                DeclOp::RValueReference => self.rvalue_reference(ty),
                DeclOp::MemberPointer(class, quals) => {
                    let class_ty = self.resolve_name_type(class, context);
                    let ptr = self.member_pointer(ty, class_ty);
                    self.with_quals(ptr, *quals)
                }
                DeclOp::Array(Some(len)) => self.constant_array(ty, *len),
                DeclOp::Array(None) => self.incomplete_array(ty),
                DeclOp::Function {
                    params,
                    variadic,
                    quals,
                    ref_qual,
                } => {
                    let params = params
                        .iter()
                        .map(|param| self.resolve_spec(param, context))
                        .collect();
                    self.function_type(FunctionProto {
                        ret: ty,
                        params,
                        variadic: *variadic,
                        quals: *quals,
                        ref_qual: *ref_qual,
                    })
                }
            };
        }
        ty
    }

    fn resolve_name_type(&mut self, name: &QualifiedName, context: DeclId) -> TypeId {
        let text = name.text();
        let lookup_from = if name.global { Model::TRANSLATION_UNIT } else { context };
        match self.resolve_type_name(&text, lookup_from) {
            Some(decl) => match self.decl(decl).kind {
                DeclKind::Record(_) => self.record_type(decl),
                DeclKind::Enum(_) => self.enum_type(decl),
                _ => self.typedef_type(decl),
            },
            None if text == "std::nullptr_t" || text == "nullptr_t" => {
                self.builtin(Builtin::NullPtr)
            }
            None => self.named(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Access, RecordInfo, TagKind, TypeKind};

    fn roundtrip(text: &str) -> String {
        let mut model = Model::new();
        let ty = model.parse_type(text, Model::TRANSLATION_UNIT);
        model.type_to_string(ty)
    }

    #[test]
    fn test_builtin_spellings() {
        assert_eq!(roundtrip("unsigned"), "unsigned int");
        assert_eq!(roundtrip("long long int"), "long long");
        assert_eq!(roundtrip("unsigned long"), "unsigned long");
        assert_eq!(roundtrip("signed char"), "signed char");
        assert_eq!(roundtrip("long double"), "long double");
        assert_eq!(roundtrip("_Complex double"), "_Complex double");
        assert_eq!(parse_builtin("int"), Some(BaseSpec::Builtin(Builtin::Int)));
        assert_eq!(parse_builtin("N::A"), None);
    }

    #[test]
    fn test_declarators() {
        assert_eq!(roundtrip("const char*"), "const char *");
        assert_eq!(roundtrip("char const * const"), "const char *const");
        assert_eq!(roundtrip("int&&"), "int &&");
        assert_eq!(roundtrip("int (*)(int, double)"), "int (*)(int, double)");
        assert_eq!(roundtrip("int (*)[3]"), "int (*)[3]");
        assert_eq!(roundtrip("int[2][3]"), "int[2][3]");
        assert_eq!(roundtrip("void (int, ...)"), "void (int, ...)");
        assert_eq!(roundtrip("void (void)"), "void ()");
        assert_eq!(roundtrip("int *__restrict"), "int *__restrict");
        assert_eq!(roundtrip("void (*)(int) noexcept"), "void (*)(int)");
    }

    #[test]
    fn test_member_pointers() {
        let mut model = Model::new();
        let mut info = RecordInfo::new(TagKind::Class);
        info.complete = true;
        let record = model.add_decl(Model::TRANSLATION_UNIT, "A", Access::None, DeclKind::Record(info));
        let ty = model.parse_type("void (A::*)(int) const", Model::TRANSLATION_UNIT);
        assert_eq!(model.type_to_string(ty), "void (A::*)(int) const");
        let data = model.parse_type("int A::*", Model::TRANSLATION_UNIT);
        match &model.ty(data).kind {
            TypeKind::MemberPointer { class, .. } => {
                assert_eq!(model.ty(*class).kind, TypeKind::Record(record));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_names_resolve_in_context() {
        let mut model = Model::new();
        let ns = model.add_decl(
            Model::TRANSLATION_UNIT,
            "N",
            Access::None,
            DeclKind::Namespace { inline: false },
        );
        let record = model.add_decl(
            ns,
            "A",
            Access::None,
            DeclKind::Record(RecordInfo::new(TagKind::Struct)),
        );
        let inside = model.parse_type("const A &", ns);
        assert_eq!(model.type_to_string(inside), "const N::A &");
        let pointee = model.pointee(inside).unwrap();
        let pointee = model.unqualified(pointee);
        assert_eq!(model.ty(pointee).kind, TypeKind::Record(record));

        let outside = model.parse_type("A", Model::TRANSLATION_UNIT);
        assert_eq!(model.ty(outside).kind, TypeKind::Named("A".to_string()));
        let elaborated = model.parse_type("struct N::A", Model::TRANSLATION_UNIT);
        assert_eq!(model.ty(elaborated).kind, TypeKind::Record(record));
    }

    #[test]
    fn test_template_argument_text_is_normalized() {
        assert_eq!(
            roundtrip("std::vector<const char*,std::allocator<const char *> >"),
            "std::vector<const char *, std::allocator<const char *>>"
        );
        assert_eq!(roundtrip("(lambda at x.cpp:1:2)"), "(lambda at x.cpp:1:2)");
    }
}

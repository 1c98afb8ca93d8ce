//! C++ source for call and destructor trampolines.
//!
//! A call trampoline has one clause per accepted argument count. Each clause
//! unpacks `args[i]` according to the parameter type, calls the target and
//! placement-constructs a non-void result into `ret`:
//!
//! ```text
//! if (ret) {
//!    new (ret) (int) (((int (&)(int))sq)(*(int*)args[0]));
//!    return;
//! }
//! else {
//!    (void)(((int (&)(int))sq)(*(int*)args[0]));
//!    return;
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use cppi_compiler::model::{DeclKind, FunctionInfo};
use cppi_compiler::{DeclId, Model, TypeId};

use crate::{Result, SynthesisError};

const INDENT: &str = "   ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Reference {
    None,
    LValue,
    RValue,
}

/// How a parameter or return type is spelled inside a trampoline.
#[derive(Debug)]
struct Spelling {
    name: String,
    reference: Reference,
    pointer: bool,
}

/// Generated trampoline source and the symbol it defines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrapperSource {
    pub symbol: String,
    pub code: String,
}

/// What the call expression needs to know about the target function.
struct Target {
    name: String,
    class_name: String,
    params: Vec<TypeId>,
    return_type: TypeId,
    variadic: bool,
    member: bool,
    /// `Some(is_const)` for non-static member functions.
    instance: Option<bool>,
    constructor: bool,
}

fn indent(buf: &mut String, level: usize) {
    for _ in 0..level {
        buf.push_str(INDENT);
    }
}

fn line(buf: &mut String, level: usize, text: &str) {
    indent(buf, level);
    buf.push_str(text);
    buf.push('\n');
}

/// Two arguments per line: `, ` after odd positions, a line break after even.
fn push_separator(buf: &mut String, index: usize, level: usize) {
    if index == 0 {
        return;
    }
    buf.push(',');
    if index % 2 == 1 {
        buf.push(' ');
    } else {
        buf.push('\n');
        indent(buf, level + 1);
    }
}

fn push_argument(buf: &mut String, index: usize, spelling: &Spelling) {
    let name = &spelling.name;
    let text = match spelling.reference {
        Reference::LValue => format!("({name}&)*({name}*)args[{index}]"),
        Reference::RValue => format!("({name}&&)*({name}*)args[{index}]"),
        Reference::None if spelling.pointer => format!("*({name}**)args[{index}]"),
        Reference::None => format!("*({name}*)args[{index}]"),
    };
    buf.push_str(&text);
}

/// Writes trampolines for declarations of one model.
///
/// `serial` numbers trampoline symbols and the auxiliary `FP`/`MP`/`AR`
/// typedefs alike, so it must be shared by every writer feeding the same
/// compiler session.
pub struct CodeWriter<'a> {
    model: &'a mut Model,
    serial: &'a AtomicU64,
}

impl<'a> CodeWriter<'a> {
    pub fn new(model: &'a mut Model, serial: &'a AtomicU64) -> Self {
        Self { model, serial }
    }

    fn next_serial(&self) -> u64 {
        self.serial.fetch_add(1, Ordering::Relaxed)
    }

    /// Source of `__cf_N(void* obj, int nargs, void** args, void* ret)` for
    /// `func`.
    pub fn wrapper_source(&mut self, func: DeclId) -> Result<WrapperSource> {
        let info = self
            .model
            .function(func)
            .cloned()
            .ok_or(SynthesisError::NotAFunction)?;
        let target = self.target(func, &info);
        let min_args = info.min_required_args();
        let num_params = info.params.len();

        let symbol = format!("__cf_{}", self.next_serial());
        let mut buf = String::from(
            "#include <new>\n\
             #pragma clang diagnostic push\n\
             #pragma clang diagnostic ignored \"-Wformat-security\"\n\
             __attribute__((used)) extern \"C\" void ",
        );
        buf.push_str(&symbol);
        buf.push_str("(void* obj, int nargs, void** args, void* ret)\n{\n");
        if min_args == num_params {
            self.make_call_with_return(&target, num_params, &mut buf, 1);
        } else {
            for n in min_args..=num_params {
                line(&mut buf, 1, &format!("if (nargs == {n}) {{"));
                self.make_call_with_return(&target, n, &mut buf, 2);
                line(&mut buf, 1, "}");
            }
        }
        buf.push_str("}\n#pragma clang diagnostic pop\n");
        Ok(WrapperSource { symbol, code: buf })
    }

    /// Source of `__dtor_N(void* obj, unsigned long nary, int withFree)` for
    /// a class, or a typedef naming one.
    pub fn destructor_source(&mut self, decl: DeclId) -> Result<WrapperSource> {
        let is_typedef = matches!(self.model.decl(decl).kind, DeclKind::Typedef { .. });
        let class_name = if self.model.decl(decl).is_record() {
            let ty = self.model.record_type(decl);
            self.model.type_to_string(ty)
        } else if is_typedef && self.model.record_of_decl(decl).is_some() {
            // Anonymous classes are only nameable through their typedef.
            self.model.qualified_name(decl)
        } else {
            return Err(SynthesisError::NotAClass);
        };

        let symbol = format!("__dtor_{}", self.next_serial());
        let mut buf = format!(
            "__attribute__((used)) extern \"C\" void {symbol}(void* obj, unsigned long nary, int withFree)\n{{\n"
        );
        line(&mut buf, 1, "if (withFree) {");
        line(&mut buf, 2, "if (!nary) {");
        line(&mut buf, 3, &format!("delete ({class_name}*) obj;"));
        line(&mut buf, 2, "}");
        line(&mut buf, 2, "else {");
        line(&mut buf, 3, &format!("delete[] ({class_name}*) obj;"));
        line(&mut buf, 2, "}");
        line(&mut buf, 1, "}");
        line(&mut buf, 1, "else {");
        line(&mut buf, 2, &format!("typedef {class_name} Nm;"));
        line(&mut buf, 2, "if (!nary) {");
        line(&mut buf, 3, "((Nm*)obj)->~Nm();");
        line(&mut buf, 2, "}");
        line(&mut buf, 2, "else {");
        line(&mut buf, 3, "do {");
        line(&mut buf, 4, "(((Nm*)obj)+(--nary))->~Nm();");
        line(&mut buf, 3, "} while (nary);");
        line(&mut buf, 2, "}");
        line(&mut buf, 1, "}");
        buf.push_str("}\n");
        Ok(WrapperSource { symbol, code: buf })
    }

    fn target(&mut self, func: DeclId, info: &FunctionInfo) -> Target {
        let params = info
            .params
            .iter()
            .map(|param| self.model.canonical(param.ty))
            .collect();
        Target {
            name: self.model.complete_name(func),
            class_name: self.scope_spelling(func),
            params,
            return_type: self.model.canonical(info.return_type),
            variadic: info.variadic,
            member: info.method.is_some(),
            instance: info
                .method
                .filter(|method| !method.is_static)
                .map(|method| method.is_const),
            constructor: info.is_constructor(),
        }
    }

    /// Spelling of the class or namespace enclosing `func`; empty at global
    /// scope.
    fn scope_spelling(&mut self, func: DeclId) -> String {
        let Some(parent) = self.model.semantic_parent(func) else {
            return String::new();
        };
        if self.model.decl(parent).is_record() {
            let ty = self.model.record_type(parent);
            return self.model.type_to_string(ty);
        }
        let mut parts = Vec::new();
        let mut current = Some(parent);
        while let Some(id) = current {
            let decl = self.model.decl(id);
            match &decl.kind {
                DeclKind::TranslationUnit => break,
                // Members of anonymous namespaces are reachable unqualified.
                DeclKind::Namespace { .. } if decl.name.is_empty() => {}
                DeclKind::Enum(info) if !info.scoped => {}
                _ => parts.push(self.model.complete_name(id)),
            }
            current = decl.parent;
        }
        parts.reverse();
        parts.join("::")
    }

    fn typedef_for(&mut self, prefix: &str, ty: TypeId, typedefs: &mut String, level: usize) -> String {
        let name = format!("{prefix}{}", self.next_serial());
        indent(typedefs, level);
        typedefs.push_str("typedef ");
        typedefs.push_str(&self.model.print_type(ty, &name));
        typedefs.push_str(";\n");
        name
    }

    /// Spells a canonical type. Types whose declarator cannot be written
    /// inline get a typedef appended to `typedefs`; one level of pointer or
    /// reference is recorded in the flags and stripped from the name.
    fn collect_type_info(
        &mut self,
        ty: TypeId,
        typedefs: &mut String,
        level: usize,
        for_argument: bool,
    ) -> Spelling {
        let mut spelling = Spelling {
            name: String::new(),
            reference: Reference::None,
            pointer: false,
        };
        if for_argument && self.model.is_record(ty) {
            spelling.name = self.model.type_to_string(ty);
            return spelling;
        }
        if self.model.is_function_pointer(ty) {
            spelling.name = self.typedef_for("FP", ty, typedefs, level);
            return spelling;
        }
        if self.model.is_member_pointer(ty) {
            spelling.name = self.typedef_for("MP", ty, typedefs, level);
            return spelling;
        }

        let mut ty = ty;
        if self.model.is_pointer(ty) {
            spelling.pointer = true;
        } else if self.model.is_rvalue_reference(ty) {
            spelling.reference = Reference::RValue;
        } else if self.model.is_reference(ty) {
            spelling.reference = Reference::LValue;
        }
        if spelling.pointer || spelling.reference != Reference::None {
            if let Some(pointee) = self.model.pointee(ty) {
                ty = pointee;
            }
        }

        // References and pointers to arrays keep their flags.
        if self.model.is_array(ty) {
            spelling.name = self.typedef_for("AR", ty, typedefs, level);
            return spelling;
        }
        spelling.name = self.model.type_to_string(ty);
        spelling
    }

    /// `(arg0, arg1,\n   arg2)` for the first `n` parameters.
    fn push_arguments(
        &mut self,
        params: &[TypeId],
        n: usize,
        typedefs: &mut String,
        call: &mut String,
        level: usize,
    ) {
        call.push('(');
        for (index, ty) in params.iter().take(n).enumerate() {
            let spelling = self.collect_type_info(*ty, typedefs, level, true);
            push_separator(call, index, level);
            push_argument(call, index, &spelling);
        }
        call.push(')');
    }

    /// `new C(args)`, or `new (obj) C(args)` when constructing in place.
    fn make_narg_ctor(
        &mut self,
        target: &Target,
        n: usize,
        in_place: bool,
        typedefs: &mut String,
        call: &mut String,
        level: usize,
    ) {
        call.push_str(if in_place { "new (obj) " } else { "new " });
        call.push_str(&target.class_name);
        self.push_arguments(&target.params, n, typedefs, call, level);
    }

    /// The call expression. A free function called with every argument goes
    /// through a cast to its exact signature so overload resolution cannot
    /// pick a different function.
    fn make_narg_call(
        &mut self,
        target: &Target,
        return_type: &str,
        n: usize,
        typedefs: &mut String,
        call: &mut String,
        level: usize,
    ) {
        let cast = !target.member && n == target.params.len();
        if cast {
            call.push_str("((");
            call.push_str(return_type);
            call.push_str(" (&)(");
            for (index, ty) in target.params.iter().enumerate() {
                push_separator(call, index, level);
                call.push_str(&self.model.type_to_string(*ty));
            }
            if target.variadic {
                call.push_str(if target.params.is_empty() { "..." } else { ", ..." });
            }
            call.push_str("))");
        }

        match target.instance {
            Some(true) => call.push_str(&format!("((const {}*)obj)->", target.class_name)),
            Some(false) => call.push_str(&format!("(({}*)obj)->", target.class_name)),
            None if !target.class_name.is_empty() => {
                call.push_str(&target.class_name);
                call.push_str("::");
            }
            None => {}
        }
        call.push_str(&target.name);
        if cast {
            call.push(')');
        }
        self.push_arguments(&target.params, n, typedefs, call, level);
    }

    /// Result spelling for the placement new into `ret`, plus the type text
    /// used by the signature cast.
    fn return_spelling(&mut self, ty: TypeId, typedefs: &mut String, level: usize) -> (Spelling, String) {
        let spelling = self.collect_type_info(ty, typedefs, level, false);
        let mut cast_name = spelling.name.clone();
        if spelling.reference != Reference::None {
            cast_name.push('&');
        } else if spelling.pointer {
            cast_name.push('*');
        }
        (spelling, cast_name)
    }

    fn make_call_with_return(&mut self, target: &Target, n: usize, buf: &mut String, level: usize) {
        if target.constructor {
            self.make_ctor_with_return(target, n, buf, level);
            return;
        }

        if self.model.is_void(target.return_type) {
            let mut typedefs = String::new();
            let mut call = String::new();
            indent(&mut call, level);
            self.make_narg_call(target, "void", n, &mut typedefs, &mut call, level);
            call.push_str(";\n");
            line(&mut call, level, "return;");
            buf.push_str(&typedefs);
            buf.push_str(&call);
            return;
        }

        let inner = level + 1;
        line(buf, level, "if (ret) {");
        {
            let mut typedefs = String::new();
            let mut call = String::new();
            indent(&mut call, inner);
            call.push_str("new (ret) (");
            let (spelling, cast_name) = self.return_spelling(target.return_type, &mut typedefs, inner);
            call.push_str(&spelling.name);
            if spelling.reference != Reference::None {
                call.push_str("*) (&");
            } else if spelling.pointer {
                call.push_str("*) (");
            } else {
                call.push_str(") (");
            }
            self.make_narg_call(target, &cast_name, n, &mut typedefs, &mut call, inner);
            call.push_str(");\n");
            line(&mut call, inner, "return;");
            buf.push_str(&typedefs);
            buf.push_str(&call);
        }
        line(buf, level, "}");
        line(buf, level, "else {");
        {
            let mut typedefs = String::new();
            let mut call = String::new();
            indent(&mut call, inner);
            call.push_str("(void)(");
            // Typedefs from the branch above are out of scope here.
            let cast_name = if target.member {
                String::new()
            } else {
                self.return_spelling(target.return_type, &mut typedefs, inner).1
            };
            self.make_narg_call(target, &cast_name, n, &mut typedefs, &mut call, inner);
            call.push_str(");\n");
            line(&mut call, inner, "return;");
            buf.push_str(&typedefs);
            buf.push_str(&call);
        }
        line(buf, level, "}");
    }

    /// Constructs in place at `obj` when given one, else on the heap; the
    /// object's address goes to `*(C**)ret` when `ret` is given.
    fn make_ctor_with_return(&mut self, target: &Target, n: usize, buf: &mut String, level: usize) {
        let class_name = &target.class_name;
        let inner = level + 1;

        line(buf, level, "if (obj) {");
        {
            let mut typedefs = String::new();
            let mut call = String::new();
            indent(&mut call, inner);
            self.make_narg_ctor(target, n, true, &mut typedefs, &mut call, inner);
            call.push_str(";\n");
            line(&mut call, inner, "if (ret) {");
            line(&mut call, inner + 1, &format!("(*({class_name}**)ret) = ({class_name}*)obj;"));
            line(&mut call, inner, "}");
            line(&mut call, inner, "return;");
            buf.push_str(&typedefs);
            buf.push_str(&call);
        }
        line(buf, level, "}");

        line(buf, level, "if (ret) {");
        {
            let mut typedefs = String::new();
            let mut call = String::new();
            indent(&mut call, inner);
            call.push_str(&format!("(*({class_name}**)ret) = "));
            self.make_narg_ctor(target, n, false, &mut typedefs, &mut call, inner);
            call.push_str(";\n");
            line(&mut call, inner, "return;");
            buf.push_str(&typedefs);
            buf.push_str(&call);
        }
        line(buf, level, "}");
        line(buf, level, "else {");
        {
            let mut typedefs = String::new();
            let mut call = String::new();
            indent(&mut call, inner);
            self.make_narg_ctor(target, n, false, &mut typedefs, &mut call, inner);
            call.push_str(";\n");
            line(&mut call, inner, "return;");
            buf.push_str(&typedefs);
            buf.push_str(&call);
        }
        line(buf, level, "}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cppi_abi::QualKind;
    use cppi_compiler::ModelBuilder;
    use cppi_compiler::model::{Builtin, FunctionProto, RefQualifier, TagKind};

    const HEADER: &str = "#include <new>\n\
        #pragma clang diagnostic push\n\
        #pragma clang diagnostic ignored \"-Wformat-security\"\n";

    fn body(source: &WrapperSource) -> &str {
        let start = source.code.find("{\n").unwrap() + 2;
        let end = source.code.rfind("}\n#pragma").unwrap();
        &source.code[start..end]
    }

    #[test]
    fn test_free_function_wrapper() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let sq = builder
            .function(Model::TRANSLATION_UNIT, "sq", int)
            .param("x", int)
            .build();

        let serial = AtomicU64::new(0);
        let source = CodeWriter::new(&mut model, &serial).wrapper_source(sq).unwrap();
        assert_eq!(source.symbol, "__cf_0");
        let expected = format!(
            "{HEADER}__attribute__((used)) extern \"C\" void __cf_0(void* obj, int nargs, void** args, void* ret)\n\
             {{\n   if (ret) {{\n      new (ret) (int) (((int (&)(int))sq)(*(int*)args[0]));\n      return;\n   }}\n   \
             else {{\n      (void)(((int (&)(int))sq)(*(int*)args[0]));\n      return;\n   }}\n}}\n\
             #pragma clang diagnostic pop\n"
        );
        assert_eq!(source.code, expected);
        assert_eq!(serial.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_const_method_with_function_pointer_argument() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let ns = builder.namespace(Model::TRANSLATION_UNIT, "N");
        let record = builder.record(ns, "A", TagKind::Struct);
        let const_int = builder.model().with_quals(int, QualKind::CONST);
        let ret = builder.model().lvalue_reference(const_int);
        let proto = builder.model().function_type(FunctionProto {
            ret: int,
            params: vec![int],
            variadic: false,
            quals: QualKind::NONE,
            ref_qual: RefQualifier::None,
        });
        let callback = builder.model().pointer(proto);
        let get = builder
            .function(record, "get", ret)
            .param("cb", callback)
            .const_method()
            .build();

        let serial = AtomicU64::new(0);
        let source = CodeWriter::new(&mut model, &serial).wrapper_source(get).unwrap();
        assert_eq!(
            body(&source),
            "   if (ret) {\n\
             \x20     typedef int (*FP1)(int);\n\
             \x20     new (ret) (const int*) (&((const N::A*)obj)->get(*(FP1*)args[0]));\n\
             \x20     return;\n\
             \x20  }\n\
             \x20  else {\n\
             \x20     typedef int (*FP2)(int);\n\
             \x20     (void)(((const N::A*)obj)->get(*(FP2*)args[0]));\n\
             \x20     return;\n\
             \x20  }\n"
        );
    }

    #[test]
    fn test_void_function_argument_layout() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let void = builder.model().void();
        let ns = builder.namespace(Model::TRANSLATION_UNIT, "N");
        let f = builder
            .function(ns, "f", void)
            .param("a", int)
            .param("b", int)
            .param("c", int)
            .build();

        let serial = AtomicU64::new(0);
        let source = CodeWriter::new(&mut model, &serial).wrapper_source(f).unwrap();
        assert_eq!(
            body(&source),
            "   ((void (&)(int, int,\n      int))N::f)(*(int*)args[0], *(int*)args[1],\n      *(int*)args[2]);\n   return;\n"
        );
    }

    #[test]
    fn test_reference_pointer_and_array_arguments() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let char_ty = builder.builtin(Builtin::Char);
        let void = builder.model().void();
        let lref = builder.model().lvalue_reference(int);
        let rref = builder.model().rvalue_reference(int);
        let const_char = builder.model().with_quals(char_ty, QualKind::CONST);
        let text = builder.model().pointer(const_char);
        let array = builder.model().constant_array(int, 3);
        let array_ref = builder.model().lvalue_reference(array);
        let g = builder
            .function(Model::TRANSLATION_UNIT, "g", void)
            .param("a", lref)
            .param("b", rref)
            .param("c", text)
            .param("d", array_ref)
            .build();

        let serial = AtomicU64::new(0);
        let source = CodeWriter::new(&mut model, &serial).wrapper_source(g).unwrap();
        let code = body(&source);
        assert!(code.starts_with("   typedef int AR1[3];\n"), "{code}");
        assert!(code.contains("(int&)*(int*)args[0]"), "{code}");
        assert!(code.contains("(int&&)*(int*)args[1]"), "{code}");
        assert!(code.contains("*(const char**)args[2]"), "{code}");
        assert!(code.contains("(AR1&)*(AR1*)args[3]"), "{code}");
    }

    #[test]
    fn test_constructor_with_default_argument() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let double = builder.builtin(Builtin::Double);
        let record = builder.record(Model::TRANSLATION_UNIT, "P", TagKind::Struct);
        let ctor = builder
            .constructor(record)
            .param("a", int)
            .param_with_default("b", double, "2.0")
            .build();
        builder.finish_record(record);

        let serial = AtomicU64::new(0);
        let source = CodeWriter::new(&mut model, &serial).wrapper_source(ctor).unwrap();
        let code = body(&source);
        assert!(code.starts_with("   if (nargs == 1) {\n      if (obj) {\n"), "{code}");
        assert!(code.contains("         new (obj) P(*(int*)args[0]);\n"));
        assert!(code.contains("            (*(P**)ret) = (P*)obj;\n"));
        assert!(code.contains("   if (nargs == 2) {\n"));
        assert!(code.contains("(*(P**)ret) = new P(*(int*)args[0], *(double*)args[1]);"));
        assert!(code.contains("      else {\n         new P(*(int*)args[0]);\n         return;\n      }\n"));
    }

    #[test]
    fn test_static_method_is_qualified() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let record = builder.record(Model::TRANSLATION_UNIT, "C", TagKind::Class);
        let make = builder.function(record, "make", int).static_method().build();

        let serial = AtomicU64::new(7);
        let source = CodeWriter::new(&mut model, &serial).wrapper_source(make).unwrap();
        assert_eq!(source.symbol, "__cf_7");
        assert!(body(&source).contains("new (ret) (int) (C::make());"));
    }

    #[test]
    fn test_destructor_source() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let ns = builder.namespace(Model::TRANSLATION_UNIT, "N");
        let record = builder.record(ns, "A", TagKind::Class);

        let serial = AtomicU64::new(3);
        let source = CodeWriter::new(&mut model, &serial)
            .destructor_source(record)
            .unwrap();
        assert_eq!(source.symbol, "__dtor_3");
        assert_eq!(
            source.code,
            "__attribute__((used)) extern \"C\" void __dtor_3(void* obj, unsigned long nary, int withFree)\n\
             {\n\
             \x20  if (withFree) {\n\
             \x20     if (!nary) {\n\
             \x20        delete (N::A*) obj;\n\
             \x20     }\n\
             \x20     else {\n\
             \x20        delete[] (N::A*) obj;\n\
             \x20     }\n\
             \x20  }\n\
             \x20  else {\n\
             \x20     typedef N::A Nm;\n\
             \x20     if (!nary) {\n\
             \x20        ((Nm*)obj)->~Nm();\n\
             \x20     }\n\
             \x20     else {\n\
             \x20        do {\n\
             \x20           (((Nm*)obj)+(--nary))->~Nm();\n\
             \x20        } while (nary);\n\
             \x20     }\n\
             \x20  }\n\
             }\n"
        );
    }

    #[test]
    fn test_destructor_source_rejects_functions() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let f = builder.function(Model::TRANSLATION_UNIT, "f", int).build();
        let serial = AtomicU64::new(0);
        assert!(matches!(
            CodeWriter::new(&mut model, &serial).destructor_source(f),
            Err(SynthesisError::NotAClass)
        ));
    }
}

//! The operation table.
//!
//! `cppinterop_api!(callback)` expands to `callback! { ... }` with one entry
//! per exported operation:
//!
//! ```text
//! ExportedName => rust_fn_name(arg: Type, ...) -> Return;
//! ```
//!
//! The resolver, the exported `extern "C"` functions and the client dispatch
//! table are all generated from this list, so adding an operation here is the
//! only way to make it reachable.

#[macro_export]
macro_rules! cppinterop_api {
    ($callback:ident) => {
        $callback! {
            // diagnostics
            GetVersion => get_version() -> $crate::RString;
            Demangle => demangle(mangled_name: *const $crate::c_char) -> $crate::RString;
            EnableDebugOutput => enable_debug_output(value: bool) -> ();
            IsDebugOutputEnabled => is_debug_output_enabled() -> bool;
            DumpScope => dump_scope(scope: $crate::ScopeHandle) -> ();

            // interpreter
            CreateInterpreter => create_interpreter(args: $crate::RSlice<'_, *const $crate::c_char>) -> $crate::InterpHandle;
            DeleteInterpreter => delete_interpreter(interp: $crate::InterpHandle) -> bool;
            ActivateInterpreter => activate_interpreter(interp: $crate::InterpHandle) -> bool;
            GetInterpreter => get_interpreter() -> $crate::InterpHandle;
            UseExternalInterpreter => use_external_interpreter(interp: $crate::InterpHandle) -> ();
            Process => process(code: *const $crate::c_char) -> $crate::c_int;
            Declare => declare(code: *const $crate::c_char, silent: bool) -> $crate::c_int;
            Evaluate => evaluate(code: *const $crate::c_char, had_error: *mut bool) -> isize;
            AddIncludePath => add_include_path(dir: *const $crate::c_char) -> ();
            GetIncludePaths => get_include_paths(with_system: bool, with_flags: bool) -> $crate::RVec<$crate::RString>;
            GetResourceDir => get_resource_dir() -> $crate::RString;
            DetectResourceDir => detect_resource_dir(clang_binary: *const $crate::c_char) -> $crate::RString;
            DetectSystemCompilerIncludePaths => detect_system_compiler_include_paths(compiler: *const $crate::c_char) -> $crate::RVec<$crate::RString>;
            AddSearchPath => add_search_path(dir: *const $crate::c_char, is_user: bool, prepend: bool) -> ();
            LoadLibrary => load_library(lib_stem: *const $crate::c_char, lookup: bool) -> bool;
            LookupLibrary => lookup_library(lib_name: *const $crate::c_char) -> $crate::RString;
            UnloadLibrary => unload_library(lib_stem: *const $crate::c_char) -> ();
            ObjToString => obj_to_string(type_name: *const $crate::c_char, obj: $crate::ObjectHandle) -> $crate::RString;

            // scopes
            IsAggregate => is_aggregate(scope: $crate::ScopeHandle) -> bool;
            IsNamespace => is_namespace(scope: $crate::ScopeHandle) -> bool;
            IsClass => is_class(scope: $crate::ScopeHandle) -> bool;
            IsFunction => is_function(scope: $crate::ScopeHandle) -> bool;
            IsComplete => is_complete(scope: $crate::ScopeHandle) -> bool;
            SizeOf => size_of(scope: $crate::ScopeHandle) -> usize;
            IsTemplate => is_template(scope: $crate::ScopeHandle) -> bool;
            IsTemplateSpecialization => is_template_specialization(scope: $crate::ScopeHandle) -> bool;
            IsTypedefed => is_typedefed(scope: $crate::ScopeHandle) -> bool;
            IsAbstract => is_abstract(klass: $crate::ScopeHandle) -> bool;
            IsEnumScope => is_enum_scope(scope: $crate::ScopeHandle) -> bool;
            IsEnumConstant => is_enum_constant(scope: $crate::ScopeHandle) -> bool;
            IsVariable => is_variable(scope: $crate::ScopeHandle) -> bool;
            IsLambdaClass => is_lambda_class(ty: $crate::TypeHandle) -> bool;
            IsClassPolymorphic => is_class_polymorphic(klass: $crate::ScopeHandle) -> bool;
            GetName => get_name(scope: $crate::ScopeHandle) -> $crate::RString;
            GetCompleteName => get_complete_name(scope: $crate::ScopeHandle) -> $crate::RString;
            GetQualifiedName => get_qualified_name(scope: $crate::ScopeHandle) -> $crate::RString;
            GetQualifiedCompleteName => get_qualified_complete_name(scope: $crate::ScopeHandle) -> $crate::RString;
            GetUsingNamespaces => get_using_namespaces(scope: $crate::ScopeHandle) -> $crate::RVec<$crate::ScopeHandle>;
            GetGlobalScope => get_global_scope() -> $crate::ScopeHandle;
            GetUnderlyingScope => get_underlying_scope(scope: $crate::ScopeHandle) -> $crate::ScopeHandle;
            GetScope => get_scope(name: *const $crate::c_char, parent: $crate::ScopeHandle) -> $crate::ScopeHandle;
            GetScopeFromCompleteName => get_scope_from_complete_name(name: *const $crate::c_char) -> $crate::ScopeHandle;
            GetNamed => get_named(name: *const $crate::c_char, parent: $crate::ScopeHandle) -> $crate::ScopeHandle;
            GetParentScope => get_parent_scope(scope: $crate::ScopeHandle) -> $crate::ScopeHandle;
            GetScopeFromType => get_scope_from_type(ty: $crate::TypeHandle) -> $crate::ScopeHandle;
            GetNumBases => get_num_bases(klass: $crate::ScopeHandle) -> usize;
            GetBaseClass => get_base_class(klass: $crate::ScopeHandle, ibase: usize) -> $crate::ScopeHandle;
            IsSubclass => is_subclass(derived: $crate::ScopeHandle, base: $crate::ScopeHandle) -> bool;
            GetBaseClassOffset => get_base_class_offset(derived: $crate::ScopeHandle, base: $crate::ScopeHandle) -> i64;
            GetAllCppNames => get_all_cpp_names(scope: $crate::ScopeHandle) -> $crate::RVec<$crate::RString>;
            GetEnums => get_enums(scope: $crate::ScopeHandle) -> $crate::RVec<$crate::RString>;

            // types
            IsBuiltin => is_builtin(ty: $crate::TypeHandle) -> bool;
            IsEnumType => is_enum_type(ty: $crate::TypeHandle) -> bool;
            IsRecordType => is_record_type(ty: $crate::TypeHandle) -> bool;
            IsPODType => is_pod_type(ty: $crate::TypeHandle) -> bool;
            IsPointerType => is_pointer_type(ty: $crate::TypeHandle) -> bool;
            IsReferenceType => is_reference_type(ty: $crate::TypeHandle) -> bool;
            IsLValueReferenceType => is_lvalue_reference_type(ty: $crate::TypeHandle) -> bool;
            IsRValueReferenceType => is_rvalue_reference_type(ty: $crate::TypeHandle) -> bool;
            IsFunctionPointerType => is_function_pointer_type(ty: $crate::TypeHandle) -> bool;
            IsSmartPtrType => is_smart_ptr_type(ty: $crate::TypeHandle) -> bool;
            GetValueKind => get_value_kind(ty: $crate::TypeHandle) -> $crate::ValueKind;
            GetPointeeType => get_pointee_type(ty: $crate::TypeHandle) -> $crate::TypeHandle;
            GetPointerType => get_pointer_type(ty: $crate::TypeHandle) -> $crate::TypeHandle;
            GetReferencedType => get_referenced_type(ty: $crate::TypeHandle, rvalue: bool) -> $crate::TypeHandle;
            GetNonReferenceType => get_non_reference_type(ty: $crate::TypeHandle) -> $crate::TypeHandle;
            GetTypeAsString => get_type_as_string(ty: $crate::TypeHandle) -> $crate::RString;
            GetCanonicalType => get_canonical_type(ty: $crate::TypeHandle) -> $crate::TypeHandle;
            GetUnderlyingType => get_underlying_type(ty: $crate::TypeHandle) -> $crate::TypeHandle;
            HasTypeQualifier => has_type_qualifier(ty: $crate::TypeHandle, qual: $crate::QualKind) -> bool;
            AddTypeQualifier => add_type_qualifier(ty: $crate::TypeHandle, qual: $crate::QualKind) -> $crate::TypeHandle;
            RemoveTypeQualifier => remove_type_qualifier(ty: $crate::TypeHandle, qual: $crate::QualKind) -> $crate::TypeHandle;
            GetSizeOfType => get_size_of_type(ty: $crate::TypeHandle) -> usize;
            GetType => get_type(name: *const $crate::c_char) -> $crate::TypeHandle;
            GetTypeFromScope => get_type_from_scope(klass: $crate::ScopeHandle) -> $crate::TypeHandle;
            GetComplexType => get_complex_type(element: $crate::TypeHandle) -> $crate::TypeHandle;
            GetIntegerTypeFromEnumScope => get_integer_type_from_enum_scope(scope: $crate::ScopeHandle) -> $crate::TypeHandle;
            GetIntegerTypeFromEnumType => get_integer_type_from_enum_type(ty: $crate::TypeHandle) -> $crate::TypeHandle;
            GetDimensions => get_dimensions(ty: $crate::TypeHandle) -> $crate::RVec<i64>;
            IsTypeDerivedFrom => is_type_derived_from(derived: $crate::TypeHandle, base: $crate::TypeHandle) -> bool;

            // functions
            GetClassMethods => get_class_methods(klass: $crate::ScopeHandle) -> $crate::RVec<$crate::FunctionHandle>;
            GetFunctionTemplatedDecls => get_function_templated_decls(klass: $crate::ScopeHandle) -> $crate::RVec<$crate::FunctionHandle>;
            HasDefaultConstructor => has_default_constructor(scope: $crate::ScopeHandle) -> bool;
            GetDefaultConstructor => get_default_constructor(scope: $crate::ScopeHandle) -> $crate::FunctionHandle;
            GetDestructor => get_destructor(scope: $crate::ScopeHandle) -> $crate::FunctionHandle;
            GetFunctionsUsingName => get_functions_using_name(scope: $crate::ScopeHandle, name: *const $crate::c_char) -> $crate::RVec<$crate::FunctionHandle>;
            GetFunctionReturnType => get_function_return_type(func: $crate::FunctionHandle) -> $crate::TypeHandle;
            GetFunctionNumArgs => get_function_num_args(func: $crate::FunctionHandle) -> usize;
            GetFunctionRequiredArgs => get_function_required_args(func: $crate::FunctionHandle) -> usize;
            GetFunctionArgType => get_function_arg_type(func: $crate::FunctionHandle, iarg: usize) -> $crate::TypeHandle;
            GetFunctionArgName => get_function_arg_name(func: $crate::FunctionHandle, iarg: usize) -> $crate::RString;
            GetFunctionArgDefault => get_function_arg_default(func: $crate::FunctionHandle, iarg: usize) -> $crate::RString;
            GetFunctionSignature => get_function_signature(func: $crate::FunctionHandle) -> $crate::RString;
            IsFunctionDeleted => is_function_deleted(func: $crate::FunctionHandle) -> bool;
            IsTemplatedFunction => is_templated_function(func: $crate::FunctionHandle) -> bool;
            ExistsFunctionTemplate => exists_function_template(name: *const $crate::c_char, parent: $crate::ScopeHandle) -> bool;
            GetClassTemplatedMethods => get_class_templated_methods(name: *const $crate::c_char, parent: $crate::ScopeHandle) -> $crate::RVec<$crate::FunctionHandle>;
            IsMethod => is_method(func: $crate::FunctionHandle) -> bool;
            IsPublicMethod => is_public_method(func: $crate::FunctionHandle) -> bool;
            IsProtectedMethod => is_protected_method(func: $crate::FunctionHandle) -> bool;
            IsPrivateMethod => is_private_method(func: $crate::FunctionHandle) -> bool;
            IsConstructor => is_constructor(func: $crate::FunctionHandle) -> bool;
            IsDestructor => is_destructor(func: $crate::FunctionHandle) -> bool;
            IsStaticMethod => is_static_method(func: $crate::FunctionHandle) -> bool;
            IsVirtualMethod => is_virtual_method(func: $crate::FunctionHandle) -> bool;
            IsConstMethod => is_const_method(func: $crate::FunctionHandle) -> bool;
            GetFunctionAddress => get_function_address(func: $crate::FunctionHandle) -> *mut $crate::c_void;
            GetFunctionAddressFromName => get_function_address_from_name(mangled_name: *const $crate::c_char) -> *mut $crate::c_void;
            GetFunctionAddressFromMethod => get_function_address_from_method(method: $crate::FunctionHandle) -> *mut $crate::c_void;
            BestOverloadFunctionMatch => best_overload_function_match(candidates: $crate::RSlice<'_, $crate::FunctionHandle>, explicit_types: $crate::RSlice<'_, $crate::TemplateArgInfo>, arg_types: $crate::RSlice<'_, $crate::TemplateArgInfo>) -> $crate::FunctionHandle;
            GetOperator => get_operator(scope: $crate::ScopeHandle, op: $crate::Operator, arity: $crate::OperatorArity) -> $crate::RVec<$crate::FunctionHandle>;
            GetOperatorArity => get_operator_arity(func: $crate::FunctionHandle) -> $crate::OperatorArity;
            GetOperatorFromSpelling => get_operator_from_spelling(spelling: *const $crate::c_char) -> $crate::Operator;
            GetSpellingFromOperator => get_spelling_from_operator(op: $crate::Operator) -> $crate::RString;

            // variables
            GetDatamembers => get_datamembers(scope: $crate::ScopeHandle) -> $crate::RVec<$crate::ScopeHandle>;
            GetStaticDatamembers => get_static_datamembers(scope: $crate::ScopeHandle) -> $crate::RVec<$crate::ScopeHandle>;
            GetEnumConstantDatamembers => get_enum_constant_datamembers(scope: $crate::ScopeHandle, include_enum_class: bool) -> $crate::RVec<$crate::ScopeHandle>;
            LookupDatamember => lookup_datamember(name: *const $crate::c_char, parent: $crate::ScopeHandle) -> $crate::ScopeHandle;
            GetVariableType => get_variable_type(var: $crate::ScopeHandle) -> $crate::TypeHandle;
            GetVariableOffset => get_variable_offset(var: $crate::ScopeHandle, parent: $crate::ScopeHandle) -> isize;
            IsPublicVariable => is_public_variable(var: $crate::ScopeHandle) -> bool;
            IsProtectedVariable => is_protected_variable(var: $crate::ScopeHandle) -> bool;
            IsPrivateVariable => is_private_variable(var: $crate::ScopeHandle) -> bool;
            IsStaticVariable => is_static_variable(var: $crate::ScopeHandle) -> bool;
            IsConstVariable => is_const_variable(var: $crate::ScopeHandle) -> bool;

            // enums
            GetEnumConstants => get_enum_constants(scope: $crate::ScopeHandle) -> $crate::RVec<$crate::ScopeHandle>;
            GetEnumConstantType => get_enum_constant_type(scope: $crate::ScopeHandle) -> $crate::TypeHandle;
            GetEnumConstantValue => get_enum_constant_value(scope: $crate::ScopeHandle) -> i64;

            // templates
            InstantiateTemplate => instantiate_template(tmpl: $crate::ScopeHandle, args: $crate::RSlice<'_, $crate::TemplateArgInfo>, instantiate_body: bool) -> $crate::ScopeHandle;
            GetClassTemplateInstantiationArgs => get_class_template_instantiation_args(klass: $crate::ScopeHandle) -> $crate::RVec<$crate::TemplateArgInfo>;

            // objects
            Allocate => allocate(scope: $crate::ScopeHandle, count: usize) -> $crate::ObjectHandle;
            Deallocate => deallocate(scope: $crate::ScopeHandle, address: $crate::ObjectHandle, count: usize) -> ();
            Construct => construct(scope: $crate::ScopeHandle, arena: *mut $crate::c_void, count: usize) -> $crate::ObjectHandle;
            Destruct => destruct(object: $crate::ObjectHandle, scope: $crate::ScopeHandle, with_free: bool, count: usize) -> bool;
            MakeFunctionCallable => make_function_callable(func: $crate::FunctionHandle) -> $crate::JitCall;
        }
    };
}

/// Names of the operations whose absence makes a dispatch table unusable.
pub const CRITICAL_OPERATIONS: [&str; 2] = ["GetInterpreter", "CreateInterpreter"];

macro_rules! collect_names {
    ($($name:ident => $func:ident ($($arg:ident : $ty:ty),*) -> $ret:ty;)*) => {
        &[$(stringify!($name),)*]
    };
}

/// Every exported operation name, in table order.
pub const OPERATION_NAMES: &[&str] = crate::cppinterop_api!(collect_names);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_operation_names_are_unique() {
        let unique: HashSet<_> = OPERATION_NAMES.iter().collect();
        assert_eq!(unique.len(), OPERATION_NAMES.len());
        assert!(OPERATION_NAMES.len() > 120);
    }

    #[test]
    fn test_critical_operations_present() {
        for name in CRITICAL_OPERATIONS {
            assert!(OPERATION_NAMES.contains(&name));
        }
    }
}

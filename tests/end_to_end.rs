//! The API driven the way a binding drives it: through the exported
//! resolver and a populated dispatch table.

use std::ffi::CString;

use cppinterop::abi::{ArgList, FunctionHandle, Operator, RSlice, ScopeHandle, c_char, c_void};
use cppinterop::compiler::toolchain::reports_clang;
use cppinterop::{CppGetProcAddress, DispatchTable, InteropConfig};

fn resolve(name: &str) -> Option<cppinterop::abi::CppFnPtr> {
    let name = CString::new(name).ok()?;
    unsafe { CppGetProcAddress(name.as_ptr().cast()) }
}

fn dispatch() -> DispatchTable {
    assert!(cppinterop::init_from_resolver(resolve));
    cppinterop::table()
}

#[test]
fn test_table_from_exported_resolver() {
    let table = dispatch();
    assert!(table.missing().is_empty());
    let (Some(get_version), Some(from_spelling), Some(get_interpreter)) = (
        table.get_version,
        table.get_operator_from_spelling,
        table.get_interpreter,
    ) else {
        panic!("table is incomplete");
    };
    unsafe {
        assert!(get_version().as_str().starts_with("CppInterOp version"));
        assert_eq!(from_spelling(c"<<".as_ptr()), Operator::LessLess);
        assert_eq!(from_spelling(c"nope".as_ptr()), Operator::None);
        let _ = get_interpreter();
    }
}

#[test]
fn test_unknown_library_fails_initialization() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("libnothing.so");
    assert!(!cppinterop::init_functions(missing.to_str()));
}

const GEO: &str = "namespace geo {\n\
    struct Point {\n\
        int x;\n\
        int y;\n\
        Point() : x(1), y(2) {}\n\
        int sum() const { return x + y; }\n\
    };\n\
}\n";

#[test]
fn test_reflect_and_call_with_toolchain() {
    if !reports_clang(&InteropConfig::default().toolchain.driver) {
        eprintln!("skipping: no clang driver");
        return;
    }
    let table = dispatch();
    let code = CString::new(GEO).unwrap();
    unsafe {
        let interp = table.create_interpreter.unwrap()(RSlice::from_slice(&[] as &[*const c_char]));
        assert!(!interp.is_null());
        assert_eq!(table.declare.unwrap()(code.as_ptr(), false), 0);

        let geo = table.get_scope.unwrap()(c"geo".as_ptr(), ScopeHandle::null());
        assert!(table.is_namespace.unwrap()(geo));
        let point = table.get_named.unwrap()(c"Point".as_ptr(), geo);
        assert!(table.is_class.unwrap()(point));
        assert_eq!(table.get_qualified_name.unwrap()(point).as_str(), "geo::Point");
        assert_eq!(table.get_datamembers.unwrap()(point).len(), 2);
        assert_eq!(table.size_of.unwrap()(point), 8);

        let sum = table.get_functions_using_name.unwrap()(point, c"sum".as_ptr());
        assert_eq!(sum.len(), 1);
        let sum: FunctionHandle = sum[0];
        assert!(table.is_const_method.unwrap()(sum));

        let object = table.construct.unwrap()(point, std::ptr::null_mut(), 1);
        assert!(!object.is_null());
        let call = table.make_function_callable.unwrap()(sum);
        assert!(call.is_valid());
        let mut result = 0i32;
        call.invoke((&raw mut result).cast::<c_void>(), ArgList::empty(), object.as_ptr());
        assert_eq!(result, 3);
        assert!(table.destruct.unwrap()(object, point, true, 1));

        assert!(table.delete_interpreter.unwrap()(interp));
    }
}

//! Declaration and type arena shared by compiler backends.
//!
//! Handles handed across the C ABI are arena indices offset by one, so the
//! null handle never names an entry.

use std::ffi::{CString, c_long, c_void};

use ahash::AHashMap;
use cppi_abi::{FunctionHandle, Operator, OperatorArity, QualKind, ScopeHandle, TypeHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

fn encode(index: u32) -> *mut c_void {
    (index as usize + 1) as *mut c_void
}

fn decode(ptr: *mut c_void) -> Option<u32> {
    (ptr as usize)
        .checked_sub(1)
        .and_then(|raw| u32::try_from(raw).ok())
}

impl DeclId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub fn scope(self) -> ScopeHandle {
        ScopeHandle::from_ptr(encode(self.0))
    }

    pub fn function(self) -> FunctionHandle {
        FunctionHandle::from_ptr(encode(self.0))
    }
}

impl TypeId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub fn handle(self) -> TypeHandle {
        TypeHandle::from_ptr(encode(self.0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    Bool,
    Char,
    SChar,
    UChar,
    WChar,
    Char8,
    Char16,
    Char32,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Int128,
    UInt128,
    Float,
    Double,
    LongDouble,
    NullPtr,
}

impl Builtin {
    pub const fn spelling(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Char => "char",
            Self::SChar => "signed char",
            Self::UChar => "unsigned char",
            Self::WChar => "wchar_t",
            Self::Char8 => "char8_t",
            Self::Char16 => "char16_t",
            Self::Char32 => "char32_t",
            Self::Short => "short",
            Self::UShort => "unsigned short",
            Self::Int => "int",
            Self::UInt => "unsigned int",
            Self::Long => "long",
            Self::ULong => "unsigned long",
            Self::LongLong => "long long",
            Self::ULongLong => "unsigned long long",
            Self::Int128 => "__int128",
            Self::UInt128 => "unsigned __int128",
            Self::Float => "float",
            Self::Double => "double",
            Self::LongDouble => "long double",
            Self::NullPtr => "std::nullptr_t",
        }
    }

    /// Size in bytes on the host target.
    pub const fn size(self) -> usize {
        match self {
            Self::Bool | Self::Char | Self::SChar | Self::UChar | Self::Char8 => 1,
            Self::Short | Self::UShort | Self::Char16 => 2,
            Self::Int | Self::UInt | Self::Char32 | Self::Float => 4,
            Self::WChar => {
                if cfg!(windows) {
                    2
                } else {
                    4
                }
            }
            Self::Long | Self::ULong => size_of::<c_long>(),
            Self::LongLong | Self::ULongLong | Self::Double => 8,
            Self::NullPtr => size_of::<*const c_void>(),
            Self::Int128 | Self::UInt128 => 16,
            Self::LongDouble => {
                if cfg!(all(target_arch = "x86_64", not(windows))) {
                    16
                } else {
                    8
                }
            }
        }
    }

    pub const fn is_integral(self) -> bool {
        !matches!(
            self,
            Self::Float | Self::Double | Self::LongDouble | Self::NullPtr
        )
    }

    pub const fn is_floating(self) -> bool {
        matches!(self, Self::Float | Self::Double | Self::LongDouble)
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::Char
                | Self::SChar
                | Self::WChar
                | Self::Short
                | Self::Int
                | Self::Long
                | Self::LongLong
                | Self::Int128
        ) || self.is_floating()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RefQualifier {
    #[default]
    None,
    LValue,
    RValue,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionProto {
    pub ret: TypeId,
    pub params: Vec<TypeId>,
    pub variadic: bool,
    /// cv-qualifiers of the implicit object parameter.
    pub quals: QualKind,
    pub ref_qual: RefQualifier,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Builtin(Builtin),
    Pointer(TypeId),
    LValueReference(TypeId),
    RValueReference(TypeId),
    Record(DeclId),
    Enum(DeclId),
    Typedef(DeclId),
    ConstantArray(TypeId, u64),
    IncompleteArray(TypeId),
    Function(FunctionProto),
    MemberPointer { pointee: TypeId, class: TypeId },
    Complex(TypeId),
    /// A type known only by its spelling.
    Named(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Type {
    pub kind: TypeKind,
    pub quals: QualKind,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Access {
    #[default]
    None,
    Public,
    Protected,
    Private,
}

impl Access {
    pub fn from_spelling(spelling: &str) -> Self {
        match spelling {
            "public" => Self::Public,
            "protected" => Self::Protected,
            "private" => Self::Private,
            _ => Self::None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagKind {
    Struct,
    Class,
    Union,
}

impl TagKind {
    pub const fn default_access(self) -> Access {
        match self {
            Self::Class => Access::Private,
            Self::Struct | Self::Union => Access::Public,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseSpecifier {
    pub ty: TypeId,
    pub access: Access,
    pub is_virtual: bool,
}

/// A template argument; non-type arguments carry their literal text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateArg {
    pub ty: TypeId,
    pub value: Option<CString>,
}

impl TemplateArg {
    pub const fn ty(ty: TypeId) -> Self {
        Self { ty, value: None }
    }

    pub fn value(ty: TypeId, text: &str) -> Self {
        Self {
            ty,
            value: CString::new(text).ok(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Specialization {
    pub template: DeclId,
    pub args: Vec<TemplateArg>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordInfo {
    pub tag: TagKind,
    pub complete: bool,
    pub bases: Vec<BaseSpecifier>,
    pub polymorphic: bool,
    pub is_abstract: bool,
    pub lambda: bool,
    pub aggregate: bool,
    pub pod: bool,
    /// Layout size once known.
    pub size: Option<usize>,
    pub specialization: Option<Specialization>,
}

impl RecordInfo {
    pub const fn new(tag: TagKind) -> Self {
        Self {
            tag,
            complete: false,
            bases: Vec::new(),
            polymorphic: false,
            is_abstract: false,
            lambda: false,
            aggregate: false,
            pod: false,
            size: None,
            specialization: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumInfo {
    pub scoped: bool,
    pub integer_type: TypeId,
    pub complete: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarInfo {
    pub ty: TypeId,
    /// Non-static data member.
    pub is_field: bool,
    pub mangled_name: Option<String>,
    /// Byte offset of a field once known.
    pub offset: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamInfo {
    pub name: String,
    pub ty: TypeId,
    pub default: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MethodInfo {
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_pure: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpecialMember {
    #[default]
    None,
    Constructor {
        default: bool,
        copy_or_move: bool,
    },
    Destructor,
    Conversion,
    Operator(Operator),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TemplatedKind {
    #[default]
    NonTemplate,
    FunctionTemplate,
    MemberSpecialization,
    FunctionTemplateSpecialization,
    DependentFunctionTemplateSpecialization,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpecializationKind {
    #[default]
    Undeclared,
    ImplicitInstantiation,
    ExplicitSpecialization,
    ExplicitInstantiationDeclaration,
    ExplicitInstantiationDefinition,
}

impl SpecializationKind {
    pub const fn is_instantiation(self) -> bool {
        matches!(
            self,
            Self::ImplicitInstantiation
                | Self::ExplicitInstantiationDeclaration
                | Self::ExplicitInstantiationDefinition
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionInfo {
    pub return_type: TypeId,
    pub params: Vec<ParamInfo>,
    pub variadic: bool,
    pub method: Option<MethodInfo>,
    pub special: SpecialMember,
    pub deleted: bool,
    pub late_parsed: bool,
    /// A body (or defaulted definition) is available.
    pub defined: bool,
    pub templated: TemplatedKind,
    pub specialization: SpecializationKind,
    /// Declaration this one was instantiated from.
    pub pattern: Option<DeclId>,
    pub template_args: Vec<TemplateArg>,
    pub mangled_name: Option<String>,
}

impl FunctionInfo {
    pub const fn new(return_type: TypeId) -> Self {
        Self {
            return_type,
            params: Vec::new(),
            variadic: false,
            method: None,
            special: SpecialMember::None,
            deleted: false,
            late_parsed: false,
            defined: true,
            templated: TemplatedKind::NonTemplate,
            specialization: SpecializationKind::Undeclared,
            pattern: None,
            template_args: Vec::new(),
            mangled_name: None,
        }
    }

    /// Number of leading parameters without a default argument.
    pub fn min_required_args(&self) -> usize {
        self.params
            .iter()
            .position(|param| param.default.is_some())
            .unwrap_or(self.params.len())
    }

    pub const fn is_constructor(&self) -> bool {
        matches!(self.special, SpecialMember::Constructor { .. })
    }

    pub const fn is_destructor(&self) -> bool {
        matches!(self.special, SpecialMember::Destructor)
    }

    pub const fn is_default_constructor(&self) -> bool {
        matches!(self.special, SpecialMember::Constructor { default: true, .. })
    }

    pub fn is_instance_method(&self) -> bool {
        self.method.is_some_and(|method| !method.is_static)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateParamKind {
    Type,
    NonType(TypeId),
    Template,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateParam {
    pub name: String,
    pub kind: TemplateParamKind,
    pub default: Option<String>,
    pub pack: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateInfo {
    pub params: Vec<TemplateParam>,
    /// The templated declaration.
    pub pattern: Option<DeclId>,
    pub specializations: Vec<DeclId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclKind {
    TranslationUnit,
    Namespace { inline: bool },
    Record(RecordInfo),
    Enum(EnumInfo),
    EnumConstant { value: i64, ty: TypeId },
    Variable(VarInfo),
    Function(Box<FunctionInfo>),
    Typedef { underlying: TypeId },
    ClassTemplate(TemplateInfo),
    FunctionTemplate(TemplateInfo),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decl {
    pub name: String,
    pub kind: DeclKind,
    pub parent: Option<DeclId>,
    pub access: Access,
    pub members: Vec<DeclId>,
    pub using_directives: Vec<DeclId>,
    pub implicit: bool,
}

impl Decl {
    pub const fn function(&self) -> Option<&FunctionInfo> {
        match &self.kind {
            DeclKind::Function(info) => Some(info),
            _ => None,
        }
    }

    pub const fn record(&self) -> Option<&RecordInfo> {
        match &self.kind {
            DeclKind::Record(info) => Some(info),
            _ => None,
        }
    }

    pub const fn variable(&self) -> Option<&VarInfo> {
        match &self.kind {
            DeclKind::Variable(info) => Some(info),
            _ => None,
        }
    }

    pub const fn template(&self) -> Option<&TemplateInfo> {
        match &self.kind {
            DeclKind::ClassTemplate(info) | DeclKind::FunctionTemplate(info) => Some(info),
            _ => None,
        }
    }

    pub const fn is_record(&self) -> bool {
        matches!(self.kind, DeclKind::Record(_))
    }

    pub const fn is_namespace(&self) -> bool {
        matches!(self.kind, DeclKind::Namespace { .. })
    }

    /// Declarations whose members are visible in the enclosing scope.
    pub fn is_transparent(&self) -> bool {
        match &self.kind {
            DeclKind::Namespace { inline } => *inline || self.name.is_empty(),
            DeclKind::Enum(info) => !info.scoped,
            _ => false,
        }
    }
}

/// Outcome of a by-name lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    NotFound,
    Found(DeclId),
    /// More than one declaration matched (an overload set).
    Ambiguous,
}

impl Lookup {
    pub const fn found(self) -> Option<DeclId> {
        match self {
            Self::Found(id) => Some(id),
            Self::NotFound | Self::Ambiguous => None,
        }
    }
}

/// Splits `A::B<C::D>::E` into its top-level segments.
pub fn split_qualified(name: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' | b'(' | b'[' => depth += 1,
            b'>' | b')' | b']' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                segments.push(name[start..i].trim());
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    segments.push(name[start..].trim());
    segments
}

/// Splits `A<int, 3>` into `("A", Some("int, 3"))`.
pub fn split_template_id(segment: &str) -> (&str, Option<&str>) {
    match (segment.find('<'), segment.rfind('>')) {
        (Some(open), Some(close)) if open < close && !segment.starts_with("operator") => {
            (segment[..open].trim(), Some(segment[open + 1..close].trim()))
        }
        _ => (segment, None),
    }
}

fn squash(text: &str) -> String {
    text.chars().filter(|ch| !ch.is_whitespace()).collect()
}

fn quals_text(quals: QualKind) -> String {
    let mut words = Vec::new();
    if quals.contains(QualKind::CONST) {
        words.push("const");
    }
    if quals.contains(QualKind::VOLATILE) {
        words.push("volatile");
    }
    if quals.contains(QualKind::RESTRICT) {
        words.push("__restrict");
    }
    words.join(" ")
}

#[derive(Debug)]
pub struct Model {
    decls: Vec<Decl>,
    types: Vec<Type>,
    interned: AHashMap<Type, TypeId>,
    keys: AHashMap<String, DeclId>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    pub const TRANSLATION_UNIT: DeclId = DeclId(0);

    pub fn new() -> Self {
        Self {
            decls: vec![Decl {
                name: String::new(),
                kind: DeclKind::TranslationUnit,
                parent: None,
                access: Access::None,
                members: Vec::new(),
                using_directives: Vec::new(),
                implicit: false,
            }],
            types: Vec::new(),
            interned: AHashMap::new(),
            keys: AHashMap::new(),
        }
    }

    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.index()]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.index()]
    }

    pub fn try_decl(&self, id: DeclId) -> Option<&Decl> {
        self.decls.get(id.index())
    }

    pub fn function(&self, id: DeclId) -> Option<&FunctionInfo> {
        self.try_decl(id).and_then(Decl::function)
    }

    pub fn function_mut(&mut self, id: DeclId) -> Option<&mut FunctionInfo> {
        match &mut self.decls.get_mut(id.index())?.kind {
            DeclKind::Function(info) => Some(info),
            _ => None,
        }
    }

    pub fn record(&self, id: DeclId) -> Option<&RecordInfo> {
        self.try_decl(id).and_then(Decl::record)
    }

    pub fn record_mut(&mut self, id: DeclId) -> Option<&mut RecordInfo> {
        match &mut self.decls.get_mut(id.index())?.kind {
            DeclKind::Record(info) => Some(info),
            _ => None,
        }
    }

    /// Decodes a handle minted by [`DeclId::scope`] or [`DeclId::function`].
    pub fn decl_from_ptr(&self, ptr: *mut c_void) -> Option<DeclId> {
        let index = decode(ptr)?;
        ((index as usize) < self.decls.len()).then_some(DeclId(index))
    }

    pub fn decl_from_scope(&self, scope: ScopeHandle) -> Option<DeclId> {
        self.decl_from_ptr(scope.as_ptr())
    }

    pub fn decl_from_function(&self, func: FunctionHandle) -> Option<DeclId> {
        self.decl_from_ptr(func.as_ptr())
    }

    pub fn type_from_handle(&self, ty: TypeHandle) -> Option<TypeId> {
        let index = decode(ty.as_ptr())?;
        ((index as usize) < self.types.len()).then_some(TypeId(index))
    }

    /// Appends a declaration and lists it among `parent`'s members.
    pub fn add_decl(
        &mut self,
        parent: DeclId,
        name: impl Into<String>,
        access: Access,
        kind: DeclKind,
    ) -> DeclId {
        let id = self.add_detached(parent, name, access, kind);
        self.decls[parent.index()].members.push(id);
        id
    }

    /// Appends a declaration owned by `parent` without listing it as a member,
    /// as for the pattern of a template.
    pub fn add_detached(
        &mut self,
        parent: DeclId,
        name: impl Into<String>,
        access: Access,
        kind: DeclKind,
    ) -> DeclId {
        let id = DeclId(u32::try_from(self.decls.len()).unwrap_or(u32::MAX));
        self.decls.push(Decl {
            name: name.into(),
            kind,
            parent: Some(parent),
            access,
            members: Vec::new(),
            using_directives: Vec::new(),
            implicit: false,
        });
        id
    }

    pub fn keyed(&self, key: &str) -> Option<DeclId> {
        self.keys.get(key).copied()
    }

    pub fn bind_key(&mut self, key: String, id: DeclId) {
        self.keys.insert(key, id);
    }

    // ---- types ----

    pub fn ty(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(id) = self.interned.get(&ty) {
            return *id;
        }
        let id = TypeId(u32::try_from(self.types.len()).unwrap_or(u32::MAX));
        self.types.push(ty.clone());
        self.interned.insert(ty, id);
        id
    }

    pub fn intern_kind(&mut self, kind: TypeKind) -> TypeId {
        self.intern(Type {
            kind,
            quals: QualKind::NONE,
        })
    }

    pub fn void(&mut self) -> TypeId {
        self.intern_kind(TypeKind::Void)
    }

    pub fn builtin(&mut self, builtin: Builtin) -> TypeId {
        self.intern_kind(TypeKind::Builtin(builtin))
    }

    pub fn pointer(&mut self, pointee: TypeId) -> TypeId {
        self.intern_kind(TypeKind::Pointer(pointee))
    }

    pub fn lvalue_reference(&mut self, referee: TypeId) -> TypeId {
        let referee = self.non_reference(referee);
        self.intern_kind(TypeKind::LValueReference(referee))
    }

    pub fn rvalue_reference(&mut self, referee: TypeId) -> TypeId {
        if matches!(self.ty(referee).kind, TypeKind::LValueReference(_)) {
            return referee;
        }
        let referee = self.non_reference(referee);
        self.intern_kind(TypeKind::RValueReference(referee))
    }

    pub fn record_type(&mut self, decl: DeclId) -> TypeId {
        self.intern_kind(TypeKind::Record(decl))
    }

    pub fn enum_type(&mut self, decl: DeclId) -> TypeId {
        self.intern_kind(TypeKind::Enum(decl))
    }

    pub fn typedef_type(&mut self, decl: DeclId) -> TypeId {
        self.intern_kind(TypeKind::Typedef(decl))
    }

    pub fn complex(&mut self, element: TypeId) -> TypeId {
        self.intern_kind(TypeKind::Complex(element))
    }

    pub fn named(&mut self, spelling: impl Into<String>) -> TypeId {
        self.intern_kind(TypeKind::Named(spelling.into()))
    }

    pub fn constant_array(&mut self, element: TypeId, len: u64) -> TypeId {
        self.intern_kind(TypeKind::ConstantArray(element, len))
    }

    pub fn incomplete_array(&mut self, element: TypeId) -> TypeId {
        self.intern_kind(TypeKind::IncompleteArray(element))
    }

    pub fn function_type(&mut self, proto: FunctionProto) -> TypeId {
        self.intern_kind(TypeKind::Function(proto))
    }

    pub fn member_pointer(&mut self, pointee: TypeId, class: TypeId) -> TypeId {
        self.intern_kind(TypeKind::MemberPointer { pointee, class })
    }

    /// `ty` with `quals` added.
    pub fn with_quals(&mut self, ty: TypeId, quals: QualKind) -> TypeId {
        let current = self.ty(ty).clone();
        self.intern(Type {
            quals: current.quals | quals,
            kind: current.kind,
        })
    }

    /// `ty` with `quals` removed.
    pub fn without_quals(&mut self, ty: TypeId, quals: QualKind) -> TypeId {
        let current = self.ty(ty).clone();
        self.intern(Type {
            quals: current.quals.without(quals),
            kind: current.kind,
        })
    }

    pub fn unqualified(&mut self, ty: TypeId) -> TypeId {
        self.without_quals(ty, QualKind::ALL)
    }

    /// Strips typedef sugar at the top level, keeping qualifiers.
    pub fn desugar(&mut self, ty: TypeId) -> TypeId {
        let mut current = ty;
        let mut quals = QualKind::NONE;
        loop {
            let entry = self.ty(current).clone();
            quals |= entry.quals;
            match entry.kind {
                TypeKind::Typedef(decl) => match &self.decl(decl).kind {
                    DeclKind::Typedef { underlying } => current = *underlying,
                    _ => break,
                },
                _ => break,
            }
        }
        self.with_quals(current, quals)
    }

    /// Removes all typedef sugar, recursively.
    pub fn canonical(&mut self, ty: TypeId) -> TypeId {
        let desugared = self.desugar(ty);
        let entry = self.ty(desugared).clone();
        let kind = match entry.kind {
            TypeKind::Pointer(p) => TypeKind::Pointer(self.canonical(p)),
            TypeKind::LValueReference(p) => TypeKind::LValueReference(self.canonical(p)),
            TypeKind::RValueReference(p) => TypeKind::RValueReference(self.canonical(p)),
            TypeKind::ConstantArray(e, n) => TypeKind::ConstantArray(self.canonical(e), n),
            TypeKind::IncompleteArray(e) => TypeKind::IncompleteArray(self.canonical(e)),
            TypeKind::Complex(e) => TypeKind::Complex(self.canonical(e)),
            TypeKind::MemberPointer { pointee, class } => TypeKind::MemberPointer {
                pointee: self.canonical(pointee),
                class: self.canonical(class),
            },
            TypeKind::Function(proto) => {
                let ret = self.canonical(proto.ret);
                let params = proto.params.iter().map(|p| self.canonical(*p)).collect();
                TypeKind::Function(FunctionProto {
                    ret,
                    params,
                    ..proto
                })
            }
            other => other,
        };
        self.intern(Type {
            kind,
            quals: entry.quals,
        })
    }

    pub fn non_reference(&mut self, ty: TypeId) -> TypeId {
        match self.ty(ty).kind {
            TypeKind::LValueReference(inner) | TypeKind::RValueReference(inner) => inner,
            TypeKind::Typedef(_) => {
                let desugared = self.desugar(ty);
                if desugared == ty {
                    ty
                } else if self.is_reference(desugared) {
                    self.non_reference(desugared)
                } else {
                    ty
                }
            }
            _ => ty,
        }
    }

    /// Pointee of a pointer, reference or member pointer.
    pub fn pointee(&mut self, ty: TypeId) -> Option<TypeId> {
        let desugared = self.desugar(ty);
        match self.ty(desugared).kind {
            TypeKind::Pointer(p)
            | TypeKind::LValueReference(p)
            | TypeKind::RValueReference(p)
            | TypeKind::MemberPointer { pointee: p, .. } => Some(p),
            _ => None,
        }
    }

    /// Canonical, unqualified type with arrays, pointers and references peeled.
    pub fn underlying(&mut self, ty: TypeId) -> TypeId {
        let mut current = self.canonical(ty);
        current = self.unqualified(current);
        if let TypeKind::ConstantArray(e, _) | TypeKind::IncompleteArray(e) = self.ty(current).kind {
            current = e;
        }
        while let Some(next) = self.pointee(current) {
            current = next;
        }
        let canonical = self.canonical(current);
        self.unqualified(canonical)
    }

    pub fn element_type(&mut self, ty: TypeId) -> Option<TypeId> {
        let desugared = self.desugar(ty);
        match self.ty(desugared).kind {
            TypeKind::ConstantArray(e, _) | TypeKind::IncompleteArray(e) => Some(e),
            _ => None,
        }
    }

    fn canonical_kind(&mut self, ty: TypeId) -> TypeKind {
        let desugared = self.desugar(ty);
        self.ty(desugared).kind.clone()
    }

    pub fn is_void(&mut self, ty: TypeId) -> bool {
        matches!(self.canonical_kind(ty), TypeKind::Void)
    }

    pub fn is_builtin(&mut self, ty: TypeId) -> bool {
        match self.canonical_kind(ty) {
            TypeKind::Builtin(_) | TypeKind::Complex(_) => true,
            TypeKind::Named(name) => name.contains("complex"),
            _ => false,
        }
    }

    pub fn is_enum(&mut self, ty: TypeId) -> bool {
        matches!(self.canonical_kind(ty), TypeKind::Enum(_))
    }

    pub fn is_record(&mut self, ty: TypeId) -> bool {
        matches!(self.canonical_kind(ty), TypeKind::Record(_))
    }

    pub fn is_pointer(&mut self, ty: TypeId) -> bool {
        matches!(self.canonical_kind(ty), TypeKind::Pointer(_))
    }

    pub fn is_reference(&mut self, ty: TypeId) -> bool {
        matches!(
            self.canonical_kind(ty),
            TypeKind::LValueReference(_) | TypeKind::RValueReference(_)
        )
    }

    pub fn is_lvalue_reference(&mut self, ty: TypeId) -> bool {
        matches!(self.canonical_kind(ty), TypeKind::LValueReference(_))
    }

    pub fn is_rvalue_reference(&mut self, ty: TypeId) -> bool {
        matches!(self.canonical_kind(ty), TypeKind::RValueReference(_))
    }

    pub fn is_array(&mut self, ty: TypeId) -> bool {
        matches!(
            self.canonical_kind(ty),
            TypeKind::ConstantArray(..) | TypeKind::IncompleteArray(_)
        )
    }

    pub fn is_member_pointer(&mut self, ty: TypeId) -> bool {
        matches!(self.canonical_kind(ty), TypeKind::MemberPointer { .. })
    }

    pub fn is_function_pointer(&mut self, ty: TypeId) -> bool {
        match self.canonical_kind(ty) {
            TypeKind::Pointer(p) => matches!(self.canonical_kind(p), TypeKind::Function(_)),
            _ => false,
        }
    }

    pub fn is_pod(&mut self, ty: TypeId) -> bool {
        match self.canonical_kind(ty) {
            TypeKind::Builtin(_)
            | TypeKind::Enum(_)
            | TypeKind::Pointer(_)
            | TypeKind::MemberPointer { .. }
            | TypeKind::Complex(_) => true,
            TypeKind::Record(decl) => self.record(decl).is_some_and(|info| info.pod),
            TypeKind::ConstantArray(e, _) | TypeKind::IncompleteArray(e) => self.is_pod(e),
            _ => false,
        }
    }

    /// Record behind `ty`, looking through one level of pointer or array.
    pub fn record_of_type(&mut self, ty: TypeId) -> Option<DeclId> {
        let mut current = self.desugar(ty);
        if let TypeKind::Pointer(p)
        | TypeKind::LValueReference(p)
        | TypeKind::RValueReference(p)
        | TypeKind::ConstantArray(p, _)
        | TypeKind::IncompleteArray(p) = self.ty(current).kind
        {
            current = self.desugar(p);
        }
        match self.ty(current).kind {
            TypeKind::Record(decl) => Some(decl),
            _ => None,
        }
    }

    /// Record named by a declaration, looking through typedefs.
    pub fn record_of_decl(&mut self, decl: DeclId) -> Option<DeclId> {
        match &self.decl(decl).kind {
            DeclKind::Record(_) => Some(decl),
            DeclKind::Typedef { underlying } => {
                let underlying = *underlying;
                self.record_of_type(underlying)
            }
            _ => None,
        }
    }

    /// Type declared by a type or value declaration.
    pub fn type_of_decl(&mut self, decl: DeclId) -> Option<TypeId> {
        match &self.decl(decl).kind {
            DeclKind::Record(_) => Some(self.record_type(decl)),
            DeclKind::Enum(_) => Some(self.enum_type(decl)),
            DeclKind::Typedef { .. } => Some(self.typedef_type(decl)),
            DeclKind::Variable(info) => Some(info.ty),
            DeclKind::EnumConstant { ty, .. } => Some(*ty),
            DeclKind::Function(info) => {
                let info = info.clone();
                let proto = FunctionProto {
                    ret: info.return_type,
                    params: info.params.iter().map(|p| p.ty).collect(),
                    variadic: info.variadic,
                    quals: if info.method.is_some_and(|m| m.is_const) {
                        QualKind::CONST
                    } else {
                        QualKind::NONE
                    },
                    ref_qual: RefQualifier::None,
                };
                Some(self.function_type(proto))
            }
            _ => None,
        }
    }

    /// Size computable without a record layout.
    pub fn static_size_of(&mut self, ty: TypeId) -> Option<usize> {
        match self.canonical_kind(ty) {
            TypeKind::Builtin(b) => Some(b.size()),
            TypeKind::Pointer(_) | TypeKind::LValueReference(_) | TypeKind::RValueReference(_) => {
                Some(size_of::<*const c_void>())
            }
            TypeKind::MemberPointer { pointee, .. } => {
                if matches!(self.canonical_kind(pointee), TypeKind::Function(_)) {
                    Some(2 * size_of::<*const c_void>())
                } else {
                    Some(size_of::<isize>())
                }
            }
            TypeKind::Enum(decl) => match &self.decl(decl).kind {
                DeclKind::Enum(info) => {
                    let int_ty = info.integer_type;
                    self.static_size_of(int_ty)
                }
                _ => None,
            },
            TypeKind::Complex(e) => self.static_size_of(e).map(|size| size * 2),
            TypeKind::ConstantArray(e, n) => self
                .static_size_of(e)
                .and_then(|size| usize::try_from(n).ok().map(|n| n * size)),
            TypeKind::Record(decl) => self.record(decl).and_then(|info| info.size),
            _ => None,
        }
    }

    // ---- names ----

    pub fn name(&self, decl: DeclId) -> String {
        self.decl(decl).name.clone()
    }

    /// Name with template arguments for specializations.
    pub fn complete_name(&self, decl: DeclId) -> String {
        let entry = self.decl(decl);
        match entry.record().and_then(|info| info.specialization.as_ref()) {
            Some(spec) => format!("{}<{}>", entry.name, self.template_args_text(&spec.args)),
            None => match entry.function() {
                Some(info) if !info.template_args.is_empty() => {
                    format!("{}<{}>", entry.name, self.template_args_text(&info.template_args))
                }
                _ => entry.name.clone(),
            },
        }
    }

    pub fn template_args_text(&self, args: &[TemplateArg]) -> String {
        args.iter()
            .map(|arg| match &arg.value {
                Some(value) => value.to_string_lossy().into_owned(),
                None => self.type_to_string(arg.ty),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn scope_prefix(&self, decl: DeclId, complete: bool) -> String {
        let mut parts = Vec::new();
        let mut current = self.decl(decl).parent;
        while let Some(parent) = current {
            let entry = self.decl(parent);
            match entry.kind {
                DeclKind::TranslationUnit => break,
                DeclKind::Enum(EnumInfo { scoped: false, .. }) => {}
                DeclKind::Namespace { .. } if entry.name.is_empty() => {
                    parts.push("(anonymous namespace)".to_string());
                }
                _ => parts.push(if complete {
                    self.complete_name(parent)
                } else {
                    entry.name.clone()
                }),
            }
            current = entry.parent;
        }
        parts.reverse();
        parts.into_iter().map(|part| part + "::").collect()
    }

    pub fn qualified_name(&self, decl: DeclId) -> String {
        if matches!(self.decl(decl).kind, DeclKind::TranslationUnit) {
            return String::new();
        }
        format!("{}{}", self.scope_prefix(decl, false), self.decl(decl).name)
    }

    pub fn qualified_complete_name(&self, decl: DeclId) -> String {
        if matches!(self.decl(decl).kind, DeclKind::TranslationUnit) {
            return String::new();
        }
        format!("{}{}", self.scope_prefix(decl, true), self.complete_name(decl))
    }

    // ---- printing ----

    pub fn type_to_string(&self, ty: TypeId) -> String {
        self.print_type(ty, "")
    }

    /// Prints `ty` as the type of a declarator named `declarator`.
    pub fn print_type(&self, ty: TypeId, declarator: &str) -> String {
        self.print_into(ty, declarator.to_string())
    }

    fn print_into(&self, ty: TypeId, inner: String) -> String {
        let entry = self.ty(ty);
        let wraps = |model: &Self, pointee: TypeId| {
            matches!(
                model.ty(pointee).kind,
                TypeKind::Function(_) | TypeKind::ConstantArray(..) | TypeKind::IncompleteArray(_)
            )
        };
        let sigil = match &entry.kind {
            TypeKind::Pointer(p) => Some(("*".to_string(), *p)),
            TypeKind::LValueReference(p) => Some(("&".to_string(), *p)),
            TypeKind::RValueReference(p) => Some(("&&".to_string(), *p)),
            TypeKind::MemberPointer { pointee, class } => {
                Some((format!("{}::*", self.type_to_string(*class)), *pointee))
            }
            _ => None,
        };
        if let Some((sigil, pointee)) = sigil {
            let mut decl = sigil;
            if !entry.quals.is_empty() {
                decl.push_str(&quals_text(entry.quals));
                if !inner.is_empty() {
                    decl.push(' ');
                }
            }
            decl.push_str(&inner);
            if wraps(self, pointee) {
                decl = format!("({decl})");
            }
            return self.print_into(pointee, decl);
        }

        match &entry.kind {
            TypeKind::ConstantArray(e, n) => self.print_into(*e, format!("{inner}[{n}]")),
            TypeKind::IncompleteArray(e) => self.print_into(*e, format!("{inner}[]")),
            TypeKind::Function(proto) => {
                let mut params: Vec<String> =
                    proto.params.iter().map(|p| self.type_to_string(*p)).collect();
                if proto.variadic {
                    params.push("...".to_string());
                }
                let mut decl = format!("{inner}({})", params.join(", "));
                if !proto.quals.is_empty() {
                    decl.push(' ');
                    decl.push_str(&quals_text(proto.quals));
                }
                match proto.ref_qual {
                    RefQualifier::None => {}
                    RefQualifier::LValue => decl.push_str(" &"),
                    RefQualifier::RValue => decl.push_str(" &&"),
                }
                self.print_into(proto.ret, decl)
            }
            _ => {
                let base = match &entry.kind {
                    TypeKind::Void => "void".to_string(),
                    TypeKind::Builtin(b) => b.spelling().to_string(),
                    TypeKind::Record(decl) => self.qualified_complete_name(*decl),
                    TypeKind::Enum(decl) | TypeKind::Typedef(decl) => self.qualified_name(*decl),
                    TypeKind::Complex(e) => format!("_Complex {}", self.type_to_string(*e)),
                    TypeKind::Named(name) => name.clone(),
                    _ => String::new(),
                };
                let mut out = if entry.quals.is_empty() {
                    base
                } else {
                    format!("{} {base}", quals_text(entry.quals))
                };
                if !inner.is_empty() {
                    if !inner.starts_with('[') {
                        out.push(' ');
                    }
                    out.push_str(&inner);
                }
                out
            }
        }
    }

    // ---- lookup ----

    /// Members of `scope` named `name`, including those of transparent
    /// children such as unscoped enums and inline namespaces.
    pub fn members_named(&self, scope: DeclId, name: &str) -> Vec<DeclId> {
        let mut found = Vec::new();
        self.collect_members_named(scope, name, &mut found);
        found
    }

    fn collect_members_named(&self, scope: DeclId, name: &str, found: &mut Vec<DeclId>) {
        for member in &self.decl(scope).members {
            let entry = self.decl(*member);
            if entry.name == name && !entry.implicit_injected() {
                found.push(*member);
            }
            if entry.is_transparent() {
                self.collect_members_named(*member, name, found);
            }
        }
    }

    /// Qualified lookup of a single name in `scope`: direct members first,
    /// then base classes, then namespaces nominated by using-directives.
    pub fn lookup_in(&self, scope: DeclId, name: &str) -> Vec<DeclId> {
        let direct = self.members_named(scope, name);
        if !direct.is_empty() {
            return direct;
        }
        if let Some(info) = self.record(scope) {
            for base in &info.bases {
                if let TypeKind::Record(base_decl) = self.resolve_sugar(base.ty) {
                    let inherited = self.lookup_in(base_decl, name);
                    if !inherited.is_empty() {
                        return inherited;
                    }
                }
            }
        }
        for nominated in &self.decl(scope).using_directives {
            let via_using = self.members_named(*nominated, name);
            if !via_using.is_empty() {
                return via_using;
            }
        }
        Vec::new()
    }

    fn resolve_sugar(&self, ty: TypeId) -> TypeKind {
        let mut current = ty;
        loop {
            match &self.ty(current).kind {
                TypeKind::Typedef(decl) => match &self.decl(*decl).kind {
                    DeclKind::Typedef { underlying } => current = *underlying,
                    _ => return TypeKind::Void,
                },
                other => return other.clone(),
            }
        }
    }

    /// Looks up a possibly qualified name (`N::A<int>::f`) inside `within`
    /// (the translation unit when `None`).
    pub fn lookup_named(&self, name: &str, within: Option<DeclId>) -> Lookup {
        let name = name.trim();
        let (global, name) = match name.strip_prefix("::") {
            Some(rest) => (true, rest),
            None => (false, name),
        };
        let mut scope = if global {
            Self::TRANSLATION_UNIT
        } else {
            within.unwrap_or(Self::TRANSLATION_UNIT)
        };
        let segments = split_qualified(name);
        let Some((last, leading)) = segments.split_last() else {
            return Lookup::NotFound;
        };
        for segment in leading {
            match self.lookup_segment(scope, segment) {
                Lookup::Found(next) => scope = self.scope_target(next),
                other => return other,
            }
        }
        self.lookup_segment(scope, last)
    }

    /// Scope a nested-name-specifier refers to, looking through typedefs.
    fn scope_target(&self, decl: DeclId) -> DeclId {
        match &self.decl(decl).kind {
            DeclKind::Typedef { underlying } => match self.resolve_sugar(*underlying) {
                TypeKind::Record(record) | TypeKind::Enum(record) => record,
                _ => decl,
            },
            _ => decl,
        }
    }

    fn lookup_segment(&self, scope: DeclId, segment: &str) -> Lookup {
        let (base, args) = split_template_id(segment);
        let candidates = self.lookup_in(scope, base);
        match args {
            Some(args) => {
                let wanted = squash(args);
                candidates
                    .iter()
                    .filter_map(|cand| self.decl(*cand).template())
                    .flat_map(|info| info.specializations.iter())
                    .find(|spec| {
                        let entry = self.decl(**spec);
                        let spec_args = entry
                            .record()
                            .and_then(|info| info.specialization.as_ref())
                            .map(|spec| spec.args.as_slice())
                            .or_else(|| entry.function().map(|info| info.template_args.as_slice()))
                            .unwrap_or(&[]);
                        squash(&self.template_args_text(spec_args)) == wanted
                    })
                    .map_or(Lookup::NotFound, |spec| Lookup::Found(*spec))
            }
            None => match candidates.as_slice() {
                [] => Lookup::NotFound,
                [only] => Lookup::Found(*only),
                [first, rest @ ..] => {
                    // Redeclarations of one entity are merged, so several hits
                    // only stay unambiguous when a tag hides nothing else.
                    if rest.iter().all(|other| other == first) {
                        Lookup::Found(*first)
                    } else {
                        Lookup::Ambiguous
                    }
                }
            },
        }
    }

    /// Resolves a type name as seen from `context`, searching enclosing scopes.
    pub fn resolve_type_name(&self, name: &str, context: DeclId) -> Option<DeclId> {
        let mut scope = Some(context);
        while let Some(current) = scope {
            if let Lookup::Found(decl) = self.lookup_named(name, Some(current)) {
                if matches!(
                    self.decl(decl).kind,
                    DeclKind::Record(_) | DeclKind::Enum(_) | DeclKind::Typedef { .. }
                ) {
                    return Some(decl);
                }
            }
            scope = self.decl(current).parent;
        }
        None
    }

    /// Nearest enclosing scope that is not transparent.
    pub fn semantic_parent(&self, decl: DeclId) -> Option<DeclId> {
        let mut parent = self.decl(decl).parent?;
        while self.decl(parent).is_transparent()
            && matches!(self.decl(parent).kind, DeclKind::Enum(_))
        {
            parent = self.decl(parent).parent?;
        }
        Some(parent)
    }

    // ---- classes ----

    /// Records named by the direct bases of `record`.
    pub fn base_records(&self, record: DeclId) -> Vec<DeclId> {
        self.record(record)
            .map(|info| {
                info.bases
                    .iter()
                    .filter_map(|base| match self.resolve_sugar(base.ty) {
                        TypeKind::Record(decl) => Some(decl),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Chain of `(class, base specifier index)` steps from `derived` to `base`.
    pub fn base_path(&self, derived: DeclId, base: DeclId) -> Option<Vec<(DeclId, usize)>> {
        let info = self.record(derived)?;
        for (index, spec) in info.bases.iter().enumerate() {
            let TypeKind::Record(direct) = self.resolve_sugar(spec.ty) else {
                continue;
            };
            if direct == base {
                return Some(vec![(derived, index)]);
            }
            if let Some(mut rest) = self.base_path(direct, base) {
                rest.insert(0, (derived, index));
                return Some(rest);
            }
        }
        None
    }

    pub fn is_derived_from(&self, derived: DeclId, base: DeclId) -> bool {
        derived != base && self.base_path(derived, base).is_some()
    }

    pub fn methods(&self, record: DeclId) -> Vec<DeclId> {
        self.decl(record)
            .members
            .iter()
            .copied()
            .filter(|member| self.function(*member).is_some())
            .collect()
    }

    pub fn destructor(&self, record: DeclId) -> Option<DeclId> {
        self.methods(record)
            .into_iter()
            .find(|method| self.function(*method).is_some_and(FunctionInfo::is_destructor))
    }

    pub fn default_constructor(&self, record: DeclId) -> Option<DeclId> {
        self.methods(record).into_iter().find(|method| {
            self.function(*method).is_some_and(|info| {
                info.is_constructor() && info.min_required_args() == 0 && !info.deleted
            })
        })
    }

    /// Fields of `record` in declaration order.
    pub fn fields(&self, record: DeclId) -> Vec<DeclId> {
        self.decl(record)
            .members
            .iter()
            .copied()
            .filter(|member| {
                self.decl(*member)
                    .variable()
                    .is_some_and(|info| info.is_field)
            })
            .collect()
    }

    pub fn static_data_members(&self, record: DeclId) -> Vec<DeclId> {
        self.decl(record)
            .members
            .iter()
            .copied()
            .filter(|member| {
                self.decl(*member)
                    .variable()
                    .is_some_and(|info| !info.is_field)
            })
            .collect()
    }

    /// Whether a class (or one of its bases) declares `name` as a member.
    pub fn has_member_named(&self, record: DeclId, name: &str) -> bool {
        !self.members_named(record, name).is_empty()
            || self
                .base_records(record)
                .into_iter()
                .any(|base| self.has_member_named(base, name))
    }

    // ---- functions ----

    /// Operand-count class of an overloaded operator declaration.
    pub fn operator_arity(&self, func: DeclId) -> Option<OperatorArity> {
        let info = self.function(func)?;
        let SpecialMember::Operator(op) = info.special else {
            return None;
        };
        let implicit_object = usize::from(info.is_instance_method());
        match info.params.len() + implicit_object {
            1 => Some(OperatorArity::Unary),
            2 => Some(OperatorArity::Binary),
            _ => op.arity(),
        }
    }

    /// `int N::f(int a, double b = 2.) const`
    pub fn function_signature(&self, func: DeclId) -> Option<String> {
        let info = self.function(func)?;
        let params: Vec<String> = info
            .params
            .iter()
            .map(|param| {
                let mut text = self.print_type(param.ty, &param.name);
                if let Some(default) = &param.default {
                    text.push_str(" = ");
                    text.push_str(default);
                }
                text
            })
            .chain(info.variadic.then(|| "...".to_string()))
            .collect();
        let name = self.qualified_complete_name(func);
        let mut out = if info.is_constructor() || info.is_destructor() {
            format!("{name}({})", params.join(", "))
        } else {
            self.print_type(info.return_type, &format!("{name}({})", params.join(", ")))
        };
        if let Some(method) = info.method {
            if method.is_const {
                out.push_str(" const");
            }
        }
        Some(out)
    }
}

impl Decl {
    /// The injected class name clang places inside every class.
    fn implicit_injected(&self) -> bool {
        self.implicit && self.is_record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_qualified() {
        assert_eq!(split_qualified("A::B<C::D, 2>::E"), ["A", "B<C::D, 2>", "E"]);
        assert_eq!(split_qualified("x"), ["x"]);
        assert_eq!(split_template_id("B<C::D, 2>"), ("B", Some("C::D, 2")));
        assert_eq!(split_template_id("operator<"), ("operator<", None));
    }

    #[test]
    fn test_type_interning_and_handles() {
        let mut model = Model::new();
        let int = model.builtin(Builtin::Int);
        assert_eq!(model.builtin(Builtin::Int), int);
        let ptr = model.pointer(int);
        assert_eq!(model.type_from_handle(ptr.handle()), Some(ptr));
        assert_eq!(model.type_from_handle(TypeHandle::null()), None);
        assert_eq!(
            model.decl_from_scope(Model::TRANSLATION_UNIT.scope()),
            Some(Model::TRANSLATION_UNIT)
        );
    }

    #[test]
    fn test_print_declarators() {
        let mut model = Model::new();
        let int = model.builtin(Builtin::Int);
        let char_ty = model.builtin(Builtin::Char);
        let const_char = model.with_quals(char_ty, QualKind::CONST);
        let ptr = model.pointer(const_char);
        let const_ptr = model.with_quals(ptr, QualKind::CONST);
        let reference = model.lvalue_reference(const_ptr);
        assert_eq!(model.type_to_string(reference), "const char *const &");

        let func = model.function_type(FunctionProto {
            ret: int,
            params: vec![int],
            variadic: false,
            quals: QualKind::NONE,
            ref_qual: RefQualifier::None,
        });
        let fp = model.pointer(func);
        assert_eq!(model.type_to_string(fp), "int (*)(int)");
        assert_eq!(model.print_type(fp, "FP1"), "int (*FP1)(int)");

        let inner = model.constant_array(int, 3);
        let outer = model.constant_array(inner, 2);
        assert_eq!(model.type_to_string(outer), "int[2][3]");
        assert_eq!(model.print_type(outer, "AR2"), "int AR2[2][3]");
    }

    #[test]
    fn test_qualified_names_and_lookup() {
        let mut model = Model::new();
        let ns = model.add_decl(
            Model::TRANSLATION_UNIT,
            "N",
            Access::None,
            DeclKind::Namespace { inline: false },
        );
        let mut info = RecordInfo::new(TagKind::Struct);
        info.complete = true;
        let record = model.add_decl(ns, "A", Access::None, DeclKind::Record(info));
        assert_eq!(model.qualified_name(record), "N::A");
        assert_eq!(model.lookup_named("N::A", None), Lookup::Found(record));
        assert_eq!(model.lookup_named("A", Some(ns)), Lookup::Found(record));
        assert_eq!(model.lookup_named("A", None), Lookup::NotFound);
        assert_eq!(model.resolve_type_name("A", record), Some(record));

        let ty = model.record_type(record);
        let const_ty = model.with_quals(ty, QualKind::CONST);
        assert_eq!(model.type_to_string(const_ty), "const N::A");
    }
}

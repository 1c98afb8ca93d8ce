//! Programmatic construction of declarations.
//!
//! Used by the AST ingester for members the compiler declares implicitly and
//! by tests that need a populated model without a toolchain.

use cppi_abi::Operator;

use crate::model::{
    Access, BaseSpecifier, Builtin, DeclId, DeclKind, EnumInfo, FunctionInfo, MethodInfo, Model,
    ParamInfo, RecordInfo, SpecialMember, Specialization, SpecializationKind, TagKind, TemplateArg,
    TemplateInfo, TemplateParam, TemplateParamKind, TemplatedKind, TypeId, VarInfo,
};

pub struct ModelBuilder<'m> {
    model: &'m mut Model,
}

impl<'m> ModelBuilder<'m> {
    pub fn new(model: &'m mut Model) -> Self {
        Self { model }
    }

    pub fn model(&mut self) -> &mut Model {
        self.model
    }

    pub fn builtin(&mut self, builtin: Builtin) -> TypeId {
        self.model.builtin(builtin)
    }

    /// Opens `name` in `parent`, reusing an existing namespace of that name.
    pub fn namespace(&mut self, parent: DeclId, name: &str) -> DeclId {
        let existing = self
            .model
            .members_named(parent, name)
            .into_iter()
            .find(|id| self.model.decl(*id).is_namespace());
        existing.unwrap_or_else(|| {
            self.model
                .add_decl(parent, name, Access::None, DeclKind::Namespace { inline: false })
        })
    }

    pub fn using_namespace(&mut self, scope: DeclId, nominated: DeclId) {
        let directives = &mut self.model.decl_mut(scope).using_directives;
        if !directives.contains(&nominated) {
            directives.push(nominated);
        }
    }

    /// Declares a complete, empty class. Call [`Self::finish_record`] once its
    /// members are in place.
    pub fn record(&mut self, parent: DeclId, name: &str, tag: TagKind) -> DeclId {
        let mut info = RecordInfo::new(tag);
        info.complete = true;
        let access = self.member_access(parent);
        self.model.add_decl(parent, name, access, DeclKind::Record(info))
    }

    /// Declares a class without a definition.
    pub fn forward_record(&mut self, parent: DeclId, name: &str, tag: TagKind) -> DeclId {
        let access = self.member_access(parent);
        self.model
            .add_decl(parent, name, access, DeclKind::Record(RecordInfo::new(tag)))
    }

    fn member_access(&self, parent: DeclId) -> Access {
        self.model
            .record(parent)
            .map_or(Access::None, |info| info.tag.default_access())
    }

    pub fn base(&mut self, record: DeclId, base: DeclId, access: Access, is_virtual: bool) {
        let ty = self.model.record_type(base);
        let base_polymorphic = self.model.record(base).is_some_and(|info| info.polymorphic);
        if let Some(info) = self.model.record_mut(record) {
            info.bases.push(BaseSpecifier {
                ty,
                access,
                is_virtual,
            });
            info.polymorphic |= base_polymorphic || is_virtual;
        }
    }

    pub fn field(&mut self, record: DeclId, name: &str, ty: TypeId, access: Access) -> DeclId {
        self.model.add_decl(
            record,
            name,
            access,
            DeclKind::Variable(VarInfo {
                ty,
                is_field: true,
                mangled_name: None,
                offset: None,
            }),
        )
    }

    /// A namespace-scope variable or static data member.
    pub fn variable(&mut self, parent: DeclId, name: &str, ty: TypeId) -> DeclId {
        let access = if self.model.record(parent).is_some() {
            Access::Public
        } else {
            Access::None
        };
        self.model.add_decl(
            parent,
            name,
            access,
            DeclKind::Variable(VarInfo {
                ty,
                is_field: false,
                mangled_name: None,
                offset: None,
            }),
        )
    }

    pub fn typedef(&mut self, parent: DeclId, name: &str, underlying: TypeId) -> DeclId {
        let access = self.member_access(parent);
        self.model
            .add_decl(parent, name, access, DeclKind::Typedef { underlying })
    }

    pub fn enumeration(
        &mut self,
        parent: DeclId,
        name: &str,
        scoped: bool,
        constants: &[(&str, i64)],
    ) -> DeclId {
        let integer_type = self.model.builtin(Builtin::Int);
        let access = self.member_access(parent);
        let id = self.model.add_decl(
            parent,
            name,
            access,
            DeclKind::Enum(EnumInfo {
                scoped,
                integer_type,
                complete: true,
            }),
        );
        let ty = self.model.enum_type(id);
        for (constant, value) in constants {
            self.model.add_decl(
                id,
                *constant,
                Access::None,
                DeclKind::EnumConstant { value: *value, ty },
            );
        }
        id
    }

    pub fn function(&mut self, parent: DeclId, name: &str, ret: TypeId) -> FunctionBuilder<'_> {
        let is_member = self.model.record(parent).is_some();
        let mut info = FunctionInfo::new(ret);
        if is_member {
            info.method = Some(MethodInfo::default());
        }
        if let Some(op) = Operator::from_function_name(name) {
            info.special = SpecialMember::Operator(op);
        }
        FunctionBuilder {
            model: self.model,
            parent,
            name: name.to_string(),
            access: if is_member { Access::Public } else { Access::None },
            info,
            role: TemplateRole::None,
        }
    }

    pub fn constructor(&mut self, record: DeclId) -> FunctionBuilder<'_> {
        let name = self.model.name(record);
        let void = self.model.void();
        let mut builder = self.function(record, &name, void);
        builder.info.special = SpecialMember::Constructor {
            default: true,
            copy_or_move: false,
        };
        builder
    }

    pub fn destructor(&mut self, record: DeclId) -> FunctionBuilder<'_> {
        let name = format!("~{}", self.model.name(record));
        let void = self.model.void();
        let mut builder = self.function(record, &name, void);
        builder.info.special = SpecialMember::Destructor;
        builder
    }

    pub fn class_template(&mut self, parent: DeclId, name: &str, params: &[&str]) -> DeclId {
        let access = self.member_access(parent);
        let params = params
            .iter()
            .map(|param| TemplateParam {
                name: (*param).to_string(),
                kind: TemplateParamKind::Type,
                default: None,
                pack: false,
            })
            .collect();
        let id = self.model.add_decl(
            parent,
            name,
            access,
            DeclKind::ClassTemplate(TemplateInfo {
                params,
                pattern: None,
                specializations: Vec::new(),
            }),
        );
        let mut pattern = RecordInfo::new(TagKind::Class);
        pattern.complete = true;
        let pattern = self
            .model
            .add_detached(parent, name, access, DeclKind::Record(pattern));
        self.set_template_pattern(id, pattern);
        id
    }

    /// Adds a specialization of `template` as a complete class in the
    /// template's scope.
    pub fn specialization(&mut self, template: DeclId, args: Vec<TemplateArg>) -> DeclId {
        let parent = self.model.decl(template).parent.unwrap_or(Model::TRANSLATION_UNIT);
        let name = self.model.name(template);
        let mut info = RecordInfo::new(TagKind::Class);
        info.complete = true;
        info.specialization = Some(Specialization { template, args });
        let access = self.model.decl(template).access;
        let id = self
            .model
            .add_detached(parent, name, access, DeclKind::Record(info));
        if let DeclKind::ClassTemplate(tmpl) = &mut self.model.decl_mut(template).kind {
            tmpl.specializations.push(id);
        }
        id
    }

    /// Declares a function template whose pattern is built by `pattern`.
    pub fn function_template(
        &mut self,
        parent: DeclId,
        name: &str,
        params: &[&str],
        ret: TypeId,
    ) -> (DeclId, FunctionBuilder<'_>) {
        let access = self.member_access(parent);
        let params = params
            .iter()
            .map(|param| TemplateParam {
                name: (*param).to_string(),
                kind: TemplateParamKind::Type,
                default: None,
                pack: false,
            })
            .collect();
        let id = self.model.add_decl(
            parent,
            name,
            access,
            DeclKind::FunctionTemplate(TemplateInfo {
                params,
                pattern: None,
                specializations: Vec::new(),
            }),
        );
        let mut builder = self.function(parent, name, ret);
        builder.info.templated = TemplatedKind::FunctionTemplate;
        builder.role = TemplateRole::Pattern(id);
        (id, builder)
    }

    /// Declares an implicit instantiation of a function template, listed
    /// among the template's specializations.
    pub fn function_specialization(
        &mut self,
        template: DeclId,
        args: Vec<TemplateArg>,
        ret: TypeId,
    ) -> FunctionBuilder<'_> {
        let parent = self.model.decl(template).parent.unwrap_or(Model::TRANSLATION_UNIT);
        let name = self.model.name(template);
        let pattern = self.model.decl(template).template().and_then(|info| info.pattern);
        let mut builder = self.function(parent, &name, ret);
        builder.info.templated = TemplatedKind::FunctionTemplateSpecialization;
        builder.info.specialization = SpecializationKind::ImplicitInstantiation;
        builder.info.pattern = pattern;
        builder.info.template_args = args;
        builder.role = TemplateRole::Specialization(template);
        builder
    }

    fn set_template_pattern(&mut self, template: DeclId, pattern: DeclId) {
        if let DeclKind::ClassTemplate(info) | DeclKind::FunctionTemplate(info) =
            &mut self.model.decl_mut(template).kind
        {
            info.pattern = Some(pattern);
        }
    }

    /// Computes class properties from the members and declares the implicit
    /// default constructor and destructor where none is declared.
    pub fn finish_record(&mut self, record: DeclId) {
        let methods = self.model.methods(record);
        let fields = self.model.fields(record);
        let mut has_ctor = false;
        let mut has_dtor = false;
        let mut has_virtual = false;
        let mut has_pure = false;
        for method in &methods {
            let Some(info) = self.model.function(*method) else {
                continue;
            };
            has_ctor |= info.is_constructor();
            has_dtor |= info.is_destructor();
            if let Some(method) = info.method {
                has_virtual |= method.is_virtual;
                has_pure |= method.is_pure;
            }
        }
        let non_public_field = fields
            .iter()
            .any(|field| self.model.decl(*field).access != Access::Public);
        let field_types: Vec<TypeId> = fields
            .iter()
            .filter_map(|field| self.model.decl(*field).variable().map(|info| info.ty))
            .collect();
        let pod_fields = field_types.iter().all(|ty| self.model.is_pod(*ty));

        if let Some(info) = self.model.record_mut(record) {
            info.polymorphic |= has_virtual;
            info.is_abstract = has_pure;
            let plain = !has_ctor && !info.polymorphic && !non_public_field;
            info.aggregate = plain && info.bases.iter().all(|base| !base.is_virtual);
            info.pod = plain && info.bases.is_empty() && !has_dtor && pod_fields;
        }
        if !has_ctor {
            let ctor = self.constructor(record).build();
            self.model.decl_mut(ctor).implicit = true;
        }
        if !has_dtor {
            let dtor = self.destructor(record).build();
            self.model.decl_mut(dtor).implicit = true;
        }
    }
}

impl Model {
    /// Classifies a constructor of `record` taking `params`.
    pub fn constructor_kind(&mut self, record: DeclId, params: &[ParamInfo]) -> SpecialMember {
        let copy_or_move = match params {
            [only] => {
                let is_ref = self.is_reference(only.ty);
                let referee = self.non_reference(only.ty);
                is_ref && self.record_of_type(referee) == Some(record)
            }
            _ => false,
        };
        let required = params
            .iter()
            .position(|param| param.default.is_some())
            .unwrap_or(params.len());
        SpecialMember::Constructor {
            default: required == 0,
            copy_or_move,
        }
    }
}

#[derive(Clone, Copy)]
enum TemplateRole {
    None,
    Pattern(DeclId),
    Specialization(DeclId),
}

pub struct FunctionBuilder<'b> {
    model: &'b mut Model,
    parent: DeclId,
    name: String,
    access: Access,
    info: FunctionInfo,
    role: TemplateRole,
}

impl FunctionBuilder<'_> {
    pub fn param(mut self, name: &str, ty: TypeId) -> Self {
        self.info.params.push(ParamInfo {
            name: name.to_string(),
            ty,
            default: None,
        });
        self.refresh_constructor_kind();
        self
    }

    pub fn param_with_default(mut self, name: &str, ty: TypeId, default: &str) -> Self {
        self.info.params.push(ParamInfo {
            name: name.to_string(),
            ty,
            default: Some(default.to_string()),
        });
        self.refresh_constructor_kind();
        self
    }

    fn refresh_constructor_kind(&mut self) {
        if let SpecialMember::Constructor { .. } = self.info.special {
            self.info.special = self.model.constructor_kind(self.parent, &self.info.params);
        }
    }

    pub fn variadic(mut self) -> Self {
        self.info.variadic = true;
        self
    }

    pub fn access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn const_method(mut self) -> Self {
        self.info.method.get_or_insert_with(MethodInfo::default).is_const = true;
        self
    }

    pub fn static_method(mut self) -> Self {
        self.info.method.get_or_insert_with(MethodInfo::default).is_static = true;
        self
    }

    pub fn virtual_method(mut self) -> Self {
        self.info.method.get_or_insert_with(MethodInfo::default).is_virtual = true;
        self
    }

    pub fn pure_virtual(mut self) -> Self {
        let method = self.info.method.get_or_insert_with(MethodInfo::default);
        method.is_virtual = true;
        method.is_pure = true;
        self.info.defined = false;
        self
    }

    pub fn deleted(mut self) -> Self {
        self.info.deleted = true;
        self
    }

    pub fn undefined(mut self) -> Self {
        self.info.defined = false;
        self
    }

    pub fn late_parsed(mut self) -> Self {
        self.info.late_parsed = true;
        self
    }

    pub fn mangled(mut self, name: &str) -> Self {
        self.info.mangled_name = Some(name.to_string());
        self
    }

    pub fn conversion(mut self) -> Self {
        self.info.special = SpecialMember::Conversion;
        self
    }

    pub fn build(self) -> DeclId {
        let Self {
            model,
            parent,
            name,
            access,
            info,
            role,
        } = self;
        let kind = DeclKind::Function(Box::new(info));
        match role {
            TemplateRole::Pattern(template) => {
                let id = model.add_detached(parent, name, access, kind);
                if let DeclKind::FunctionTemplate(tmpl) = &mut model.decl_mut(template).kind {
                    tmpl.pattern = Some(id);
                }
                id
            }
            TemplateRole::Specialization(template) => {
                let id = model.add_detached(parent, name, access, kind);
                if let DeclKind::FunctionTemplate(tmpl) = &mut model.decl_mut(template).kind {
                    tmpl.specializations.push(id);
                }
                id
            }
            TemplateRole::None => model.add_decl(parent, name, access, kind),
        }
    }
}

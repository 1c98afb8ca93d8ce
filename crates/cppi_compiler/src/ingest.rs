//! Populates a [`Model`] from clang's JSON AST dump.
//!
//! Only declarations located in the main file are taken; everything pulled in
//! by `#include` is skipped. Re-ingesting a grown dump updates declarations
//! in place, keyed by their scope and signature, so handles stay valid across
//! dumps.
//!
//! clang elides the `file` of a source location when it matches the previous
//! location printed, so every location in the dump must be observed in
//! document order, including those inside skipped subtrees.

use std::path::Path;

use ahash::AHashMap;
use cppi_abi::Operator;
use serde_json::Value;

use crate::model::{
    Access, BaseSpecifier, Builtin, DeclId, DeclKind, EnumInfo, FunctionInfo, MethodInfo, Model,
    ParamInfo, RecordInfo, SpecialMember, Specialization, SpecializationKind, TagKind, TemplateArg,
    TemplateInfo, TemplateParam, TemplateParamKind, TemplatedKind, TypeId, TypeKind, VarInfo,
};
use crate::Result;

#[derive(Default)]
struct LocTracker {
    file: Option<String>,
}

impl LocTracker {
    fn observe(&mut self, loc: &Value) {
        if let Some(spelling) = loc.get("spellingLoc") {
            self.observe(spelling);
        }
        if let Some(expansion) = loc.get("expansionLoc") {
            self.observe(expansion);
        }
        if let Some(file) = loc.get("file").and_then(Value::as_str) {
            self.file = Some(file.to_string());
        }
    }

    fn observe_node(&mut self, node: &Value) {
        if let Some(loc) = node.get("loc") {
            self.observe(loc);
        }
        if let Some(range) = node.get("range") {
            if let Some(begin) = range.get("begin") {
                self.observe(begin);
            }
            if let Some(end) = range.get("end") {
                self.observe(end);
            }
        }
    }

    /// Observes every location below `value` in document order.
    fn skim(&mut self, value: &Value) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    match key.as_str() {
                        "loc" | "begin" | "end" => self.observe(child),
                        "includedFrom" => {}
                        _ => self.skim(child),
                    }
                }
            }
            Value::Array(items) => items.iter().for_each(|item| self.skim(item)),
            _ => {}
        }
    }
}

fn text<'v>(node: &'v Value, key: &str) -> &'v str {
    node.get(key).and_then(Value::as_str).unwrap_or("")
}

fn flag(node: &Value, key: &str) -> bool {
    node.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn kind(node: &Value) -> &str {
    text(node, "kind")
}

fn qual_type(node: &Value) -> Option<&str> {
    node.get("type")
        .and_then(|ty| ty.get("qualType"))
        .and_then(Value::as_str)
}

fn children(node: &Value) -> &[Value] {
    node.get("inner")
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

fn offset_of(loc: &Value) -> Option<(usize, usize)> {
    let loc = loc.get("expansionLoc").unwrap_or(loc);
    let offset = usize::try_from(loc.get("offset")?.as_u64()?).ok()?;
    let len = loc
        .get("tokLen")
        .and_then(Value::as_u64)
        .and_then(|len| usize::try_from(len).ok())
        .unwrap_or(0);
    Some((offset, len))
}

fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_u64().map(|v| v as i64)),
        Value::String(text) => text
            .parse::<i64>()
            .ok()
            .or_else(|| text.parse::<u64>().ok().map(|v| v as i64)),
        _ => None,
    }
}

/// First `value` carried by a constant-folded or literal expression below `node`.
fn constant_value(node: &Value) -> Option<i64> {
    if matches!(kind(node), "ConstantExpr" | "IntegerLiteral" | "CharacterLiteral") {
        if let Some(value) = node.get("value").and_then(parse_integer) {
            return Some(value);
        }
    }
    children(node).iter().find_map(constant_value)
}

fn is_function_kind(kind: &str) -> bool {
    matches!(
        kind,
        "FunctionDecl"
            | "CXXMethodDecl"
            | "CXXConstructorDecl"
            | "CXXDestructorDecl"
            | "CXXConversionDecl"
    )
}

/// Walks one AST dump into a model.
pub struct Ingester<'a> {
    model: &'a mut Model,
    source: &'a str,
    main_file: &'a str,
    tracker: LocTracker,
    /// clang node id to declaration, for out-of-line definitions.
    node_ids: AHashMap<String, DeclId>,
    anonymous: AHashMap<(DeclId, &'static str), usize>,
}

impl<'a> Ingester<'a> {
    /// `source` is the text of `main_file`, used to recover default arguments.
    pub fn new(model: &'a mut Model, source: &'a str, main_file: &'a str) -> Self {
        Self {
            model,
            source,
            main_file,
            tracker: LocTracker::default(),
            node_ids: AHashMap::new(),
            anonymous: AHashMap::new(),
        }
    }

    /// Ingests a JSON dump; returns the number of declarations added.
    pub fn ingest(mut self, json: &str) -> Result<usize> {
        let root: Value = serde_json::from_str(json)?;
        let before = self.model.decl_count();
        self.tracker.observe_node(&root);
        self.visit_members(&root, Model::TRANSLATION_UNIT, Access::None);
        Ok(self.model.decl_count() - before)
    }

    fn in_main_file(&self) -> bool {
        let Some(file) = self.tracker.file.as_deref() else {
            return false;
        };
        file == self.main_file
            || Path::new(file).file_name().is_some_and(|name| {
                Path::new(self.main_file).file_name() == Some(name)
            })
    }

    fn type_from(&mut self, spelling: Option<&str>, context: DeclId) -> TypeId {
        match spelling {
            Some(spelling) => self.model.parse_type(spelling, context),
            None => self.model.named("<unknown>"),
        }
    }

    fn skim_children(&mut self, node: &Value) {
        for child in children(node) {
            self.tracker.skim(child);
        }
    }

    fn anonymous_key(&mut self, parent: DeclId, what: &'static str) -> String {
        let counter = self.anonymous.entry((parent, what)).or_insert(0);
        *counter += 1;
        format!("{}/{what}:#{counter}", parent.index())
    }

    fn upsert(
        &mut self,
        key: String,
        parent: DeclId,
        name: &str,
        access: Access,
        detached: bool,
        kind: impl FnOnce(&mut Model) -> DeclKind,
    ) -> (DeclId, bool) {
        if let Some(existing) = self.model.keyed(&key) {
            return (existing, false);
        }
        let kind = kind(self.model);
        let id = if detached {
            self.model.add_detached(parent, name, access, kind)
        } else {
            self.model.add_decl(parent, name, access, kind)
        };
        self.model.bind_key(key, id);
        (id, true)
    }

    /// Visits the declarations inside `node`, which declares `scope`.
    fn visit_members(&mut self, node: &Value, scope: DeclId, default_access: Access) {
        let mut access = default_access;
        let mut last_anonymous_record = None;
        for child in children(node) {
            self.tracker.observe_node(child);
            if child.get("loc").is_none() || !self.in_main_file() {
                self.skim_children(child);
                continue;
            }
            match kind(child) {
                "AccessSpecDecl" => access = Access::from_spelling(text(child, "access")),
                "LinkageSpecDecl" | "ExportDecl" => self.visit_members(child, scope, access),
                "NamespaceDecl" => self.namespace_decl(child, scope),
                "UsingDirectiveDecl" => {
                    self.using_directive(child, scope);
                    self.skim_children(child);
                }
                "CXXRecordDecl" | "RecordDecl" => {
                    if flag(child, "isImplicit") {
                        self.skim_children(child);
                    } else {
                        let record = self.record_decl(child, scope, access, None);
                        if text(child, "name").is_empty() {
                            last_anonymous_record = Some(record);
                        }
                    }
                }
                "ClassTemplateDecl" => self.class_template_decl(child, scope, access),
                "ClassTemplateSpecializationDecl" => {
                    let name = text(child, "name");
                    let template = self
                        .model
                        .members_named(scope, name)
                        .into_iter()
                        .find(|id| matches!(self.model.decl(*id).kind, DeclKind::ClassTemplate(_)));
                    match template {
                        Some(template) => self.specialization_decl(child, template, access),
                        None => self.skim_children(child),
                    }
                }
                "FunctionTemplateDecl" => self.function_template_decl(child, scope, access),
                "EnumDecl" => self.enum_decl(child, scope, access),
                "TypedefDecl" | "TypeAliasDecl" => {
                    self.typedef_decl(child, scope, access, last_anonymous_record);
                    self.skim_children(child);
                }
                "FieldDecl" => {
                    self.field_decl(child, scope, access);
                    self.skim_children(child);
                }
                "VarDecl" => {
                    self.var_decl(child, scope, access);
                    self.skim_children(child);
                }
                k if is_function_kind(k) => {
                    self.function_decl(child, scope, access, None);
                }
                _ => self.skim_children(child),
            }
        }
    }

    fn namespace_decl(&mut self, node: &Value, parent: DeclId) {
        let name = text(node, "name");
        let inline = flag(node, "isInline");
        let key = format!("{}/ns:{name}", parent.index());
        let (id, _) = self.upsert(key, parent, name, Access::None, false, |_| {
            DeclKind::Namespace { inline }
        });
        self.visit_members(node, id, Access::None);
    }

    fn using_directive(&mut self, node: &Value, scope: DeclId) {
        let name = node
            .get("nominatedNamespace")
            .map(|ns| text(ns, "name"))
            .unwrap_or("");
        let mut current = Some(scope);
        while let Some(lookup_scope) = current {
            if let Some(ns) = self
                .model
                .lookup_named(name, Some(lookup_scope))
                .found()
                .filter(|id| self.model.decl(*id).is_namespace())
            {
                let directives = &mut self.model.decl_mut(scope).using_directives;
                if !directives.contains(&ns) {
                    directives.push(ns);
                }
                return;
            }
            current = self.model.decl(lookup_scope).parent;
        }
    }

    /// Declares (or completes) a class. A `detached` key marks a template
    /// pattern or specialization, owned by its template rather than listed
    /// in `parent`.
    fn record_decl(
        &mut self,
        node: &Value,
        parent: DeclId,
        access: Access,
        detached: Option<(String, Option<Specialization>)>,
    ) -> DeclId {
        let name = text(node, "name");
        let tag = match text(node, "tagUsed") {
            "class" => TagKind::Class,
            "union" => TagKind::Union,
            _ => TagKind::Struct,
        };
        let is_detached = detached.is_some();
        let (key, spec) = match detached {
            Some((key, spec)) => (key, spec),
            None if name.is_empty() => (self.anonymous_key(parent, "rec"), None),
            None => (format!("{}/rec:{name}", parent.index()), None),
        };
        let (id, _) = self.upsert(key, parent, name, access, is_detached, |_| {
            let mut info = RecordInfo::new(tag);
            info.specialization = spec;
            DeclKind::Record(info)
        });
        if let Some(node_id) = node.get("id").and_then(Value::as_str) {
            self.node_ids.insert(node_id.to_string(), id);
        }

        if !flag(node, "completeDefinition") {
            self.skim_children(node);
            return id;
        }

        let bases: Vec<BaseSpecifier> = node
            .get("bases")
            .and_then(Value::as_array)
            .map(|bases| {
                bases
                    .iter()
                    .map(|base| BaseSpecifier {
                        ty: self.type_from(qual_type(base), parent),
                            access: Access::from_spelling(text(base, "access")),
                        is_virtual: flag(base, "isVirtual"),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let data = node.get("definitionData").cloned().unwrap_or(Value::Null);
        if let Some(info) = self.model.record_mut(id) {
            info.complete = true;
            info.bases = bases;
            info.aggregate = flag(&data, "isAggregate");
            info.pod = flag(&data, "isPOD");
            info.polymorphic = flag(&data, "isPolymorphic");
            info.is_abstract = flag(&data, "isAbstract");
            info.lambda = flag(&data, "isLambda");
        }

        self.visit_members(node, id, tag.default_access());
        self.declare_implicit_members(id, &data);
        id
    }

    /// Adds the default constructor and destructor clang declares lazily.
    fn declare_implicit_members(&mut self, record: DeclId, data: &Value) {
        let name = self.model.name(record);
        let methods = self.model.methods(record);
        let has_ctor = methods
            .iter()
            .any(|m| self.model.function(*m).is_some_and(FunctionInfo::is_constructor));
        let has_dtor = self.model.destructor(record).is_some();
        let default_ctor_exists = data
            .get("defaultCtor")
            .is_some_and(|ctor| flag(ctor, "exists") || flag(ctor, "needsImplicit"));

        let void = self.model.void();
        if !has_ctor && default_ctor_exists {
            let key = format!("{}/fn:{name}()", record.index());
            let (ctor, created) = self.upsert(key, record, &name, Access::Public, false, |_| {
                let mut info = FunctionInfo::new(void);
                info.method = Some(MethodInfo::default());
                info.special = SpecialMember::Constructor {
                    default: true,
                    copy_or_move: false,
                };
                DeclKind::Function(Box::new(info))
            });
            if created {
                self.model.decl_mut(ctor).implicit = true;
            }
        }
        if !has_dtor {
            let dtor_name = format!("~{name}");
            let key = format!("{}/fn:{dtor_name}()", record.index());
            let (dtor, created) = self.upsert(key, record, &dtor_name, Access::Public, false, |_| {
                let mut info = FunctionInfo::new(void);
                info.method = Some(MethodInfo::default());
                info.special = SpecialMember::Destructor;
                DeclKind::Function(Box::new(info))
            });
            if created {
                self.model.decl_mut(dtor).implicit = true;
            }
        }
    }

    fn template_params(&mut self, node: &Value, context: DeclId) -> Vec<TemplateParam> {
        children(node)
            .iter()
            .filter_map(|child| {
                let param_kind = match kind(child) {
                    "TemplateTypeParmDecl" => TemplateParamKind::Type,
                    "NonTypeTemplateParmDecl" => {
                        let ty = qual_type(child).unwrap_or("int");
                        TemplateParamKind::NonType(self.model.parse_type(ty, context))
                    }
                    "TemplateTemplateParmDecl" => TemplateParamKind::Template,
                    _ => return None,
                };
                Some(TemplateParam {
                    name: text(child, "name").to_string(),
                    kind: param_kind,
                    default: None,
                    pack: flag(child, "isParameterPack"),
                })
            })
            .collect()
    }

    fn template_args(&mut self, node: &Value, context: DeclId) -> Vec<TemplateArg> {
        let mut args = Vec::new();
        for child in children(node) {
            if kind(child) == "TemplateArgument" {
                self.template_arg(child, context, &mut args);
            }
        }
        args
    }

    fn template_arg(&mut self, node: &Value, context: DeclId, out: &mut Vec<TemplateArg>) {
        if let Some(spelling) = qual_type(node) {
            let ty = self.model.parse_type(spelling, context);
            match node.get("value") {
                Some(value) => out.push(TemplateArg::value(ty, &value_text(value))),
                None => out.push(TemplateArg::ty(ty)),
            }
        } else if let Some(value) = node.get("value") {
            let int = self.model.builtin(Builtin::Int);
            out.push(TemplateArg::value(int, &value_text(value)));
        } else if flag(node, "isPack") {
            for child in children(node) {
                self.template_arg(child, context, out);
            }
        }
    }

    fn class_template_decl(&mut self, node: &Value, parent: DeclId, access: Access) {
        let name = text(node, "name");
        let key = format!("{}/tmpl:{name}", parent.index());
        let params = self.template_params(node, parent);
        let (template, _) = self.upsert(key, parent, name, access, false, |_| {
            DeclKind::ClassTemplate(TemplateInfo {
                params,
                pattern: None,
                specializations: Vec::new(),
            })
        });

        for child in children(node) {
            self.tracker.observe_node(child);
            if child.get("loc").is_none() {
                continue;
            }
            match kind(child) {
                "CXXRecordDecl" if !flag(child, "isImplicit") => {
                    let key = format!("{}/pattern", template.index());
                    let pattern = self.record_decl(child, parent, access, Some((key, None)));
                    if let DeclKind::ClassTemplate(info) = &mut self.model.decl_mut(template).kind {
                        info.pattern = Some(pattern);
                    }
                }
                "ClassTemplateSpecializationDecl" if self.in_main_file() => {
                    self.specialization_decl(child, template, access);
                }
                _ => self.skim_children(child),
            }
        }
    }

    fn specialization_decl(&mut self, node: &Value, template: DeclId, access: Access) {
        let parent = self
            .model
            .decl(template)
            .parent
            .unwrap_or(Model::TRANSLATION_UNIT);
        let args = self.template_args(node, parent);
        let key = format!(
            "{}/spec:<{}>",
            template.index(),
            self.model.template_args_text(&args)
        );
        let spec = Specialization { template, args };
        let record = self.record_decl(node, parent, access, Some((key, Some(spec))));
        if let DeclKind::ClassTemplate(info) = &mut self.model.decl_mut(template).kind {
            if !info.specializations.contains(&record) {
                info.specializations.push(record);
            }
        }
    }

    fn function_template_decl(&mut self, node: &Value, parent: DeclId, access: Access) {
        let name = text(node, "name");
        let pattern_type = children(node)
            .iter()
            .find(|child| is_function_kind(kind(child)))
            .and_then(qual_type)
            .unwrap_or("");
        let key = format!("{}/ftmpl:{name}:{pattern_type}", parent.index());
        let params = self.template_params(node, parent);
        let (template, _) = self.upsert(key, parent, name, access, false, |_| {
            DeclKind::FunctionTemplate(TemplateInfo {
                params,
                pattern: None,
                specializations: Vec::new(),
            })
        });

        let mut pattern = None;
        for child in children(node) {
            self.tracker.observe_node(child);
            if child.get("loc").is_none() || !is_function_kind(kind(child)) {
                self.skim_children(child);
                continue;
            }
            match pattern {
                None => {
                    let key = format!("{}/pattern", template.index());
                    let id = self.function_decl(child, parent, access, Some(key));
                    if let Some(info) = self.model.function_mut(id) {
                        info.templated = TemplatedKind::FunctionTemplate;
                    }
                    pattern = Some(id);
                }
                Some(pattern_id) => {
                    let args = self.template_args(child, parent);
                    let key = format!(
                        "{}/spec:<{}>",
                        template.index(),
                        self.model.template_args_text(&args)
                    );
                    let id = self.function_decl(child, parent, access, Some(key));
                    if let Some(info) = self.model.function_mut(id) {
                        info.templated = TemplatedKind::FunctionTemplateSpecialization;
                        info.specialization = SpecializationKind::ImplicitInstantiation;
                        info.pattern = Some(pattern_id);
                        info.template_args = args;
                    }
                    if let DeclKind::FunctionTemplate(info) =
                        &mut self.model.decl_mut(template).kind
                    {
                        if !info.specializations.contains(&id) {
                            info.specializations.push(id);
                        }
                    }
                }
            }
        }
        if let DeclKind::FunctionTemplate(info) = &mut self.model.decl_mut(template).kind {
            info.pattern = info.pattern.or(pattern);
        }
    }

    fn default_argument(&self, param: &Value) -> Option<String> {
        if param.get("init").is_none() {
            return None;
        }
        let expr = children(param).first()?;
        let range = expr.get("range")?;
        let (begin, _) = offset_of(range.get("begin")?)?;
        let (end, len) = offset_of(range.get("end")?)?;
        self.source
            .get(begin..end + len)
            .map(|text| text.trim().to_string())
    }

    /// Declares or merges a function. `detached_key` places a template
    /// pattern or specialization outside its scope's member list.
    fn function_decl(
        &mut self,
        node: &Value,
        scope: DeclId,
        access: Access,
        detached_key: Option<String>,
    ) -> DeclId {
        let node_kind = kind(node);
        let name = text(node, "name");
        let owner = node
            .get("parentDeclContextId")
            .and_then(Value::as_str)
            .and_then(|id| self.node_ids.get(id).copied())
            .unwrap_or(scope);

        let fn_type = self.type_from(qual_type(node), owner);
        let proto = match &self.model.ty(fn_type).kind {
            TypeKind::Function(proto) => Some(proto.clone()),
            _ => None,
        };

        let mut params = Vec::new();
        for param in children(node).iter().filter(|child| kind(child) == "ParmVarDecl") {
            let default = self.default_argument(param);
            params.push(ParamInfo {
                name: text(param, "name").to_string(),
                ty: self.type_from(qual_type(param), owner),
                default,
            });
        }

        let is_member = self.model.record(owner).is_some();
        let method = is_member.then(|| MethodInfo {
            is_const: proto
                .as_ref()
                .is_some_and(|p| p.quals.contains(cppi_abi::QualKind::CONST)),
            is_volatile: proto
                .as_ref()
                .is_some_and(|p| p.quals.contains(cppi_abi::QualKind::VOLATILE)),
            is_static: text(node, "storageClass") == "static",
            is_virtual: flag(node, "virtual"),
            is_pure: flag(node, "pure"),
        });
        let special = match node_kind {
            "CXXConstructorDecl" => self.model.constructor_kind(owner, &params),
            "CXXDestructorDecl" => SpecialMember::Destructor,
            "CXXConversionDecl" => SpecialMember::Conversion,
            _ => Operator::from_function_name(name).map_or(SpecialMember::None, SpecialMember::Operator),
        };
        let has_body = children(node).iter().any(|child| kind(child) == "CompoundStmt");
        let defined = has_body || node.get("explicitlyDefaulted").is_some() || flag(node, "isImplicit");

        let signature: Vec<String> = params
            .iter()
            .map(|param| self.model.type_to_string(param.ty))
            .collect();
        let const_suffix = if method.is_some_and(|m| m.is_const) { "const" } else { "" };
        let detached = detached_key.is_some();
        let key = detached_key.unwrap_or_else(|| {
            format!("{}/fn:{name}({}){const_suffix}", owner.index(), signature.join(","))
        });

        let return_type = match (&proto, &special) {
            (_, SpecialMember::Constructor { .. } | SpecialMember::Destructor) => self.model.void(),
            (Some(proto), _) => proto.ret,
            (None, _) => self.model.named("<unknown>"),
        };
        let variadic = proto.as_ref().is_some_and(|p| p.variadic);
        let mangled = node.get("mangledName").and_then(Value::as_str).map(str::to_string);
        let deleted = flag(node, "explicitlyDeleted");

        let (id, created) = self.upsert(key, owner, name, access, detached, |_| {
            let mut info = FunctionInfo::new(return_type);
            info.variadic = variadic;
            info.method = method;
            info.special = special;
            DeclKind::Function(Box::new(info))
        });
        if created && flag(node, "isImplicit") {
            self.model.decl_mut(id).implicit = true;
        }

        let member_pattern = self.member_pattern(owner, name, params.len());
        if let Some(info) = self.model.function_mut(id) {
            // Redeclarations merge: a later definition keeps earlier defaults.
            if created || info.params.len() != params.len() {
                info.params = params;
            } else {
                for (existing, incoming) in info.params.iter_mut().zip(params) {
                    if !incoming.name.is_empty() {
                        existing.name = incoming.name;
                    }
                    if incoming.default.is_some() {
                        existing.default = incoming.default;
                    }
                }
            }
            info.defined |= defined;
            if created {
                info.defined = defined;
            }
            info.deleted |= deleted;
            if mangled.is_some() {
                info.mangled_name = mangled;
            }
            if let Some(pattern) = member_pattern {
                info.templated = TemplatedKind::MemberSpecialization;
                info.specialization = SpecializationKind::ImplicitInstantiation;
                info.pattern = Some(pattern);
            }
        }
        self.skim_children(node);
        id
    }

    /// The member of a class template pattern that a specialization's member
    /// `name` was instantiated from.
    fn member_pattern(&self, owner: DeclId, name: &str, arity: usize) -> Option<DeclId> {
        let spec = self.model.record(owner)?.specialization.as_ref()?;
        let pattern = self.model.decl(spec.template).template()?.pattern?;
        self.model
            .members_named(pattern, name)
            .into_iter()
            .find(|member| {
                self.model
                    .function(*member)
                    .is_some_and(|info| info.params.len() == arity)
            })
    }

    fn field_decl(&mut self, node: &Value, record: DeclId, access: Access) {
        let name = text(node, "name");
        let key = if name.is_empty() {
            self.anonymous_key(record, "field")
        } else {
            format!("{}/field:{name}", record.index())
        };
        let spelling = qual_type(node).unwrap_or("int").to_string();
        self.upsert(key, record, name, access, false, |model| {
            DeclKind::Variable(VarInfo {
                ty: model.parse_type(&spelling, record),
                is_field: true,
                mangled_name: None,
                offset: None,
            })
        });
    }

    fn var_decl(&mut self, node: &Value, scope: DeclId, access: Access) {
        let name = text(node, "name");
        let owner = node
            .get("parentDeclContextId")
            .and_then(Value::as_str)
            .and_then(|id| self.node_ids.get(id).copied())
            .unwrap_or(scope);
        let key = format!("{}/var:{name}", owner.index());
        let spelling = qual_type(node).unwrap_or("int").to_string();
        let mangled = node.get("mangledName").and_then(Value::as_str).map(str::to_string);
        let access = if owner == scope { access } else { Access::Public };
        let (id, _) = self.upsert(key, owner, name, access, false, |model| {
            DeclKind::Variable(VarInfo {
                ty: model.parse_type(&spelling, owner),
                is_field: false,
                mangled_name: None,
                offset: None,
            })
        });
        if let DeclKind::Variable(info) = &mut self.model.decl_mut(id).kind {
            if mangled.is_some() {
                info.mangled_name = mangled;
            }
        }
    }

    fn enum_decl(&mut self, node: &Value, parent: DeclId, access: Access) {
        let name = text(node, "name");
        let key = if name.is_empty() {
            self.anonymous_key(parent, "enum")
        } else {
            format!("{}/enum:{name}", parent.index())
        };
        let scoped = node.get("scopedEnumTag").is_some();
        let fixed = node
            .get("fixedUnderlyingType")
            .and_then(|ty| ty.get("qualType"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let (id, _) = self.upsert(key, parent, name, access, false, |model| {
            let integer_type = model.builtin(Builtin::Int);
            DeclKind::Enum(EnumInfo {
                scoped,
                integer_type,
                complete: false,
            })
        });
        let enum_ty = self.model.enum_type(id);

        let mut next = 0i64;
        let mut max = 0i64;
        let mut min = 0i64;
        let mut any = false;
        for child in children(node) {
            self.tracker.observe_node(child);
            if kind(child) != "EnumConstantDecl" {
                self.skim_children(child);
                continue;
            }
            any = true;
            let value = constant_value(child).unwrap_or(next);
            next = value.wrapping_add(1);
            max = max.max(value);
            min = min.min(value);
            let constant = text(child, "name");
            let key = format!("{}/const:{constant}", id.index());
            let (constant_id, _) = self.upsert(key, id, constant, Access::None, false, |_| {
                DeclKind::EnumConstant {
                    value,
                    ty: enum_ty,
                }
            });
            if let DeclKind::EnumConstant { value: stored, .. } =
                &mut self.model.decl_mut(constant_id).kind
            {
                *stored = value;
            }
            self.skim_children(child);
        }

        let integer_type = match fixed {
            Some(spelling) => self.model.parse_type(&spelling, parent),
            None if min >= 0 && max > i64::from(i32::MAX) && max <= i64::from(u32::MAX) => {
                self.model.builtin(Builtin::UInt)
            }
            None if max > i64::from(u32::MAX) || min < i64::from(i32::MIN) => {
                self.model.builtin(Builtin::Long)
            }
            None => self.model.builtin(Builtin::Int),
        };
        if let DeclKind::Enum(info) = &mut self.model.decl_mut(id).kind {
            info.integer_type = integer_type;
            info.complete |= any || scoped || node.get("fixedUnderlyingType").is_some();
        }
    }

    fn typedef_decl(
        &mut self,
        node: &Value,
        parent: DeclId,
        access: Access,
        anonymous_record: Option<DeclId>,
    ) {
        let name = text(node, "name");
        let key = format!("{}/typedef:{name}", parent.index());
        let spelling = qual_type(node).unwrap_or("").to_string();
        let names_anonymous = spelling.contains("(unnamed") || spelling.contains("(anonymous");
        self.upsert(key, parent, name, access, false, |model| {
            let underlying = match anonymous_record {
                Some(record) if names_anonymous => model.record_type(record),
                _ => model.parse_type(&spelling, parent),
            };
            DeclKind::Typedef { underlying }
        });
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

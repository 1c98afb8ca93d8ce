//! Whether a function can be wrapped, materializing template bodies on the
//! way.

use cppi_compiler::model::{FunctionInfo, SpecializationKind, TemplatedKind};
use cppi_compiler::{CompilerService, DeclId};

use crate::{Result, SynthesisError};

fn reject(reason: &'static str) -> SynthesisError {
    tracing::error!("make_wrapper: {reason}");
    SynthesisError::Ineligible(reason)
}

fn function_info(service: &dyn CompilerService, func: DeclId) -> Result<FunctionInfo> {
    service
        .model()
        .function(func)
        .cloned()
        .ok_or(SynthesisError::NotAFunction)
}

/// The wording of rejections that depends on how `func` is templated.
struct Wording {
    no_pattern: &'static str,
    no_body: &'static str,
}

const fn wording(kind: TemplatedKind) -> Option<Wording> {
    match kind {
        TemplatedKind::MemberSpecialization => Some(Wording {
            no_pattern: "Cannot make wrapper for a member function instantiation with no pattern!",
            no_body: "Cannot make wrapper for a member function instantiation with no body!",
        }),
        TemplatedKind::FunctionTemplateSpecialization => Some(Wording {
            no_pattern: "Cannot make wrapper for a function template instantiation with no pattern!",
            no_body: "Cannot make wrapper for a function template instantiation with no body!",
        }),
        TemplatedKind::DependentFunctionTemplateSpecialization => Some(Wording {
            no_pattern: "Cannot make wrapper for a dependent function template instantiation with no pattern!",
            no_body: "Cannot make wrapper for a dependent function template instantiation with no body!",
        }),
        TemplatedKind::NonTemplate | TemplatedKind::FunctionTemplate => None,
    }
}

/// Checks that `func` has (or can be given) a definition a trampoline may
/// call. Implicit template instantiations get their body instantiated.
pub fn prepare(service: &dyn CompilerService, func: DeclId) -> Result<()> {
    let mut info = function_info(service, func)?;

    if !info.defined && !info.deleted {
        match info.templated {
            // The body may live in a library.
            TemplatedKind::NonTemplate => {}
            TemplatedKind::FunctionTemplate => {
                return Err(reject("Cannot make wrapper for a function template!"));
            }
            kind => {
                if info.specialization.is_instantiation() && needs_instantiation(service, &info, kind)? {
                    if let Err(err) = service.instantiate_function_definition(func) {
                        tracing::debug!("instantiating {func:?} failed: {err}");
                    }
                    info = function_info(service, func)?;
                    if !info.defined {
                        return Err(reject("Failed to force template instantiation!"));
                    }
                }
            }
        }
    }

    if info.defined || info.deleted {
        check_definition(&info)?;
    }
    Ok(())
}

/// Whether the instantiation pattern has a body that must be instantiated.
/// Patterns that are ordinary functions need nothing.
fn needs_instantiation(
    service: &dyn CompilerService,
    info: &FunctionInfo,
    kind: TemplatedKind,
) -> Result<bool> {
    let Some(wording) = wording(kind) else {
        return Ok(false);
    };
    let Some(pattern) = info.pattern else {
        return Err(reject(wording.no_pattern));
    };
    let pattern = function_info(service, pattern)?;
    let ordinary = pattern.templated == TemplatedKind::NonTemplate
        || (pattern.templated != TemplatedKind::FunctionTemplate
            && matches!(
                pattern.specialization,
                SpecializationKind::Undeclared | SpecializationKind::ExplicitSpecialization
            ));
    if ordinary {
        return Ok(false);
    }
    if !pattern.defined {
        return Err(reject(wording.no_body));
    }
    Ok(info.specialization == SpecializationKind::ImplicitInstantiation)
}

fn check_definition(info: &FunctionInfo) -> Result<()> {
    let (deleted, late_parsed) = match info.templated {
        TemplatedKind::NonTemplate => (
            "Cannot make wrapper for a deleted function!",
            "Cannot make wrapper for a late template parsed function!",
        ),
        TemplatedKind::FunctionTemplate => {
            return Err(reject("Cannot make wrapper for a function template!"));
        }
        TemplatedKind::MemberSpecialization => (
            "Cannot make wrapper for a deleted member function of a specialization!",
            "Cannot make wrapper for a late template parsed member function of a specialization!",
        ),
        TemplatedKind::FunctionTemplateSpecialization => (
            "Cannot make wrapper for a deleted function template specialization!",
            "Cannot make wrapper for a late template parsed function template specialization!",
        ),
        TemplatedKind::DependentFunctionTemplateSpecialization => (
            "Cannot make wrapper for a deleted dependent function template specialization!",
            "Cannot make wrapper for a late template parsed dependent function template specialization!",
        ),
    };
    if info.deleted {
        return Err(reject(deleted));
    }
    if info.late_parsed {
        return Err(reject(late_parsed));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cppi_compiler::model::{Builtin, TagKind, TemplateArg};
    use cppi_compiler::testing::StubCompiler;
    use cppi_compiler::{Model, ModelBuilder};

    fn reason(result: Result<()>) -> &'static str {
        match result {
            Err(SynthesisError::Ineligible(reason)) => reason,
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_declarations() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let defined = builder.function(Model::TRANSLATION_UNIT, "f", int).build();
        let external = builder
            .function(Model::TRANSLATION_UNIT, "g", int)
            .undefined()
            .build();
        let deleted = builder
            .function(Model::TRANSLATION_UNIT, "h", int)
            .deleted()
            .build();
        let late = builder
            .function(Model::TRANSLATION_UNIT, "k", int)
            .late_parsed()
            .build();
        let record = builder.record(Model::TRANSLATION_UNIT, "R", TagKind::Struct);
        builder.finish_record(record);
        let service = StubCompiler::new(model);

        assert!(prepare(&service, defined).is_ok());
        assert!(prepare(&service, external).is_ok());
        assert_eq!(
            reason(prepare(&service, deleted)),
            "Cannot make wrapper for a deleted function!"
        );
        assert_eq!(
            reason(prepare(&service, late)),
            "Cannot make wrapper for a late template parsed function!"
        );
        assert!(matches!(
            prepare(&service, record),
            Err(SynthesisError::NotAFunction)
        ));
    }

    #[test]
    fn test_function_template_is_rejected() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let (_, pattern) = builder.function_template(Model::TRANSLATION_UNIT, "id", &["T"], int);
        let pattern = pattern.undefined().build();
        let service = StubCompiler::new(model);
        assert_eq!(
            reason(prepare(&service, pattern)),
            "Cannot make wrapper for a function template!"
        );
    }

    fn specialization(model: &mut Model, pattern_defined: bool) -> DeclId {
        let mut builder = ModelBuilder::new(model);
        let int = builder.builtin(Builtin::Int);
        let (_, pattern) = builder.function_template(Model::TRANSLATION_UNIT, "id", &["T"], int);
        let pattern = if pattern_defined {
            pattern.build()
        } else {
            pattern.undefined().build()
        };
        let spec = builder
            .function(Model::TRANSLATION_UNIT, "id", int)
            .param("v", int)
            .undefined()
            .build();
        let info = model.function_mut(spec).unwrap();
        info.templated = TemplatedKind::FunctionTemplateSpecialization;
        info.specialization = SpecializationKind::ImplicitInstantiation;
        info.pattern = Some(pattern);
        info.template_args = vec![TemplateArg::ty(int)];
        spec
    }

    #[test]
    fn test_implicit_instantiation_is_materialized() {
        let mut model = Model::new();
        let spec = specialization(&mut model, true);
        let service = StubCompiler::new(model);
        assert!(prepare(&service, spec).is_ok());
        assert!(service.model().function(spec).unwrap().defined);
    }

    #[test]
    fn test_instantiation_without_pattern_body() {
        let mut model = Model::new();
        let spec = specialization(&mut model, false);
        let service = StubCompiler::new(model);
        assert_eq!(
            reason(prepare(&service, spec)),
            "Cannot make wrapper for a function template instantiation with no body!"
        );
    }

    #[test]
    fn test_instantiation_without_pattern() {
        let mut model = Model::new();
        let spec = specialization(&mut model, true);
        model.function_mut(spec).unwrap().pattern = None;
        let service = StubCompiler::new(model);
        assert_eq!(
            reason(prepare(&service, spec)),
            "Cannot make wrapper for a function template instantiation with no pattern!"
        );
    }

    #[test]
    fn test_deleted_member_specialization() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let record = builder.record(Model::TRANSLATION_UNIT, "S", TagKind::Struct);
        let method = builder.function(record, "m", int).deleted().build();
        model.function_mut(method).unwrap().templated = TemplatedKind::MemberSpecialization;
        let service = StubCompiler::new(model);
        assert_eq!(
            reason(prepare(&service, method)),
            "Cannot make wrapper for a deleted member function of a specialization!"
        );
    }
}

use super::{check, declared, resolve};
use crate::{Declaration, Type};
use able_ast::{
    FunctionDefinition, GenericParameter, ImplementationDefinition, InterfaceDefinition, Parameter,
    Program, Span, StructDefinition, TypeAliasDefinition, TypeExpression as TE,
};
use pretty_assertions::assert_eq;

#[test]
fn test_diagnostics_point_at_the_offending_declaration() {
    let program = Program::new()
        .with_item(StructDefinition::new("Point"))
        .with_item(
            ImplementationDefinition::new("Show", TE::simple("Point")).with_span(Span::new(10, 34)),
        );
    let checker = check(&program);

    assert_eq!(checker.diagnostics().len(), 1);
    assert_eq!(checker.diagnostics()[0].node, Some(Span::new(10, 34)));
    assert_eq!(
        checker.messages(),
        vec!["typechecker: impl references unknown interface 'Show'".to_string()]
    );
}

#[test]
fn test_named_implementations_are_not_implicit_candidates() {
    let program = Program::new()
        .with_item(InterfaceDefinition::new("Show"))
        .with_item(StructDefinition::new("Point"))
        .with_item(ImplementationDefinition::new("Show", TE::simple("Point")).named("Fancy"));
    let checker = check(&program);

    assert!(checker.registry().find_named("Fancy").is_some());
    assert_eq!(
        resolve(&checker, &declared(&checker, "Point"), "Show").message(),
        "Point does not implement Show"
    );
}

#[test]
fn test_method_generic_count_must_match_interface() {
    let mapper = InterfaceDefinition::new("Mapper").with_signature(
        FunctionDefinition::signature("apply")
            .with_generic_param(GenericParameter::new("U"))
            .with_param(Parameter::untyped("self"))
            .with_param(Parameter::new("value", TE::simple("U")))
            .with_return(TE::simple("U")),
    );
    let program = Program::new()
        .with_item(mapper)
        .with_item(StructDefinition::new("Point"))
        .with_item(
            ImplementationDefinition::new("Mapper", TE::simple("Point")).with_definition(
                FunctionDefinition::new("apply")
                    .with_param(Parameter::untyped("self"))
                    .with_param(Parameter::new("value", TE::simple("i32")))
                    .with_return(TE::simple("i32")),
            ),
        )
        .with_item(
            ImplementationDefinition::new("Mapper", TE::simple("i32")).with_definition(
                FunctionDefinition::new("apply")
                    .with_generic_param(GenericParameter::new("V"))
                    .with_param(Parameter::untyped("self"))
                    .with_param(Parameter::new("value", TE::simple("V")))
                    .with_return(TE::simple("V")),
            ),
        );
    let checker = check(&program);

    assert_eq!(
        checker.messages(),
        vec!["typechecker: impl Mapper for Point method 'apply' expects 1 generic parameter(s), got 0".to_string()]
    );
    assert_eq!(checker.registry().len(), 2);
}

#[test]
fn test_interface_signatures_use_self() {
    let program = Program::new().with_item(
        InterfaceDefinition::new("Show").with_signature(
            FunctionDefinition::signature("show")
                .with_param(Parameter::untyped("self"))
                .with_param(Parameter::new("other", TE::simple("Self")))
                .with_return(TE::simple("String")),
        ),
    );
    let checker = check(&program);

    let interface = checker.env().lookup_interface("Show").expect("declared");
    let show = &interface.methods["show"];
    assert!(!show.has_default);
    assert_eq!(
        show.function.params,
        vec![Type::type_param("Self"), Type::type_param("Self")]
    );
    assert_eq!(show.function.to_string(), "fn(Self, Self) -> String");
}

#[test]
fn test_generic_alias_is_instantiated_at_use() {
    let program = Program::new()
        .with_item(
            TypeAliasDefinition::new("Pairs", TE::generic("Map", vec![TE::simple("K"), TE::simple("K")]))
                .with_generic_param(GenericParameter::new("K")),
        )
        .with_item(StructDefinition::new("Index").with_field(
            "entries",
            TE::generic("Pairs", vec![TE::simple("String")]),
        ));
    let checker = check(&program);
    assert!(checker.diagnostics().is_empty());

    match checker.env().lookup("Index") {
        Some(Declaration::Struct(index)) => {
            let entries = &index.fields["entries"];
            assert_eq!(entries.to_string(), "Pairs");
            assert_eq!(entries.resolve_alias(), &Type::map(Type::string(), Type::string()));
        }
        other => panic!("expected struct, got {other:?}"),
    }
}

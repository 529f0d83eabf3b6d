use super::{applied, check, declared, resolve, winner};
use crate::{Checker, CollectorOptions, ResolutionOutcome, ResolverOptions, Type};
use able_ast::{
    GenericParameter, ImplementationDefinition, InterfaceDefinition, Program, StructDefinition,
    TypeExpression as TE, WhereClause,
};
use pretty_assertions::assert_eq;

fn point_program() -> Program {
    Program::new()
        .with_item(InterfaceDefinition::new("Show"))
        .with_item(StructDefinition::new("Point"))
}

#[test]
fn test_unique_implementation_binds_self() {
    let program =
        point_program().with_item(ImplementationDefinition::new("Show", TE::simple("Point")));
    let checker = check(&program);
    assert!(checker.diagnostics().is_empty());

    let point = declared(&checker, "Point");
    let outcome = resolve(&checker, &point, "Show");
    let resolution = outcome.resolution().expect("Point implements Show");
    assert_eq!(resolution.label, "impl Show for Point");
    assert_eq!(resolution.substitution.get("Self"), Some(&point));
    assert!(!resolution.is_builtin);
}

#[test]
fn test_identical_targets_are_ambiguous() {
    let program = point_program()
        .with_item(ImplementationDefinition::new("Show", TE::simple("Point")))
        .with_item(ImplementationDefinition::new("Show", TE::simple("Point")));
    let checker = check(&program);

    let outcome = resolve(&checker, &declared(&checker, "Point"), "Show");
    assert_eq!(
        outcome,
        ResolutionOutcome::Ambiguous {
            interface: "Show".to_string(),
            subject: "Point".to_string(),
            candidates: vec!["impl Show for Point".to_string()],
        }
    );
    assert_eq!(
        outcome.message(),
        "ambiguous implementations of Show for Point: impl Show for Point"
    );
}

#[test]
fn test_concrete_target_beats_generic_target() {
    let program = point_program()
        .with_item(ImplementationDefinition::new("Show", TE::simple("T")))
        .with_item(ImplementationDefinition::new("Show", TE::simple("Point")));
    let checker = check(&program);
    assert!(checker.diagnostics().is_empty());

    assert_eq!(
        winner(&resolve(&checker, &declared(&checker, "Point"), "Show")),
        "impl Show for Point"
    );
    assert_eq!(winner(&resolve(&checker, &Type::i32(), "Show")), "impl Show for i32");
}

#[test]
fn test_more_constrained_implementation_wins_in_any_order() {
    let base = Program::new()
        .with_item(InterfaceDefinition::new("Show"))
        .with_item(InterfaceDefinition::new("Display"))
        .with_item(InterfaceDefinition::new("Clone"))
        .with_item(StructDefinition::new("Wrapper").with_generic_param(GenericParameter::new("T")))
        .with_item(ImplementationDefinition::new("Display", TE::simple("i32")))
        .with_item(ImplementationDefinition::new("Display", TE::simple("String")))
        .with_item(ImplementationDefinition::new("Clone", TE::simple("i32")));
    let target = || TE::generic("Wrapper", vec![TE::simple("T")]);
    let loose = ImplementationDefinition::new("Show", target())
        .with_where(WhereClause::new("T", vec![TE::simple("Display")]));
    let strict = ImplementationDefinition::new("Show", target()).with_where(WhereClause::new(
        "T",
        vec![TE::simple("Display"), TE::simple("Clone")],
    ));

    for impls in [
        vec![loose.clone(), strict.clone()],
        vec![strict.clone(), loose.clone()],
    ] {
        let mut program = base.clone();
        for definition in impls {
            program.push(definition);
        }
        let checker = check(&program);
        assert!(checker.diagnostics().is_empty());

        let wrapper_of = |arg: Type| applied(&checker, "Wrapper", vec![arg]);
        assert_eq!(
            winner(&resolve(&checker, &wrapper_of(Type::i32()), "Show")),
            "impl Show for Wrapper i32"
        );
        assert!(resolve(&checker, &wrapper_of(Type::string()), "Show").is_resolved());
        assert_eq!(
            resolve(&checker, &wrapper_of(Type::bool()), "Show").message(),
            "Wrapper bool does not implement Show: impl Show for Wrapper bool: bool does not implement Display"
        );
    }
}

#[test]
fn test_wildcard_self_pattern_accepts_array_targets() {
    let collection = InterfaceDefinition::new("Collection")
        .with_self_pattern(TE::generic("Array", vec![TE::wildcard()]));

    let bare = Program::new()
        .with_item(collection.clone())
        .with_item(StructDefinition::new("Point"))
        .with_item(ImplementationDefinition::new("Collection", TE::simple("Array")))
        .with_item(ImplementationDefinition::new("Collection", TE::simple("Point")));
    let checker = check(&bare);
    assert_eq!(
        checker.messages(),
        vec!["typechecker: impl Collection for Point must match interface self type 'Array _'"
            .to_string()]
    );
    assert!(resolve(&checker, &Type::array(Type::i32()), "Collection").is_resolved());
    assert!(!resolve(&checker, &declared(&checker, "Point"), "Collection").is_resolved());

    let generic = Program::new()
        .with_item(collection)
        .with_item(ImplementationDefinition::new(
            "Collection",
            TE::generic("Array", vec![TE::simple("T")]),
        ));
    let checker = check(&generic);
    assert!(checker.diagnostics().is_empty());
    assert_eq!(
        winner(&resolve(&checker, &Type::array(Type::string()), "Collection")),
        "impl Collection for Array String"
    );
}

#[test]
fn test_user_implementation_beats_builtin() {
    let program = Program::new()
        .with_item(InterfaceDefinition::new("Display"))
        .with_item(ImplementationDefinition::new("Display", TE::simple("i32")));

    let checker = Checker::from_program(&program);
    let user = resolve(&checker, &Type::i32(), "Display");
    assert_eq!(user.resolution().map(|r| r.is_builtin), Some(false));
    let builtin = resolve(&checker, &Type::f64(), "Display");
    assert_eq!(builtin.resolution().map(|r| r.is_builtin), Some(true));

    let neutral = Checker::with_options(
        &program,
        CollectorOptions::default(),
        ResolverOptions {
            prefer_user_implementations: false,
            ..ResolverOptions::default()
        },
    );
    assert!(matches!(
        resolve(&neutral, &Type::i32(), "Display"),
        ResolutionOutcome::Ambiguous { .. }
    ));
}

#[test]
fn test_eq_is_preferred_over_partial_eq() {
    let program = Program::new()
        .with_item(InterfaceDefinition::new("Eq"))
        .with_item(InterfaceDefinition::new("PartialEq"))
        .with_item(StructDefinition::new("Point"))
        .with_item(ImplementationDefinition::new("PartialEq", TE::simple("Point")))
        .with_item(ImplementationDefinition::new("Eq", TE::simple("Point")));
    let checker = check(&program);
    let point = declared(&checker, "Point");

    let outcome = resolve(&checker, &point, "PartialEq");
    let resolution = outcome.resolution().expect("Point implements PartialEq");
    assert_eq!(resolution.label, "impl Eq for Point");
    assert_eq!(resolution.interface_name, "PartialEq");
    assert_eq!(winner(&resolve(&checker, &point, "Eq")), "impl Eq for Point");

    let crowded = program.with_item(ImplementationDefinition::new("PartialEq", TE::simple("Point")));
    let checker = check(&crowded);
    assert_eq!(
        resolve(&checker, &point, "PartialEq"),
        ResolutionOutcome::Ambiguous {
            interface: "PartialEq".to_string(),
            subject: "Point".to_string(),
            candidates: vec![
                "impl Eq for Point".to_string(),
                "impl PartialEq for Point".to_string(),
            ],
        }
    );
}

#[test]
fn test_interface_arguments_select_implementations() {
    let program = Program::new()
        .with_item(InterfaceDefinition::new("Into").with_generic_param(GenericParameter::new("T")))
        .with_item(
            ImplementationDefinition::new("Into", TE::simple("i32"))
                .with_interface_arg(TE::simple("String")),
        );
    let checker = check(&program);
    let resolver = checker.resolver();

    let outcome = resolver.resolve(&Type::i32(), "Into", &[Type::string()]);
    assert_eq!(winner(&outcome), "impl Into String for i32");

    let (provided, detail) =
        checker.implementation_provides_interface(&Type::i32(), "Into", &[Type::bool()]);
    assert!(!provided);
    assert_eq!(
        detail,
        "impl Into String for i32: interface arguments do not match expected Into bool"
    );
}

#[test]
fn test_ambiguity_labels_do_not_depend_on_declaration_order() {
    let with_string =
        ImplementationDefinition::new("Show", TE::union(vec![TE::simple("i32"), TE::simple("String")]));
    let with_bool =
        ImplementationDefinition::new("Show", TE::union(vec![TE::simple("i32"), TE::simple("bool")]));

    let forward = point_program()
        .with_item(with_string.clone())
        .with_item(with_bool.clone());
    let backward = point_program().with_item(with_bool).with_item(with_string);

    let expected = "ambiguous implementations of Show for i32: impl Show for i32 | String, impl Show for i32 | bool";
    assert_eq!(resolve(&check(&forward), &Type::i32(), "Show").message(), expected);
    assert_eq!(resolve(&check(&backward), &Type::i32(), "Show").message(), expected);
}

#[test]
fn test_composite_subjects() {
    let program =
        point_program().with_item(ImplementationDefinition::new("Show", TE::simple("Point")));
    let mut checker = check(&program);
    let point = declared(&checker, "Point");

    assert!(checker.require_interface(&Type::nullable(point.clone()), "Show", &[], None));
    assert!(!checker.require_interface(
        &Type::UnionLiteral(vec![point, Type::i32()]),
        "Show",
        &[],
        None
    ));
    assert_eq!(
        checker.messages(),
        vec!["typechecker: i32 does not implement Show".to_string()]
    );
}

#[test]
fn test_blanket_implementation_over_interface_target() {
    let program = Program::new()
        .with_item(InterfaceDefinition::new("Show"))
        .with_item(InterfaceDefinition::new("Display"))
        .with_item(ImplementationDefinition::new("Display", TE::simple("i32")))
        .with_item(ImplementationDefinition::new("Show", TE::simple("Display")));
    let mut checker = check(&program);
    assert!(checker.diagnostics().is_empty());

    assert!(resolve(&checker, &Type::i32(), "Show").is_resolved());
    assert!(!resolve(&checker, &Type::bool(), "Show").is_resolved());

    let display = declared(&checker, "Display");
    assert!(checker.require_interface(&display, "Display", &[], None));
}

#[test]
fn test_self_referential_obligation_is_cut_off() {
    let program = point_program().with_item(
        ImplementationDefinition::new("Show", TE::simple("T"))
            .with_where(WhereClause::new("T", vec![TE::simple("Show")])),
    );
    let checker = check(&program);

    assert_eq!(
        resolve(&checker, &Type::i32(), "Show").message(),
        "i32 does not implement Show: impl Show for i32: i32 does not implement Show: cyclic obligation while checking i32: Show"
    );
}

#[test]
fn test_constructor_placeholder_binds_subject_constructor() {
    let mappable = InterfaceDefinition::new("Mappable")
        .with_generic_param(GenericParameter::new("A"))
        .with_self_pattern(TE::generic("M", vec![TE::wildcard()]))
        .with_signature(
            able_ast::FunctionDefinition::signature("wrap")
                .with_param(able_ast::Parameter::untyped("self"))
                .with_param(able_ast::Parameter::new("value", TE::simple("A")))
                .with_return(TE::generic("M", vec![TE::simple("A")])),
        );
    let program = Program::new()
        .with_item(StructDefinition::new("Box").with_generic_param(GenericParameter::new("T")))
        .with_item(mappable)
        .with_item(
            ImplementationDefinition::new("Mappable", TE::simple("Box"))
                .with_interface_arg(TE::simple("A"))
                .with_definition(
                    able_ast::FunctionDefinition::new("wrap")
                        .with_param(able_ast::Parameter::untyped("self"))
                        .with_param(able_ast::Parameter::new("value", TE::simple("A")))
                        .with_return(TE::generic("Box", vec![TE::simple("A")])),
                ),
        );
    let checker = check(&program);
    assert!(checker.diagnostics().is_empty(), "{:?}", checker.messages());

    let subject = applied(&checker, "Box", vec![Type::i32()]);
    let outcome = checker.resolver().resolve(&subject, "Mappable", &[Type::i32()]);
    let resolution = outcome.resolution().expect("Box i32 is Mappable");
    assert_eq!(
        resolution.substitution.get("M"),
        Some(&declared(&checker, "Box"))
    );
}

#[test]
fn test_constructor_placeholder_rejects_scalar_targets() {
    let mappable = InterfaceDefinition::new("Mappable")
        .with_generic_param(GenericParameter::new("A"))
        .with_self_pattern(TE::generic("M", vec![TE::wildcard()]));
    let program = Program::new()
        .with_item(StructDefinition::new("Point"))
        .with_item(mappable)
        .with_item(
            ImplementationDefinition::new("Mappable", TE::simple("i32"))
                .with_interface_arg(TE::simple("A")),
        )
        .with_item(
            ImplementationDefinition::new("Mappable", TE::simple("Point"))
                .with_interface_arg(TE::simple("A")),
        );
    let checker = check(&program);

    assert_eq!(
        checker.messages(),
        vec![
            "typechecker: impl Mappable for i32 must match interface self type 'M _'".to_string(),
            "typechecker: impl Mappable for Point must match interface self type 'M _'".to_string(),
        ]
    );
    assert!(checker.registry().is_empty());
}

#[test]
fn test_distinct_restrictions_of_equal_size_are_incomparable() {
    // The widened match scores lower, but specificity never separates restrictions
    let nullable = ImplementationDefinition::new(
        "Show",
        TE::union(vec![TE::nullable(TE::simple("i32")), TE::simple("String")]),
    );
    let plain =
        ImplementationDefinition::new("Show", TE::union(vec![TE::simple("i32"), TE::simple("bool")]));
    let checker = check(&point_program().with_item(nullable).with_item(plain));

    assert_eq!(
        resolve(&checker, &Type::i32(), "Show").message(),
        "ambiguous implementations of Show for i32: impl Show for i32 | bool, impl Show for i32? | String"
    );
}

#[test]
fn test_union_subject_matches_reordered_target() {
    let program = point_program().with_item(ImplementationDefinition::new(
        "Show",
        TE::union(vec![TE::simple("i32"), TE::simple("String")]),
    ));
    let checker = check(&program);

    let subject = Type::UnionLiteral(vec![Type::string(), Type::i32()]);
    assert_eq!(
        winner(&resolve(&checker, &subject, "Show")),
        "impl Show for i32 | String"
    );
}

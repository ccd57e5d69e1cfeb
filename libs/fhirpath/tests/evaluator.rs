//! End-to-end evaluator tests: paths, operators, the function library,
//! variable scopes and temporal determinism.

use kupfer_fhirpath::{Collection, Error, EvalContext, Expression, Value};
use serde_json::json;

fn patient() -> serde_json::Value {
    json!({
        "resourceType": "Patient",
        "id": "example",
        "active": true,
        "name": [
            {"use": "official", "family": "Everyman", "given": ["Adam", "A."]},
            {"use": "nickname", "given": ["Ad"]}
        ],
        "birthDate": "1970-03-30",
        "multipleBirthInteger": 2
    })
}

fn ctx() -> EvalContext {
    let instant = "2024-06-01T12:30:45.123Z"
        .parse::<chrono::DateTime<chrono::FixedOffset>>()
        .unwrap();
    EvalContext::at_instant(instant)
}

fn eval(source: &str) -> Collection {
    let resource = patient();
    let ctx = ctx().with_resource(&resource);
    kupfer_fhirpath::evaluate(&ctx, source, &resource).unwrap()
}

fn eval_err(source: &str) -> Error {
    let resource = patient();
    let ctx = ctx().with_resource(&resource);
    kupfer_fhirpath::evaluate(&ctx, source, &resource).unwrap_err()
}

fn strings(c: &Collection) -> Vec<String> {
    c.iter().map(|v| v.render().unwrap()).collect()
}

fn boolean(c: &Collection) -> Option<bool> {
    match c.first() {
        None => None,
        Some(Value::Boolean(b)) => Some(*b),
        other => panic!("expected boolean, got {other:?}"),
    }
}

#[test]
fn path_navigation() {
    assert_eq!(
        strings(&eval("Patient.name.given")),
        vec!["Adam", "A.", "Ad"]
    );
    assert_eq!(strings(&eval("name.family")), vec!["Everyman"]);
    assert_eq!(eval("name.period"), Collection::empty());
    assert_eq!(strings(&eval("name[1].given")), vec!["Ad"]);
}

#[test]
fn where_and_select() {
    assert_eq!(
        strings(&eval("name.where(use = 'official').family")),
        vec!["Everyman"]
    );
    assert_eq!(
        strings(&eval("name.select(given.first())")),
        vec!["Adam", "Ad"]
    );
    // $index is bound during iteration.
    assert_eq!(
        strings(&eval("name.given.where($index > 0)")),
        vec!["A.", "Ad"]
    );
}

#[test]
fn arithmetic() {
    assert_eq!(eval("1 + 2"), Collection::single(Value::Integer(3)));
    assert_eq!(strings(&eval("1 / 2")), vec!["0.5"]);
    assert_eq!(eval("7 div 2"), Collection::single(Value::Integer(3)));
    assert_eq!(eval("7 mod 2"), Collection::single(Value::Integer(1)));
    assert_eq!(strings(&eval("'a' & 'b'")), vec!["ab"]);
    assert_eq!(strings(&eval("{} & 'b'")), vec!["b"]);
    // Decimal arithmetic is exact: adding and subtracting restores the value.
    assert_eq!(boolean(&eval("(0.1 + 0.2) - 0.2 = 0.1")), Some(true));
    // Empty propagation.
    assert_eq!(eval("1 + {}"), Collection::empty());
}

#[test]
fn arithmetic_errors() {
    assert_eq!(eval_err("1 / 0"), Error::DivisionByZero);
    assert_eq!(eval_err("2147483647 + 1"), Error::ArithmeticOverflow);
    assert!(matches!(
        eval_err("(1 | 2) + 1"),
        Error::SingletonRequired { found: 2 }
    ));
}

#[test]
fn three_valued_logic() {
    assert_eq!(boolean(&eval("true and true")), Some(true));
    assert_eq!(boolean(&eval("{} and false")), Some(false));
    assert_eq!(eval("{} and true"), Collection::empty());
    assert_eq!(boolean(&eval("true or {}")), Some(true));
    assert_eq!(eval("false or {}"), Collection::empty());
    assert_eq!(eval("{} xor true"), Collection::empty());
    assert_eq!(boolean(&eval("false implies {}")), Some(true));
    assert_eq!(eval("true implies {}"), Collection::empty());
}

#[test]
fn equality_and_equivalence() {
    assert_eq!(boolean(&eval("1 = 1.0")), Some(true));
    assert_eq!(boolean(&eval("'abc' != 'abd'")), Some(true));
    assert_eq!(eval("1 = {}"), Collection::empty());
    assert_eq!(boolean(&eval("{} ~ {}")), Some(true));
    assert_eq!(boolean(&eval("'Hello  World' ~ 'hello world'")), Some(true));
    // Differing temporal precision: equality is empty, equivalence false.
    assert_eq!(eval("@2024-12-25 = @2024-12"), Collection::empty());
    assert_eq!(boolean(&eval("@2024-12-25 ~ @2024-12")), Some(false));
    assert_eq!(boolean(&eval("@2024-12-25 < @2025-01-01")), Some(true));
    assert_eq!(eval("@2024-12-25 < @2024-12"), Collection::empty());
}

#[test]
fn fhir_date_strings_compare_with_date_literals() {
    assert_eq!(boolean(&eval("birthDate = @1970-03-30")), Some(true));
    assert_eq!(boolean(&eval("birthDate < @1971-01-01")), Some(true));
}

#[test]
fn membership_and_union() {
    assert_eq!(boolean(&eval("1 in (1 | 2 | 3)")), Some(true));
    assert_eq!(boolean(&eval("(1 | 2) contains 3")), Some(false));
    assert_eq!(eval("(1 | 2 | 2 | 3).count()"), Collection::single(Value::Integer(3)));
    assert_eq!(
        eval("(1 | 2).combine(2 | 3).count()"),
        Collection::single(Value::Integer(4))
    );
}

#[test]
fn existence_functions() {
    assert_eq!(boolean(&eval("name.exists()")), Some(true));
    assert_eq!(boolean(&eval("name.exists(use = 'maiden')")), Some(false));
    assert_eq!(boolean(&eval("telecom.empty()")), Some(true));
    assert_eq!(boolean(&eval("name.given.all($this.length() > 2)")), Some(false));
    assert_eq!(boolean(&eval("name.given.all($this.length() > 1)")), Some(true));
    assert_eq!(boolean(&eval("(1 | 2).subsetOf(1 | 2 | 3)")), Some(true));
    assert_eq!(boolean(&eval("name.given.isDistinct()")), Some(true));
}

#[test]
fn subsetting_functions() {
    assert_eq!(strings(&eval("name.given.first()")), vec!["Adam"]);
    assert_eq!(strings(&eval("name.given.last()")), vec!["Ad"]);
    assert_eq!(strings(&eval("name.given.skip(1).take(1)")), vec!["A."]);
    assert_eq!(strings(&eval("name.given.tail()")), vec!["A.", "Ad"]);
    assert!(matches!(
        eval_err("name.given.single()"),
        Error::SingletonRequired { .. }
    ));
}

#[test]
fn string_functions() {
    assert_eq!(strings(&eval("'hello'.upper()")), vec!["HELLO"]);
    assert_eq!(strings(&eval("'  x  '.trim()")), vec!["x"]);
    assert_eq!(eval("'hello'.indexOf('ll')"), Collection::single(Value::Integer(2)));
    assert_eq!(strings(&eval("'hello'.substring(1, 3)")), vec!["ell"]);
    assert_eq!(boolean(&eval("'hello'.startsWith('he')")), Some(true));
    assert_eq!(boolean(&eval("'hello world'.matches('w.rld')")), Some(true));
    assert_eq!(
        strings(&eval("'a,b,c'.split(',').join('-')")),
        vec!["a-b-c"]
    );
    assert_eq!(eval("'hello'.length()"), Collection::single(Value::Integer(5)));
    assert!(matches!(eval_err("'x'.matches('[')"), Error::InvalidRegex(_)));
}

#[test]
fn conversion_functions() {
    assert_eq!(eval("'42'.toInteger()"), Collection::single(Value::Integer(42)));
    assert_eq!(boolean(&eval("'42'.convertsToInteger()")), Some(true));
    assert_eq!(boolean(&eval("'abc'.convertsToInteger()")), Some(false));
    assert!(matches!(
        eval_err("'abc'.toInteger()"),
        Error::ConversionFailed { .. }
    ));
    assert_eq!(strings(&eval("42.toString()")), vec!["42"]);
    assert_eq!(boolean(&eval("'1970-03-30'.toDate() = @1970-03-30")), Some(true));
    assert_eq!(boolean(&eval("'4 days'.toQuantity() = 4 days")), Some(true));
}

#[test]
fn math_functions() {
    assert_eq!(eval("(-5).abs()"), Collection::single(Value::Integer(5)));
    assert_eq!(eval("1.1.ceiling()"), Collection::single(Value::Integer(2)));
    assert_eq!(eval("2.power(10)"), Collection::single(Value::Integer(1024)));
    assert_eq!(strings(&eval("0.5.round(0)")), vec!["1"]);
    assert_eq!(eval("(-1).sqrt()"), Collection::empty());
}

#[test]
fn type_operations() {
    assert_eq!(boolean(&eval("1 is Integer")), Some(true));
    assert_eq!(boolean(&eval("1 is System.Integer")), Some(true));
    assert_eq!(boolean(&eval("'x' is Integer")), Some(false));
    assert_eq!(eval("(1 | 'a' | 2).ofType(Integer).count()"), Collection::single(Value::Integer(2)));
    assert_eq!(boolean(&eval("$this is Patient")), Some(true));
    assert_eq!(strings(&eval("1.type().name")), vec!["Integer"]);
    assert_eq!(strings(&eval("$this.type().namespace")), vec!["FHIR"]);
}

#[test]
fn quantities() {
    assert_eq!(boolean(&eval("(2 'kg' + 3 'kg') = 5 'kg'")), Some(true));
    assert_eq!(boolean(&eval("1 'a' = 1 year")), Some(true));
    assert_eq!(boolean(&eval("4 days > 2 days")), Some(true));
    // Incomparable units error out of ordering.
    assert!(matches!(eval_err("1 'kg' < 1 'm'"), Error::Type(_)));
}

#[test]
fn temporal_arithmetic() {
    assert_eq!(strings(&eval("(@2024-01-31 + 1 month).toString()")), vec!["2024-02-29"]);
    assert_eq!(strings(&eval("(@2024-06-15 - 7 days).toString()")), vec!["2024-06-08"]);
    assert_eq!(
        strings(&eval("(@2024-06-15T10:00:00Z + 90 minutes).toString()")),
        vec!["2024-06-15T11:30:00Z"]
    );
}

#[test]
fn deterministic_evaluation_instant() {
    assert_eq!(boolean(&eval("now() = now()")), Some(true));
    assert_eq!(boolean(&eval("today() = @2024-06-01")), Some(true));
    assert_eq!(boolean(&eval("timeOfDay() = @T12:30:45.123")), Some(true));
}

#[test]
fn iif_is_lazy() {
    assert_eq!(eval("iif(true, 1, 1/0)"), Collection::single(Value::Integer(1)));
    assert_eq!(eval("iif(false, 1/0, 2)"), Collection::single(Value::Integer(2)));
    assert_eq!(eval("iif(false, 1)"), Collection::empty());
}

#[test]
fn coalesce_short_circuits() {
    assert_eq!(eval("coalesce({}, 2, 1/0)"), Collection::single(Value::Integer(2)));
    assert_eq!(eval("coalesce({}, {})"), Collection::empty());
}

#[test]
fn variables_and_scopes() {
    assert_eq!(
        strings(&eval(
            "defineVariable('prefix', 'Mr. ').name.where(family.exists()).select(%prefix & family)"
        )),
        vec!["Mr. Everyman"]
    );
    // Redefinition in the same scope chain is an error.
    assert!(matches!(
        eval_err("defineVariable('x', 1).defineVariable('x', 2)"),
        Error::Evaluation(_)
    ));
    // A variable defined inside an iteration scope is gone outside it.
    assert!(matches!(
        eval_err("name.select(defineVariable('n', family)).first() & %n"),
        Error::UnknownVariable(_)
    ));
    assert!(matches!(eval_err("%nosuch"), Error::UnknownVariable(_)));
}

#[test]
fn external_constants() {
    assert_eq!(strings(&eval("%ucum")), vec!["http://unitsofmeasure.org"]);
    assert_eq!(strings(&eval("%resource.id")), vec!["example"]);
}

#[test]
fn repeat_expands_transitively() {
    let resource = json!({
        "resourceType": "ValueSet",
        "contains": [
            {"code": "a", "contains": [{"code": "b", "contains": [{"code": "c"}]}]}
        ]
    });
    let ctx = ctx().with_resource(&resource);
    let result =
        kupfer_fhirpath::evaluate(&ctx, "repeat(contains).code", &resource).unwrap();
    assert_eq!(strings(&result), vec!["a", "b", "c"]);
}

#[test]
fn descendants_and_children() {
    assert_eq!(eval("name[0].children().count()"), Collection::single(Value::Integer(4)));
    assert!(eval("descendants().count()").len() == 1);
}

#[test]
fn extension_lookup() {
    let resource = json!({
        "resourceType": "Patient",
        "birthDate": "1970-03-30",
        "_birthDate": {
            "extension": [{
                "url": "http://hl7.org/fhir/StructureDefinition/patient-birthTime",
                "valueDateTime": "1970-03-30T05:40:00Z"
            }]
        }
    });
    let ctx = ctx().with_resource(&resource);
    let result = kupfer_fhirpath::evaluate(
        &ctx,
        "birthDate.extension('http://hl7.org/fhir/StructureDefinition/patient-birthTime').value",
        &resource,
    )
    .unwrap();
    assert_eq!(strings(&result), vec!["1970-03-30T05:40:00Z"]);
}

#[test]
fn choice_types_navigate_by_prefix() {
    let obs = json!({
        "resourceType": "Observation",
        "status": "final",
        "valueQuantity": {"value": 80, "unit": "beats/minute"}
    });
    let ctx = ctx().with_resource(&obs);
    let result = kupfer_fhirpath::evaluate(&ctx, "Observation.value.ofType(Quantity).value", &obs)
        .unwrap();
    assert_eq!(result, Collection::single(Value::Integer(80)));
}

#[test]
fn sort_extension() {
    assert_eq!(
        strings(&eval("name.given.sort()")),
        vec!["A.", "Ad", "Adam"]
    );
    assert_eq!(
        strings(&eval("name.sort(-given.count()).select(given.first())")),
        vec!["Adam", "Ad"]
    );
}

#[test]
fn parse_errors_carry_position() {
    let err = Expression::parse("1 + + +").unwrap_err();
    match err {
        Error::Parse { line, column, .. } => {
            assert_eq!(line, 1);
            assert!(column > 1);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(Expression::parse("name.where(").is_err());
}

#[test]
fn unknown_function_is_an_error() {
    assert!(matches!(eval_err("name.frobnicate()"), Error::UnknownFunction(_)));
}

#[test]
fn trace_passes_through() {
    assert_eq!(
        strings(&eval("name.given.trace('given').first()")),
        vec!["Adam"]
    );
}

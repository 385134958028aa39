/*!
 * Tests for lenient parsing of model output
 */

use aphasia_exercises::errors::GenerationError;
use aphasia_exercises::generation::json::{expect_object, parse_lenient, parse_lenient_as};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct Verbs {
    verbos: Vec<String>,
}

#[test]
fn test_parseLenient_withBareFence_shouldParseBody() {
    let response = "```\n{\"verbos\": [\"cortar\", \"lavar\"]}\n```";

    let value = parse_lenient(response).unwrap();

    assert_eq!(value, json!({"verbos": ["cortar", "lavar"]}));
}

#[test]
fn test_parseLenient_withNewlinesInsideStrings_shouldFlattenThem() {
    let response = "{\"descripcion_adaptado\": \"Primera línea\nsegunda línea\"}";

    let value = parse_lenient(response).unwrap();

    assert_eq!(value["descripcion_adaptado"], "Primera línea segunda línea");
}

#[test]
fn test_parseLenient_withSmartQuotesAndTrailingCommas_shouldRepair() {
    let response = "Aquí tienes el resultado:\n{\u{201C}verbos\u{201D}: [\u{201C}cortar\u{201D}, \u{201C}coser\u{201D},],}\nEspero que sirva.";

    let parsed: Verbs = parse_lenient_as(response).unwrap();

    assert_eq!(parsed.verbos, vec!["cortar", "coser"]);
}

#[test]
fn test_parseLenientAs_withWrongShape_shouldReturnMalformed() {
    let result = parse_lenient_as::<Verbs>("{\"verbos\": \"cortar\"}");

    assert!(matches!(result, Err(GenerationError::MalformedJson(_))));
}

#[test]
fn test_expectObject_withArray_shouldFail() {
    let value = parse_lenient("[1, 2, 3]").unwrap();

    assert!(matches!(expect_object(value), Err(GenerationError::MalformedJson(_))));
}

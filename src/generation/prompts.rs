/*!
 * Prompt builders for the generation workflows.
 *
 * Every prompt asks for a single JSON object and names the exact keys the
 * workflow reads back.
 */

use serde_json::Value;

use crate::database::models::Difficulty;

/// System role for the VNEST pipeline
pub const VNEST_SYSTEM: &str = "Eres experto en generación de ejercicios VNeST.";

/// System role for SR card generation
pub const SR_SYSTEM: &str = "Eres experto en Spaced Retrieval.";

/// System role for personalization
pub const PERSONALIZATION_SYSTEM: &str =
    "Eres un terapeuta experto en lenguaje y afasia. Debes personalizar ejercicios de terapia.";

/// System role for profile structuring
pub const PROFILE_SYSTEM: &str =
    "Eres un asistente experto en estructurar perfiles clínicos de pacientes con afasia.";

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Step 1: candidate verbs for a context
pub fn vnest_verbs_prompt(context: &str) -> String {
    format!(
        r#"Contexto: "{context}".
Genera una lista de 10 verbos transitivos en infinitivo que una persona use con frecuencia en este contexto.
Responde solo con JSON: {{"verbos": ["verbo1", "verbo2", ...]}}"#
    )
}

/// Step 2: classify verbs by difficulty
pub fn vnest_classify_prompt(context: &str, verbs: &[String]) -> String {
    format!(
        r#"Contexto: "{context}".
Clasifica estos verbos según su dificultad para una persona con afasia: {verbs}.
Responde solo con JSON: {{"verbos_clasificados": {{"facil": [...], "medio": [...], "dificil": [...]}}}}"#,
        verbs = verbs.join(", ")
    )
}

/// Step 3: pick a verb of the requested level and build subject-verb-object sentences
pub fn vnest_pairs_prompt(context: &str, classified: &Value, level: Difficulty, sentence_count: usize) -> String {
    format!(
        r#"Contexto: "{context}".
Verbos clasificados por dificultad:
{classified}
Elige un verbo del nivel "{level}" y escribe {sentence_count} oraciones simples sujeto-verbo-objeto con ese verbo.
Responde solo con JSON: {{"verbo_seleccionado": "...", "oraciones": [{{"sujeto": "...", "verbo": "...", "objeto": "..."}}]}}"#,
        classified = pretty(classified)
    )
}

/// Step 4: expand the SVO sentences with where/when/why
pub fn vnest_expansion_prompt(verb: &str, svo_sentences: &Value) -> String {
    format!(
        r#"Verbo: "{verb}".
Oraciones sujeto-verbo-objeto:
{sentences}
Para cada par sujeto-objeto, amplía la oración respondiendo dónde, cuándo y por qué.
Responde solo con JSON: {{"verbo": "{verb}", "pares": [{{"sujeto": "...", "objeto": "...", "expansiones": {{"donde": "...", "cuando": "...", "por_que": "..."}}}}]}}"#,
        sentences = pretty(svo_sentences)
    )
}

/// Step 5: final exercise assembly
pub fn vnest_final_prompt(expansion: &Value, sentence_count: usize) -> String {
    format!(
        r#"A partir de este material:
{material}
Construye el ejercicio VNeST final. Incluye exactamente {sentence_count} oraciones expandidas; algunas deben ser semánticamente incorrectas para que el paciente las detecte.
Responde solo con JSON: {{"verbo": "...", "pares": [{{"sujeto": "...", "objeto": "..."}}], "oraciones": [{{"oracion": "...", "correcta": true}}]}}"#,
        material = pretty(expansion)
    )
}

/// SR cards built from a patient profile
pub fn sr_cards_prompt(profile: &Value) -> String {
    format!(
        r#"Perfil del paciente:
{profile}
Crea tarjetas de Spaced Retrieval con preguntas breves sobre datos personales del perfil (nombres, lugares, rutinas, objetos) y su respuesta exacta.
Responde solo con JSON: {{"cards": [{{"stimulus": "pregunta", "answer": "respuesta"}}]}}"#,
        profile = pretty(profile)
    )
}

/// Personalized copy of a base exercise
pub fn personalization_prompt(base: &Value, profile: &Value, patient_id: &str) -> String {
    format!(
        r#"Ejercicio base:
{base}
Perfil del paciente ({patient_id}):
{profile}
Adapta el ejercicio a los intereses, familia y rutinas del paciente, manteniendo la terapia, el nivel y la estructura.
Para VNEST responde con JSON: {{"verbo": "...", "nivel": "...", "pares": [{{"sujeto": "...", "objeto": "..."}}], "oraciones": [{{"oracion": "...", "correcta": true}}], "descripcion_adaptado": "..."}}
Para SR responde con JSON: {{"pregunta": "...", "rta_correcta": "...", "descripcion_adaptado": "..."}}"#,
        base = pretty(base),
        profile = pretty(profile)
    )
}

/// Structured profile from free text
pub fn profile_structure_prompt(raw_text: &str, patient_id: &str) -> String {
    format!(
        r#"Paciente: {patient_id}
Texto libre:
"{raw_text}"
Estructura la información en un perfil JSON con las secciones "personal", "familia", "rutinas", "objetos" e "intereses". Omite lo que no aparezca en el texto; no inventes datos.
Responde solo con JSON."#
    )
}

/*!
 * Personalization of a base exercise for one patient.
 *
 * The base exercise (general record merged with its detail record) and the
 * patient profile go into one prompt. The adapted content is stored as a
 * private, personalized copy that references the base, then assigned.
 */

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::database::models::{
    Difficulty, ExerciseRecord, SrExerciseRecord, SubjectObjectPair, TherapyType, Visibility, VnestExerciseRecord,
};
use crate::database::Repository;
use crate::errors::{AssignmentError, GenerationError};
use crate::generation::vnest::parse_sentence;
use crate::generation::{json::expect_object, prompts, run_prompt, PromptSettings};
use crate::providers::Provider;

/// Creator recorded on personalized copies
const GENERATED_BY: &str = "IA";

/// Base exercise loaded for personalization
#[derive(Debug, Clone)]
enum BaseExercise {
    Vnest(ExerciseRecord, VnestExerciseRecord),
    Sr(ExerciseRecord, SrExerciseRecord),
}

impl BaseExercise {
    fn general(&self) -> &ExerciseRecord {
        match self {
            BaseExercise::Vnest(general, _) | BaseExercise::Sr(general, _) => general,
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            BaseExercise::Vnest(_, detail) => Some(detail.context.clone()),
            BaseExercise::Sr(_, detail) => detail.context.clone(),
        }
    }

    /// General and detail fields merged into one document
    fn to_document(&self) -> Result<Value, GenerationError> {
        let (general, detail) = match self {
            BaseExercise::Vnest(g, d) => (serde_json::to_value(g), serde_json::to_value(d)),
            BaseExercise::Sr(g, d) => (serde_json::to_value(g), serde_json::to_value(d)),
        };
        let to_map = |v: Result<Value, serde_json::Error>| -> Result<Map<String, Value>, GenerationError> {
            expect_object(v.map_err(|e| GenerationError::InvalidRecord(e.to_string()))?)
        };

        let mut merged = to_map(general)?;
        merged.extend(to_map(detail)?);
        Ok(Value::Object(merged))
    }
}

#[derive(Debug, Deserialize)]
struct PersonalizedVnest {
    #[serde(default, alias = "verb")]
    verbo: Option<String>,
    #[serde(default)]
    nivel: Option<String>,
    #[serde(default)]
    pares: Vec<SubjectObjectPair>,
    #[serde(default)]
    oraciones: Vec<Value>,
    #[serde(default)]
    descripcion_adaptado: String,
}

#[derive(Debug, Deserialize)]
struct PersonalizedSr {
    #[serde(alias = "stimulus")]
    pregunta: String,
    #[serde(alias = "answer")]
    rta_correcta: String,
    #[serde(default)]
    descripcion_adaptado: String,
}

/// Result of a personalization run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalizationOutput {
    pub ok: bool,
    pub saved_id: String,
    /// Model output annotated with ownership and provenance
    pub personalized: Value,
}

/// Runs the personalization pipeline
pub struct PersonalizationWorkflow<'a> {
    provider: &'a dyn Provider,
    repo: Repository,
    settings: PromptSettings,
}

impl<'a> PersonalizationWorkflow<'a> {
    /// Create the workflow with default prompt settings
    pub fn new(provider: &'a dyn Provider, repo: Repository) -> Self {
        Self {
            provider,
            repo,
            settings: PromptSettings::personalization(),
        }
    }

    /// Override prompt settings
    pub fn with_settings(mut self, settings: PromptSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Personalize `exercise_id` for `patient_id` and assign the copy
    pub async fn run(
        &self,
        patient_id: &str,
        exercise_id: &str,
        profile: &Value,
    ) -> Result<PersonalizationOutput, GenerationError> {
        let base = self.load_base(exercise_id).await?;
        let prompt = prompts::personalization_prompt(&base.to_document()?, profile, patient_id);
        let mut result = run_prompt(self.provider, prompts::PERSONALIZATION_SYSTEM, self.settings, prompt).await?;

        check_therapy(&result, base.general().therapy)?;

        let context = base.context();
        let saved_id = match &base {
            BaseExercise::Vnest(general, detail) => self.save_vnest(patient_id, general, detail, &result).await?,
            BaseExercise::Sr(general, detail) => self.save_sr(patient_id, general, detail, &result).await?,
        };

        info!("Personalized {} into {} for {}", exercise_id, saved_id, patient_id);

        if let Value::Object(map) = &mut result {
            map.insert("id".to_string(), json!(saved_id));
            map.insert("terapia".to_string(), json!(base.general().therapy));
            map.insert("id_paciente".to_string(), json!(patient_id));
            map.insert("referencia_base".to_string(), json!(exercise_id));
            map.insert("creado_por".to_string(), json!(GENERATED_BY));
            map.insert("personalizado".to_string(), json!(true));
            map.insert("contexto".to_string(), json!(context));
        }

        Ok(PersonalizationOutput {
            ok: true,
            saved_id,
            personalized: result,
        })
    }

    async fn load_base(&self, exercise_id: &str) -> Result<BaseExercise, GenerationError> {
        let general = self
            .repo
            .get_exercise(exercise_id)
            .await?
            .ok_or_else(|| GenerationError::ExerciseNotFound(exercise_id.to_string()))?;

        let base = match general.therapy {
            TherapyType::Vnest => self
                .repo
                .get_vnest_exercise(exercise_id)
                .await?
                .map(|detail| BaseExercise::Vnest(general, detail)),
            TherapyType::Sr => self
                .repo
                .get_sr_exercise(exercise_id)
                .await?
                .map(|detail| BaseExercise::Sr(general, detail)),
        };

        base.ok_or_else(|| GenerationError::ExerciseNotFound(exercise_id.to_string()))
    }

    fn personalized_general(&self, patient_id: &str, base: &ExerciseRecord, description: String) -> ExerciseRecord {
        let mut general =
            ExerciseRecord::new(base.therapy, Visibility::Private, GENERATED_BY).personalized_from(&base.id, patient_id);
        general.adapted_description = description;
        general
    }

    async fn save_vnest(
        &self,
        patient_id: &str,
        base: &ExerciseRecord,
        base_detail: &VnestExerciseRecord,
        result: &Value,
    ) -> Result<String, GenerationError> {
        let adapted: PersonalizedVnest = serde_json::from_value(result.clone())
            .map_err(|e| GenerationError::MalformedJson(e.to_string()))?;

        let sentences = adapted
            .oraciones
            .into_iter()
            .map(parse_sentence)
            .collect::<Result<Vec<_>, _>>()?;
        if sentences.is_empty() {
            return Err(GenerationError::MissingField("oraciones".to_string()));
        }

        let verb = adapted
            .verbo
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| base_detail.verb.clone());

        let general = self.personalized_general(patient_id, base, adapted.descripcion_adaptado);
        let detail = VnestExerciseRecord {
            id: general.id.clone(),
            level: adapted
                .nivel
                .and_then(|n| n.parse::<Difficulty>().ok())
                .unwrap_or(base_detail.level),
            context: base_detail.context.clone(),
            verb,
            pairs: adapted.pares,
            sentences,
        };

        if detail.context.trim().is_empty() {
            return Err(AssignmentError::MissingContext {
                exercise_id: base.id.clone(),
                therapy: TherapyType::Vnest,
            }
            .into());
        }

        self.repo
            .create_assigned_vnest_exercise(&general, &detail, patient_id)
            .await?;
        Ok(general.id)
    }

    async fn save_sr(
        &self,
        patient_id: &str,
        base: &ExerciseRecord,
        base_detail: &SrExerciseRecord,
        result: &Value,
    ) -> Result<String, GenerationError> {
        let adapted: PersonalizedSr = serde_json::from_value(result.clone())
            .map_err(|e| GenerationError::MalformedJson(e.to_string()))?;
        if adapted.pregunta.trim().is_empty() {
            return Err(GenerationError::MissingField("pregunta".to_string()));
        }

        let general = self.personalized_general(patient_id, base, adapted.descripcion_adaptado);
        let mut detail = SrExerciseRecord::new(general.id.clone(), adapted.pregunta.trim(), adapted.rta_correcta.trim());
        detail.intervals_sec = base_detail.intervals_sec.clone();
        detail.context = base_detail.context.clone();

        self.repo.create_assigned_sr_exercise(&general, &detail, patient_id).await?;
        Ok(general.id)
    }
}

/// A therapy named by the model must parse and match the base
fn check_therapy(result: &Value, expected: TherapyType) -> Result<(), GenerationError> {
    match result.get("terapia").and_then(Value::as_str) {
        None => Ok(()),
        Some(raw) => match raw.parse::<TherapyType>() {
            Ok(therapy) if therapy == expected => Ok(()),
            _ => Err(GenerationError::UnsupportedTherapy(raw.to_string())),
        },
    }
}

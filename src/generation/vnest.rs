/*!
 * VNEST exercise generation.
 *
 * Five prompts in sequence: candidate verbs, difficulty classification,
 * verb and subject-verb-object selection, sentence expansion, and final
 * assembly. The assembled exercise is validated and stored as a general
 * record plus a VNEST detail record.
 */

use log::info;
use serde::Serialize;
use serde_json::Value;

use crate::database::models::{
    Difficulty, ExerciseRecord, ExpandedSentence, SubjectObjectPair, TherapyType, Visibility,
    VnestExerciseRecord, VNEST_SENTENCE_COUNT,
};
use crate::database::Repository;
use crate::errors::GenerationError;
use crate::generation::{prompts, run_prompt, take_field, PromptSettings};
use crate::providers::Provider;

/// Number of subject-verb-object sentences requested in step 3
const SVO_SENTENCE_COUNT: usize = 3;

/// Parameters of a VNEST generation run
#[derive(Debug, Clone, PartialEq)]
pub struct VnestRequest {
    /// Linguistic context, e.g. "Un hospital"
    pub context: String,
    /// Requested difficulty
    pub level: Difficulty,
    /// Creator recorded on the exercise
    pub created_by: String,
    /// Visibility of the stored exercise
    pub visibility: Visibility,
}

impl VnestRequest {
    /// Create a request with the default creator and private visibility
    pub fn new(context: impl Into<String>, level: Difficulty) -> Self {
        Self {
            context: context.into(),
            level,
            created_by: "terapeuta".to_string(),
            visibility: Visibility::Private,
        }
    }

    /// Set the creator
    pub fn created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    /// Set the visibility
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Stored VNEST exercise as returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VnestOutput {
    pub id: String,
    #[serde(rename = "verbo")]
    pub verb: String,
    #[serde(rename = "nivel")]
    pub level: Difficulty,
    #[serde(rename = "context_hint")]
    pub context: String,
    pub reviewed: bool,
    #[serde(rename = "pares")]
    pub pairs: Vec<SubjectObjectPair>,
    #[serde(rename = "oraciones")]
    pub sentences: Vec<ExpandedSentence>,
}

/// Final exercise content before it is stored
#[derive(Debug, Clone, PartialEq)]
pub struct VnestDraft {
    pub verb: String,
    pub pairs: Vec<SubjectObjectPair>,
    pub sentences: Vec<ExpandedSentence>,
}

/// Validate the assembled payload
///
/// The verb falls back to the one selected in step 3. Pairs must be a list
/// and there must be exactly ten sentences.
pub fn validate_final(mut payload: Value, selected_verb: &str) -> Result<VnestDraft, GenerationError> {
    let verb = payload
        .get("verbo")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| selected_verb.trim())
        .to_string();
    if verb.is_empty() {
        return Err(GenerationError::MissingField("verbo".to_string()));
    }

    let pairs = match payload.get_mut("pares").map(Value::take) {
        Some(pairs @ Value::Array(_)) => serde_json::from_value::<Vec<SubjectObjectPair>>(pairs)
            .map_err(|e| GenerationError::MalformedJson(format!("pares: {}", e)))?,
        _ => return Err(GenerationError::MissingField("pares".to_string())),
    };

    let sentences = match payload.get_mut("oraciones").map(Value::take) {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(parse_sentence)
            .collect::<Result<Vec<_>, _>>()?,
        _ => Vec::new(),
    };
    if sentences.len() != VNEST_SENTENCE_COUNT {
        return Err(GenerationError::SentenceCount {
            expected: VNEST_SENTENCE_COUNT,
            found: sentences.len(),
        });
    }

    Ok(VnestDraft { verb, pairs, sentences })
}

/// Sentences arrive either as objects or as bare strings
pub(crate) fn parse_sentence(item: Value) -> Result<ExpandedSentence, GenerationError> {
    match item {
        Value::String(text) => Ok(ExpandedSentence { text, correct: None }),
        other => serde_json::from_value(other).map_err(|e| GenerationError::MalformedJson(format!("oraciones: {}", e))),
    }
}

/// Runs the VNEST pipeline
pub struct VnestWorkflow<'a> {
    provider: &'a dyn Provider,
    repo: Repository,
    settings: PromptSettings,
}

impl<'a> VnestWorkflow<'a> {
    /// Create the workflow with default prompt settings
    pub fn new(provider: &'a dyn Provider, repo: Repository) -> Self {
        Self {
            provider,
            repo,
            settings: PromptSettings::vnest(),
        }
    }

    /// Override prompt settings
    pub fn with_settings(mut self, settings: PromptSettings) -> Self {
        self.settings = settings;
        self
    }

    async fn ask(&self, prompt: String) -> Result<Value, GenerationError> {
        run_prompt(self.provider, prompts::VNEST_SYSTEM, self.settings, prompt).await
    }

    /// Generate, validate and store one exercise
    pub async fn run(&self, request: &VnestRequest) -> Result<VnestOutput, GenerationError> {
        info!("Generating VNEST exercise for '{}' ({})", request.context, request.level);

        // Step 1: candidate verbs
        let mut out1 = self.ask(prompts::vnest_verbs_prompt(&request.context)).await?;
        let verbs: Vec<String> = serde_json::from_value(take_field(&mut out1, "verbos")?)
            .map_err(|e| GenerationError::MalformedJson(format!("verbos: {}", e)))?;

        // Step 2: difficulty classification
        let mut out2 = self.ask(prompts::vnest_classify_prompt(&request.context, &verbs)).await?;
        let classified = take_field(&mut out2, "verbos_clasificados")?;

        // Step 3: verb and SVO sentences
        let mut out3 = self
            .ask(prompts::vnest_pairs_prompt(&request.context, &classified, request.level, SVO_SENTENCE_COUNT))
            .await?;
        let selected_verb = take_field(&mut out3, "verbo_seleccionado")?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GenerationError::MissingField("verbo_seleccionado".to_string()))?;
        let svo_sentences = take_field(&mut out3, "oraciones")?;
        info!("Selected verb '{}' from {} candidates", selected_verb, verbs.len());

        // Step 4: expansion and final assembly
        let expansion = self.ask(prompts::vnest_expansion_prompt(&selected_verb, &svo_sentences)).await?;
        let out5 = self.ask(prompts::vnest_final_prompt(&expansion, VNEST_SENTENCE_COUNT)).await?;
        let draft = validate_final(out5, &selected_verb)?;

        // Step 5: persist
        self.save(request, draft).await
    }

    async fn save(&self, request: &VnestRequest, draft: VnestDraft) -> Result<VnestOutput, GenerationError> {
        let general = ExerciseRecord::new(TherapyType::Vnest, request.visibility, &request.created_by);
        let detail = VnestExerciseRecord {
            id: general.id.clone(),
            level: request.level,
            context: request.context.clone(),
            verb: draft.verb,
            pairs: draft.pairs,
            sentences: draft.sentences,
        };

        self.repo.create_vnest_exercise(&general, &detail).await?;
        info!("Stored VNEST exercise {} ({} / {})", detail.id, detail.context, detail.verb);

        Ok(VnestOutput {
            id: detail.id,
            verb: detail.verb,
            level: detail.level,
            context: detail.context,
            reviewed: general.reviewed,
            pairs: detail.pairs,
            sentences: detail.sentences,
        })
    }
}

/*!
 * Mermaid export of the workflow pipelines.
 */

use anyhow::{anyhow, Context, Result};
use log::info;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default output directory for exported graphs
pub const DEFAULT_GRAPH_DIR: &str = "graphs";

/// The generation workflows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    Vnest,
    Sr,
    Personalization,
    Profile,
}

impl WorkflowKind {
    /// All workflows
    pub const ALL: [WorkflowKind; 4] = [
        WorkflowKind::Vnest,
        WorkflowKind::Sr,
        WorkflowKind::Personalization,
        WorkflowKind::Profile,
    ];

    /// Pipeline steps as (node id, label)
    pub fn steps(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            WorkflowKind::Vnest => &[
                ("step1_generate_verbs", "step1_generate_verbs: verbos del contexto"),
                ("step2_classify_verbs", "step2_classify_verbs: clasifica por dificultad"),
                ("step3_select_pairs", "step3_select_pairs: verbo y oraciones SVO"),
                ("step4_expand_sentences", "step4_expand_sentences: expansión y ensamblado"),
                ("step5_save_db", "step5_save_db: guarda el ejercicio"),
            ],
            WorkflowKind::Sr => &[
                ("build_prompt", "build_prompt: genera prompt SR"),
                ("call_model", "call_model: invoca el modelo"),
                ("parse_and_validate", "parse_and_validate: procesa JSON"),
                ("persist", "persist: guarda y asigna tarjetas"),
            ],
            WorkflowKind::Personalization => &[
                ("load_base", "load_base: carga el ejercicio base"),
                ("build_prompt", "build_prompt: combina ejercicio y perfil"),
                ("call_model", "call_model: invoca el modelo"),
                ("persist", "persist: guarda la copia personalizada"),
                ("assign", "assign: asigna al paciente"),
            ],
            WorkflowKind::Profile => &[
                ("generate_prompt", "generate_prompt: crea prompt con texto no estructurado"),
                ("call_model", "call_model: devuelve perfil estructurado JSON"),
                ("persist_profile", "persist_profile: (opcional) guarda el perfil"),
            ],
        }
    }

    /// Default file name for the exported graph
    pub fn file_name(&self) -> String {
        format!("langgraph_{}.mmd", self)
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowKind::Vnest => write!(f, "vnest"),
            WorkflowKind::Sr => write!(f, "sr"),
            WorkflowKind::Personalization => write!(f, "personalization"),
            WorkflowKind::Profile => write!(f, "profile_structure"),
        }
    }
}

impl FromStr for WorkflowKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vnest" => Ok(WorkflowKind::Vnest),
            "sr" => Ok(WorkflowKind::Sr),
            "personalization" | "personalizacion" => Ok(WorkflowKind::Personalization),
            "profile" | "profile_structure" => Ok(WorkflowKind::Profile),
            _ => Err(anyhow!("Unknown workflow: {}", s)),
        }
    }
}

/// Render a workflow as a Mermaid `flowchart TD`
pub fn render_mermaid(kind: WorkflowKind) -> String {
    let mut lines = vec!["flowchart TD".to_string()];
    let mut previous = "START([Start])".to_string();

    for (id, label) in kind.steps() {
        lines.push(format!("  {} --> {}[\"{}\"]", previous, id, label));
        previous = id.to_string();
    }
    lines.push(format!("  {} --> END([Finish])", previous));

    lines.join("\n")
}

/// Write the graph to `out_path` (or `graphs/<default name>`) and return its absolute path
pub fn export_mermaid(kind: WorkflowKind, out_path: Option<&Path>) -> Result<PathBuf> {
    let path = match out_path {
        Some(path) => path.to_path_buf(),
        None => Path::new(DEFAULT_GRAPH_DIR).join(kind.file_name()),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create graph directory: {:?}", parent))?;
        }
    }

    fs::write(&path, render_mermaid(kind)).with_context(|| format!("Failed to write graph: {:?}", path))?;
    let absolute = fs::canonicalize(&path).with_context(|| format!("Failed to resolve graph path: {:?}", path))?;

    info!("Mermaid graph for {} exported to {:?}", kind, absolute);
    Ok(absolute)
}

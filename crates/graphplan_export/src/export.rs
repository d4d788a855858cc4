// SPDX-License-Identifier: MIT OR Apache-2.0
//! Loading graphs, compiling them and writing the exported workflow.

use crate::settings::ExportSettings;
use graphplan_graph::{BehaviorRegistry, CompileError, CompiledPrompt, Graph, PlanCompiler};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Error during export
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RON error
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// Compilation failed
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// Graph file extension not recognised
    #[error("Unsupported graph format: {0}")]
    UnsupportedFormat(PathBuf),
}

/// On-disk graph format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    /// `.json`
    Json,
    /// `.ron`
    Ron,
}

impl GraphFormat {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(Self::Json),
            "ron" => Some(Self::Ron),
            _ => None,
        }
    }
}

/// Read a graph from a `.json` or `.ron` file
pub async fn load_graph(path: &Path) -> Result<Graph, ExportError> {
    let format =
        GraphFormat::from_path(path).ok_or_else(|| ExportError::UnsupportedFormat(path.to_path_buf()))?;
    let content = tokio::fs::read_to_string(path).await?;
    let graph = match format {
        GraphFormat::Json => serde_json::from_str(&content)?,
        GraphFormat::Ron => Graph::from_ron(&content)?,
    };
    Ok(graph)
}

/// Apply the output naming rules: blank names cancel, `.json` is appended
/// unless already present.
pub fn normalize_filename(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    if name.to_lowercase().ends_with(".json") {
        Some(name.to_string())
    } else {
        Some(format!("{name}.json"))
    }
}

/// Ask for the output file name.
///
/// An empty line accepts `default`; end of input cancels.
pub async fn prompt_filename<R, W>(default: &str, input: &mut R, output: &mut W) -> Result<Option<String>, ExportError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output
        .write_all(format!("Save workflow as [{default}]: ").as_bytes())
        .await?;
    output.flush().await?;

    let mut answer = String::new();
    if input.read_line(&mut answer).await? == 0 {
        return Ok(None);
    }
    let answer = answer.trim();
    Ok(normalize_filename(if answer.is_empty() { default } else { answer }))
}

/// Compile a graph with the built-in behaviours and the given settings
pub async fn compile_graph(graph: &mut Graph, settings: &ExportSettings) -> Result<CompiledPrompt, ExportError> {
    let compiler = PlanCompiler::new(BehaviorRegistry::with_builtins()).with_options(settings.compile_options());
    Ok(compiler.compile(graph).await?)
}

/// Write a JSON value with two-space indentation
pub async fn write_json(path: &Path, value: &Value) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Load, compile and write the workflow package to `output`
pub async fn export_workflow(graph_path: &Path, output: &Path, settings: &ExportSettings) -> Result<CompiledPrompt, ExportError> {
    let mut graph = load_graph(graph_path).await?;
    let compiled = compile_graph(&mut graph, settings).await?;
    write_json(output, &compiled.workflow).await?;
    tracing::info!(
        "Exported {} plan entries from {} to {}",
        compiled.output.len(),
        graph_path.display(),
        output.display()
    );
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphplan_graph::{InputSlot, Node, NodeId, OutputSlot, Widget};
    use serde_json::json;

    fn sample_graph() -> Graph {
        let mut graph = Graph::new();
        let a = graph.add_node(
            Node::new(NodeId::from(1), "NodeA")
                .with_output(OutputSlot::new("STRING", "STRING"))
                .with_widget(Widget::new("text", "hello")),
        );
        let b = graph.add_node(Node::new(NodeId::from(2), "NodeB").with_input(InputSlot::new("in", "STRING")));
        graph.connect(&a, 0, &b, 0).unwrap();
        graph
    }

    #[test]
    fn test_normalize_filename() {
        assert_eq!(normalize_filename("out"), Some("out.json".to_string()));
        assert_eq!(normalize_filename("out.JSON"), Some("out.JSON".to_string()));
        assert_eq!(normalize_filename("  run.json "), Some("run.json".to_string()));
        assert_eq!(normalize_filename("archive.json.bak"), Some("archive.json.bak.json".to_string()));
        assert_eq!(normalize_filename("   "), None);
    }

    #[test]
    fn test_graph_format_from_extension() {
        assert_eq!(GraphFormat::from_path(Path::new("a/b.JSON")), Some(GraphFormat::Json));
        assert_eq!(GraphFormat::from_path(Path::new("b.ron")), Some(GraphFormat::Ron));
        assert_eq!(GraphFormat::from_path(Path::new("b.yaml")), None);
    }

    #[tokio::test]
    async fn test_prompt_accepts_default_and_answers() {
        let mut shown: Vec<u8> = Vec::new();
        let mut input: &[u8] = b"\n";
        let name = prompt_filename("workflow_merged.json", &mut input, &mut shown).await.unwrap();
        assert_eq!(name.as_deref(), Some("workflow_merged.json"));
        assert_eq!(String::from_utf8(shown).unwrap(), "Save workflow as [workflow_merged.json]: ");

        let mut input: &[u8] = b"portrait\n";
        let name = prompt_filename("workflow_merged.json", &mut input, &mut Vec::<u8>::new()).await.unwrap();
        assert_eq!(name.as_deref(), Some("portrait.json"));
    }

    #[tokio::test]
    async fn test_prompt_cancels_at_end_of_input() {
        let mut input: &[u8] = b"";
        let name = prompt_filename("workflow_merged.json", &mut input, &mut Vec::<u8>::new()).await.unwrap();
        assert!(name.is_none());
    }

    #[tokio::test]
    async fn test_export_writes_workflow_package() {
        let dir = tempfile::tempdir().unwrap();
        let graph_path = dir.path().join("graph.json");
        let output = dir.path().join("workflow_merged.json");
        std::fs::write(&graph_path, serde_json::to_string(&sample_graph()).unwrap()).unwrap();

        export_workflow(&graph_path, &output, &ExportSettings::default()).await.unwrap();

        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.contains("\n  \""));
        let workflow: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(
            workflow["extra"]["api"],
            json!({
                "1": {"inputs": {"text": "hello"}, "class_type": "NodeA", "title": "NodeA"},
                "2": {"inputs": {"in": ["1", 0]}, "class_type": "NodeB", "title": "NodeB"},
            })
        );
        assert_eq!(workflow["extra"]["inputs"], json!({}));
        assert_eq!(workflow["extra"]["outputs"], json!({}));
    }

    #[tokio::test]
    async fn test_ron_graphs_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.ron");
        std::fs::write(&path, sample_graph().to_ron().unwrap()).unwrap();

        let mut graph = load_graph(&path).await.unwrap();
        let compiled = compile_graph(&mut graph, &ExportSettings::default()).await.unwrap();
        assert_eq!(compiled.output.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_extension_is_rejected() {
        let result = load_graph(Path::new("graph.txt")).await;
        assert!(matches!(result, Err(ExportError::UnsupportedFormat(_))));
    }
}

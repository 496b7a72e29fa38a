//! Transformer configuration, passed from the host as JSON.

use crate::diagnostics::TransformError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MACRO_MODULE: &str = "rbxts-transformer-yeagar";

/// Which node a recognized macro call turns into. One shape per build.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum RewriteShape {
    /// `$path("src/a.ts")` → `["Shared", "a"]`
    #[default]
    Inline,
    /// `Yeagar.addPath("src/a.ts")` → `Yeagar._addPath(["Shared", "a"])`
    RuntimeCall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformerConfig {
    pub macro_module: String,
    /// Export name of the path macro function (`import { $path } from ...`).
    pub path_export: String,
    /// Method recognized on default/namespace imports (`Yeagar.addPath(...)`).
    pub namespace_method: String,
    /// Method the runtime-call shape rewrites to.
    pub runtime_method: String,
    pub source_root: String,
    pub output_root: String,
    pub rewrite_shape: RewriteShape,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        TransformerConfig {
            macro_module: DEFAULT_MACRO_MODULE.to_string(),
            path_export: "$path".to_string(),
            namespace_method: "addPath".to_string(),
            runtime_method: "_addPath".to_string(),
            source_root: "src".to_string(),
            output_root: "out".to_string(),
            rewrite_shape: RewriteShape::Inline,
        }
    }
}

impl TransformerConfig {
    pub fn from_json(json: &str) -> Result<Self, TransformError> {
        serde_json::from_str(json)
            .map_err(|e| TransformError::configuration(format!("Invalid transformer config: {}", e)))
    }
}

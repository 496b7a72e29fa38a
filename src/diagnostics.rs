#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_CONFIG: &str = "Y-ERR-CONFIG";
pub const ERR_SYNTAX: &str = "Y-ERR-SYNTAX";
pub const ERR_USAGE_ARITY: &str = "Y-ERR-USAGE-ARITY";
pub const ERR_USAGE_LITERAL: &str = "Y-ERR-USAGE-LITERAL";
pub const ERR_USAGE_RUNTIME: &str = "Y-ERR-USAGE-RUNTIME";
pub const ERR_RESOLVE: &str = "Y-ERR-RESOLVE";

fn get_guarantee(code: &str) -> &'static str {
    match code {
        ERR_CONFIG => "The project layout is loaded once, before any file is transformed.",
        ERR_SYNTAX => "Only units the parser accepts are transformed.",
        ERR_USAGE_ARITY => "The path macro takes exactly one argument.",
        ERR_USAGE_LITERAL => "The path macro only accepts string literals.",
        ERR_USAGE_RUNTIME => "A runtime path call only targets a binding the unit imports.",
        ERR_RESOLVE => "Every macro call resolves to a location in the project tree.",
        _ => "Unknown error code.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    /// Converts a byte offset into a 1-based line/column pair.
    pub fn from_offset(file: &str, source: &str, offset: u32) -> Self {
        let offset = (offset as usize).min(source.len());
        let before = &source[..offset];
        let line = before.matches('\n').count() as u32 + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() as u32 + 1;
        SourceLocation {
            file: file.to_string(),
            line,
            column,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub guarantee: String,
    pub location: Option<SourceLocation>,
    pub hints: Vec<String>,
}

impl Diagnostic {
    pub fn new(code: &str, message: &str) -> Self {
        Diagnostic {
            code: code.to_string(),
            message: message.to_string(),
            guarantee: get_guarantee(code).to_string(),
            location: None,
            hints: vec![],
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{} [{}] {}", loc, self.code, self.message)?,
            None => write!(f, "[{}] {}", self.code, self.message)?,
        }
        for hint in &self.hints {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFORM ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Every failure of a run. None of them is recovered locally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    /// Bad or missing manifest / compiler options. Raised before any unit is traversed.
    #[error("configuration error: {0}")]
    Configuration(Diagnostic),
    /// Malformed macro call, or a unit that does not parse.
    #[error("usage error: {0}")]
    Usage(Diagnostic),
    /// Well-formed macro call whose path has no mount coverage.
    #[error("resolution error: {0}")]
    Resolution(Diagnostic),
}

impl TransformError {
    pub fn configuration(message: impl AsRef<str>) -> Self {
        TransformError::Configuration(Diagnostic::new(ERR_CONFIG, message.as_ref()))
    }

    pub fn diagnostic(&self) -> &Diagnostic {
        match self {
            TransformError::Configuration(d)
            | TransformError::Usage(d)
            | TransformError::Resolution(d) => d,
        }
    }

    pub fn code(&self) -> &str {
        &self.diagnostic().code
    }
}

// Error reports
//
// An ErrorReport pairs the error being reported with an optional, best-effort
// ErrorContext derived from the taxonomy. Reports are shared read-only
// between backends.

use std::sync::Arc;

use serde::Serialize;

use crate::taxonomy::{ErrorCategory, PluginError, SmelterError};

/// Which family an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "SmelterError")]
    DomainError,
    #[serde(rename = "SmelterPluginError")]
    PluginError,
    #[serde(rename = "Error")]
    GenericError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DomainError => "SmelterError",
            ErrorKind::PluginError => "SmelterPluginError",
            ErrorKind::GenericError => "Error",
        }
    }
}

/// Structured enrichment attached to an error report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    #[serde(rename = "errorType")]
    pub kind: ErrorKind,
    #[serde(rename = "isSmelterError")]
    pub is_domain_error: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_name: Option<String>,
    #[serde(rename = "number", skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ErrorContext {
    /// Minimal context for an error outside the taxonomy
    pub fn generic(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::GenericError,
            is_domain_error: false,
            message: message.into(),
            plugin_name: None,
            code: None,
            category: None,
            name: None,
            context_message: None,
            title: None,
            description: None,
        }
    }

    /// Context for a Smelter error; registry fields are filled in when the
    /// code is known
    pub fn domain(error: &SmelterError) -> Self {
        let descriptor = error.descriptor();
        Self {
            kind: ErrorKind::DomainError,
            is_domain_error: true,
            message: error.message.clone(),
            plugin_name: None,
            code: Some(error.code),
            category: ErrorCategory::for_code(error.code).copied(),
            name: descriptor.map(|d| d.name.to_string()),
            context_message: error.context_message.clone(),
            title: descriptor.map(|d| d.title.to_string()),
            description: descriptor.map(|d| d.description.to_string()),
        }
    }

    pub fn plugin(error: &PluginError) -> Self {
        Self {
            kind: ErrorKind::PluginError,
            is_domain_error: true,
            message: error.message.clone(),
            plugin_name: Some(error.plugin_name.clone()),
            ..Self::generic(String::new())
        }
    }

    /// Classify an arbitrary error, looking through its whole source chain
    pub fn from_error(error: &anyhow::Error) -> Self {
        if let Some(smelter) = error
            .chain()
            .find_map(|e| e.downcast_ref::<SmelterError>())
        {
            return Self::domain(smelter);
        }

        if let Some(plugin) = error.chain().find_map(|e| e.downcast_ref::<PluginError>()) {
            return Self::plugin(plugin);
        }

        Self::generic(error.to_string())
    }
}

/// One error, ready to be sent to every crash-reporting backend
#[derive(Debug, Clone)]
pub struct ErrorReport {
    error: Arc<anyhow::Error>,
    context: Option<ErrorContext>,
}

impl ErrorReport {
    /// A report with no enrichment
    pub fn new(error: anyhow::Error) -> Self {
        Self {
            error: Arc::new(error),
            context: None,
        }
    }

    /// A report enriched through the taxonomy
    pub fn contextualized(error: anyhow::Error) -> Self {
        let context = ErrorContext::from_error(&error);
        Self {
            error: Arc::new(error),
            context: Some(context),
        }
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        self.context.as_ref()
    }

    /// Top-level message of the error
    pub fn message(&self) -> String {
        self.error.to_string()
    }

    /// Name reported as the exception type
    pub fn error_type(&self) -> &'static str {
        self.context
            .as_ref()
            .map(|context| context.kind.as_str())
            .unwrap_or(ErrorKind::GenericError.as_str())
    }

    /// Messages of the error and each of its sources, outermost first
    pub fn chain(&self) -> Vec<String> {
        self.error.chain().map(|e| e.to_string()).collect()
    }
}

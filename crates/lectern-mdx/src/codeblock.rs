//! Code sample extraction.

use serde::Serialize;

/// Language tag of a code sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    Jsx,
    TypeScript,
    Tsx,
    Html,
    Css,
    Json,
    Bash,
    #[default]
    Text,
}

impl Language {
    /// Parse language from code fence info string.
    pub fn from_info(info: &str) -> Self {
        let lang = info.split_whitespace().next().unwrap_or("");
        match lang.to_lowercase().as_str() {
            "js" | "javascript" | "mjs" => Self::JavaScript,
            "jsx" => Self::Jsx,
            "ts" | "typescript" => Self::TypeScript,
            "tsx" => Self::Tsx,
            "html" => Self::Html,
            "css" => Self::Css,
            "json" => Self::Json,
            "bash" | "sh" | "shell" | "console" => Self::Bash,
            _ => Self::Text,
        }
    }

    /// Name used in class names (`language-js`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JavaScript => "js",
            Self::Jsx => "jsx",
            Self::TypeScript => "ts",
            Self::Tsx => "tsx",
            Self::Html => "html",
            Self::Css => "css",
            Self::Json => "json",
            Self::Bash => "bash",
            Self::Text => "text",
        }
    }
}

/// A literal code sample embedded in a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeSample {
    /// Language tag
    pub language: Language,

    /// Optional filename hint from info string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Remaining formatting hints from the info string
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,

    /// Sample text
    pub text: String,

    /// Line number where the fence starts (1-indexed)
    #[serde(skip)]
    pub line_number: usize,
}

impl CodeSample {
    /// Create a code sample from a fence info string.
    pub fn from_info(info: &str, text: String, line_number: usize) -> Self {
        Self {
            language: Language::from_info(info),
            filename: extract_filename(info),
            hints: extract_hints(info),
            text,
            line_number,
        }
    }
}

/// Extract filename from code fence info string if present.
///
/// Supports formats like:
/// - `js filename="flowers-model.js"`
/// - `js file=flowers-model.js`
pub fn extract_filename(info: &str) -> Option<String> {
    if let Some(start) = info.find("filename=\"") {
        let rest = &info[start + 10..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }

    if let Some(start) = info.find("file=") {
        let rest = &info[start + 5..];
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let filename = rest[..end].trim_matches('"');
        if !filename.is_empty() {
            return Some(filename.to_string());
        }
    }

    None
}

/// Words after the language that are not filename attributes.
fn extract_hints(info: &str) -> Vec<String> {
    let mut words = info.split_whitespace();
    words.next();

    let mut hints = Vec::new();
    let mut in_quoted = false;
    for word in words {
        if in_quoted {
            in_quoted = !word.ends_with('"');
            continue;
        }
        if word.starts_with("filename=\"") {
            in_quoted = !word[10..].contains('"');
            continue;
        }
        if word.starts_with("file=") || word.starts_with("filename=") {
            continue;
        }
        hints.push(word.to_string());
    }
    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_language() {
        assert_eq!(Language::from_info("jsx"), Language::Jsx);
        assert_eq!(Language::from_info("typescript"), Language::TypeScript);
        assert_eq!(Language::from_info("js numbered"), Language::JavaScript);
        assert_eq!(Language::from_info("sh"), Language::Bash);
        assert_eq!(Language::from_info(""), Language::Text);
        assert_eq!(Language::from_info("unknown"), Language::Text);
    }

    #[test]
    fn extracts_filename() {
        assert_eq!(
            extract_filename("js filename=\"flowers-model.js\""),
            Some("flowers-model.js".to_string())
        );
        assert_eq!(
            extract_filename("js file=js/main.js numbered"),
            Some("js/main.js".to_string())
        );
        assert_eq!(extract_filename("js numbered"), None);
    }

    #[test]
    fn collects_hints_without_filename() {
        let sample = CodeSample::from_info(
            "js file=main.js numbered highlight=2",
            "x".to_string(),
            3,
        );

        assert_eq!(sample.language, Language::JavaScript);
        assert_eq!(sample.filename.as_deref(), Some("main.js"));
        assert_eq!(sample.hints, vec!["numbered", "highlight=2"]);
        assert_eq!(sample.line_number, 3);
    }

    #[test]
    fn serializes_without_empty_fields() {
        let sample = CodeSample::from_info("bash", "npm i".to_string(), 1);
        let json = serde_json::to_string(&sample).unwrap();

        assert_eq!(json, r#"{"language":"bash","text":"npm i"}"#);
    }
}

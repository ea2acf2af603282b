//! Fragment and target types shared by every pipeline stage.
//!
//! All of these are plain values: built inside one `process` call and
//! dropped when it returns.

use serde::{Deserialize, Serialize};

/// One code segment as found in the input, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFragment {
    /// Language tag written after the opening fence, if any (`html`, `js`, ...).
    pub declared_tag: Option<String>,
    /// Fence body, without the fence lines.
    pub content: String,
    /// Position among the fragments of the same input (0-based).
    pub source_order: usize,
}

/// Common view over raw and classified fragments.
pub trait Fragment {
    fn content(&self) -> &str;

    fn source_order(&self) -> usize;

    /// Length in characters, used when picking a primary fragment.
    fn char_len(&self) -> usize {
        self.content().chars().count()
    }
}

impl RawFragment {
    pub fn new(declared_tag: Option<&str>, content: impl Into<String>, source_order: usize) -> Self {
        Self {
            declared_tag: declared_tag.map(str::to_string),
            content: content.into(),
            source_order,
        }
    }

    /// Normalised tag: trimmed and lowercased, `None` when empty.
    pub fn tag(&self) -> Option<String> {
        self.declared_tag
            .as_deref()
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
    }
}

/// Browser-side kind of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Html,
    Css,
    Javascript,
    Unknown,
}

impl FragmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentKind::Html => "html",
            FragmentKind::Css => "css",
            FragmentKind::Javascript => "javascript",
            FragmentKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw fragment together with its classified kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedFragment {
    #[serde(flatten)]
    pub raw: RawFragment,
    pub kind: FragmentKind,
}

impl<F: Fragment + ?Sized> Fragment for &F {
    fn content(&self) -> &str {
        (**self).content()
    }

    fn source_order(&self) -> usize {
        (**self).source_order()
    }
}

impl Fragment for RawFragment {
    fn content(&self) -> &str {
        &self.content
    }

    fn source_order(&self) -> usize {
        self.source_order
    }
}

impl Fragment for ClassifiedFragment {
    fn content(&self) -> &str {
        &self.raw.content
    }

    fn source_order(&self) -> usize {
        self.raw.source_order
    }
}

/// Interpreter family chosen for a whole input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTarget {
    Html,
    Python,
    Node,
    Bash,
}

impl ExecutionTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionTarget::Html => "html",
            ExecutionTarget::Python => "python",
            ExecutionTarget::Node => "node",
            ExecutionTarget::Bash => "bash",
        }
    }

    /// Interpreter binary used to run this target, `None` for `Html`.
    pub fn interpreter(&self) -> Option<&'static str> {
        match self {
            ExecutionTarget::Html => None,
            ExecutionTarget::Python => Some("python3"),
            ExecutionTarget::Node => Some("node"),
            ExecutionTarget::Bash => Some("bash"),
        }
    }
}

impl std::fmt::Display for ExecutionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file of a multi-file generation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    #[serde(alias = "name")]
    pub path: String,
    pub code: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code: code.into(),
        }
    }
}

/// Payload of one chat message handed to the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    #[serde(default)]
    pub files: Vec<SourceFile>,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            files: Vec::new(),
        }
    }

    pub fn with_files(mut self, files: Vec<SourceFile>) -> Self {
        self.files = files;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_is_normalised() {
        let frag = RawFragment::new(Some("  HTML "), "<p>x</p>", 0);
        assert_eq!(frag.tag().as_deref(), Some("html"));

        let blank = RawFragment::new(Some("   "), "x", 0);
        assert_eq!(blank.tag(), None);
    }

    #[test]
    fn test_char_len_counts_chars_not_bytes() {
        let frag = RawFragment::new(None, "héllo", 0);
        assert_eq!(frag.char_len(), 5);
    }

    #[test]
    fn test_interpreters() {
        assert_eq!(ExecutionTarget::Html.interpreter(), None);
        assert_eq!(ExecutionTarget::Python.interpreter(), Some("python3"));
        assert_eq!(ExecutionTarget::Node.interpreter(), Some("node"));
        assert_eq!(ExecutionTarget::Bash.interpreter(), Some("bash"));
    }

    #[test]
    fn test_source_file_accepts_name_alias() {
        let file: SourceFile =
            serde_json::from_str(r#"{"name": "index.html", "code": "<p>hi</p>"}"#).unwrap();
        assert_eq!(file.path, "index.html");
    }

    #[test]
    fn test_classified_fragment_serializes_flat() {
        let frag = ClassifiedFragment {
            raw: RawFragment::new(Some("css"), "a{}", 2),
            kind: FragmentKind::Css,
        };
        let json = serde_json::to_value(&frag).unwrap();
        assert_eq!(json["kind"], "css");
        assert_eq!(json["source_order"], 2);
        assert_eq!(json["declared_tag"], "css");
    }
}

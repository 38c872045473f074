//! Source and executable unit types.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

static OPENING_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Match: ```tsx, ```typescript, ``` followed by the end of the line
    Regex::new(r"^```[A-Za-z]*[ \t]*\r?\n?").expect("Invalid opening fence regex")
});

static CLOSING_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n?```\s*$").expect("Invalid closing fence regex"));

/// One complete, self-contained component program in typed JSX form.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct SourceUnit(Arc<str>);

impl SourceUnit {
    /// Wrap source text as-is.
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// Build a unit from raw model output, dropping surrounding markdown fences.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        let without_open = OPENING_FENCE_RE.replace(trimmed, "");
        let without_close = CLOSING_FENCE_RE.replace(&without_open, "");
        Self::new(without_close.trim())
    }

    /// Source text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the unit holds nothing but whitespace.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SourceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SourceUnit")
            .field(&format_args!("{} bytes", self.0.len()))
            .finish()
    }
}

impl From<&str> for SourceUnit {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for SourceUnit {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// Type-erased, directly executable script body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableUnit(Arc<str>);

impl ExecutableUnit {
    pub fn new(code: impl Into<Arc<str>>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_tsx_fences() {
        let raw = "```tsx\nexport default function App() {}\n```\n";
        let unit = SourceUnit::normalize(raw);

        assert_eq!(unit.as_str(), "export default function App() {}");
    }

    #[test]
    fn strips_bare_fences() {
        let raw = "```\nconst a = 1;\n```";
        let unit = SourceUnit::normalize(raw);

        assert_eq!(unit.as_str(), "const a = 1;");
    }

    #[test]
    fn leaves_unfenced_source_alone() {
        let raw = "  const tpl = `a`;\nexport default tpl;  ";
        let unit = SourceUnit::normalize(raw);

        assert_eq!(unit.as_str(), "const tpl = `a`;\nexport default tpl;");
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert!(SourceUnit::normalize(" \n\t ").is_empty());
        assert!(SourceUnit::normalize("```tsx\n```").is_empty());
        assert!(!SourceUnit::from("x").is_empty());
    }
}

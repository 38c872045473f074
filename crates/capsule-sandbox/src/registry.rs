//! The fixed set of dependencies a unit may resolve.

/// Specifier of the UI framework module, also bound directly as `React`.
pub const FRAMEWORK: &str = "react";

/// Specifier of the animation library.
pub const ANIMATION: &str = "framer-motion";

/// Specifier of the icon library.
pub const ICONS: &str = "lucide-react";

static DEPENDENCIES: [(&str, &str); 3] = [
    (FRAMEWORK, include_str!("js/react.js")),
    (ANIMATION, include_str!("js/framer-motion.js")),
    (ICONS, include_str!("js/lucide-react.js")),
];

/// Static markup renderer. Evaluated once per sandbox and never resolvable.
pub(crate) const RENDERER_SOURCE: &str = include_str!("js/renderer.js");

/// Read-only view of the dependency table.
///
/// Each module source evaluates to a factory function. The framework factory
/// takes no arguments; every other factory receives the framework module.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyRegistry;

impl DependencyRegistry {
    /// Resolvable specifiers, framework first.
    pub fn names() -> impl Iterator<Item = &'static str> {
        DEPENDENCIES.iter().map(|(name, _)| *name)
    }

    /// Specifier and module source pairs, framework first.
    pub fn entries() -> impl Iterator<Item = (&'static str, &'static str)> {
        DEPENDENCIES.iter().copied()
    }

    /// Exact, case-sensitive membership test.
    pub fn contains(name: &str) -> bool {
        DEPENDENCIES.iter().any(|(known, _)| *known == name)
    }

    /// Module source for a specifier.
    pub fn source(name: &str) -> Option<&'static str> {
        DEPENDENCIES
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, source)| *source)
    }

    /// Error message thrown for a specifier outside the table.
    pub fn unresolved_message(name: &str) -> String {
        format!("Module '{name}' not found in preview environment.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exposes_exactly_three_modules() {
        let names: Vec<_> = DependencyRegistry::names().collect();

        assert_eq!(names, vec!["react", "framer-motion", "lucide-react"]);
    }

    #[test]
    fn membership_is_exact() {
        assert!(DependencyRegistry::contains("react"));
        assert!(DependencyRegistry::contains("lucide-react"));
        assert!(!DependencyRegistry::contains("React"));
        assert!(!DependencyRegistry::contains("react-dom"));
        assert!(!DependencyRegistry::contains("fs"));
        assert!(!DependencyRegistry::contains(""));
    }

    #[test]
    fn sources_are_factories() {
        for (name, source) in DependencyRegistry::entries() {
            assert!(
                source.contains("(function ("),
                "{name} must evaluate to a factory"
            );
        }
        assert!(DependencyRegistry::source("fs").is_none());
    }

    #[test]
    fn unresolved_message_names_the_module() {
        assert_eq!(
            DependencyRegistry::unresolved_message("axios"),
            "Module 'axios' not found in preview environment."
        );
    }
}

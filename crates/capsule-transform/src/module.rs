//! Lowering of ES module syntax to `require`/`exports` form.
//!
//! The executable unit runs as a plain function body, so `import` and `export`
//! statements are rewritten in place by splicing the printed JavaScript at the
//! statement spans reported by the parser.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPattern, BindingPatternKind, Declaration, ExportAllDeclaration,
    ExportDefaultDeclaration, ExportDefaultDeclarationKind, ExportNamedDeclaration,
    ImportDeclaration, ImportDeclarationSpecifier, Statement,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};

use crate::traits::TransformError;

/// A pending text replacement over the printed module.
#[derive(Debug)]
struct Edit {
    start: u32,
    end: u32,
    text: String,
}

impl Edit {
    fn replace(span: Span, text: impl Into<String>) -> Self {
        Self {
            start: span.start,
            end: span.end,
            text: text.into(),
        }
    }

    fn insert(at: u32, text: impl Into<String>) -> Self {
        Self {
            start: at,
            end: at,
            text: text.into(),
        }
    }
}

/// Rewrite every top-level `import`/`export` statement of a JavaScript module.
pub fn lower_modules(code: &str) -> Result<String, TransformError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::mjs()).parse();

    if !ret.errors.is_empty() {
        let message = ret
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        return Err(TransformError::Module(message));
    }

    let mut edits = Vec::new();

    for statement in &ret.program.body {
        match statement {
            Statement::ImportDeclaration(decl) => {
                edits.push(Edit::replace(decl.span, import_bindings(decl)));
            }
            Statement::ExportDefaultDeclaration(decl) => lower_default_export(decl, &mut edits),
            Statement::ExportNamedDeclaration(decl) => lower_named_export(decl, &mut edits),
            Statement::ExportAllDeclaration(decl) => lower_export_all(decl, &mut edits),
            _ => {}
        }
    }

    Ok(apply_edits(code, edits))
}

/// Build the `var` bindings that replace one import declaration.
fn import_bindings(decl: &ImportDeclaration<'_>) -> String {
    let module = js_string(decl.source.value.as_str());

    let Some(specifiers) = &decl.specifiers else {
        return format!("require({module});");
    };

    let mut lines = Vec::new();
    let mut named = Vec::new();

    for specifier in specifiers {
        match specifier {
            ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                lines.push(format!("var {} = require({module}).default;", s.local.name));
            }
            ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                lines.push(format!("var {} = require({module});", s.local.name));
            }
            ImportDeclarationSpecifier::ImportSpecifier(s) => {
                let imported = s.imported.name();
                if imported.as_str() == s.local.name.as_str() {
                    named.push(imported.to_string());
                } else {
                    named.push(format!("{}: {}", property_key(imported.as_str()), s.local.name));
                }
            }
        }
    }

    if !named.is_empty() {
        lines.push(format!("var {{ {} }} = require({module});", named.join(", ")));
    }

    if lines.is_empty() {
        lines.push(format!("require({module});"));
    }

    lines.join(" ")
}

fn lower_default_export(decl: &ExportDefaultDeclaration<'_>, edits: &mut Vec<Edit>) {
    let head = Span::new(decl.span.start, decl.declaration.span().start);

    let declared_name = match &decl.declaration {
        ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
            Some(func.id.as_ref().map(|id| id.name.to_string()))
        }
        ExportDefaultDeclarationKind::ClassDeclaration(class) => {
            Some(class.id.as_ref().map(|id| id.name.to_string()))
        }
        _ => None,
    };

    match declared_name {
        // Named declaration: keep it in place so it stays hoisted, export after.
        Some(Some(name)) => {
            edits.push(Edit::replace(head, ""));
            edits.push(Edit::insert(
                decl.span.end,
                format!("\nexports.default = {name};"),
            ));
        }
        // Anonymous declaration becomes an expression statement.
        Some(None) => {
            edits.push(Edit::replace(head, "exports.default = "));
            edits.push(Edit::insert(decl.span.end, ";"));
        }
        None => {
            edits.push(Edit::replace(head, "exports.default = "));
        }
    }
}

fn lower_named_export(decl: &ExportNamedDeclaration<'_>, edits: &mut Vec<Edit>) {
    if let Some(declaration) = &decl.declaration {
        edits.push(Edit::replace(
            Span::new(decl.span.start, declaration.span().start),
            "",
        ));

        let assignments: String = declared_names(declaration)
            .iter()
            .map(|name| format!("\n{} = {name};", export_target(name)))
            .collect();

        if !assignments.is_empty() {
            edits.push(Edit::insert(decl.span.end, assignments));
        }
        return;
    }

    let assignments: Vec<String> = match &decl.source {
        Some(source) => {
            let module = js_string(source.value.as_str());
            decl.specifiers
                .iter()
                .map(|specifier| {
                    format!(
                        "{} = require({module}){};",
                        export_target(specifier.exported.name().as_str()),
                        member(specifier.local.name().as_str())
                    )
                })
                .collect()
        }
        None => decl
            .specifiers
            .iter()
            .map(|specifier| {
                format!(
                    "{} = {};",
                    export_target(specifier.exported.name().as_str()),
                    specifier.local.name()
                )
            })
            .collect(),
    };

    edits.push(Edit::replace(decl.span, assignments.join(" ")));
}

fn lower_export_all(decl: &ExportAllDeclaration<'_>, edits: &mut Vec<Edit>) {
    let module = js_string(decl.source.value.as_str());

    let text = match &decl.exported {
        Some(name) => format!("{} = require({module});", export_target(name.name().as_str())),
        None => format!(
            "(function (m) {{ for (var k in m) if (k !== \"default\") exports[k] = m[k]; }})(require({module}));"
        ),
    };

    edits.push(Edit::replace(decl.span, text));
}

/// Names bound by an exported declaration.
fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    let mut names = Vec::new();

    match declaration {
        Declaration::VariableDeclaration(var) => {
            for declarator in &var.declarations {
                collect_bindings(&declarator.id, &mut names);
            }
        }
        Declaration::FunctionDeclaration(func) => {
            names.extend(func.id.iter().map(|id| id.name.to_string()));
        }
        Declaration::ClassDeclaration(class) => {
            names.extend(class.id.iter().map(|id| id.name.to_string()));
        }
        _ => {}
    }

    names
}

fn collect_bindings(pattern: &BindingPattern<'_>, names: &mut Vec<String>) {
    match &pattern.kind {
        BindingPatternKind::BindingIdentifier(id) => names.push(id.name.to_string()),
        BindingPatternKind::ObjectPattern(object) => {
            for property in &object.properties {
                collect_bindings(&property.value, names);
            }
            if let Some(rest) = &object.rest {
                collect_bindings(&rest.argument, names);
            }
        }
        BindingPatternKind::ArrayPattern(array) => {
            for element in array.elements.iter().flatten() {
                collect_bindings(element, names);
            }
            if let Some(rest) = &array.rest {
                collect_bindings(&rest.argument, names);
            }
        }
        BindingPatternKind::AssignmentPattern(assignment) => {
            collect_bindings(&assignment.left, names);
        }
    }
}

fn apply_edits(code: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| e.start);

    let mut out = String::with_capacity(code.len() + 64);
    let mut cursor = 0usize;

    for edit in edits {
        let start = edit.start as usize;
        let end = edit.end as usize;
        if start < cursor {
            continue;
        }
        out.push_str(&code[cursor..start]);
        out.push_str(&edit.text);
        cursor = end;
    }

    out.push_str(&code[cursor..]);
    out
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

fn property_key(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        js_string(name)
    }
}

fn member(name: &str) -> String {
    if is_identifier(name) {
        format!(".{name}")
    } else {
        format!("[{}]", js_string(name))
    }
}

fn export_target(name: &str) -> String {
    format!("exports{}", member(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lowers_imports() {
        let code = r#"import React, { useState as useS, useEffect } from "react";
import * as Icons from "lucide-react";
import "./styles.css";
"#;

        let lowered = lower_modules(code).unwrap();

        assert_eq!(
            lowered,
            r#"var React = require("react").default; var { useState: useS, useEffect } = require("react");
var Icons = require("lucide-react");
require("./styles.css");
"#
        );
    }

    #[test]
    fn lowers_named_default_function() {
        let code = "export default function App() {\n  return null;\n}\n";

        let lowered = lower_modules(code).unwrap();

        assert_eq!(
            lowered,
            "function App() {\n  return null;\n}\nexports.default = App;\n"
        );
    }

    #[test]
    fn lowers_default_expression() {
        let lowered = lower_modules("export default () => 42;\n").unwrap();

        assert_eq!(lowered, "exports.default = () => 42;\n");
    }

    #[test]
    fn lowers_anonymous_default_class() {
        let lowered = lower_modules("export default class {}\n").unwrap();

        assert_eq!(lowered, "exports.default = class {};\n");
    }

    #[test]
    fn lowers_export_specifiers() {
        let code = "const a = 1;\nexport { a as b, a as default };\n";

        let lowered = lower_modules(code).unwrap();

        assert_eq!(lowered, "const a = 1;\nexports.b = a; exports.default = a;\n");
    }

    #[test]
    fn lowers_exported_declarations() {
        let code = "export const x = 1, { y, z: [w] } = obj;\n";

        let lowered = lower_modules(code).unwrap();

        assert_eq!(
            lowered,
            "const x = 1, { y, z: [w] } = obj;\nexports.x = x;\nexports.y = y;\nexports.w = w;\n"
        );
    }

    #[test]
    fn lowers_re_exports() {
        let code = "export { motion as m } from \"framer-motion\";\nexport * as ns from \"b\";\nexport * from \"c\";\n";

        let lowered = lower_modules(code).unwrap();

        assert!(lowered.contains("exports.m = require(\"framer-motion\").motion;"));
        assert!(lowered.contains("exports.ns = require(\"b\");"));
        assert!(lowered.contains("k !== \"default\""));
        assert!(lowered.contains("require(\"c\")"));
        assert!(!lowered.contains("export "));
    }

    #[test]
    fn leaves_plain_scripts_untouched() {
        let code = "const answer = 42;\nfunction f() { return answer; }\n";

        assert_eq!(lower_modules(code).unwrap(), code);
    }

    #[test]
    fn reports_syntax_errors() {
        let result = lower_modules("export default function (");

        assert!(matches!(result, Err(TransformError::Module(_))));
    }
}

//! C text for single declarations
//!
//! Pure string rendering, no layout decisions.

use crate::catalog::FunctionDefinition;
use crate::error::{GenerationError, Result};

/// Banner at the top of every generated file
pub fn file_banner(project: &str, file_name: &str) -> String {
    format!(
        "//===----------------------------------------------------------------------===//\n\
         //\n\
         //                         {project}\n\
         //\n\
         // {file_name}\n\
         //\n\
         //\n\
         //===----------------------------------------------------------------------===//\n\
         //\n\
         // !!!!!!!\n\
         // WARNING: this file is autogenerated by capi-gen, manual changes will be overwritten\n\
         // !!!!!!!\n"
    )
}

/// Section separator
pub fn comment_header(name: &str) -> String {
    format!(
        "//===--------------------------------------------------------------------===//\n\
         // {name}\n\
         //===--------------------------------------------------------------------===//\n"
    )
}

/// `table_function_bind` -> `Table Function Bind`
pub fn group_title(group: &str) -> String {
    group
        .to_lowercase()
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `type name`, without a space after a trailing `*`
fn typed(ty: &str, name: &str) -> String {
    if ty.ends_with('*') {
        format!("{ty}{name}")
    } else {
        format!("{ty} {name}")
    }
}

/// `/*! ... */` documentation block; empty when the function has no comment.
pub fn function_comment(function: &FunctionDefinition, allow_uncommented_params: bool) -> Result<String> {
    let Some(comment) = &function.comment else {
        return Ok(String::new());
    };

    let mut out = String::from("/*!\n");
    out.push_str(&comment.description);
    if !comment.description.ends_with('\n') {
        out.push('\n');
    }

    for param in &function.params {
        match comment.param_comments.as_ref().and_then(|c| c.get(&param.name)) {
            Some(text) => out.push_str(&format!("* @param {} {}\n", param.name, text)),
            None if allow_uncommented_params => {}
            None => {
                return Err(GenerationError::MissingParamComment {
                    function: function.name.clone(),
                    param: param.name.clone(),
                })
            }
        }
    }

    if let Some(return_value) = &comment.return_value {
        out.push_str(&format!("* @return {}\n", return_value));
    }
    out.push_str("*/\n");
    Ok(out)
}

/// `<API> ret name(type a, type b);`
pub fn function_declaration(function: &FunctionDefinition, api_decorator: &str) -> String {
    let params: Vec<_> = function.params.iter().map(|p| typed(&p.ty, &p.name)).collect();
    format!(
        "{}({});\n",
        typed(&format!("{} {}", api_decorator, function.return_type), &function.name),
        params.join(", ")
    )
}

/// `    ret (*name)(type a, type b);`
pub fn struct_member(function: &FunctionDefinition) -> String {
    let params: Vec<_> = function.params.iter().map(|p| typed(&p.ty, &p.name)).collect();
    format!(
        "    {} (*{})({});\n",
        function.return_type,
        function.name,
        params.join(", ")
    )
}

/// `#define name var.name`
pub fn field_macro(name: &str, api_variable: &str) -> String {
    format!("#define {name} {api_variable}.{name}\n")
}

/// C condition that holds when the requested `MAJOR.MINOR.PATCH` is at
/// least `version`.
pub fn version_at_least(major: &str, minor: &str, patch: &str, version: &semver::Version) -> String {
    let (a, b, c) = (version.major, version.minor, version.patch);
    format!(
        "({major} > {a} || ({major} == {a} && ({minor} > {b} || ({minor} == {b} && {patch} >= {c}))))"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FunctionComment, Param};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn function() -> FunctionDefinition {
        FunctionDefinition {
            name: "duckdb_open".to_string(),
            return_type: "duckdb_state".to_string(),
            params: vec![
                Param { name: "path".to_string(), ty: "const char *".to_string() },
                Param { name: "out_database".to_string(), ty: "duckdb_database".to_string() },
            ],
            group: "open_connect".to_string(),
            deprecated: false,
            comment: Some(FunctionComment {
                description: "Opens a database.".to_string(),
                param_comments: Some(BTreeMap::from([(
                    "path".to_string(),
                    "Path to the database file.".to_string(),
                )])),
                return_value: Some("`DuckDBSuccess` on success.".to_string()),
            }),
        }
    }

    #[test]
    fn test_group_title() {
        assert_eq!(group_title("table_function_bind"), "Table Function Bind");
        assert_eq!(group_title("ARROW_interface"), "Arrow Interface");
    }

    #[test]
    fn test_declaration_pointer_spacing() {
        assert_eq!(
            function_declaration(&function(), "DUCKDB_API"),
            "DUCKDB_API duckdb_state duckdb_open(const char *path, duckdb_database out_database);\n"
        );

        let mut f = function();
        f.return_type = "char *".to_string();
        f.params.clear();
        assert_eq!(function_declaration(&f, "DUCKDB_API"), "DUCKDB_API char *duckdb_open();\n");
    }

    #[test]
    fn test_struct_member() {
        assert_eq!(
            struct_member(&function()),
            "    duckdb_state (*duckdb_open)(const char *path, duckdb_database out_database);\n"
        );
    }

    #[test]
    fn test_comment_skips_uncommented_params_when_allowed() {
        let comment = function_comment(&function(), true).unwrap();
        assert_eq!(
            comment,
            "/*!\nOpens a database.\n* @param path Path to the database file.\n* @return `DuckDBSuccess` on success.\n*/\n"
        );
    }

    #[test]
    fn test_comment_rejects_uncommented_params_when_disallowed() {
        let err = function_comment(&function(), false).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::MissingParamComment { param, .. } if param == "out_database"
        ));
    }

    #[test]
    fn test_no_comment() {
        let mut f = function();
        f.comment = None;
        assert_eq!(function_comment(&f, false).unwrap(), "");
    }

    #[test]
    fn test_version_at_least() {
        assert_eq!(
            version_at_least("MA", "MI", "PA", &semver::Version::new(1, 2, 0)),
            "(MA > 1 || (MA == 1 && (MI > 2 || (MI == 2 && PA >= 0))))"
        );
    }
}

//! Header Emitters
//!
//! Three artifacts are rendered from one validated layout:
//! 1. the public API header (declarations grouped in display order)
//! 2. the plugin-facing header (versioning, guarded struct, field macros, entrypoints)
//! 3. the internal header (unguarded struct, construction routine, version ladder)

use std::collections::BTreeSet;
use std::path::Path;

use crate::catalog::{Catalog, FunctionDefinition};
use crate::config::GeneratorConfig;
use crate::error::{GenerationError, Result};
use crate::layout::{GuardLadder, LayoutBlock, StructLayout};
use crate::render::{
    comment_header, field_macro, file_banner, function_comment, function_declaration, group_title,
    struct_member, version_at_least,
};
use crate::versions::ApiVersion;

/// Everything an emitter reads
pub struct EmitContext<'a> {
    pub config: &'a GeneratorConfig,
    pub catalog: &'a Catalog,
    pub layout: &'a StructLayout,
    /// Newest stable version
    pub current: &'a semver::Version,
}

impl<'a> EmitContext<'a> {
    fn function(&self, block: &LayoutBlock, name: &str) -> Result<&'a FunctionDefinition> {
        self.catalog
            .get(name)
            .ok_or_else(|| GenerationError::UnknownSnapshotEntries {
                entries: vec![(block.version.to_string(), name.to_string())],
            })
    }

    fn guard(&self, version: &ApiVersion) -> String {
        self.config
            .ext_macro(&format!("API_VERSION_{}", version.guard_suffix()))
    }

    fn public_include(&self) -> String {
        file_name(&self.config.output.public_header)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// --- Public API header ---

/// The skeleton used when no header template is configured.
pub fn builtin_template(config: &GeneratorConfig) -> String {
    let p = &config.macro_prefix;
    format!(
        "{start}\n\
         #pragma once\n\
         \n\
         #ifndef {p}_API\n\
         #ifdef _WIN32\n\
         #define {p}_API __declspec(dllimport)\n\
         #else\n\
         #define {p}_API\n\
         #endif\n\
         #endif\n\
         \n\
         #ifndef {p}_EXTENSION_API\n\
         #ifdef _WIN32\n\
         #define {p}_EXTENSION_API __declspec(dllexport)\n\
         #else\n\
         #define {p}_EXTENSION_API\n\
         #endif\n\
         #endif\n\
         \n\
         #include <stdbool.h>\n\
         #include <stdint.h>\n\
         #include <stddef.h>\n\
         \n\
         #ifdef __cplusplus\n\
         extern \"C\" {{\n\
         #endif\n\
         \n\
         {content}\n\
         #ifdef __cplusplus\n\
         }}\n\
         #endif\n",
        start = config.start_mark,
        content = config.content_mark,
    )
}

/// Cut the template down to what follows the start mark and splice the
/// declarations in at the content mark.
pub fn fill_template(template: &str, declarations: &str, config: &GeneratorConfig, source: &Path) -> Result<String> {
    let missing = |mark: &str| GenerationError::TemplateMark {
        path: source.to_path_buf(),
        mark: mark.to_string(),
    };

    let start = template
        .find(&config.start_mark)
        .ok_or_else(|| missing(&config.start_mark))?;
    let mut body = &template[start + config.start_mark.len()..];
    body = body.strip_prefix('\n').unwrap_or(body);

    let at = body
        .find(&config.content_mark)
        .ok_or_else(|| missing(&config.content_mark))?;
    let mut rest = &body[at + config.content_mark.len()..];
    rest = rest.strip_prefix('\n').unwrap_or(rest);

    Ok(format!("{}{}{}", &body[..at], declarations, rest))
}

/// Every function declaration, grouped in display order.
pub fn public_declarations(ctx: &EmitContext<'_>) -> Result<String> {
    let no_deprecated = format!("#ifndef {}_API_NO_DEPRECATED\n", ctx.config.macro_prefix);
    let decorator = format!("{}_API", ctx.config.macro_prefix);
    let mut out = String::new();

    for group in ctx.catalog.groups() {
        out.push_str(&comment_header(&group_title(&group.group)));
        out.push('\n');

        if let Some(description) = &group.description {
            out.push_str(description);
            out.push('\n');
        }
        if group.deprecated {
            out.push_str(&no_deprecated);
        }

        for function in &group.entries {
            if function.deprecated {
                out.push_str(&no_deprecated);
            }
            out.push_str(&function_comment(function, ctx.config.allow_uncommented_params)?);
            out.push_str(&function_declaration(function, &decorator));
            if function.deprecated {
                out.push_str("#endif\n");
            }
            out.push('\n');
        }

        if group.deprecated {
            out.push_str("#endif\n");
        }
    }
    Ok(out)
}

pub fn public_header(ctx: &EmitContext<'_>, template: &str, template_source: &Path) -> Result<String> {
    let declarations = public_declarations(ctx)?;
    let body = fill_template(template, &declarations, ctx.config, template_source)?;
    Ok(format!("{}{}", file_banner(&ctx.config.project_name, &ctx.public_include()), body))
}

// --- Shared struct and ladder rendering ---

/// The struct definition. Guarded blocks are only visible to consumers
/// that enabled the block's version macro.
fn struct_definition(ctx: &EmitContext<'_>, guarded: bool) -> Result<String> {
    let mut out = comment_header("Function pointer struct");
    out.push_str("typedef struct {\n");

    for block in ctx.layout.blocks() {
        if guarded {
            out.push_str(&format!("#ifdef {} // {}\n", ctx.guard(&block.version), block.version));
        } else {
            out.push_str(&format!("// {}\n", block.version));
        }
        if block.version.is_dev() {
            out.push_str("    // WARNING! the functions below are not (yet) stable\n\n");
        }
        for name in &block.fields {
            out.push_str(&struct_member(ctx.function(block, name)?));
        }
        if guarded {
            out.push_str("#endif\n");
        }
        out.push('\n');
    }

    out.push_str(&format!("}} {};\n\n", ctx.config.struct_typename));
    Ok(out)
}

/// "Version N implies N-1" rungs, newest first so they cascade.
fn ladder_rungs(ctx: &EmitContext<'_>, ladder: &GuardLadder) -> String {
    let mut out = String::new();
    for rung in ladder.rungs() {
        out.push_str(&format!(
            "#ifdef {}\n#define {}\n#endif\n\n",
            ctx.guard(rung.newer),
            ctx.guard(rung.older)
        ));
    }
    out
}

// --- Plugin-facing header ---

const HELPER_MACROS: &str = r#"
#ifdef __cplusplus
#define $P_EXTENSION_EXTERN_C_GUARD_OPEN  extern "C" {
#define $P_EXTENSION_EXTERN_C_GUARD_CLOSE }
#else
#define $P_EXTENSION_EXTERN_C_GUARD_OPEN
#define $P_EXTENSION_EXTERN_C_GUARD_CLOSE
#endif

#define $P_EXTENSION_GLUE_HELPER(x, y) x##y
#define $P_EXTENSION_GLUE(x, y)        $P_EXTENSION_GLUE_HELPER(x, y)
#define $P_EXTENSION_STR_HELPER(x)     #x
#define $P_EXTENSION_STR(x)            $P_EXTENSION_STR_HELPER(x)
#define $P_EXTENSION_SEMVER_STRING(major, minor, patch) "v" $P_EXTENSION_STR_HELPER(major) "." $P_EXTENSION_STR_HELPER(minor) "." $P_EXTENSION_STR_HELPER(patch)

"#;

const VERSIONING_MACROS: &str = r#"//! Set version to latest if no explicit version is defined
#if !defined($P_EXTENSION_API_VERSION_MAJOR) && !defined($P_EXTENSION_API_VERSION_MINOR) && !defined($P_EXTENSION_API_VERSION_PATCH)
#define $P_EXTENSION_API_VERSION_MAJOR $MAJOR
#define $P_EXTENSION_API_VERSION_MINOR $MINOR
#define $P_EXTENSION_API_VERSION_PATCH $PATCH
#elif !(defined($P_EXTENSION_API_VERSION_MAJOR) && defined($P_EXTENSION_API_VERSION_MINOR) && defined($P_EXTENSION_API_VERSION_PATCH))
#error "either all or none of the $P_EXTENSION_API_VERSION_ defines should be defined"
#endif

//! Set the $P_EXTENSION_API_VERSION_STRING which is passed to the host on extension load
#ifdef $P_EXTENSION_API_VERSION_DEV
#define $P_EXTENSION_API_VERSION_STRING "$DEV"
#else
#define $P_EXTENSION_API_VERSION_STRING $P_EXTENSION_SEMVER_STRING($P_EXTENSION_API_VERSION_MAJOR, $P_EXTENSION_API_VERSION_MINOR, $P_EXTENSION_API_VERSION_PATCH)
#endif

#if $P_EXTENSION_API_VERSION_MAJOR != $MAJOR
#error "This version of the extension API header only supports API VERSION v$MAJOR.x.x"
#endif
"#;

const GLOBAL_MACROS: &str = r#"// This goes in the c/c++ file containing the entrypoint (handle
#define $P_EXTENSION_GLOBAL $STRUCT $VAR = {0};
// Initializes the C Extension API: First thing to call in the extension entrypoint
#define $P_EXTENSION_API_INIT(info, access, minimum_api_version) $STRUCT * res = ($STRUCT *)access->get_api(info, minimum_api_version); if (!res) {return;}; $VAR = *res;

// Place in global scope of any C/C++ file that needs to access the extension API
#define $P_EXTENSION_EXTERN extern $STRUCT $VAR;

"#;

const ENTRYPOINT_MACROS: &str = r#"
// Note: the $P_EXTENSION_ENTRYPOINT macro requires $P_EXTENSION_NAME to be set.

#ifdef $P_EXTENSION_NAME

// Main entrypoint: opens (and closes) a connection automatically for the extension to register its functionality through
#define $P_EXTENSION_ENTRYPOINT\
	$P_EXTENSION_GLOBAL static void $P_EXTENSION_GLUE($P_EXTENSION_NAME,_init_c_api_internal)($S_connection connection, $S_extension_info info, $S_extension_access *access);\
	    $P_EXTENSION_EXTERN_C_GUARD_OPEN\
	    $P_EXTENSION_API void $P_EXTENSION_GLUE($P_EXTENSION_NAME,_init_c_api)(\
	    $S_extension_info info, $S_extension_access *access) {\
		$P_EXTENSION_API_INIT(info, access, $P_EXTENSION_API_VERSION_STRING);\
		$S_database *db = access->get_database(info);\
		$S_connection conn;\
		if ($S_connect(*db, &conn) == $ERROR) {\
			access->set_error(info, "Failed to open connection to database");\
			return;\
		}\
		$P_EXTENSION_GLUE($P_EXTENSION_NAME,_init_c_api_internal)(conn, info, access);\
		$S_disconnect(&conn);\
	}\
	$P_EXTENSION_EXTERN_C_GUARD_CLOSE static void $P_EXTENSION_GLUE($P_EXTENSION_NAME,_init_c_api_internal)

// Custom entrypoint: just forwards the info and access
#define $P_EXTENSION_ENTRYPOINT_CUSTOM\
	$P_EXTENSION_GLOBAL static void $P_EXTENSION_GLUE($P_EXTENSION_NAME,_init_c_api_internal)(\
	    $S_extension_info info, $S_extension_access *access);\
	    $P_EXTENSION_EXTERN_C_GUARD_OPEN\
	    $P_EXTENSION_API void $P_EXTENSION_GLUE($P_EXTENSION_NAME,_init_c_api)(\
	    $S_extension_info info, $S_extension_access *access) {\
		$P_EXTENSION_API_INIT(info, access, $P_EXTENSION_API_VERSION_STRING);\
		$P_EXTENSION_GLUE($P_EXTENSION_NAME,_init_c_api_internal)(info, access);\
	}\
	$P_EXTENSION_EXTERN_C_GUARD_CLOSE static void $P_EXTENSION_GLUE($P_EXTENSION_NAME,_init_c_api_internal)
#endif
"#;

fn expand(template: &str, ctx: &EmitContext<'_>) -> String {
    let config = ctx.config;
    // longer tokens first: `$P` and `$S` prefix others
    template
        .replace("$STRUCT", &config.struct_typename)
        .replace("$PATCH", &ctx.current.patch.to_string())
        .replace("$MAJOR", &ctx.current.major.to_string())
        .replace("$MINOR", &ctx.current.minor.to_string())
        .replace("$VAR", &config.api_variable)
        .replace("$ERROR", &config.error_state)
        .replace("$DEV", &config.dev_tag)
        .replace("$P", &config.macro_prefix)
        .replace("$S", &config.symbol_prefix)
}

/// Entry rungs: a numeric version request defines the guard of the newest
/// snapshot it covers. The unstable guard is never defined here.
fn guard_entry(ctx: &EmitContext<'_>, ladder: &GuardLadder) -> String {
    let major = ctx.config.ext_macro("API_VERSION_MAJOR");
    let minor = ctx.config.ext_macro("API_VERSION_MINOR");
    let patch = ctx.config.ext_macro("API_VERSION_PATCH");

    let mut out = String::from("//! These defines control which version of the API is available\n");
    for version in ladder.stable() {
        let Some(floor) = version.stable() else { continue };
        let mut condition = version_at_least(&major, &minor, &patch, floor);
        if let Some(next) = ladder.next_after(version).and_then(ApiVersion::stable) {
            condition = format!("{} && !{}", condition, version_at_least(&major, &minor, &patch, next));
        }
        out.push_str(&format!("#if {}\n#define {}\n#endif\n\n", condition, ctx.guard(version)));
    }
    out.push_str("//! Each version implies all earlier versions\n");
    out.push_str(&ladder_rungs(ctx, ladder));
    if let Some(dev) = ladder.dev() {
        out.push_str(&format!(
            "//! {} is opt-in only: define {} explicitly\n",
            dev,
            ctx.guard(dev)
        ));
        // unstable fields sit after every stable block in the host's struct
        match ladder.latest() {
            Some(latest) => out.push_str(&format!(
                "#if defined({}) && !defined({})\n\
                 #error \"the unstable API requires the latest stable API version ({})\"\n\
                 #endif\n\n",
                ctx.guard(dev),
                ctx.guard(latest),
                latest
            )),
            None => out.push('\n'),
        }
    }
    out
}

/// `#define name var.name` per field, by version, then by group order.
fn field_macros(ctx: &EmitContext<'_>) -> String {
    let mut out = String::new();
    for block in ctx.layout.blocks() {
        out.push_str(&format!("// Version {}\n", block.version));
        let in_block: BTreeSet<&str> = block.fields.iter().map(String::as_str).collect();

        for group in ctx.catalog.groups() {
            let names: Vec<_> = group
                .entries
                .iter()
                .map(|f| f.name.as_str())
                .filter(|name| in_block.contains(name))
                .collect();
            if names.is_empty() {
                continue;
            }
            for name in names {
                out.push_str(&field_macro(name, &ctx.config.api_variable));
            }
            out.push('\n');
        }
    }
    out
}

pub fn extension_header(ctx: &EmitContext<'_>) -> Result<String> {
    let ladder = ctx.layout.guard_ladder();
    let mut out = file_banner(&ctx.config.project_name, &file_name(&ctx.config.output.extension_header));
    out.push_str(&format!("#pragma once\n\n#include \"{}\"\n\n", ctx.public_include()));

    out.push_str(&comment_header("Util Macros"));
    out.push_str(&expand(HELPER_MACROS, ctx));

    out.push_str(&comment_header("Versioning"));
    out.push_str(&expand(VERSIONING_MACROS, ctx));
    out.push('\n');
    out.push_str(&guard_entry(ctx, &ladder));

    out.push_str(&struct_definition(ctx, true)?);
    out.push('\n');

    out.push_str(&comment_header("Typedefs mapping functions to struct entries"));
    out.push_str(&field_macros(ctx));
    out.push('\n');

    out.push_str(&comment_header("Struct Global Macros"));
    out.push_str(&expand(GLOBAL_MACROS, ctx));

    out.push_str(&comment_header("Entrypoint Macros"));
    out.push_str(&expand(ENTRYPOINT_MACROS, ctx));
    Ok(out)
}

// --- Internal header ---

fn create_method(ctx: &EmitContext<'_>) -> String {
    let typename = &ctx.config.struct_typename;
    let mut out = comment_header("Struct Create Method");
    out.push_str(&format!("inline {} {}() {{\n", typename, ctx.config.create_method));
    out.push_str(&format!("    {} result;\n", typename));
    for block in ctx.layout.blocks() {
        for name in &block.fields {
            out.push_str(&format!("    result.{name} = {name};\n"));
        }
    }
    out.push_str("    return result;\n}\n\n");
    out
}

fn version_defines(ctx: &EmitContext<'_>) -> String {
    let v = ctx.current;
    format!(
        "#define {} {}\n#define {} {}\n#define {} {}\n#define {} \"v{}.{}.{}\"\n",
        ctx.config.ext_macro("API_VERSION_MAJOR"),
        v.major,
        ctx.config.ext_macro("API_VERSION_MINOR"),
        v.minor,
        ctx.config.ext_macro("API_VERSION_PATCH"),
        v.patch,
        ctx.config.ext_macro("API_VERSION_STRING"),
        v.major,
        v.minor,
        v.patch
    )
}

pub fn internal_header(ctx: &EmitContext<'_>) -> Result<String> {
    let ladder = ctx.layout.guard_ladder();
    let mut out = file_banner(&ctx.config.project_name, &file_name(&ctx.config.output.internal_header));
    out.push_str(&format!("#pragma once\n\n#include \"{}\"\n\n", ctx.public_include()));
    out.push_str(&struct_definition(ctx, false)?);
    out.push_str(&create_method(ctx));
    out.push_str(&comment_header("Version Compatibility"));
    out.push_str("//! Each version implies all earlier versions\n");
    out.push_str(&ladder_rungs(ctx, &ladder));
    out.push_str(&version_defines(ctx));
    Ok(out)
}

//! C header and C unit rendering.
//!
//! Every wrapper is bracketed by `push_macro`/`#undef`/`pop_macro` so the
//! declaration names a real symbol while the engine's macro stays usable,
//! both for the forwarding body and for code including the header.

use super::{EmitOptions, DEBUG_WRITE_SYMBOL};
use crate::error::Result;
use crate::export::{CType, ConstantExport, ExportTable, FunctionExport};

/// Render the declarations header
pub fn render_header(table: &ExportTable, opts: &EmitOptions) -> Result<String> {
    let mut out = String::new();

    line(&mut out, format!("/* {} */", opts.banner.text()));
    line(&mut out, "#pragma once");
    for prelude in &opts.prelude {
        line(&mut out, prelude);
    }
    for include in &opts.engine_includes {
        line(&mut out, format!("#include {}", quote(include)));
    }

    line(&mut out, "");
    line(&mut out, "#ifdef __cplusplus");
    line(&mut out, "extern \"C\" {");
    line(&mut out, "#endif");

    if opts.debug_write_hook {
        line(&mut out, "");
        line(
            &mut out,
            format!(
                "void {}(long level, const char *file, long line, const char *func, const char *msg);",
                DEBUG_WRITE_SYMBOL
            ),
        );
    }

    for constant in &table.constants {
        let decl = constant.storage_type()?.declare(&constant.name);
        line(&mut out, "");
        guarded(&mut out, &constant.name, &[format!("extern {};", decl)]);
    }

    for function in &table.functions {
        let signature = signature(function)?;
        line(&mut out, "");
        guarded(&mut out, &function.name, &[format!("{};", signature)]);
    }

    line(&mut out, "");
    line(&mut out, "#ifdef __cplusplus");
    line(&mut out, "}");
    line(&mut out, "#endif");

    Ok(out)
}

/// Render the definitions unit
pub fn render_source(table: &ExportTable, opts: &EmitOptions) -> Result<String> {
    let mut out = String::new();

    line(&mut out, format!("/* {} */", opts.banner.text()));
    line(&mut out, format!("#include {}", quote(&opts.header_name)));

    for constant in &table.constants {
        line(&mut out, "");
        constant_definition(&mut out, constant)?;
    }

    for function in &table.functions {
        line(&mut out, "");
        function_definition(&mut out, function)?;
    }

    Ok(out)
}

fn constant_definition(out: &mut String, constant: &ConstantExport) -> Result<()> {
    let decl = constant.storage_type()?.declare(&constant.name);
    let name = &constant.name;
    // The initializer sits after pop_macro so it expands to the engine's value.
    line(out, format!("#pragma push_macro(\"{}\")", name));
    line(out, format!("#undef {}", name));
    line(out, format!("{} =", decl));
    line(out, format!("#pragma pop_macro(\"{}\")", name));
    line(out, format!("  {};", name));
    Ok(())
}

fn function_definition(out: &mut String, function: &FunctionExport) -> Result<()> {
    let signature = signature(function)?;
    let name = &function.name;
    let args = function
        .params
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let maybe_return = if function.returns_void() { "" } else { "return " };

    line(out, format!("#pragma push_macro(\"{}\")", name));
    line(out, format!("#undef {}", name));
    line(out, format!("{} {{", signature));
    line(out, format!("#pragma pop_macro(\"{}\")", name));
    line(out, format!("  {}{}({});", maybe_return, name, args));
    line(out, "}");
    Ok(())
}

/// `R name(T1 a, T2 b)`, or `R name(void)` without parameters
pub fn signature(function: &FunctionExport) -> Result<String> {
    let params = if function.params.is_empty() {
        "void".to_string()
    } else {
        function
            .params
            .iter()
            .map(|p| Ok(CType::parse(&p.c_type)?.declare(&p.name)))
            .collect::<Result<Vec<_>>>()?
            .join(", ")
    };
    let returns = CType::parse(&function.returns)?;
    Ok(returns.declare(&format!("{}({})", function.name, params)))
}

fn guarded(out: &mut String, name: &str, body: &[String]) {
    line(out, format!("#pragma push_macro(\"{}\")", name));
    line(out, format!("#undef {}", name));
    for l in body {
        line(out, l);
    }
    line(out, format!("#pragma pop_macro(\"{}\")", name));
}

fn line(out: &mut String, text: impl AsRef<str>) {
    out.push_str(text.as_ref());
    out.push('\n');
}

/// Quote an include operand unless it is already `"..."` or `<...>`
pub(crate) fn quote(include: &str) -> String {
    if (include.starts_with('"') && include.ends_with('"'))
        || (include.starts_with('<') && include.ends_with('>'))
    {
        include.to_string()
    } else {
        format!("\"{}\"", include.replace('\\', "/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::Banner;
    use crate::export::Param;

    fn opts() -> EmitOptions {
        EmitOptions {
            header_name: "wrapper.h".into(),
            engine_includes: vec!["duktape.h".into(), "<duk_logging.h>".into()],
            prelude: vec!["#define DUK_SHIM_PRELUDE 1".into()],
            debug_write_hook: false,
            banner: Banner {
                engine_header: "duktape.h".into(),
                engine_version: Some(20500),
                digest: "feedface".into(),
            },
        }
    }

    fn table() -> ExportTable {
        ExportTable::new("duktape")
            .with_constant(ConstantExport::new("DUK_VERSION", "duk_uint_t"))
            .with_constant(ConstantExport::new("DUK_GIT_COMMIT", "char *const"))
            .with_function(FunctionExport::new("duk_create_heap_default", "duk_context *", vec![]))
            .with_function(FunctionExport::new(
                "duk_eval_string",
                "void",
                vec![Param::new("duk_context *", "ctx"), Param::new("const char *", "src")],
            ))
            .with_function(FunctionExport::new(
                "duk_peval_file",
                "duk_int_t",
                vec![Param::new("duk_context *", "ctx"), Param::new("const char *", "path")],
            ))
    }

    #[test]
    fn test_header_declarations() {
        let header = render_header(&table(), &opts()).unwrap();
        assert!(header.starts_with("/* Generated by duk-shim"));
        assert!(header.contains("#pragma once\n#define DUK_SHIM_PRELUDE 1\n#include \"duktape.h\"\n#include <duk_logging.h>\n"));
        assert!(header.contains(
            "#pragma push_macro(\"DUK_VERSION\")\n#undef DUK_VERSION\nextern const duk_uint_t DUK_VERSION;\n#pragma pop_macro(\"DUK_VERSION\")\n"
        ));
        assert!(header.contains("extern const char *const DUK_GIT_COMMIT;\n"));
        assert!(header.contains("duk_context *duk_create_heap_default(void);\n"));
        assert!(header.contains("void duk_eval_string(duk_context *ctx, const char *src);\n"));
        assert!(!header.contains(DEBUG_WRITE_SYMBOL));
        assert!(header.ends_with("#ifdef __cplusplus\n}\n#endif\n"));
    }

    #[test]
    fn test_header_debug_hook() {
        let mut opts = opts();
        opts.debug_write_hook = true;
        let header = render_header(&table(), &opts).unwrap();
        assert!(header.contains("void duk_shim_debug_write(long level, const char *file, long line, const char *func, const char *msg);"));
    }

    #[test]
    fn test_constant_definition() {
        let source = render_source(&table(), &opts()).unwrap();
        assert!(source.contains("#include \"wrapper.h\"\n"));
        assert!(source.contains(
            "#pragma push_macro(\"DUK_VERSION\")\n#undef DUK_VERSION\nconst duk_uint_t DUK_VERSION =\n#pragma pop_macro(\"DUK_VERSION\")\n  DUK_VERSION;\n"
        ));
    }

    #[test]
    fn test_function_forwarding() {
        let source = render_source(&table(), &opts()).unwrap();
        assert!(source.contains(
            "#undef duk_create_heap_default\nduk_context *duk_create_heap_default(void) {\n#pragma pop_macro(\"duk_create_heap_default\")\n  return duk_create_heap_default();\n}\n"
        ));
        assert!(source.contains(
            "void duk_eval_string(duk_context *ctx, const char *src) {\n#pragma pop_macro(\"duk_eval_string\")\n  duk_eval_string(ctx, src);\n}\n"
        ));
        assert!(source.contains(
            "duk_int_t duk_peval_file(duk_context *ctx, const char *path) {\n#pragma pop_macro(\"duk_peval_file\")\n  return duk_peval_file(ctx, path);\n}\n"
        ));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let a = render_source(&table(), &opts()).unwrap();
        let b = render_source(&table(), &opts()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("duktape.h"), "\"duktape.h\"");
        assert_eq!(quote("\"duktape.h\""), "\"duktape.h\"");
        assert_eq!(quote("<duktape.h>"), "<duktape.h>");
        assert_eq!(quote("C:\\duk\\duktape.h"), "\"C:/duk/duktape.h\"");
    }
}

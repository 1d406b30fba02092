//! Parse/print adapter over the SWC toolchain.

use std::path::Path;

use swc_core::{
    common::{
        comments::SingleThreadedComments, source_map::DefaultSourceMapGenConfig, sync::Lrc,
        FileName, Globals, Mark, SourceMap, GLOBALS,
    },
    ecma::{
        ast::{EsVersion, Module},
        codegen::{text_writer::JsWriter, Config, Emitter},
        parser::{parse_file_as_module, EsSyntax, Syntax, TsSyntax},
        transforms::base::resolver,
        visit::VisitMutWith,
    },
};

use crate::error::{Result, TransformError};

/// A parsed and scope-resolved module together with the state needed to print it.
pub struct ParsedModule {
    pub module: Module,
    pub file_name: String,
    pub syntax: Syntax,
    cm: Lrc<SourceMap>,
    comments: SingleThreadedComments,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintedModule {
    pub code: String,
    /// Source map v3 JSON.
    pub map: Option<String>,
}

/// Runs `f` with a fresh set of SWC globals (mark and context tables).
///
/// Every transform invocation gets its own table; nothing is shared across calls.
pub fn with_globals<R>(f: impl FnOnce() -> R) -> R {
    GLOBALS.set(&Globals::new(), f)
}

/// Drops a bundler query suffix: `/app/root.tsx?v=123` -> `/app/root.tsx`.
pub fn strip_query(file_id: &str) -> &str {
    file_id.split('?').next().unwrap_or(file_id)
}

/// Picks the grammar from the file extension.
pub fn syntax_for(path: &str) -> Syntax {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    match ext {
        "ts" | "mts" | "cts" => Syntax::Typescript(TsSyntax {
            tsx: false,
            ..Default::default()
        }),
        "tsx" => Syntax::Typescript(TsSyntax {
            tsx: true,
            ..Default::default()
        }),
        _ => Syntax::Es(EsSyntax {
            jsx: true,
            ..Default::default()
        }),
    }
}

/// Parses `source` as an ES module and runs the SWC resolver over it.
///
/// Must be called inside [`with_globals`]. Recovered parser errors count as
/// failures: a partially recovered tree is never rewritten.
pub fn parse(source: &str, file_id: &str) -> Result<ParsedModule> {
    let file_name = strip_query(file_id).to_string();
    let syntax = syntax_for(&file_name);

    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Real(file_name.clone().into()).into(), source.to_string());
    let comments = SingleThreadedComments::default();

    let mut recovered = vec![];
    let mut module = parse_file_as_module(
        &fm,
        syntax,
        EsVersion::latest(),
        Some(&comments),
        &mut recovered,
    )
    .map_err(|err| TransformError::Parse {
        file: file_name.clone(),
        message: err.kind().msg().into_owned(),
    })?;
    if let Some(err) = recovered.first() {
        return Err(TransformError::Parse {
            file: file_name,
            message: err.kind().msg().into_owned(),
        });
    }

    let unresolved_mark = Mark::new();
    let top_level_mark = Mark::new();
    module.visit_mut_with(&mut resolver(
        unresolved_mark,
        top_level_mark,
        syntax.typescript(),
    ));

    Ok(ParsedModule {
        module,
        file_name,
        syntax,
        cm,
        comments,
    })
}

/// Prints the module, optionally with a source map pointing back at the input.
pub fn print(parsed: &ParsedModule, source_maps: bool) -> Result<PrintedModule> {
    let mut buf = vec![];
    let mut mappings = vec![];
    {
        let wr = JsWriter::new(
            parsed.cm.clone(),
            "\n",
            &mut buf,
            source_maps.then_some(&mut mappings),
        );
        let mut emitter = Emitter {
            cfg: Config::default(),
            cm: parsed.cm.clone(),
            comments: Some(&parsed.comments),
            wr,
        };
        emitter.emit_module(&parsed.module)?;
    }
    let code = String::from_utf8(buf)
        .map_err(|e| TransformError::invariant(format!("codegen produced invalid UTF-8: {e}")))?;

    let map = if source_maps {
        let map = parsed
            .cm
            .build_source_map(&mappings, None, DefaultSourceMapGenConfig);
        let mut out = vec![];
        map.to_writer(&mut out)
            .map_err(|e| TransformError::SourceMap(e.to_string()))?;
        Some(String::from_utf8(out).map_err(|e| TransformError::SourceMap(e.to_string()))?)
    } else {
        None
    };

    Ok(PrintedModule { code, map })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_query_suffix() {
        assert_eq!(strip_query("/app/routes/home.tsx?v=1&x=2"), "/app/routes/home.tsx");
        assert_eq!(strip_query("/app/routes/home.tsx"), "/app/routes/home.tsx");
    }

    #[test]
    fn grammar_follows_extension() {
        assert!(syntax_for("/a/b.ts").typescript());
        assert!(syntax_for("/a/b.tsx").typescript());
        assert!(!syntax_for("/a/b.jsx").typescript());
        assert!(!syntax_for("/file/path").typescript());
    }

    #[test]
    fn parses_typescript_only_when_the_extension_says_so() {
        let source = "export const loader = (x: number): number => x;";
        with_globals(|| {
            assert!(parse(source, "/app/route.ts?import").is_ok());
            assert!(matches!(
                parse(source, "/app/route.js"),
                Err(TransformError::Parse { .. })
            ));
        });
    }

    #[test]
    fn prints_a_source_map_naming_the_stripped_path() {
        with_globals(|| {
            let parsed = parse("export const a = 1;\n", "/app/route.js?v=42").unwrap();
            assert_eq!(parsed.file_name, "/app/route.js");
            let printed = print(&parsed, true).unwrap();
            assert!(printed.code.contains("export const a = 1;"));
            let map: serde_json::Value = serde_json::from_str(printed.map.as_deref().unwrap()).unwrap();
            assert_eq!(map["version"], 3);
            assert_eq!(map["sources"][0], "/app/route.js");
        });
    }
}

//! Chunk minification.
//!
//! Chunks are parsed as scripts, compressed and mangled, then printed
//! without comments. The printer's source map relates the minified text to
//! the chunk it was given.

use std::path::PathBuf;

use lectern_transform::TransformError;
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc_mangler::MangleOptions;
use oxc_minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use sourcemap::SourceMap;

/// Minified chunk text.
#[derive(Debug, Clone)]
pub struct Minified {
    pub code: String,
    /// Minified text back to the input
    pub map: Option<SourceMap>,
}

/// Minify the chunk `name`.
pub fn minify(name: &str, code: &str) -> Result<Minified, TransformError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::cjs()).parse();
    if let Some(error) = ret.errors.first() {
        return Err(TransformError::from_diagnostic(name, code, error));
    }
    let mut program = ret.program;

    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let output = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            source_map_path: Some(PathBuf::from(name)),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program);

    let map = output
        .map
        .and_then(|map| SourceMap::from_slice(map.to_json_string().as_bytes()).ok());
    Ok(Minified {
        code: output.code,
        map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parses(code: &str) -> bool {
        let allocator = Allocator::default();
        Parser::new(&allocator, code, SourceType::cjs())
            .parse()
            .errors
            .is_empty()
    }

    #[test]
    fn strips_comments_and_indentation() {
        let out = minify(
            "main.js",
            "/* banner */\nfunction greet(name) {\n  // say hello\n  return 'hello ' + name;\n}\nconsole.log(greet('docs'));\n",
        )
        .unwrap();
        assert!(!out.code.contains("banner"));
        assert!(!out.code.contains("say hello"));
        assert!(!out.code.contains("\n  "));
        assert!(parses(&out.code));
    }

    #[test]
    fn keeps_regex_literals_after_parenthesized_conditions() {
        let src = "var s = 'a  b';\nvar n = 0;\nif (s) / {2}/.test(s) && n++;\nconsole.log(n);\n";
        let out = minify("main.js", src).unwrap();
        assert!(parses(&out.code));
        assert!(out.code.contains("console.log"));
    }

    #[test]
    fn keeps_template_text() {
        let out = minify("main.js", "console.log(`crizmas-mvc  ${version} / {2}/`);").unwrap();
        assert!(out.code.contains("crizmas-mvc  "));
        assert!(out.code.contains(" / {2}/"));
        assert!(parses(&out.code));
    }

    #[test]
    fn maps_back_to_the_input() {
        let src = "(function () {\n  var answer = 42;\n  console.log(answer);\n})();\n";
        let out = minify("main.js", src).unwrap();
        let map = out.map.unwrap();
        assert!(map.get_token_count() > 0);
        assert!(map.tokens().all(|t| t.get_src_line() < 5));
    }

    #[test]
    fn reports_syntax_errors() {
        let err = minify("main.js", "var = ;").unwrap_err();
        assert!(err.to_string().starts_with("main.js:1:"));
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(minify("main.js", "").unwrap().code.trim(), "");
    }
}

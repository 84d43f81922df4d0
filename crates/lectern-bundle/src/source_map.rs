//! Source maps for emitted chunks.
//!
//! A chunk map points every module's lines, and every stretch an edit
//! produced, back to the module as it was read. Minified chunks go through
//! the minifier's map first.

use sourcemap::{SourceMap, SourceMapBuilder};

use crate::bundler::BundleError;
use crate::codegen::RenderedChunk;

/// Line starts of a text, for offset to line/column lookups.
struct LineIndex<'t> {
    text: &'t str,
    starts: Vec<usize>,
}

impl<'t> LineIndex<'t> {
    fn new(text: &'t str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, starts }
    }

    /// 0-based line and UTF-16 column of a byte offset.
    fn position(&self, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.text.len());
        let line = self.starts.partition_point(|&start| start <= offset) - 1;
        let column = self
            .text
            .get(self.starts[line]..offset)
            .map_or(0, |prefix| prefix.encode_utf16().count());
        (line as u32, column as u32)
    }
}

/// Map of a rendered chunk back to its modules' sources.
pub fn chunk_source_map(file: &str, chunk: &RenderedChunk<'_>) -> SourceMap {
    let mut builder = SourceMapBuilder::new(Some(file));
    let lines = LineIndex::new(&chunk.code);

    for placement in &chunk.placements {
        let module = placement.module;
        let source_id = builder.add_source(&module.id);
        builder.set_source_contents(source_id, Some(module.source.as_str()));
        let source_lines = LineIndex::new(&module.source);

        let rendered = &chunk.code[placement.range.clone()];
        let mut points: Vec<usize> = placement
            .mapping
            .anchors()
            .iter()
            .map(|anchor| anchor.generated)
            .chain(rendered.match_indices('\n').map(|(i, _)| i + 1))
            .filter(|&point| point < rendered.len())
            .collect();
        points.sort_unstable();
        points.dedup();

        for point in points {
            let (dst_line, dst_col) = lines.position(placement.range.start + point);
            let (src_line, src_col) = source_lines.position(placement.mapping.original(point));
            builder.add_raw(dst_line, dst_col, src_line, src_col, Some(source_id), None, false);
        }
    }
    builder.into_sourcemap()
}

/// Chain `minified` (minified text to chunk) with `chunk` (chunk to sources).
pub fn compose(file: &str, minified: &SourceMap, chunk: &SourceMap) -> SourceMap {
    let mut builder = SourceMapBuilder::new(Some(file));
    for (index, source) in chunk.sources().enumerate() {
        let id = builder.add_source(source);
        builder.set_source_contents(id, chunk.get_source_contents(index as u32));
    }

    for token in minified.tokens() {
        let Some(original) = chunk.lookup_token(token.get_src_line(), token.get_src_col()) else {
            continue;
        };
        if original.get_source().is_none() {
            continue;
        }
        builder.add_raw(
            token.get_dst_line(),
            token.get_dst_col(),
            original.get_src_line(),
            original.get_src_col(),
            Some(original.get_src_id()),
            None,
            false,
        );
    }
    builder.into_sourcemap()
}

/// Serialize a map as JSON.
pub fn to_json(map: &SourceMap) -> Result<String, BundleError> {
    let mut bytes = Vec::new();
    map.to_writer(&mut bytes)
        .map_err(|e| BundleError::SourceMap(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| BundleError::SourceMap(e.to_string()))
}

/// Comment that links a chunk to its map.
pub fn source_map_comment(map_file: &str) -> String {
    format!("//# sourceMappingURL={}\n", map_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::render_main_chunk;
    use crate::graph::{Module, ModuleKind};
    use crate::scan::scan_module;
    use lectern_transform::{Transformed, TransformOptions, Transformer};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn module(id: &str, source: &str) -> Module {
        let transformer = Transformer::new(TransformOptions::default()).unwrap();
        let Transformed { code, mapping } = transformer.transform_module(id, source).unwrap();
        Module {
            id: id.to_string(),
            kind: ModuleKind::Script,
            source: source.to_string(),
            info: scan_module(id, &code).unwrap(),
            code,
            mapping,
            resolved: Default::default(),
        }
    }

    #[test]
    fn positions_count_utf16_columns() {
        let index = LineIndex::new("ab\nπx\n");
        assert_eq!(index.position(0), (0, 0));
        assert_eq!(index.position(3), (1, 0));
        assert_eq!(index.position(5), (1, 1));
        assert_eq!(index.position(100), (2, 0));
    }

    #[test]
    fn maps_chunk_lines_to_module_sources() {
        let m = module("src/js/main.jsx", "const a = 1;\nrender(<App />);\n");
        let kept = BTreeSet::from(["src/js/main.jsx".to_string()]);
        let chunk = render_main_chunk(&[&m], &kept, "src/js/main.jsx");
        let map = chunk_source_map("main.bundle.js", &chunk);

        assert_eq!(map.get_source(0), Some("src/js/main.jsx"));
        assert_eq!(map.get_source_contents(0), Some(m.source.as_str()));

        let at = chunk.code.find("React.createElement(App").unwrap();
        let (line, col) = LineIndex::new(&chunk.code).position(at);
        let token = map.lookup_token(line, col).unwrap();
        assert_eq!((token.get_src_line(), token.get_src_col()), (1, 7));

        let at = chunk.code.find("const a").unwrap();
        let (line, col) = LineIndex::new(&chunk.code).position(at);
        let token = map.lookup_token(line, col).unwrap();
        assert_eq!((token.get_src_line(), token.get_src_col()), (0, 0));
    }

    #[test]
    fn serializes_with_sources() {
        let m = module("src/a.js", "console.log(1);\n");
        let kept = BTreeSet::from(["src/a.js".to_string()]);
        let chunk = render_main_chunk(&[&m], &kept, "src/a.js");
        let json = to_json(&chunk_source_map("main.js", &chunk)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], 3);
        assert_eq!(value["sources"][0], "src/a.js");
        assert_eq!(value["sourcesContent"][0], "console.log(1);\n");
    }

    #[test]
    fn links_maps_by_comment() {
        assert_eq!(
            source_map_comment("main.bundle-abc.js.map"),
            "//# sourceMappingURL=main.bundle-abc.js.map\n"
        );
    }
}

use crate::error::{CullError, CullResult};
use crate::gpu::shader_includes::get_shader_include;
use std::collections::HashSet;

/// Simple WGSL preprocessor that resolves `#include` directives against the
/// embedded include table
pub struct WgslPreprocessor {
    processed: HashSet<String>,
}

impl WgslPreprocessor {
    pub fn new() -> Self {
        Self {
            processed: HashSet::new(),
        }
    }

    /// Process WGSL content for the shader named `shader`
    pub fn process(&mut self, shader: &str, content: &str) -> CullResult<String> {
        let mut result = String::with_capacity(content.len());

        for line in content.lines() {
            let Some(include) = Self::parse_include_directive(line) else {
                result.push_str(line);
                result.push('\n');
                continue;
            };

            // Each include is emitted once; repeats and cycles are skipped
            if !self.processed.insert(include.clone()) {
                result.push_str("// Skipped repeated include: ");
                result.push_str(&include);
                result.push('\n');
                continue;
            }

            let source = get_shader_include(&include).ok_or_else(|| CullError::MissingInclude {
                shader: shader.to_string(),
                include: include.clone(),
            })?;
            let expanded = self.process(&include, source)?;

            result.push_str("// Begin include: ");
            result.push_str(&include);
            result.push('\n');
            result.push_str(&expanded);
            result.push_str("// End include: ");
            result.push_str(&include);
            result.push('\n');
        }

        Ok(result)
    }

    /// Parse an #include directive from a line
    fn parse_include_directive(line: &str) -> Option<String> {
        let after_include = line.trim().strip_prefix("#include")?.trim();

        // Support both #include "file.wgsl" and #include <file.wgsl>
        if after_include.len() >= 2 && after_include.starts_with('"') && after_include.ends_with('"') {
            Some(after_include.trim_matches('"').to_string())
        } else if after_include.starts_with('<') && after_include.ends_with('>') {
            Some(after_include.trim_start_matches('<').trim_end_matches('>').to_string())
        } else {
            None
        }
    }
}

impl Default for WgslPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand a shader's includes
pub fn preprocess_shader(shader: &str, content: &str) -> CullResult<String> {
    WgslPreprocessor::new().process(shader, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::shader_includes::*;

    #[test]
    fn test_include_directive_forms() {
        assert_eq!(
            WgslPreprocessor::parse_include_directive("#include \"cull_common.wgsl\""),
            Some("cull_common.wgsl".to_string())
        );
        assert_eq!(
            WgslPreprocessor::parse_include_directive("  #include <cull_constants.wgsl>"),
            Some("cull_constants.wgsl".to_string())
        );
        assert_eq!(WgslPreprocessor::parse_include_directive("let x = 1;"), None);
    }

    #[test]
    fn test_nested_includes_are_emitted_once() {
        let source = "#include \"cull_constants.wgsl\"\n#include \"cull_common.wgsl\"\n";
        let expanded = preprocess_shader("test.wgsl", source).expect("includes resolve");

        assert_eq!(expanded.matches("const PYRAMID_LEVELS").count(), 1);
        assert!(expanded.contains("struct CullView"));
        assert!(!expanded.contains("#include"));
    }

    #[test]
    fn test_missing_include_is_an_error() {
        let err = preprocess_shader("broken.wgsl", "#include \"nope.wgsl\"").unwrap_err();
        assert!(matches!(err, CullError::MissingInclude { .. }));
    }

    #[test]
    fn test_all_shaders_expand() {
        for (name, source) in [
            ("hzb_linearize.wgsl", HZB_LINEARIZE_WGSL),
            ("hzb_reduce.wgsl", HZB_REDUCE_WGSL),
            ("visibility_test.wgsl", VISIBILITY_TEST_WGSL),
            ("region_cull.wgsl", REGION_CULL_WGSL),
        ] {
            let expanded = preprocess_shader(name, source).expect("shader expands");
            assert!(expanded.contains("fn main"), "{} has no entry point", name);
        }
    }
}

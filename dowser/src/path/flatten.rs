//! Flattens a YAML document into leaf definition paths with source context.

use super::{Path, PathContext, Paths};

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use log::{debug, warn};
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, ScanError};

/// Failure to turn raw bytes into definition paths.
#[derive(Debug)]
pub enum FlattenError {
    Utf8 { file: String },
    Yaml { file: String, source: ScanError },
}

impl fmt::Display for FlattenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FlattenError::Utf8 { file } => write!(f, "{}: not valid UTF-8", file),
            FlattenError::Yaml { file, source } => write!(f, "{}: {}", file, source),
        }
    }
}

impl Error for FlattenError {}

/// Position of a node in its source file, 1-based.
#[derive(Clone, Copy, Debug)]
struct Mark {
    line: usize,
    column: usize,
}

impl From<Marker> for Mark {
    fn from(marker: Marker) -> Mark {
        // Scanner columns are 0-based.
        Mark {
            line: marker.line(),
            column: marker.col() + 1,
        }
    }
}

/// YAML tree with a source mark per node. Aliases are resolved to clones of
/// their anchor targets while the tree is built.
#[derive(Clone, Debug)]
enum YamlNode {
    Scalar { value: String, mark: Mark },
    Mapping { entries: Vec<(YamlNode, YamlNode)>, mark: Mark },
    Sequence { items: Vec<YamlNode>, mark: Mark },
}

enum OpenContainer {
    Mapping {
        entries: Vec<(YamlNode, YamlNode)>,
        pending_key: Option<YamlNode>,
        mark: Mark,
        anchor: usize,
    },
    Sequence {
        items: Vec<YamlNode>,
        mark: Mark,
        anchor: usize,
    },
}

#[derive(Default)]
struct TreeBuilder {
    documents: Vec<YamlNode>,
    stack: Vec<OpenContainer>,
    anchors: HashMap<usize, YamlNode>,
}

impl TreeBuilder {
    fn insert(&mut self, node: YamlNode) {
        match self.stack.last_mut() {
            Some(OpenContainer::Mapping {
                entries,
                pending_key,
                ..
            }) => match pending_key.take() {
                Some(key) => entries.push((key, node)),
                None => *pending_key = Some(node),
            },
            Some(OpenContainer::Sequence { items, .. }) => items.push(node),
            None => self.documents.push(node),
        }
    }

    fn close(&mut self, node: YamlNode, anchor: usize) {
        if anchor > 0 {
            self.anchors.insert(anchor, node.clone());
        }
        self.insert(node);
    }
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, event: Event, marker: Marker) {
        let mark = Mark::from(marker);
        match event {
            Event::Scalar(value, _, anchor, _) => {
                let node = YamlNode::Scalar { value, mark };
                self.close(node, anchor);
            }
            Event::MappingStart(anchor, _) => {
                self.stack.push(OpenContainer::Mapping {
                    entries: Vec::new(),
                    pending_key: None,
                    mark,
                    anchor,
                });
            }
            Event::MappingEnd => {
                if let Some(OpenContainer::Mapping {
                    entries,
                    mark,
                    anchor,
                    ..
                }) = self.stack.pop()
                {
                    self.close(YamlNode::Mapping { entries, mark }, anchor);
                }
            }
            Event::SequenceStart(anchor, _) => {
                self.stack.push(OpenContainer::Sequence {
                    items: Vec::new(),
                    mark,
                    anchor,
                });
            }
            Event::SequenceEnd => {
                if let Some(OpenContainer::Sequence { items, mark, anchor }) = self.stack.pop() {
                    self.close(YamlNode::Sequence { items, mark }, anchor);
                }
            }
            Event::Alias(anchor) => match self.anchors.get(&anchor) {
                Some(target) => {
                    let node = target.clone();
                    self.insert(node);
                }
                None => warn!("unresolved YAML alias (anchor id {})", anchor),
            },
            Event::Nothing
            | Event::StreamStart
            | Event::StreamEnd
            | Event::DocumentStart
            | Event::DocumentEnd => {}
        }
    }
}

/// Parses raw YAML and returns every leaf definition path with file
/// location context attached.
///
/// Scalars and empty containers are leaves; an empty dict or list is a
/// deliberate override point and is reported as its container path. Each
/// map-key segment carries the key node's line and column. Sequence
/// elements extend the path with their decimal index and inherit the
/// enclosing key's context.
pub fn flatten_definitions(data: &[u8], file: &str) -> Result<Paths, FlattenError> {
    if data.is_empty() {
        return Ok(Paths::new());
    }
    let source = std::str::from_utf8(data).map_err(|_| FlattenError::Utf8 {
        file: file.to_string(),
    })?;

    let mut builder = TreeBuilder::default();
    let mut parser = Parser::new_from_str(source);
    parser
        .load(&mut builder, true)
        .map_err(|source| FlattenError::Yaml {
            file: file.to_string(),
            source,
        })?;

    let mut ctx = FlattenCtx {
        file,
        out: Paths::new(),
    };
    for document in &builder.documents {
        ctx.walk(Path::new(), document);
    }
    Ok(ctx.out)
}

struct FlattenCtx<'a> {
    file: &'a str,
    out: Paths,
}

impl<'a> FlattenCtx<'a> {
    fn emit(&mut self, path: Path) {
        if path.contexts.is_empty() {
            // Only a root-level scalar or empty container can get here;
            // there is no key node to anchor a context to.
            debug!("{}: skipping leaf without context", self.file);
            return;
        }
        self.out.push(path);
    }

    fn walk(&mut self, path: Path, node: &YamlNode) {
        match node {
            YamlNode::Scalar { .. } => self.emit(path),
            YamlNode::Mapping { entries, .. } => {
                if entries.is_empty() {
                    self.emit(path);
                    return;
                }
                for (key, value) in entries {
                    let key_text = match key {
                        YamlNode::Scalar { value, .. } => value,
                        _ => {
                            warn!("{}: skipping non-scalar mapping key", self.file);
                            continue;
                        }
                    };
                    let mark = key_mark(key);
                    let mut child = path.with_key(key_text);
                    // Each segment's context replaces the inherited one; a
                    // leaf points at its own key, not the whole chain.
                    child.contexts =
                        vec![PathContext::new(self.file, mark.line, mark.column)];
                    self.walk(child, value);
                }
            }
            YamlNode::Sequence { items, .. } => {
                if items.is_empty() {
                    self.emit(path);
                    return;
                }
                for (i, item) in items.iter().enumerate() {
                    self.walk(path.with_idx(&i.to_string()), item);
                }
            }
        }
    }
}

fn key_mark(node: &YamlNode) -> Mark {
    match node {
        YamlNode::Scalar { mark, .. }
        | YamlNode::Mapping { mark, .. }
        | YamlNode::Sequence { mark, .. } => *mark,
    }
}

#[cfg(test)]
mod flatten_tests {
    use super::*;

    fn flatten(src: &str) -> Paths {
        flatten_definitions(src.as_bytes(), "values.yaml").unwrap()
    }

    fn ids(paths: &Paths) -> Vec<String> {
        paths.iter().map(Path::id).collect()
    }

    #[test]
    fn scalars_are_leaves() {
        let out = flatten("config:\n  message: hi\n  enabled: true\n");
        assert_eq!(ids(&out), vec![".config.message", ".config.enabled"]);
    }

    #[test]
    fn sequences_extend_with_indexes() {
        let out = flatten("items:\n  - name: a\n  - name: b\n");
        assert_eq!(ids(&out), vec![".items.0.name", ".items.1.name"]);
        assert_eq!(out.get(0).unwrap().kinds_string(), "/K/I/K");
    }

    #[test]
    fn empty_containers_are_leaves() {
        let out = flatten("overrides: {}\nextra: []\n");
        assert_eq!(ids(&out), vec![".overrides", ".extra"]);
    }

    #[test]
    fn contexts_point_at_the_innermost_key_node() {
        let out = flatten("a: 1\nnested:\n  b: 2\n");
        let a = out.get(0).unwrap();
        assert_eq!(a.contexts, vec![PathContext::new("values.yaml", 1, 1)]);
        let b = out.get(1).unwrap();
        assert_eq!(b.contexts, vec![PathContext::new("values.yaml", 3, 3)]);
    }

    #[test]
    fn sequence_elements_inherit_the_enclosing_key_context() {
        let out = flatten("items:\n  - name: a\n  - plain\n");
        // items.0.name points at its own key; items.1 inherits "items".
        assert_eq!(
            out.get(0).unwrap().contexts,
            vec![PathContext::new("values.yaml", 2, 5)]
        );
        assert_eq!(
            out.get(1).unwrap().contexts,
            vec![PathContext::new("values.yaml", 1, 1)]
        );
    }

    #[test]
    fn aliases_resolve_to_their_anchor() {
        let out = flatten("base: &b\n  x: 1\ncopy: *b\n");
        assert_eq!(ids(&out), vec![".base.x", ".copy.x"]);
    }

    #[test]
    fn non_string_keys_use_their_textual_form() {
        let out = flatten("80: http\ntrue: yes\n");
        assert_eq!(ids(&out), vec![".80", ".true"]);
        assert_eq!(out.get(0).unwrap().kinds_string(), "/K");
    }

    #[test]
    fn multiple_documents_all_flatten() {
        let out = flatten("a: 1\n---\nb: 2\n");
        assert_eq!(ids(&out), vec![".a", ".b"]);
    }

    #[test]
    fn empty_input_yields_no_paths() {
        assert!(flatten("").is_empty());
    }

    #[test]
    fn root_scalar_document_yields_no_paths() {
        assert!(flatten("null\n").is_empty());
    }

    #[test]
    fn dotted_keys_are_escaped() {
        let out = flatten("annotations:\n  helm.sh/hook: pre-install\n");
        assert_eq!(ids(&out), vec![".annotations.helm~.sh/hook"]);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let err = flatten_definitions(b"a: [unclosed\n", "values.yaml").unwrap_err();
        assert!(err.to_string().starts_with("values.yaml:"));
    }
}

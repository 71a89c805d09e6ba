//! Source parsing for the static extraction channel.
//!
//! Files are parsed with the TSX grammar first, then retried with the plain
//! JavaScript grammar. A file that fails both attempts is "unparsable",
//! which is a recoverable outcome (zero sites), not an error.

use thiserror::Error;
use tree_sitter::{Parser, Tree};

#[derive(Error, Debug)]
pub enum ParserInitError {
    #[error("Failed to load {grammar} grammar: {source}")]
    Grammar {
        grammar: &'static str,
        source: tree_sitter::LanguageError,
    },
}

/// Two-attempt parser for JavaScript/TypeScript sources.
pub struct SourceParser {
    typescript: Parser,
    javascript: Parser,
}

impl SourceParser {
    pub fn new() -> Result<Self, ParserInitError> {
        // TSX is a superset of plain TypeScript, so one grammar covers both.
        let mut typescript = Parser::new();
        typescript
            .set_language(&tree_sitter_typescript::LANGUAGE_TSX.into())
            .map_err(|source| ParserInitError::Grammar {
                grammar: "tsx",
                source,
            })?;

        let mut javascript = Parser::new();
        javascript
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .map_err(|source| ParserInitError::Grammar {
                grammar: "javascript",
                source,
            })?;

        Ok(Self {
            typescript,
            javascript,
        })
    }

    /// Parses source text, retrying with the JavaScript grammar when the
    /// TSX attempt produces a tree with errors.
    ///
    /// Returns `None` when both attempts fail. Parsing never partially
    /// succeeds: callers either get a usable tree or nothing.
    pub fn parse(&mut self, source: &str) -> Option<Tree> {
        if let Some(tree) = self.typescript.parse(source, None) {
            if !tree.root_node().has_error() {
                return Some(tree);
            }
        }

        if let Some(tree) = self.javascript.parse(source, None) {
            if !tree.root_node().has_error() {
                return Some(tree);
            }
        }

        None
    }
}

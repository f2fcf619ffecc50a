/// Authoring repository: owns the currently loaded tree.
///
/// Loading always builds a fresh tree and swaps it in only after it
/// validates; a failed load leaves the previous tree untouched.

use log::{debug, info};
use std::path::Path;
use thiserror::Error;

use crate::core::compiler::{CompileError, DialogueCompiler};
use crate::core::document::{self, EncodeError, Format};
use crate::core::validator::{ValidatedTree, ValidationError};
use crate::schema::tree::Tree;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0}")]
    Compile(#[from] CompileError),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown document format for '{0}' (expected .json or .ron)")]
    UnknownFormat(String),
}

#[derive(Debug, Default)]
pub struct Repository {
    compiler: DialogueCompiler,
    tree: Option<ValidatedTree>,
}

impl Repository {
    pub fn new(compiler: DialogueCompiler) -> Self {
        Self {
            compiler,
            tree: None,
        }
    }

    pub fn compiler(&self) -> &DialogueCompiler {
        &self.compiler
    }

    /// The loaded tree, if any.
    pub fn tree(&self) -> Option<&ValidatedTree> {
        self.tree.as_ref()
    }

    /// Compile a script file and make it current.
    pub fn load_script(&mut self, path: &Path) -> Result<&ValidatedTree, RepositoryError> {
        let script = std::fs::read_to_string(path)?;
        let tree = self.compiler.compile_script(&script)?;
        debug!("loaded script '{}'", path.display());
        Ok(self.tree.insert(tree))
    }

    /// Decode a `.json` or `.ron` document and make it current.
    pub fn load_document(&mut self, path: &Path) -> Result<&ValidatedTree, RepositoryError> {
        let format = format_for(path)?;
        let input = std::fs::read_to_string(path)?;
        let tree = self.compiler.compile_document(&input, format)?;
        debug!("loaded document '{}'", path.display());
        Ok(self.tree.insert(tree))
    }

    /// Validate an edited tree and make it current.
    pub fn replace(&mut self, tree: Tree) -> Result<&ValidatedTree, RepositoryError> {
        let tree = self.compiler.validate(tree)?;
        Ok(self.tree.insert(tree))
    }

    /// Drop the current tree.
    pub fn clear(&mut self) -> Option<ValidatedTree> {
        self.tree.take()
    }

    /// Write the current tree, format by extension. Saving with nothing
    /// loaded writes an empty document.
    pub fn save(&self, path: &Path) -> Result<(), RepositoryError> {
        let format = format_for(path)?;
        let empty = Tree::new();
        let tree = self.tree.as_ref().map(|t| t.tree()).unwrap_or(&empty);
        let text = document::encode(tree, format)?;
        std::fs::write(path, text)?;
        info!("saved {} entities to '{}'", tree.len(), path.display());
        Ok(())
    }
}

fn format_for(path: &Path) -> Result<Format, RepositoryError> {
    Format::from_path(path).ok_or_else(|| RepositoryError::UnknownFormat(path.display().to_string()))
}

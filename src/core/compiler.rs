/// The compile pipeline: script or document text → validated tree.
///
/// Wires together lexer, parser, graph builder and validator for scripts,
/// and the document decoder and validator for persisted trees.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::builder::{BuildError, GraphBuilder, DEFAULT_ID_WIDTH};
use crate::core::document::{self, DecodeError, Format};
use crate::core::lexer::{self, LexError};
use crate::core::parser::{self, ParseError};
use crate::core::validator::{
    Diagnostics, OrphanPolicy, ValidatedTree, ValidationError, Validator, ValidatorConfig,
};
use crate::schema::ids::DialogueId;
use crate::schema::tree::Tree;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("build error: {0}")]
    Build(#[from] BuildError),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Compiler settings, usually kept next to the scripts as a `.ron` file.
///
/// ```ron
/// (
///     id_width: 4,
///     orphan_policy: Warn,
///     shared_dialogues: ["farewell"],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub id_width: usize,
    pub orphan_policy: OrphanPolicy,
    pub shared_dialogues: BTreeSet<DialogueId>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            id_width: DEFAULT_ID_WIDTH,
            orphan_policy: OrphanPolicy::default(),
            shared_dialogues: BTreeSet::new(),
        }
    }
}

impl CompilerConfig {
    /// Load a config from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<CompilerConfig, CompileError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<CompilerConfig, CompileError> {
        Ok(ron::from_str(input)?)
    }

    fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            orphan_policy: self.orphan_policy,
            shared_dialogues: self.shared_dialogues.clone(),
        }
    }
}

/// Compiles scripts and documents into validated trees. Built via
/// `DialogueCompiler::builder()`.
#[derive(Debug, Clone)]
pub struct DialogueCompiler {
    id_width: usize,
    validator: Validator,
}

/// Builder for constructing a `DialogueCompiler`.
#[derive(Debug, Default)]
pub struct DialogueCompilerBuilder {
    config_file: Option<PathBuf>,
    /// Directly provided config (for use without files).
    config: Option<CompilerConfig>,
    id_width: Option<usize>,
    orphan_policy: Option<OrphanPolicy>,
    shared_dialogues: Vec<DialogueId>,
}

impl Default for DialogueCompiler {
    fn default() -> Self {
        Self::from_config(&CompilerConfig::default())
    }
}

impl DialogueCompiler {
    pub fn builder() -> DialogueCompilerBuilder {
        DialogueCompilerBuilder::default()
    }

    pub fn from_config(config: &CompilerConfig) -> Self {
        Self {
            id_width: config.id_width.max(1),
            validator: Validator::new(config.validator_config()),
        }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Lex, parse and build a script without validating the result.
    pub fn build_script(&self, script: &str) -> Result<Tree, CompileError> {
        let tokens = lexer::tokenize(script)?;
        let nodes = parser::parse(&tokens)?;
        debug!("{} tokens, {} commands", tokens.len(), nodes.len());

        let mut builder = GraphBuilder::new().id_width(self.id_width);
        builder.apply_all(&nodes)?;
        Ok(builder.finish())
    }

    /// Script text to validated tree.
    pub fn compile_script(&self, script: &str) -> Result<ValidatedTree, CompileError> {
        let tree = self.build_script(script)?;
        Ok(self.validate(tree)?)
    }

    /// Persisted document text to validated tree.
    pub fn compile_document(
        &self,
        input: &str,
        format: Format,
    ) -> Result<ValidatedTree, CompileError> {
        let tree = document::decode(input, format)?;
        Ok(self.validate(tree)?)
    }

    pub fn validate(&self, tree: Tree) -> Result<ValidatedTree, ValidationError> {
        self.validator.validate(tree)
    }

    /// Full findings for a tree, including warnings and notes.
    pub fn check(&self, tree: &Tree) -> Diagnostics {
        self.validator.check(tree)
    }
}

impl DialogueCompilerBuilder {
    /// Read settings from a RON file at build time. Explicit builder
    /// settings override what the file says.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Provide a config directly (for use without files).
    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn id_width(mut self, width: usize) -> Self {
        self.id_width = Some(width);
        self
    }

    pub fn orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = Some(policy);
        self
    }

    /// Mark a dialogue as shared. Shared dialogues are entered by game code
    /// and are never orphans.
    pub fn shared_dialogue(mut self, dialogue: impl Into<DialogueId>) -> Self {
        self.shared_dialogues.push(dialogue.into());
        self
    }

    pub fn build(self) -> Result<DialogueCompiler, CompileError> {
        let mut config = match (&self.config_file, self.config) {
            (Some(path), _) => CompilerConfig::load_from_ron(path)?,
            (None, Some(config)) => config,
            (None, None) => CompilerConfig::default(),
        };

        if let Some(width) = self.id_width {
            config.id_width = width;
        }
        if let Some(policy) = self.orphan_policy {
            config.orphan_policy = policy;
        }
        config.shared_dialogues.extend(self.shared_dialogues);

        Ok(DialogueCompiler::from_config(&config))
    }
}

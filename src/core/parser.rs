/// Script parser: turns a token sequence into script nodes.
///
/// Grammar, one statement per command keyword:
///
/// ```text
/// create scene    [id] <start>
/// create dialogue [id] "text" <action>*
/// create action   [id] <owner> <next|end> ["reply"]
/// update <type> <id> <fields as for create>
/// delete <type> <id>
/// ```
///
/// Parsing stops at the first error. There is no recovery.

use std::fmt;
use thiserror::Error;

use crate::core::lexer::{Position, Token, TokenKind};
use crate::schema::entity::EntityKind;
use crate::schema::ids::{ActionId, DialogueId, NextDialogue};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("command {index}: expected {expected}, found {found}")]
pub struct ParseError {
    /// 1-based index of the offending command in the script.
    pub index: usize,
    pub expected: String,
    pub found: String,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Create,
    Update,
    Delete,
}

impl Command {
    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// The typed fields of a create or update statement, in script order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fields {
    Scene {
        start: DialogueId,
    },
    Dialogue {
        text: String,
        actions: Vec<ActionId>,
    },
    Action {
        owner: DialogueId,
        next: NextDialogue,
        text: Option<String>,
    },
}

/// One parsed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptNode {
    /// 1-based index of this command in the script.
    pub index: usize,
    pub command: Command,
    pub kind: EntityKind,
    /// Explicit identifier. Always present for update and delete.
    pub id: Option<String>,
    /// `None` only for delete.
    pub fields: Option<Fields>,
    pub position: Position,
}

/// Parse a full token sequence into script nodes.
pub fn parse(tokens: &[Token]) -> Result<Vec<ScriptNode>, ParseError> {
    let mut nodes = Vec::new();
    let mut rest = tokens;

    if let Some(first) = rest.first() {
        if first.kind != TokenKind::Command {
            return Err(ParseError {
                index: 1,
                expected: "a command (create, update or delete)".to_string(),
                found: describe(Some(first)),
                position: Some(first.position),
            });
        }
    }

    while !rest.is_empty() {
        let end = rest[1..]
            .iter()
            .position(|t| t.kind == TokenKind::Command)
            .map_or(rest.len(), |p| p + 1);
        let (statement, tail) = rest.split_at(end);
        nodes.push(StatementParser::new(statement, nodes.len() + 1).parse()?);
        rest = tail;
    }

    Ok(nodes)
}

fn describe(token: Option<&Token>) -> String {
    match token {
        Some(t) if t.kind == TokenKind::Text => format!("{} \"{}\"", t.kind, t.text),
        Some(t) => format!("{} '{}'", t.kind, t.text),
        None => "end of statement".to_string(),
    }
}

struct StatementParser<'t> {
    tokens: &'t [Token],
    cursor: usize,
    index: usize,
}

impl<'t> StatementParser<'t> {
    fn new(tokens: &'t [Token], index: usize) -> Self {
        Self {
            tokens,
            cursor: 0,
            index,
        }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.cursor)
    }

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.cursor);
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn error(&self, expected: impl Into<String>, found: Option<&Token>) -> ParseError {
        ParseError {
            index: self.index,
            expected: expected.into(),
            found: describe(found),
            position: found
                .or_else(|| self.tokens.last())
                .map(|t| t.position),
        }
    }

    fn parse(mut self) -> Result<ScriptNode, ParseError> {
        // The statement splitter guarantees a leading command token.
        let head = self.next().ok_or_else(|| self.error("a command", None))?;
        let command = Command::from_keyword(&head.text)
            .ok_or_else(|| self.error("a command (create, update or delete)", Some(head)))?;

        let kind_token = self.next();
        let kind = match kind_token {
            Some(t) if t.kind == TokenKind::NodeType => EntityKind::from_keyword(&t.text)
                .ok_or_else(|| self.error("scene, dialogue or action", Some(t)))?,
            other => return Err(self.error("scene, dialogue or action", other)),
        };

        let (id, fields) = match command {
            Command::Delete => {
                let id = self.expect_identifier("the identifier to delete")?;
                (Some(id), None)
            }
            Command::Create | Command::Update => {
                let required_id = command == Command::Update;
                let (id, fields) = match kind {
                    EntityKind::Scene => self.scene_fields(required_id)?,
                    EntityKind::Dialogue => self.dialogue_fields(required_id)?,
                    EntityKind::Action => self.action_fields(required_id)?,
                };
                (id, Some(fields))
            }
        };

        if let Some(extra) = self.peek() {
            return Err(self.error("end of statement", Some(extra)));
        }

        Ok(ScriptNode {
            index: self.index,
            command,
            kind,
            id,
            fields,
            position: head.position,
        })
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        match self.next() {
            Some(t) if t.is_identifier_like() => Ok(t.text.clone()),
            other => Err(self.error(what, other)),
        }
    }

    /// Consume consecutive identifier-like tokens.
    fn identifiers(&mut self) -> Vec<&'t Token> {
        let mut ids = Vec::new();
        while let Some(t) = self.peek() {
            if !t.is_identifier_like() {
                break;
            }
            ids.push(t);
            self.cursor += 1;
        }
        ids
    }

    fn scene_fields(&mut self, required_id: bool) -> Result<(Option<String>, Fields), ParseError> {
        let ids = self.identifiers();
        let (id, start) = match (ids.as_slice(), required_id) {
            ([start], false) => (None, *start),
            ([id, start], _) => (Some(id.text.clone()), *start),
            ([_], true) => return Err(self.error("a starting dialogue identifier", self.peek())),
            ([], _) => return Err(self.error("a starting dialogue identifier", self.peek())),
            (too_many, _) => return Err(self.error("end of statement", Some(too_many[2]))),
        };
        Ok((
            id,
            Fields::Scene {
                start: DialogueId::new(start.text.clone()),
            },
        ))
    }

    fn dialogue_fields(
        &mut self,
        required_id: bool,
    ) -> Result<(Option<String>, Fields), ParseError> {
        let ids = self.identifiers();
        let id = match (ids.as_slice(), required_id) {
            ([], false) => None,
            ([id], _) => Some(id.text.clone()),
            ([], true) => return Err(self.error("a dialogue identifier", self.peek())),
            (too_many, _) => return Err(self.error("quoted dialogue text", Some(too_many[1]))),
        };

        let text = match self.next() {
            Some(t) if t.kind == TokenKind::Text => t.text.clone(),
            other => return Err(self.error("quoted dialogue text", other)),
        };

        let actions = self
            .identifiers()
            .into_iter()
            .map(|t| ActionId::new(t.text.clone()))
            .collect();

        Ok((id, Fields::Dialogue { text, actions }))
    }

    fn action_fields(&mut self, required_id: bool) -> Result<(Option<String>, Fields), ParseError> {
        let mut refs = Vec::new();
        while let Some(t) = self.peek() {
            if !(t.is_identifier_like() || t.kind == TokenKind::Name) {
                break;
            }
            refs.push(t);
            self.cursor += 1;
        }

        let (id, owner, next) = match (refs.as_slice(), required_id) {
            ([owner, next], false) => (None, *owner, *next),
            ([id, owner, next], _) => (Some(id.text.clone()), *owner, *next),
            ([_, _], true) | ([_], _) | ([], _) => {
                return Err(self.error(
                    "owner and next dialogue identifiers (or 'end')",
                    self.peek(),
                ))
            }
            (too_many, _) => return Err(self.error("end of statement", Some(too_many[3]))),
        };

        // The terminal sentinel may only stand in the next-dialogue slot.
        if owner.kind == TokenKind::Name {
            return Err(self.error("an owning dialogue identifier", Some(owner)));
        }
        if let Some(id_token) = refs.first().filter(|_| id.is_some()) {
            if id_token.kind == TokenKind::Name {
                return Err(self.error("an action identifier", Some(id_token)));
            }
        }

        let next = NextDialogue::parse(&next.text)
            .ok_or_else(|| self.error("a next dialogue identifier or 'end'", Some(next)))?;

        let text = match self.peek() {
            Some(t) if t.kind == TokenKind::Text => {
                self.cursor += 1;
                Some(t.text.clone())
            }
            _ => None,
        };

        Ok((
            id,
            Fields::Action {
                owner: DialogueId::new(owner.text.clone()),
                next,
                text,
            },
        ))
    }
}

//! Field selector parser
//!
//! Grammar, informally:
//!
//! ```text
//! fields    := term ("," term)*
//! term      := ["!" | "-"] name modifier*
//! modifier  := block | transform
//! block     := ("[" | "(") fields ("]" | ")")?
//! transform := ("::" | "~" | "|") ident ["(" args ")"]
//! ```
//!
//! Parsing is purely syntactic. Names are checked against the schema later.

use thiserror::Error;

use super::predicate::Fields;
use super::transform::Transform;

/// What went wrong while parsing a selector
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("Unbalanced closing bracket at position {position}")]
    UnbalancedClosing { position: usize },

    #[error("Block must have a field name (position {position})")]
    BlockWithoutName { position: usize },

    #[error("Missing closing parenthesis for transformer `{transform}`")]
    UnclosedArguments { transform: String },

    #[error("Invalid field transformer(s): {names}")]
    UnknownTransforms { names: String },

    #[error("Duplicate transformers `{transform}` on field `{field}`")]
    DuplicateTransforms { field: String, transform: String },

    #[error("Field `{field}` cannot combine transformers `{first}` and `{second}`")]
    ConflictingTransforms {
        field: String,
        first: String,
        second: String,
    },

    #[error("Transformer `{transform}` expects {expected} argument(s) but got {actual}")]
    TransformArity {
        transform: String,
        expected: String,
        actual: usize,
    },

    #[error("Invalid auto tier `{tier}`, expected one of XS, S, M, L, XL")]
    InvalidTier { tier: String },
}

/// A selector that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct FieldsParseError {
    input: String,
    kind: ParseErrorKind,
}

impl FieldsParseError {
    /// The selector as it was received
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }
}

/// Parse a field selector such as `*,first[second[!third]]`
pub fn parse_fields(input: &str) -> Result<Fields, FieldsParseError> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
    };
    parser.level(0).map_err(|kind| FieldsParseError {
        input: input.to_string(),
        kind,
    })
}

/// A single parsed term before it is folded into its level
struct Term {
    name: String,
    excluded: bool,
    block: Option<Fields>,
    transforms: Vec<Transform>,
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn level(&mut self, depth: usize) -> Result<Fields, ParseErrorKind> {
        let mut fields = Fields::default();
        loop {
            match self.peek() {
                None => return Ok(fields),
                Some(']') | Some(')') => {
                    if depth == 0 {
                        return Err(ParseErrorKind::UnbalancedClosing { position: self.pos });
                    }
                    self.pos += 1;
                    return Ok(fields);
                }
                Some(',') => self.pos += 1,
                Some(_) => {
                    let term = self.term(depth)?;
                    apply(&mut fields, term)?;
                }
            }
        }
    }

    fn term(&mut self, depth: usize) -> Result<Term, ParseErrorKind> {
        self.skip_whitespace();
        let excluded = matches!(self.peek(), Some('!') | Some('-'));
        if excluded {
            self.pos += 1;
        }

        let name = self.name();
        let mut block: Option<Fields> = None;
        let mut transforms = Vec::new();
        let mut unknown = Vec::new();

        loop {
            match self.peek() {
                Some('[') | Some('(') => {
                    if name.is_empty() {
                        return Err(ParseErrorKind::BlockWithoutName { position: self.pos });
                    }
                    self.pos += 1;
                    let nested = self.level(depth + 1)?;
                    if nested.is_empty() {
                        continue;
                    }
                    match block.as_mut() {
                        Some(existing) => existing.merge(nested)?,
                        None => block = Some(nested),
                    }
                }
                Some(':') if self.peek_at(1) == Some(':') => {
                    self.pos += 2;
                    self.transform(&mut transforms, &mut unknown)?;
                }
                Some('~') | Some('|') => {
                    self.pos += 1;
                    self.transform(&mut transforms, &mut unknown)?;
                }
                Some(c) if c.is_whitespace() => self.pos += 1,
                _ => break,
            }
        }

        if !unknown.is_empty() {
            return Err(ParseErrorKind::UnknownTransforms {
                names: unknown.join(", "),
            });
        }

        Ok(Term {
            name,
            excluded,
            block,
            transforms,
        })
    }

    /// Read a name, dropping any whitespace inside it
    fn name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            match c {
                ',' | '[' | ']' | '(' | ')' | '~' | '|' => break,
                ':' if !name.is_empty() && self.peek_at(1) == Some(':') => break,
                c if c.is_whitespace() => self.pos += 1,
                c => {
                    name.push(c);
                    self.pos += 1;
                }
            }
        }
        name
    }

    fn transform(
        &mut self,
        transforms: &mut Vec<Transform>,
        unknown: &mut Vec<String>,
    ) -> Result<(), ParseErrorKind> {
        self.skip_whitespace();
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                ident.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }

        let mut args = Vec::new();
        if self.peek() == Some('(') {
            self.pos += 1;
            let mut current = String::new();
            let mut closed = false;
            while let Some(c) = self.peek() {
                self.pos += 1;
                match c {
                    ')' => {
                        closed = true;
                        break;
                    }
                    ',' | ';' => args.push(std::mem::take(&mut current)),
                    c => current.push(c),
                }
            }
            if !closed {
                return Err(ParseErrorKind::UnclosedArguments { transform: ident });
            }
            args.push(current);
        }

        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        match Transform::from_parts(&ident, args) {
            Ok(transform) => transforms.push(transform),
            Err(ParseErrorKind::UnknownTransforms { .. }) => unknown.push(ident),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }
}

fn apply(fields: &mut Fields, term: Term) -> Result<(), ParseErrorKind> {
    let Term {
        name,
        excluded,
        block,
        transforms,
    } = term;

    if name.is_empty() {
        return Ok(());
    }
    // `!*` and `!:all` mean the same as their positive form
    if name == "*" || name == ":all" {
        fields.set_all();
        return Ok(());
    }
    if name.starts_with(':') {
        fields.add_preset(name);
        return Ok(());
    }
    if excluded {
        fields.exclude(name);
        return Ok(());
    }
    fields.include(name, block, transforms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_names() {
        let fields = parse_fields("id,name,code").unwrap();
        let names: Vec<&str> = fields.included_names().collect();
        assert_eq!(names, vec!["id", "name", "code"]);
    }

    #[test]
    fn test_whitespace_inside_names_is_dropped() {
        let fields = parse_fields(" gro  up , na me").unwrap();
        assert!(fields.is_explicit("group"));
        assert!(fields.is_explicit("name"));
    }

    #[test]
    fn test_wildcard_and_presets() {
        let fields = parse_fields("*,:simple").unwrap();
        assert!(fields.is_all());
        assert_eq!(fields.presets().collect::<Vec<_>>(), vec![":simple"]);

        assert!(parse_fields(":all").unwrap().is_all());
        assert!(parse_fields("!*").unwrap().is_all());
    }

    #[test]
    fn test_exclusion_overrules_inclusion() {
        let fields = parse_fields("!first,first").unwrap();
        assert!(!fields.test("first"));
        assert!(!fields.includes("first.second"));

        let fields = parse_fields("group[code],!group").unwrap();
        assert!(!fields.includes("group.code"));
    }

    #[test]
    fn test_excluded_block_is_plain_exclusion() {
        let fields = parse_fields("*,!group[code]").unwrap();
        assert!(fields.is_excluded("group"));
        assert!(!fields.includes("group.name"));
    }

    #[test]
    fn test_exclusion_only_affects_its_level() {
        let fields = parse_fields("!code,group[code]").unwrap();
        assert!(!fields.test("code"));
        assert!(fields.includes("group.code"));
    }

    #[test]
    fn test_exclusion_only_block_means_all_except() {
        let fields = parse_fields("relationships[!from]").unwrap();
        assert!(fields.includes("relationships.to"));
        assert!(!fields.includes("relationships.from"));
    }

    #[test]
    fn test_wildcard_with_nested_exclusion() {
        let fields = parse_fields("*,first[second[!third]]").unwrap();
        assert!(fields.includes("first.second"));
        assert!(!fields.includes("first.second.third"));
        assert!(fields.includes("other"));
    }

    #[test]
    fn test_parent_includes_children() {
        let fields = parse_fields("first").unwrap();
        assert!(fields.includes("first.second.third"));
    }

    #[test]
    fn test_parentheses_and_brackets_mix() {
        let a = parse_fields("group(id,name)").unwrap();
        let b = parse_fields("group[id,name]").unwrap();
        assert_eq!(a, b);
        assert!(parse_fields("group[id,name)").is_ok());
    }

    #[test]
    fn test_repeated_blocks_merge() {
        let fields = parse_fields("group[id],group[name]").unwrap();
        assert!(fields.includes("group.id"));
        assert!(fields.includes("group.name"));
        assert!(!fields.includes("group.code"));
    }

    #[test]
    fn test_missing_closing_bracket_is_tolerated() {
        let fields = parse_fields("group[id,users[name").unwrap();
        assert!(fields.includes("group.users.name"));
    }

    #[test]
    fn test_unbalanced_closing_bracket() {
        let err = parse_fields("id]").unwrap_err();
        assert!(matches!(err.kind(), ParseErrorKind::UnbalancedClosing { position: 2 }));
        assert!(err.to_string().starts_with("Unbalanced"));
        assert_eq!(err.input(), "id]");
    }

    #[test]
    fn test_block_without_name() {
        let err = parse_fields("[id]").unwrap_err();
        assert!(err.to_string().contains("Block must have a field name"));
    }

    #[test]
    fn test_transform_syntaxes() {
        let fields = parse_fields("a::size,b~ids,c|is-empty").unwrap();
        assert_eq!(fields.transforms("a"), &[Transform::Size]);
        assert_eq!(fields.transforms("b"), &[Transform::Ids]);
        assert_eq!(fields.transforms("c"), &[Transform::IsEmpty]);
    }

    #[test]
    fn test_transform_arguments() {
        let fields = parse_fields("users::pluck(id;surname)").unwrap();
        assert_eq!(
            fields.transforms("users"),
            &[Transform::Pluck(vec!["id".to_string(), "surname".to_string()])]
        );

        let fields = parse_fields("users::pluck(id, surname)").unwrap();
        assert_eq!(
            fields.transforms("users"),
            &[Transform::Pluck(vec!["id".to_string(), "surname".to_string()])]
        );
    }

    #[test]
    fn test_pluck_without_parentheses() {
        let a = parse_fields("users::pluck").unwrap();
        let b = parse_fields("users::pluck()").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.transforms("users"), &[Transform::Pluck(vec![])]);
    }

    #[test]
    fn test_transform_before_and_after_block() {
        let fields = parse_fields("groups::rename(g)[name]").unwrap();
        assert!(fields.includes("groups.name"));
        assert_eq!(
            fields.transforms("groups"),
            &[Transform::Rename("g".to_string())]
        );

        let fields = parse_fields("x[a]~rename(b)").unwrap();
        assert!(fields.includes("x.a"));
        assert_eq!(fields.transforms("x"), &[Transform::Rename("b".to_string())]);
    }

    #[test]
    fn test_unknown_transformers_are_listed() {
        let err = parse_fields("a::foo::bar").unwrap_err();
        assert_eq!(err.to_string(), "Invalid field transformer(s): foo, bar");
    }

    #[test]
    fn test_duplicate_transformers() {
        let err = parse_fields("a::rename(b)::rename(c)").unwrap_err();
        assert!(err.to_string().starts_with("Duplicate transformers"));

        let err = parse_fields("a::size,a::size").unwrap_err();
        assert!(matches!(err.kind(), ParseErrorKind::DuplicateTransforms { .. }));
    }

    #[test]
    fn test_competing_value_transforms() {
        let err = parse_fields("users::size::ids").unwrap_err();
        assert!(matches!(err.kind(), ParseErrorKind::ConflictingTransforms { .. }));
    }

    #[test]
    fn test_unclosed_transform_arguments() {
        let err = parse_fields("users::pluck(id").unwrap_err();
        assert!(matches!(err.kind(), ParseErrorKind::UnclosedArguments { .. }));
    }

    #[test]
    fn test_empty_terms_and_blocks_are_ignored() {
        let fields = parse_fields("id,,name,group[]").unwrap();
        assert_eq!(fields.included_names().count(), 3);
        assert!(fields.children("group").is_none());
    }
}

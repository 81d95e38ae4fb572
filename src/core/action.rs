//! Action lists: the `m1; m2(1, "a"); m3(*)` mini-language.
//!
//! Transition effects and state entry/exit/do actions are declared as
//! semicolon-separated lists of calls. Each call is parsed once, at
//! construction time, into an [`ActionCall`]. Arguments are constants only;
//! nothing is ever evaluated.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use thiserror::Error;

/// Actions handled by the machine and its driver instead of the host.
pub const BUILTINS: [&str; 4] = ["start_timer", "stop_timer", "send", "terminate"];

/// Errors produced while parsing an action list.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("Unbalanced parentheses in action '{item}'")]
    Unbalanced { item: String },

    #[error("Unterminated string literal in '{input}'")]
    UnterminatedString { input: String },

    #[error("Action '{item}' has no name")]
    EmptyName { item: String },

    #[error("Invalid action name '{name}'")]
    InvalidName { name: String },

    #[error("Invalid literal '{literal}' in action '{item}'")]
    InvalidLiteral { item: String, literal: String },
}

/// One parsed action call.
///
/// A call either carries the literal arguments written in its declaration, or
/// is marked with `(*)` to receive the arguments of the event being handled.
///
/// # Example
///
/// ```rust
/// use runstate::core::{parse_actions, ActionCall};
/// use serde_json::json;
///
/// let actions = parse_actions(r#"on_init; start_timer("t", 1000); log(*)"#).unwrap();
/// assert_eq!(actions[0], ActionCall::new("on_init"));
/// assert_eq!(actions[1].args(), &[json!("t"), json!(1000)]);
/// assert!(actions[2].uses_event_args());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    name: String,
    args: Vec<Value>,
    event_args: bool,
}

impl ActionCall {
    /// A call without arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            event_args: false,
        }
    }

    /// A call with literal arguments.
    pub fn with_args(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
            event_args: false,
        }
    }

    /// A call that receives the arguments of the triggering event.
    pub fn with_event_args(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            event_args: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Literal arguments captured at declaration time.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn uses_event_args(&self) -> bool {
        self.event_args
    }

    /// Whether the call is routed to the machine rather than its host.
    pub fn is_builtin(&self) -> bool {
        BUILTINS.contains(&self.name.as_str())
    }
}

impl fmt::Display for ActionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.event_args {
            return write!(f, "{}(*)", self.name);
        }
        if self.args.is_empty() {
            return f.write_str(&self.name);
        }
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

/// Parse a semicolon-separated action list.
///
/// Empty segments are skipped, so `""`, `"  "` and `"a;;b;"` are all valid.
pub fn parse_actions(input: &str) -> Result<Vec<ActionCall>, ParseError> {
    let outside = unquoted(input).ok_or_else(|| ParseError::UnterminatedString {
        input: input.trim().to_string(),
    })?;

    let cuts = outside
        .iter()
        .filter(|(_, c)| *c == ';')
        .map(|(i, _)| *i)
        .chain(std::iter::once(input.len()));

    let mut actions = Vec::new();
    let mut start = 0;
    for end in cuts {
        let item = input[start..end].trim();
        start = end + 1;
        if !item.is_empty() {
            actions.push(parse_action(item)?);
        }
    }
    Ok(actions)
}

fn parse_action(item: &str) -> Result<ActionCall, ParseError> {
    // Segments are cut outside string literals, so their quotes balance.
    let outside = unquoted(item).unwrap_or_default();
    let opens: Vec<usize> = positions(&outside, '(');
    let closes: Vec<usize> = positions(&outside, ')');

    let Some(&open) = opens.first() else {
        if !closes.is_empty() {
            return Err(unbalanced(item));
        }
        return Ok(ActionCall::new(valid_name(item, item)?));
    };
    if opens.len() != 1 || closes != [item.len() - 1] {
        return Err(unbalanced(item));
    }

    let name = valid_name(item[..open].trim(), item)?;
    let inner = item[open + 1..item.len() - 1].trim();
    if inner.is_empty() {
        return Ok(ActionCall::new(name));
    }
    if inner == "*" {
        return Ok(ActionCall::with_event_args(name));
    }

    let mut args = Vec::new();
    for literal in split_unquoted(inner, ',') {
        let literal = literal.trim();
        if literal.is_empty() {
            continue;
        }
        let value = parse_literal(literal).ok_or_else(|| ParseError::InvalidLiteral {
            item: item.to_string(),
            literal: literal.to_string(),
        })?;
        args.push(value);
    }
    Ok(ActionCall::with_args(name, args))
}

fn unbalanced(item: &str) -> ParseError {
    ParseError::Unbalanced {
        item: item.to_string(),
    }
}

fn valid_name<'a>(name: &'a str, item: &str) -> Result<&'a str, ParseError> {
    if name.is_empty() {
        return Err(ParseError::EmptyName {
            item: item.to_string(),
        });
    }
    let starts_well = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !starts_well || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ParseError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(name)
}

/// Characters of `input` outside string literals, with their byte offsets.
/// `None` when a literal is left open.
fn unquoted(input: &str) -> Option<Vec<(usize, char)>> {
    let mut outside = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None => outside.push((i, c)),
        }
    }
    quote.is_none().then_some(outside)
}

fn positions(outside: &[(usize, char)], target: char) -> Vec<usize> {
    outside
        .iter()
        .filter(|(_, c)| *c == target)
        .map(|(i, _)| *i)
        .collect()
}

fn split_unquoted(input: &str, separator: char) -> Vec<&str> {
    let outside = unquoted(input).unwrap_or_default();
    let mut parts = Vec::new();
    let mut start = 0;
    for i in positions(&outside, separator) {
        parts.push(&input[start..i]);
        start = i + separator.len_utf8();
    }
    parts.push(&input[start..]);
    parts
}

fn parse_literal(literal: &str) -> Option<Value> {
    match literal {
        "true" | "True" => return Some(Value::Bool(true)),
        "false" | "False" => return Some(Value::Bool(false)),
        "null" | "None" => return Some(Value::Null),
        _ => {}
    }
    if let Some(quote) = literal.chars().next().filter(|c| *c == '"' || *c == '\'') {
        return unquote(literal, quote).map(Value::String);
    }
    if let Ok(int) = literal.parse::<i64>() {
        return Some(Value::from(int));
    }
    literal
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn unquote(literal: &str, quote: char) -> Option<String> {
    let body = literal.strip_prefix(quote)?.strip_suffix(quote)?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let unescaped = match chars.next()? {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    'u' => {
                        let hex: String = chars.by_ref().take(4).collect();
                        if hex.len() != 4 {
                            return None;
                        }
                        char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?
                    }
                    other @ ('\\' | '\'' | '"' | '/') => other,
                    _ => return None,
                };
                out.push(unescaped);
            }
            c if c == quote => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_names_and_empty_parentheses() {
        let actions = parse_actions("m1; m2()").unwrap();
        assert_eq!(actions, vec![ActionCall::new("m1"), ActionCall::new("m2")]);
    }

    #[test]
    fn literal_arguments_are_constants() {
        let actions = parse_actions(r#"m3(1, True, "a", 2.5, 'b', None)"#).unwrap();
        assert_eq!(
            actions[0].args(),
            &[
                json!(1),
                json!(true),
                json!("a"),
                json!(2.5),
                json!("b"),
                Value::Null
            ]
        );
        assert!(!actions[0].uses_event_args());
    }

    #[test]
    fn asterisk_marks_event_arguments() {
        let actions = parse_actions("m4(*)").unwrap();
        assert_eq!(actions, vec![ActionCall::with_event_args("m4")]);
    }

    #[test]
    fn empty_segments_are_skipped() {
        assert!(parse_actions("").unwrap().is_empty());
        assert!(parse_actions("  ;  ; ").unwrap().is_empty());

        let actions = parse_actions(r#"start_timer("t1", 100); stop_timer("t2");"#).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1].name(), "stop_timer");
    }

    #[test]
    fn separators_inside_strings_do_not_split() {
        let actions = parse_actions(r#"say("a; b, c"); next"#).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].args(), &[json!("a; b, c")]);
    }

    #[test]
    fn escapes_in_strings() {
        let actions = parse_actions(r#"say("line\n\"quoted\"", 'it\'s')"#).unwrap();
        assert_eq!(
            actions[0].args(),
            &[json!("line\n\"quoted\""), json!("it's")]
        );
    }

    #[test]
    fn unbalanced_parentheses_are_rejected() {
        assert!(matches!(
            parse_actions("m(1"),
            Err(ParseError::Unbalanced { .. })
        ));
        assert!(matches!(
            parse_actions("m1)"),
            Err(ParseError::Unbalanced { .. })
        ));
        assert!(matches!(
            parse_actions("m((1))"),
            Err(ParseError::Unbalanced { .. })
        ));
        assert!(matches!(
            parse_actions("m(1) extra"),
            Err(ParseError::Unbalanced { .. })
        ));
    }

    #[test]
    fn unterminated_string_is_rejected() {
        assert!(matches!(
            parse_actions(r#"say("oops)"#),
            Err(ParseError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn expressions_are_not_literals() {
        let err = parse_actions("m(1 + 2)").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidLiteral {
                item: "m(1 + 2)".to_string(),
                literal: "1 + 2".to_string(),
            }
        );
        assert!(matches!(
            parse_actions("m(os)"),
            Err(ParseError::InvalidLiteral { .. })
        ));
        assert!(matches!(
            parse_actions("m(*, 1)"),
            Err(ParseError::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn names_are_validated() {
        assert!(matches!(
            parse_actions("(1)"),
            Err(ParseError::EmptyName { .. })
        ));
        assert!(matches!(
            parse_actions("do-it"),
            Err(ParseError::InvalidName { .. })
        ));
        assert!(matches!(
            parse_actions("9lives"),
            Err(ParseError::InvalidName { .. })
        ));
    }

    #[test]
    fn builtins_are_recognised() {
        let actions = parse_actions(r#"start_timer("t", 10); terminate; on_tick"#).unwrap();
        assert!(actions[0].is_builtin());
        assert!(actions[1].is_builtin());
        assert!(!actions[2].is_builtin());
    }

    #[test]
    fn display_renders_the_declaration() {
        let actions = parse_actions(r#"a; b(1, "x"); c(*)"#).unwrap();
        let rendered: Vec<String> = actions.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["a", r#"b(1, "x")"#, "c(*)"]);
    }
}

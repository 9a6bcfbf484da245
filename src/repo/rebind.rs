//! Placeholder rebinding.
//!
//! SQL is built with the neutral `?` marker. Postgres needs positional `$n`
//! markers, but `?` is also a JSONB operator (`?`, `?|`, `?&`), so the text is
//! scanned lexically instead of substituted blindly.

use sea_orm::DbBackend;

#[derive(Clone, PartialEq, Eq)]
enum Lexeme {
    Code,
    Literal,
    /// `E'...'`: a backslash escapes the next character.
    EscapeLiteral,
    Identifier,
    LineComment,
    BlockComment(usize),
    /// Body of `$tag$ ... $tag$`, holding the full delimiter.
    DollarQuoted(String),
}

/// Rewrites bind markers in `sql` into the syntax expected by `backend`.
///
/// Text inside `'...'` and `E'...'` literals, `"..."` identifiers, `$tag$`
/// dollar quotes and `--` or `/* */` comments is copied verbatim, as are the
/// JSONB operators `?|`, `?&` and `? 'key'`. Rebinding an already rebound
/// statement returns it unchanged.
pub fn rebind(backend: DbBackend, sql: &str) -> String {
    match backend {
        DbBackend::Postgres => rebind_positional(sql),
        DbBackend::MySql | DbBackend::Sqlite => sql.to_owned(),
    }
}

fn rebind_positional(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut state = Lexeme::Code;
    let mut position = 0usize;
    let mut after_word = false;
    let mut idx = 0usize;

    while let Some(ch) = sql[idx..].chars().next() {
        let rest = &sql[idx..];
        let mut step = ch.len_utf8();
        let mut next = None;

        match &state {
            Lexeme::Literal => {
                if ch == '\'' {
                    next = Some(Lexeme::Code);
                }
            }
            Lexeme::EscapeLiteral => {
                if ch == '\\' {
                    step += rest[1..].chars().next().map_or(0, char::len_utf8);
                } else if ch == '\'' {
                    next = Some(Lexeme::Code);
                }
            }
            Lexeme::Identifier => {
                if ch == '"' {
                    next = Some(Lexeme::Code);
                }
            }
            Lexeme::LineComment => {
                if ch == '\n' {
                    next = Some(Lexeme::Code);
                }
            }
            Lexeme::BlockComment(depth) => {
                if rest.starts_with("*/") {
                    step = 2;
                    next = Some(match depth {
                        1 => Lexeme::Code,
                        _ => Lexeme::BlockComment(depth - 1),
                    });
                } else if rest.starts_with("/*") {
                    step = 2;
                    next = Some(Lexeme::BlockComment(depth + 1));
                }
            }
            Lexeme::DollarQuoted(tag) => {
                if rest.starts_with(tag.as_str()) {
                    step = tag.len();
                    next = Some(Lexeme::Code);
                }
            }
            Lexeme::Code => match ch {
                'E' | 'e' if !after_word && rest[1..].starts_with('\'') => {
                    step = 2;
                    next = Some(Lexeme::EscapeLiteral);
                }
                '\'' => next = Some(Lexeme::Literal),
                '"' => next = Some(Lexeme::Identifier),
                '-' if rest.starts_with("--") => {
                    step = 2;
                    next = Some(Lexeme::LineComment);
                }
                '/' if rest.starts_with("/*") => {
                    step = 2;
                    next = Some(Lexeme::BlockComment(1));
                }
                '$' if !after_word => {
                    if let Some(tag) = dollar_tag(rest) {
                        step = tag.len();
                        next = Some(Lexeme::DollarQuoted(tag.to_owned()));
                    }
                }
                '?' if !is_jsonb_operator(&rest[1..]) => {
                    position += 1;
                    out.push('$');
                    out.push_str(&position.to_string());
                    after_word = false;
                    idx += step;
                    continue;
                }
                _ => {}
            },
        }

        out.push_str(&rest[..step]);
        after_word = state == Lexeme::Code
            && next.is_none()
            && (ch.is_alphanumeric() || ch == '_' || ch == '$');
        if let Some(next) = next {
            state = next;
        }
        idx += step;
    }

    out
}

/// Opening delimiter of a dollar-quoted string at the start of `rest`.
///
/// `$1` is a positional marker, not a tag.
fn dollar_tag(rest: &str) -> Option<&str> {
    let body = &rest[1..];
    let end = body.find('$')?;
    let tag = &body[..end];
    let valid = tag
        .chars()
        .next()
        .is_none_or(|first| first.is_alphabetic() || first == '_')
        && tag.chars().all(|c| c.is_alphanumeric() || c == '_');
    valid.then(|| &rest[..end + 2])
}

/// `rest` is the text immediately after a `?` in code position.
fn is_jsonb_operator(rest: &str) -> bool {
    if rest.starts_with('|') || rest.starts_with('&') {
        return true;
    }
    rest.trim_start().starts_with('\'')
}

//! Interpreting PostgreSQL text-format values.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

/// Parse the text output of an `hstore` value
///
/// Accepts the server's canonical form `"a"=>"1", "b"=>NULL`. Keys and
/// values may contain backslash-escaped quotes and backslashes.
pub fn parse_hstore(text: &str) -> Result<BTreeMap<String, Option<String>>, String> {
    let mut chars = text.chars().peekable();
    let mut map = BTreeMap::new();

    loop {
        skip_whitespace(&mut chars);
        if chars.peek().is_none() {
            break;
        }

        let key = parse_quoted(&mut chars)?;

        skip_whitespace(&mut chars);
        if chars.next() != Some('=') || chars.next() != Some('>') {
            return Err(format!("expected '=>' after key \"{}\"", key));
        }
        skip_whitespace(&mut chars);

        let value = if chars.peek() == Some(&'"') {
            Some(parse_quoted(&mut chars)?)
        } else {
            let word: String = std::iter::from_fn(|| chars.next_if(|c| c.is_ascii_alphabetic()))
                .collect();
            if !word.eq_ignore_ascii_case("null") {
                return Err(format!("unexpected value for key \"{}\"", key));
            }
            None
        };

        map.insert(key, value);

        skip_whitespace(&mut chars);
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(c) => return Err(format!("unexpected character '{}' between pairs", c)),
        }
    }

    Ok(map)
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if(|c| c.is_whitespace()).is_some() {}
}

fn parse_quoted(chars: &mut Peekable<Chars<'_>>) -> Result<String, String> {
    if chars.next() != Some('"') {
        return Err("expected '\"'".to_string());
    }

    let mut out = String::new();
    loop {
        match chars.next() {
            Some('\\') => match chars.next() {
                Some(escaped) => out.push(escaped),
                None => return Err("unterminated escape".to_string()),
            },
            Some('"') => return Ok(out),
            Some(c) => out.push(c),
            None => return Err("unterminated string".to_string()),
        }
    }
}

/// Interpret a value the way a boolean column getter would
///
/// Booleans map directly; numbers are true when non-zero. Anything else is
/// not a boolean.
pub fn is_truthy(text: &str) -> Option<bool> {
    let normalized = text.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "t" | "true" | "y" | "yes" | "on" => Some(true),
        "f" | "false" | "n" | "no" | "off" => Some(false),
        other => other.parse::<f64>().ok().map(|n| n != 0.0),
    }
}

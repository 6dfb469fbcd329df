/// GDB/MI line parser. One call parses one LF-terminated line already
/// stripped of its trailing newline by the annotation scanner /
/// correlator. The cstring escape set is restricted to `\n \t \r \\ \"`;
/// `\x` is intentionally left un-decoded, same as any other unrecognized
/// escape.
use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

use regex::Regex;

use crate::error::MiError;
use super::types::*;

pub fn parse_line(line: &str) -> Result<Record, MiError> {
    let line = line.trim_end_matches(['\r', '\n']);

    if line == "(gdb)" || line == "(gdb) " {
        return Ok(Record::Prompt);
    }

    if let Some(stream) = try_parse_stream(line) {
        return stream.map(Record::Stream);
    }

    if let Some(rest) = strip_sigil(line, &['*', '+', '=']) {
        return parse_async(line, rest).map(Record::Async);
    }

    if line.contains('^') {
        return parse_result(line).map(Record::Result);
    }

    Err(MiError::Unrecognized(line.to_string()))
}

fn leading_token(line: &str) -> (Option<u32>, &str) {
    let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        (None, line)
    } else {
        (digits.parse().ok(), &line[digits.len()..])
    }
}

fn strip_sigil<'a>(line: &'a str, sigils: &[char]) -> Option<(char, &'a str)> {
    let (_, rest) = leading_token(line);
    let mut chars = rest.chars();
    let first = chars.next()?;
    if sigils.contains(&first) {
        Some((first, rest))
    } else {
        None
    }
}

fn try_parse_stream(line: &str) -> Option<Result<StreamRecord, MiError>> {
    let mut chars = line.chars();
    let stream_type = match chars.next()? {
        '~' => StreamType::Console,
        '@' => StreamType::Target,
        '&' => StreamType::Log,
        _ => return None,
    };
    let rest = chars.as_str();
    let mut it = rest.chars().peekable();
    Some(parse_cstring(&mut it).map(|content| StreamRecord {
        stream_type,
        content,
    }))
}

fn parse_async(full_line: &str, _rest: &str) -> Result<AsyncRecord, MiError> {
    let (token, rest) = leading_token(full_line);
    let mut chars = rest.chars();
    let sigil = chars.next().unwrap();
    let kind = match sigil {
        '*' => AsyncKind::Exec,
        '+' => AsyncKind::Status,
        '=' => AsyncKind::Notify,
        _ => unreachable!(),
    };
    let body = chars.as_str();
    let (class, results_str) = match body.find(',') {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };
    let results = match results_str {
        Some(s) => parse_results(s)?,
        None => HashMap::new(),
    };
    Ok(AsyncRecord {
        token,
        kind,
        class: class.to_string(),
        results,
    })
}

fn result_regex() -> Regex {
    Regex::new(r"^(?:(\d+))?\^(done|running|connected|error|exit)(?:,(.*))?$").unwrap()
}

fn parse_result(line: &str) -> Result<ResultRecord, MiError> {
    let re = result_regex();
    let caps = re
        .captures(line)
        .ok_or_else(|| MiError::Unrecognized(line.to_string()))?;

    let token = caps.get(1).and_then(|m| m.as_str().parse().ok());
    let class = match caps.get(2).unwrap().as_str() {
        "done" => ResultClass::Done,
        "running" => ResultClass::Running,
        "connected" => ResultClass::Connected,
        "error" => ResultClass::Error,
        "exit" => ResultClass::Exit,
        other => return Err(MiError::UnknownResultClass(other.to_string())),
    };
    let results = match caps.get(3) {
        Some(m) => parse_results(m.as_str())?,
        None => HashMap::new(),
    };

    Ok(ResultRecord {
        token,
        class,
        results,
    })
}

fn parse_results(input: &str) -> Result<HashMap<String, Value>, MiError> {
    let mut out = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        skip_spaces(&mut chars);
        if chars.peek().is_none() {
            break;
        }
        let key = parse_identifier(&mut chars)?;
        match chars.next() {
            Some('=') => {}
            _ => return Err(MiError::ExpectedEquals(key)),
        }
        let value = parse_value(&mut chars)?;
        out.insert(key, value);

        skip_spaces(&mut chars);
        if chars.peek() == Some(&',') {
            chars.next();
        } else {
            break;
        }
    }

    Ok(out)
}

fn skip_spaces(chars: &mut Peekable<Chars>) {
    while chars.peek() == Some(&' ') {
        chars.next();
    }
}

fn parse_identifier(chars: &mut Peekable<Chars>) -> Result<String, MiError> {
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '_' || c == '-' {
            ident.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if ident.is_empty() {
        return Err(MiError::EmptyIdentifier);
    }
    Ok(ident)
}

fn parse_value(chars: &mut Peekable<Chars>) -> Result<Value, MiError> {
    match chars.peek() {
        Some('"') => Ok(Value::String(parse_cstring(chars)?)),
        Some('{') => parse_tuple(chars),
        Some('[') => parse_list(chars),
        _ => {
            // Bare token (no quotes). Not common in real MI output for
            // result values, but kept for resilience.
            let mut s = String::new();
            while let Some(&c) = chars.peek() {
                if c == ',' || c == ']' || c == '}' {
                    break;
                }
                s.push(c);
                chars.next();
            }
            Ok(Value::String(s))
        }
    }
}

fn parse_cstring(chars: &mut Peekable<Chars>) -> Result<String, MiError> {
    if chars.next() != Some('"') {
        return Err(MiError::UnterminatedString);
    }
    let mut out = String::new();
    loop {
        match chars.next() {
            None => return Err(MiError::UnterminatedString),
            Some('"') => break,
            Some('\\') => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                // `\x` escapes are unsupported; leave the backslash and
                // following character verbatim, same as any other
                // unrecognized escape.
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => return Err(MiError::UnterminatedString),
            },
            Some(c) => out.push(c),
        }
    }
    Ok(out)
}

fn parse_tuple(chars: &mut Peekable<Chars>) -> Result<Value, MiError> {
    chars.next(); // '{'
    let mut out = HashMap::new();
    skip_spaces(chars);
    if chars.peek() == Some(&'}') {
        chars.next();
        return Ok(Value::Tuple(out));
    }
    loop {
        skip_spaces(chars);
        let key = parse_identifier(chars)?;
        match chars.next() {
            Some('=') => {}
            _ => return Err(MiError::ExpectedEquals(key)),
        }
        let value = parse_value(chars)?;
        out.insert(key, value);
        skip_spaces(chars);
        match chars.peek() {
            Some(',') => {
                chars.next();
            }
            Some('}') => {
                chars.next();
                break;
            }
            _ => return Err(MiError::UnterminatedCompound("tuple")),
        }
    }
    Ok(Value::Tuple(out))
}

fn parse_list(chars: &mut Peekable<Chars>) -> Result<Value, MiError> {
    chars.next(); // '['
    let mut out = Vec::new();
    skip_spaces(chars);
    if chars.peek() == Some(&']') {
        chars.next();
        return Ok(Value::List(out));
    }
    loop {
        skip_spaces(chars);
        // A list element can be a bare value or a `key=value` result --
        // MI uses both shapes (e.g. `variables=[{name="x"},...]` vs
        // `thread-groups=["i1"]`). Peek for an identifier-then-'=' to
        // disambiguate without consuming on the wrong branch.
        let save: Vec<char> = {
            let mut probe = chars.clone();
            let mut ident = String::new();
            while let Some(&c) = probe.peek() {
                if c.is_alphanumeric() || c == '_' || c == '-' {
                    ident.push(c);
                    probe.next();
                } else {
                    break;
                }
            }
            if !ident.is_empty() && probe.peek() == Some(&'=') {
                vec!['='] // sentinel: key=value form
            } else {
                vec![]
            }
        };

        let value = if !save.is_empty() {
            let key = parse_identifier(chars)?;
            chars.next(); // '='
            let v = parse_value(chars)?;
            let mut t = HashMap::new();
            t.insert(key, v);
            Value::Tuple(t)
        } else {
            parse_value(chars)?
        };

        out.push(value);
        skip_spaces(chars);
        match chars.peek() {
            Some(',') => {
                chars.next();
            }
            Some(']') => {
                chars.next();
                break;
            }
            _ => return Err(MiError::UnterminatedCompound("list")),
        }
    }
    Ok(Value::List(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_done_with_token() {
        let rec = parse_line(r#"12^done,bkpt={number="1"}"#).unwrap();
        match rec {
            Record::Result(r) => {
                assert_eq!(r.token, Some(12));
                assert_eq!(r.class, ResultClass::Done);
                assert!(r.results.contains_key("bkpt"));
            }
            _ => panic!("expected result"),
        }
    }

    #[test]
    fn parses_error_without_token() {
        let rec = parse_line(r#"^error,msg="No symbol table is loaded.""#).unwrap();
        match rec {
            Record::Result(r) => {
                assert_eq!(r.token, None);
                assert_eq!(r.class, ResultClass::Error);
                assert_eq!(r.results["msg"].as_str(), Some("No symbol table is loaded."));
            }
            _ => panic!("expected result"),
        }
    }

    #[test]
    fn parses_stream_with_escapes() {
        let rec = parse_line(r#"~"Hello\nWorld\\\"quoted\"""#).unwrap();
        match rec {
            Record::Stream(s) => {
                assert_eq!(s.stream_type, StreamType::Console);
                assert_eq!(s.content, "Hello\nWorld\\\"quoted\"");
            }
            _ => panic!("expected stream"),
        }
    }

    #[test]
    fn parses_async_stopped_with_nested_frame() {
        let rec = parse_line(
            r#"*stopped,reason="breakpoint-hit",frame={addr="0x1",func="main",args=[{name="argc",value="1"}]}"#,
        )
        .unwrap();
        match rec {
            Record::Async(a) => {
                assert_eq!(a.kind, AsyncKind::Exec);
                assert_eq!(a.class, "stopped");
                let frame = a.results["frame"].as_tuple().unwrap();
                assert_eq!(frame["func"].as_str(), Some("main"));
                let args = frame["args"].as_list().unwrap();
                assert_eq!(args.len(), 1);
            }
            _ => panic!("expected async"),
        }
    }

    #[test]
    fn parses_notify_thread_group() {
        let rec = parse_line(r#"=thread-group-started,id="i1",pid="1234""#).unwrap();
        match rec {
            Record::Async(a) => {
                assert_eq!(a.kind, AsyncKind::Notify);
                assert_eq!(a.class, "thread-group-started");
            }
            _ => panic!("expected async"),
        }
    }

    #[test]
    fn parses_plain_list_of_strings() {
        let rec = parse_line(r#"^done,thread-groups=["i1"]"#).unwrap();
        match rec {
            Record::Result(r) => {
                let list = r.results["thread-groups"].as_list().unwrap();
                assert_eq!(list[0].as_str(), Some("i1"));
            }
            _ => panic!("expected result"),
        }
    }

    #[test]
    fn recognizes_prompt_line() {
        assert_eq!(parse_line("(gdb) ").unwrap(), Record::Prompt);
        assert_eq!(parse_line("(gdb)").unwrap(), Record::Prompt);
    }

    #[test]
    fn unknown_line_is_an_error() {
        assert!(parse_line("not a valid mi line").is_err());
    }
}

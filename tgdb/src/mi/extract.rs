/// Command-specific extractors that turn a parsed MI result into typed
/// domain objects: `-break-info` into `Breakpoint`s (with multi-location
/// flattening), source file lists, stack frames, and disassembly line
/// accumulation.
use std::collections::HashMap;

use super::types::Value;
use crate::request::{Breakpoint, Disposition, FilePosition};

fn field<'a>(tuple: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    tuple.get(key).and_then(|v| v.as_str())
}

fn field_owned(tuple: &HashMap<String, Value>, key: &str) -> Option<String> {
    field(tuple, key).map(str::to_string)
}

fn parse_disposition(s: Option<&str>) -> Disposition {
    match s {
        Some("del") | Some("delete") => Disposition::Delete,
        Some("dstp") | Some("delete_next_stop") => Disposition::DeleteNextStop,
        Some("dis") | Some("disable") => Disposition::Disable,
        Some("keep") => Disposition::Keep,
        _ => Disposition::Unknown,
    }
}

/// Builds one `Breakpoint` from a `bkpt` tuple, without resolving
/// parent/child links -- those are wired by `breakpoints_from_table`
/// once every top-level breakpoint (and its `locations` children) has
/// been flattened into one arena-like `Vec`.
fn breakpoint_from_tuple(tuple: &HashMap<String, Value>) -> Breakpoint {
    let addr = field_owned(tuple, "addr");
    let enabled = field(tuple, "enabled").map(|s| s == "y").unwrap_or(false);
    let line = field(tuple, "line").and_then(|s| s.parse().ok());
    let hit_count = field(tuple, "times").and_then(|s| s.parse().ok()).unwrap_or(0);
    let is_multi = addr.as_deref() == Some("<MULTIPLE>");

    Breakpoint {
        number: field_owned(tuple, "number").unwrap_or_default(),
        breakpoint_type: field_owned(tuple, "type"),
        catch_type: field_owned(tuple, "catch-type"),
        disposition: parse_disposition(field(tuple, "disp")),
        enabled,
        address: addr,
        func_name: field_owned(tuple, "func"),
        file: field_owned(tuple, "file"),
        fullname: field_owned(tuple, "fullname"),
        line,
        hit_count,
        original_location: field_owned(tuple, "original-location"),
        multi: is_multi,
        from_multi: false,
        children: Vec::new(),
        parent: None,
    }
}

/// `-break-info` / `-break-list` → flattened breakpoint list. When a
/// breakpoint's `addr` is the literal `<MULTIPLE>` sentinel, its
/// `locations` sub-list is flattened alongside it with `from_multi = true`
/// and `parent` set to the parent's breakpoint number; the parent's own
/// `children` field carries the same set of numbers.
pub fn breakpoints_from_table(body: &Value) -> Vec<Breakpoint> {
    let mut out = Vec::new();
    for item in body.as_items() {
        let Some(tuple) = item.as_tuple() else { continue };
        let Some(bkpt) = tuple.get("bkpt").and_then(Value::as_tuple).or(Some(tuple)) else {
            continue;
        };
        let mut parent = breakpoint_from_tuple(bkpt);

        if parent.multi {
            if let Some(locations) = bkpt.get("locations") {
                let mut child_numbers = Vec::new();
                for loc in locations.as_items() {
                    if let Some(loc_tuple) = loc.as_tuple() {
                        let mut child = breakpoint_from_tuple(loc_tuple);
                        child.from_multi = true;
                        child.parent = Some(parent.number.clone());
                        child_numbers.push(child.number.clone());
                        out.push(child);
                    }
                }
                parent.children = child_numbers;
            }
        }

        out.push(parent);
    }
    out
}

/// `complete` → the list of completion strings in a `matches` result,
/// which unlike the other list extractors holds bare strings rather than
/// tuples.
pub fn completions_from_list(list: &Value) -> Vec<String> {
    list.as_items()
        .into_iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// `-file-list-exec-source-files` → list of source file paths, preferring
/// `fullname` over `file` when present.
pub fn source_files_from_list(list: &Value) -> Vec<String> {
    list.as_items()
        .into_iter()
        .filter_map(Value::as_tuple)
        .map(|t| field_owned(t, "fullname").or_else(|| field_owned(t, "file")))
        .flatten()
        .collect()
}

/// `-file-list-exec-source-file` → a single `FilePosition`.
pub fn file_position_from_source_file(tuple: &HashMap<String, Value>) -> FilePosition {
    FilePosition {
        path: field_owned(tuple, "fullname").or_else(|| field_owned(tuple, "file")),
        line: field(tuple, "line").and_then(|s| s.parse().ok()).unwrap_or(0),
        address: 0,
        from_shared_library: None,
        func: None,
    }
}

/// `-stack-info-frame` → a `FilePosition` describing the current frame.
pub fn file_position_from_frame(tuple: &HashMap<String, Value>) -> FilePosition {
    let addr = field(tuple, "addr")
        .and_then(|s| s.strip_prefix("0x"))
        .and_then(|s| u64::from_str_radix(s, 16).ok())
        .unwrap_or(0);
    FilePosition {
        path: field_owned(tuple, "fullname").or_else(|| field_owned(tuple, "file")),
        line: field(tuple, "line").and_then(|s| s.parse().ok()).unwrap_or(0),
        address: addr,
        from_shared_library: field_owned(tuple, "from"),
        func: field_owned(tuple, "func"),
    }
}

/// Accumulates `~`-prefixed disassembly lines between a disassemble
/// command and its terminating `^done`. The leading `=>` current-pc
/// marker is replaced with spaces rather than stripped, so column
/// alignment in the rendered instruction list is preserved for the UI.
#[derive(Debug, Default)]
pub struct DisassemblyAccumulator {
    pub lines: Vec<String>,
    pub min_addr: Option<u64>,
    pub max_addr: Option<u64>,
}

impl DisassemblyAccumulator {
    pub fn push_line(&mut self, raw: &str) {
        let line = if let Some(rest) = raw.strip_prefix("=>") {
            format!("  {rest}")
        } else {
            raw.to_string()
        };

        if let Some(addr) = extract_leading_address(&line) {
            self.min_addr = Some(self.min_addr.map_or(addr, |m| m.min(addr)));
            self.max_addr = Some(self.max_addr.map_or(addr, |m| m.max(addr)));
        }

        self.lines.push(line);
    }
}

fn extract_leading_address(line: &str) -> Option<u64> {
    let trimmed = line.trim_start();
    let hex = trimmed.strip_prefix("0x")?;
    let end = hex
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(hex.len());
    if end == 0 {
        return None;
    }
    u64::from_str_radix(&hex[..end], 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mi::parser::parse_line;
    use crate::mi::types::Record;

    fn parse_results_value(input: &str) -> Value {
        let line = format!("^done,{input}");
        match parse_line(&line).unwrap() {
            Record::Result(r) => r.results.into_iter().next().unwrap().1,
            _ => panic!("expected result"),
        }
    }

    #[test]
    fn flattens_multi_location_breakpoint() {
        let body = parse_results_value(
            r#"body=[bkpt={number="1",addr="<MULTIPLE>",type="breakpoint",disp="keep",enabled="y",times="0",locations=[{number="1.1",addr="0x1",file="a.c",line="1",enabled="y"},{number="1.2",addr="0x2",file="b.c",line="2",enabled="y"}]}]"#,
        );
        let bps = breakpoints_from_table(&body);
        assert_eq!(bps.len(), 3);
        let parent = bps.iter().find(|b| b.number == "1").unwrap();
        assert!(parent.multi);
        assert_eq!(parent.children, vec!["1.1", "1.2"]);
        for child_num in ["1.1", "1.2"] {
            let child = bps.iter().find(|b| b.number == child_num).unwrap();
            assert!(child.from_multi);
            assert_eq!(child.parent.as_deref(), Some("1"));
        }
    }

    #[test]
    fn simple_breakpoint_has_no_multi_flags() {
        let body = parse_results_value(
            r#"body=[bkpt={number="1",type="breakpoint",disp="keep",enabled="y",addr="0x400500",func="main",file="a.c",fullname="/p/a.c",line="3",times="0",original-location="main"}]"#,
        );
        let bps = breakpoints_from_table(&body);
        assert_eq!(bps.len(), 1);
        let bp = &bps[0];
        assert!(!bp.multi && !bp.from_multi && bp.parent.is_none());
        assert_eq!(bp.address.as_deref(), Some("0x400500"));
        assert_eq!(bp.line, Some(3));
        assert_eq!(bp.disposition, Disposition::Keep);
    }

    #[test]
    fn completion_list_extracts_bare_strings() {
        let body = parse_results_value(r#"matches=["main","mainloop"]"#);
        assert_eq!(completions_from_list(&body), vec!["main", "mainloop"]);
    }

    #[test]
    fn disassembly_bounds_track_min_max() {
        let mut acc = DisassemblyAccumulator::default();
        acc.push_line("0x0000000000401130 <main+0>:\tpush %rbp");
        acc.push_line("=> 0x0000000000401131 <main+1>:\tmov %rsp,%rbp");
        acc.push_line("0x0000000000401120 <main-16>:\tnop");
        assert_eq!(acc.min_addr, Some(0x401120));
        assert_eq!(acc.max_addr, Some(0x401131));
        assert_eq!(acc.lines.len(), 3);
        assert!(acc.lines[1].starts_with("  "));
    }
}

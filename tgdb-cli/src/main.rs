//! Line-oriented demo driver for `tgdb`. Reads lines from stdin and turns
//! them into `tgdb::Request`s, printing every callback the core fires to
//! stdout. It stands in for a curses UI only far enough to prove the core
//! works end to end; it implements none of the scroller, source viewer,
//! window manager, syntax highlighting, or readline integration a full
//! front-end would have.
use std::io::Read as _;
use std::os::unix::io::AsRawFd;

use tgdb::{
    BreakpointAction, Core, DebuggerCommandKind, DisassembleMode, Location, Request, Response,
    UiCallbacks,
};

fn usage() -> ! {
    eprintln!("usage: tgdb-cli <gdb-path> [gdb-arg ...]");
    std::process::exit(2);
}

fn print_response(resp: Response) {
    match resp {
        Response::UpdateBreakpoints(bps) => {
            println!("[breakpoints] {} entries", bps.len());
            for bp in &bps {
                println!(
                    "  #{} {}:{:?} enabled={} multi={} from_multi={} parent={:?}",
                    bp.number,
                    bp.file.as_deref().unwrap_or("?"),
                    bp.line,
                    bp.enabled,
                    bp.multi,
                    bp.from_multi,
                    bp.parent
                );
            }
        }
        Response::UpdateFilePosition(pos) => {
            println!(
                "[location] {}:{} (0x{:x}) func={}",
                pos.path.as_deref().unwrap_or("?"),
                pos.line,
                pos.address,
                pos.func.as_deref().unwrap_or("?")
            );
        }
        Response::UpdateSourceFiles(files) => {
            println!("[sources] {} files", files.len());
            for f in &files {
                println!("  {f}");
            }
        }
        Response::UpdateCompletions(list) => {
            println!("[completions] {}", list.join(", "));
        }
        Response::DisassembleFunc(d) | Response::DisassemblePC(d) => {
            println!(
                "[disassemble] 0x{:x}-0x{:x} error={}",
                d.start_addr, d.end_addr, d.error
            );
            for line in &d.lines {
                println!("  {line}");
            }
        }
        Response::UpdateConsolePrompt(p) => {
            print!("{p}");
        }
        Response::DebuggerCommandDelivered { text, user_initiated } => {
            println!("[sent:{}] {}", if user_initiated { "user" } else { "core" }, text.trim_end());
        }
        Response::InferiorExited { status } => {
            println!("[inferior exited] status={status}");
        }
        Response::Quit { exit_status, return_value } => {
            println!("[quit] exit_status={exit_status} return_value={return_value}");
        }
    }
}

/// Parses one demo-CLI input line into a `Request`. `:`-prefixed lines are
/// structured commands; everything else is a verbatim `ConsoleCommand`.
fn parse_line(line: &str) -> Option<Request> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.is_empty() {
        return None;
    }
    if let Some(rest) = line.strip_prefix(':') {
        let mut parts = rest.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("");
        let arg = parts.next().unwrap_or("").trim();
        return match cmd {
            "sources" => Some(Request::InfoSources),
            "loc" => Some(Request::CurrentLocation),
            "complete" => Some(Request::Complete { line: arg.to_string() }),
            "disas" => Some(Request::DisassembleFunc { mode: DisassembleMode::Plain }),
            "disas/r" => Some(Request::DisassembleFunc { mode: DisassembleMode::Raw }),
            "disas/s" => Some(Request::DisassembleFunc { mode: DisassembleMode::Source }),
            "x" => Some(Request::DisassemblePC {
                lines: arg.parse().unwrap_or(1),
            }),
            "break" | "tbreak" | "clear" => {
                let action = match cmd {
                    "break" => BreakpointAction::Add,
                    "tbreak" => BreakpointAction::TBreak,
                    _ => BreakpointAction::Delete,
                };
                let location = match arg.rsplit_once(':') {
                    Some((file, line)) => Location::File {
                        file: file.to_string(),
                        line: line.parse().unwrap_or(0),
                    },
                    None => Location::Address(arg.to_string()),
                };
                Some(Request::ModifyBreakpoint { location, action })
            }
            "quit" => None,
            _ => {
                eprintln!("unknown meta command: :{cmd}");
                None
            }
        };
    }

    let kind = match line {
        "c" | "continue" => Some(DebuggerCommandKind::Continue),
        "n" | "next" => Some(DebuggerCommandKind::Next),
        "s" | "step" => Some(DebuggerCommandKind::Step),
        "fin" | "finish" => Some(DebuggerCommandKind::Finish),
        "start" => Some(DebuggerCommandKind::Start),
        "run" | "r" => Some(DebuggerCommandKind::Run),
        "kill" => Some(DebuggerCommandKind::Kill),
        "until" => Some(DebuggerCommandKind::Until),
        "up" => Some(DebuggerCommandKind::Up),
        "down" => Some(DebuggerCommandKind::Down),
        _ => None,
    };
    if let Some(kind) = kind {
        return Some(Request::DebuggerCommand { kind });
    }

    Some(Request::ConsoleCommand {
        text: line.to_string(),
        queued: false,
    })
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }
    let debugger_path = args[0].clone();
    let debugger_args = args[1..].to_vec();

    let config_dir = tgdb::config::config_dir();
    if let Ok(dir) = tgdb::config::ensure_config_dir() {
        let log_path = tgdb::config::log_file_path(&dir);
        if let Err(e) = tgdb::install_logger(&log_path, log::LevelFilter::Debug) {
            eprintln!("warning: failed to install logger: {e}");
        }
    }
    log::info!("tgdb-cli starting: {debugger_path} {debugger_args:?}");

    let callbacks = UiCallbacks {
        console_output: Box::new(|text| print!("{text}")),
        console_ready: Box::new(|| {}),
        request_sent: Box::new(|_req, rendered| log::trace!("request_sent: {}", rendered.trim_end())),
        command_response: Box::new(print_response),
    };

    let mut core = match Core::create(&debugger_path, &debugger_args, config_dir, callbacks) {
        Ok(core) => core,
        Err(e) => {
            eprintln!("failed to start gdb: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = core.tty_new() {
        eprintln!("warning: failed to allocate inferior tty: {e}");
    }

    let stdin = std::io::stdin();
    let stdin_fd = stdin.as_raw_fd();
    let mut line_buf = Vec::new();
    let mut byte = [0u8; 1];
    let mut stdin_lock = stdin.lock();

    loop {
        if !core.is_alive() {
            break;
        }
        match core.poll_once(&[stdin_fd]) {
            Ok(Some(0)) => {
                // Drain exactly one byte per wakeup so this service stays
                // non-blocking and bounded; a full line is dispatched once
                // a `\n` completes it.
                match stdin_lock.read(&mut byte) {
                    Ok(0) => break,
                    Ok(_) => {
                        if byte[0] == b'\n' {
                            let text = String::from_utf8_lossy(&line_buf).into_owned();
                            line_buf.clear();
                            if let Some(req) = parse_line(&text) {
                                core.submit(req);
                            } else if text.trim() == ":quit" {
                                break;
                            }
                        } else {
                            line_buf.push(byte[0]);
                        }
                    }
                    Err(e) => {
                        eprintln!("stdin read error: {e}");
                        break;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("poll error: {e}");
                break;
            }
        }
    }

    log::info!("tgdb-cli exiting");
}

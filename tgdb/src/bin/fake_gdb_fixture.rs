//! Stand-in for a real `gdb --annotate=2` child, used only by
//! `tests/integration_tests.rs` to drive `tgdb::api::Core` over a real pty
//! without requiring gdb to be installed. Ignores argv and stdin and emits
//! one canned annotate-2/MI byte sequence: the startup disassemble-mode
//! probe result, a `breakpoints-invalid` annotation at `pre-prompt`
//! (triggering the priority `-break-info` refresh), and that query's
//! result.
use std::io::Write;

const SESSION: &[u8] = b"^done,asm_insns=[]\n\
\x1a\x1abreakpoints-invalid\n\
\n\x1a\x1apre-prompt\n\
(gdb) \n\x1a\x1aprompt\n\
\n\x1a\x1apost-prompt\n\
^done,BreakpointTable={body=[bkpt={number=\"1\",type=\"breakpoint\",disp=\"keep\",enabled=\"y\",addr=\"0x400500\",func=\"main\",file=\"a.c\",fullname=\"/p/a.c\",line=\"3\",times=\"0\",original-location=\"main\"}]}\n\
\n\x1a\x1apre-prompt\n\
(gdb) \n\x1a\x1aprompt\n\
\n\x1a\x1apost-prompt\n";

fn main() {
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(SESSION);
    let _ = stdout.flush();
}

/// Integration tests driving `AnnotationScanner` + `Correlator` +
/// `Scheduler` together against literal annotation/MI byte strings,
/// without needing a real `gdb` child, since those three modules own no
/// fds.
use std::cell::RefCell;
use std::rc::Rc;

use tgdb::annotation::AnnotationScanner;
use tgdb::api::{Core, UiCallbacks};
use tgdb::correlator::Correlator;
use tgdb::request::InternalQuery;
use tgdb::response::Response;
use tgdb::scheduler::{CommandOrigin, ScheduledCommand, Scheduler};

fn feed(correlator: &mut Correlator, bytes: &[u8]) {
    let mut scanner = AnnotationScanner::new();
    scanner.feed(bytes, correlator);
}

/// Prompt detection: console text, prompt text change, and readiness all
/// fire from one cycle.
#[test]
fn s1_prompt_detection_emits_console_prompt_and_ready() {
    let mut c = Correlator::new();
    feed(
        &mut c,
        b"hello\n\x1a\x1apre-prompt\n(gdb) \n\x1a\x1aprompt\n\n\x1a\x1apost-prompt\n",
    );
    let console = c.take_console();
    assert_eq!(console, b"hello\n");
    let responses = c.take_responses();
    assert_eq!(responses, vec![Response::UpdateConsolePrompt("(gdb) ".to_string())]);
    assert!(c.take_ready());
}

/// break-info parses into a single typed `Breakpoint`.
#[test]
fn s2_break_info_parses_single_breakpoint() {
    let mut c = Correlator::new();
    c.begin_command(CommandOrigin::Internal, Some(InternalQuery::InfoBreakpoints));
    feed(
        &mut c,
        br#"^done,BreakpointTable={body=[bkpt={number="1",type="breakpoint",disp="keep",enabled="y",addr="0x400500",func="main",file="a.c",fullname="/p/a.c",line="3",times="0",original-location="main"}]}
(gdb)
"#,
    );
    let responses = c.take_responses();
    assert_eq!(responses.len(), 1);
    match &responses[0] {
        Response::UpdateBreakpoints(bps) => {
            assert_eq!(bps.len(), 1);
            let bp = &bps[0];
            assert_eq!(bp.number, "1");
            assert!(bp.enabled);
            assert_eq!(bp.disposition, tgdb::Disposition::Keep);
            assert_eq!(bp.address.as_deref(), Some("0x400500"));
            assert_eq!(bp.file.as_deref(), Some("a.c"));
            assert_eq!(bp.fullname.as_deref(), Some("/p/a.c"));
            assert_eq!(bp.line, Some(3));
            assert_eq!(bp.func_name.as_deref(), Some("main"));
        }
        other => panic!("expected UpdateBreakpoints, got {other:?}"),
    }
}

/// SIGINT drops queued commands but never retracts the in-flight one.
#[test]
fn s3_interrupt_drops_queued_but_not_in_flight() {
    let mut s = Scheduler::new();
    let mk = |text: &str| ScheduledCommand {
        rendered: format!("{text}\n"),
        origin: CommandOrigin::UserConsole,
        query: None,
        source_request: None,
        console_affecting: false,
    };

    let first = s.submit(mk("first"), false);
    assert!(first.is_some(), "first command delivers synchronously");
    s.note_delivered();

    // Two more submitted while busy: both enqueue rather than deliver.
    assert!(s.submit(mk("second"), false).is_none());
    assert!(s.submit(mk("third"), false).is_none());
    assert_eq!(s.normal_len(), 2);

    s.clear_on_interrupt();
    assert_eq!(s.normal_len(), 0);
    assert_eq!(s.priority_len(), 0);
    // The in-flight command's slot is untouched: still not ready until a
    // `prompt` annotation arrives.
    assert!(!s.is_ready());
}

/// Multi-location breakpoint flattening with back-references.
#[test]
fn s4_multi_location_breakpoint_flattens_with_backrefs() {
    let mut c = Correlator::new();
    c.begin_command(CommandOrigin::Internal, Some(InternalQuery::InfoBreakpoints));
    feed(
        &mut c,
        br#"^done,BreakpointTable={body=[bkpt={number="1",addr="<MULTIPLE>",type="breakpoint",disp="keep",enabled="y",times="0",locations=[{number="1.1",addr="0x1",file="a.c",line="1",enabled="y"},{number="1.2",addr="0x2",file="b.c",line="2",enabled="y"}]}]}
(gdb)
"#,
    );
    let responses = c.take_responses();
    assert_eq!(responses.len(), 1);
    match &responses[0] {
        Response::UpdateBreakpoints(bps) => {
            assert_eq!(bps.len(), 3);
            let parent = bps.iter().find(|b| b.number == "1").unwrap();
            assert!(parent.multi);
            assert_eq!(parent.children.len(), 2);
            for child in bps.iter().filter(|b| b.from_multi) {
                assert_eq!(child.parent.as_deref(), Some("1"));
            }
        }
        other => panic!("expected UpdateBreakpoints, got {other:?}"),
    }
}

/// An internal command at a misc sub-prompt is auto-answered with a
/// bare newline rather than waiting on the (absent) user.
#[test]
fn s5_misc_prompt_auto_answered_for_internal_command() {
    let mut c = Correlator::new();
    c.begin_command(CommandOrigin::Internal, Some(InternalQuery::InfoSources));
    feed(&mut c, b"\n\x1a\x1apre-query\nContinue? (y or n) \n\x1a\x1aquery\n");
    assert_eq!(c.take_writes(), vec![b'\n']);
    assert!(c.take_ready());
}

/// An empty `asm_insns=[]` done-result means `/s` is supported.
#[test]
fn s6a_disassemble_probe_done_enables_source_mode() {
    let mut c = Correlator::new();
    c.begin_command(CommandOrigin::Internal, Some(InternalQuery::DisassembleModeProbe));
    feed(&mut c, b"^done,asm_insns=[]\n(gdb)\n");
    assert!(c.disassemble_supports_s());
}

/// An error result leaves the flag false, so `DisassembleFunc` would
/// fall back to the plain form.
#[test]
fn s6b_disassemble_probe_error_disables_source_mode() {
    let mut c = Correlator::new();
    c.begin_command(CommandOrigin::Internal, Some(InternalQuery::DisassembleModeProbe));
    feed(
        &mut c,
        b"^error,msg=\"Mode argument must be 0, 1, 2, or 3.\"\n(gdb)\n",
    );
    assert!(!c.disassemble_supports_s());
}

/// Prompt-change minimality: an unchanged prompt text emits nothing on
/// the second cycle.
#[test]
fn prompt_change_minimality_holds_across_cycles() {
    let mut c = Correlator::new();
    let cycle: &[u8] = b"\n\x1a\x1apre-prompt\n(gdb) \n\x1a\x1aprompt\n\n\x1a\x1apost-prompt\n";
    feed(&mut c, cycle);
    assert_eq!(c.take_responses().len(), 1);
    feed(&mut c, cycle);
    assert!(c.take_responses().is_empty());

    let different: &[u8] = b"\n\x1a\x1apre-prompt\n(gdb-remote) \n\x1a\x1aprompt\n\n\x1a\x1apost-prompt\n";
    feed(&mut c, different);
    assert_eq!(
        c.take_responses(),
        vec![Response::UpdateConsolePrompt("(gdb-remote) ".to_string())]
    );
}

/// Priority preemption: a priority command submitted while the
/// scheduler is idle with a non-empty normal queue is delivered next.
#[test]
fn priority_preemption_delivers_priority_first() {
    let mut s = Scheduler::new();
    let mk = |text: &str, origin| ScheduledCommand {
        rendered: format!("{text}\n"),
        origin,
        query: None,
        source_request: None,
        console_affecting: false,
    };

    s.submit(mk("a", CommandOrigin::UserConsole), false);
    s.note_delivered();

    s.enqueue(mk("b", CommandOrigin::UserConsole), false);
    s.enqueue(mk("-break-info", CommandOrigin::Internal), true);

    s.mark_ready();
    let next = s.try_dispatch().unwrap();
    assert_eq!(next.rendered, "-break-info\n");
}

/// Annotation framing soundness: bytes outside a correctly framed
/// annotation window are delivered verbatim and in order; bytes inside
/// the framing never leak into the data sink.
#[test]
fn annotation_framing_is_byte_exact_and_order_preserving() {
    let mut c = Correlator::new();
    // The newline immediately before `\x1a\x1asource\n` belongs to the
    // annotation frame and is therefore never delivered to the data
    // sink; everything else passes through verbatim and in order. A
    // second annotation at the end flushes the otherwise-pending
    // trailing newline so the assertion isn't order-dependent on it.
    feed(
        &mut c,
        b"line one\nline two\n\x1a\x1asource\nline three\n\x1a\x1aend\n",
    );
    assert_eq!(c.take_console(), b"line one\nline twoline three");
}

/// End-to-end through `tgdb::api::Core` against a real child (a tiny
/// fixture binary standing in for gdb, see `src/bin/fake_gdb_fixture.rs`)
/// over a real pty: a priority `-break-info` query that the correlator
/// itself enqueues at `pre-prompt` (because `breakpoints-invalid` was
/// seen) always has to wait in the FIFO behind the startup disassemble
/// probe, since the scheduler isn't marked ready again until after that
/// queue is drained (`Core::drain_correlator`). This exercises the
/// redelivery path -- `Scheduler::try_dispatch` handing a queued command
/// back to `Core::deliver` -- and confirms the requeued command still
/// carries its `InternalQuery` tag, so the MI reply is routed to the
/// parser rather than dumped into `console_output`.
#[test]
fn core_redelivers_queued_priority_query_with_its_tag_intact() {
    let console_lines = Rc::new(RefCell::new(Vec::<String>::new()));
    let responses = Rc::new(RefCell::new(Vec::<Response>::new()));

    let console_for_cb = console_lines.clone();
    let responses_for_cb = responses.clone();
    let callbacks = UiCallbacks {
        console_output: Box::new(move |text| console_for_cb.borrow_mut().push(text.to_string())),
        console_ready: Box::new(|| {}),
        request_sent: Box::new(|_, _| {}),
        command_response: Box::new(move |resp| responses_for_cb.borrow_mut().push(resp)),
    };

    let gdb_path = env!("CARGO_BIN_EXE_fake_gdb_fixture");
    let config_dir = tempfile::tempdir().expect("tempdir");
    let mut core = Core::create(gdb_path, &[], config_dir.path().to_path_buf(), callbacks)
        .expect("fake gdb fixture should spawn");

    while core.pump_gdb() {}

    let responses = responses.borrow();
    let got_breakpoints = responses.iter().any(|r| {
        matches!(
            r,
            Response::UpdateBreakpoints(bps) if bps.len() == 1 && bps[0].number == "1"
        )
    });
    assert!(
        got_breakpoints,
        "expected UpdateBreakpoints from the queued priority -break-info query, got: {responses:?}"
    );

    let console = console_lines.borrow();
    let leaked_mi = console.iter().any(|line| line.contains("BreakpointTable"));
    assert!(!leaked_mi, "MI reply text leaked into console_output: {console:?}");
}

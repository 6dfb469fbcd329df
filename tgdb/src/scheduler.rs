/// Two FIFOs plus a `ready_for_next` flag enforcing the at-most-one-
/// outstanding-command invariant, with priority preemption for out-of-band
/// MI queries.
use std::collections::VecDeque;

use crate::request::{InternalQuery, Request};

/// One scheduled unit of work: the exact bytes to write to gdb's stdin
/// plus enough bookkeeping for the correlator and the UI callbacks. This
/// is the only record of a command that survives a trip through a FIFO,
/// so it must carry everything `Core::deliver` needs to reconstruct the
/// same behavior on redelivery as on synchronous delivery -- the
/// originating `query` (for `Correlator::begin_command`), the originating
/// `source_request` (for `request_sent` and the `DebuggerCommandDelivered`
/// console-command exemption), and `console_affecting` (for
/// `pending_console_ready`).
#[derive(Debug, Clone)]
pub struct ScheduledCommand {
    pub rendered: String,
    pub origin: CommandOrigin,
    pub query: Option<InternalQuery>,
    pub source_request: Option<Request>,
    pub console_affecting: bool,
}

/// Distinguishes user-issued console input from core-issued MI queries,
/// needed by the misc-prompt discard rule: an internal query dequeued
/// while sitting at a misc prompt is dropped rather than delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOrigin {
    UserConsole,
    Internal,
}

pub struct Scheduler {
    normal: VecDeque<ScheduledCommand>,
    priority: VecDeque<ScheduledCommand>,
    ready_for_next: bool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            normal: VecDeque::new(),
            priority: VecDeque::new(),
            ready_for_next: true,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready_for_next
    }

    pub fn normal_len(&self) -> usize {
        self.normal.len()
    }

    pub fn priority_len(&self) -> usize {
        self.priority.len()
    }

    /// Submits a command. If the scheduler is idle (`ready_for_next` and
    /// no pending priority work) the command is handed back immediately
    /// for synchronous delivery rather than enqueued. Otherwise it is
    /// queued on the appropriate FIFO and `None` is returned.
    pub fn submit(&mut self, cmd: ScheduledCommand, priority: bool) -> Option<ScheduledCommand> {
        if self.ready_for_next && self.priority.is_empty() {
            return Some(cmd);
        }
        if priority {
            self.priority.push_back(cmd);
        } else {
            self.normal.push_back(cmd);
        }
        None
    }

    /// Forces a command straight onto a queue without attempting
    /// synchronous delivery; used when the caller already knows delivery
    /// must wait (e.g. queued console commands per the `queued` flag).
    pub fn enqueue(&mut self, cmd: ScheduledCommand, priority: bool) {
        if priority {
            self.priority.push_back(cmd);
        } else {
            self.normal.push_back(cmd);
        }
    }

    /// Pops and returns the next command to deliver, preferring `priority`
    /// over `normal`, only when `ready_for_next`. Does not itself flip
    /// `ready_for_next` -- the caller must call `note_delivered` once the
    /// bytes are actually written to gdb's stdin, tying the flip to the
    /// write rather than the queue pop.
    pub fn try_dispatch(&mut self) -> Option<ScheduledCommand> {
        if !self.ready_for_next {
            return None;
        }
        self.priority.pop_front().or_else(|| self.normal.pop_front())
    }

    /// Re-arms `ready_for_next`; called solely in response to observing
    /// the `prompt` annotation.
    pub fn mark_ready(&mut self) {
        self.ready_for_next = true;
    }

    /// Marks a command as having actually been written to gdb's stdin,
    /// arming the at-most-one-in-flight invariant until the next
    /// `prompt` annotation re-arms it via `mark_ready`.
    pub fn note_delivered(&mut self) {
        self.ready_for_next = false;
    }

    /// SIGINT handling: both FIFOs are drained. `ready_for_next` is left
    /// untouched -- the in-flight command (if any) is not retracted.
    pub fn clear_on_interrupt(&mut self) {
        self.normal.clear();
        self.priority.clear();
    }

    /// An internal command dequeued while the correlator sits at a misc
    /// prompt would hang forever, so it is dropped rather than
    /// delivered. Returns `true` if the in-flight slot should be
    /// considered free again (since nothing was actually written).
    pub fn discard_if_internal_at_misc_prompt(&mut self, cmd: &ScheduledCommand) -> bool {
        matches!(cmd.origin, CommandOrigin::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(text: &str, origin: CommandOrigin) -> ScheduledCommand {
        ScheduledCommand {
            rendered: text.to_string(),
            origin,
            query: None,
            source_request: None,
            console_affecting: false,
        }
    }

    #[test]
    fn idle_submission_delivers_synchronously() {
        let mut s = Scheduler::new();
        let result = s.submit(cmd("continue\n", CommandOrigin::UserConsole), false);
        assert!(result.is_some());
        assert_eq!(s.normal_len(), 0);
    }

    #[test]
    fn busy_submission_enqueues() {
        let mut s = Scheduler::new();
        let delivered = s.submit(cmd("a\n", CommandOrigin::UserConsole), false);
        assert!(delivered.is_some());
        s.note_delivered(); // simulate the write to gdb stdin

        let queued = s.submit(cmd("b\n", CommandOrigin::UserConsole), false);
        assert!(queued.is_none(), "scheduler should now be busy");
        assert_eq!(s.normal_len(), 1);
    }

    #[test]
    fn priority_preempts_normal_queue() {
        let mut s = Scheduler::new();
        // Make scheduler busy first so subsequent submissions queue.
        s.submit(cmd("first\n", CommandOrigin::UserConsole), false);
        s.note_delivered();

        s.submit(cmd("second\n", CommandOrigin::UserConsole), false);
        s.submit(cmd("-break-info\n", CommandOrigin::Internal), true);

        s.mark_ready();
        let next = s.try_dispatch().unwrap();
        assert_eq!(next.rendered, "-break-info\n");
    }

    #[test]
    fn interrupt_clears_both_queues() {
        let mut s = Scheduler::new();
        s.submit(cmd("a\n", CommandOrigin::UserConsole), false);
        s.note_delivered();
        s.submit(cmd("b\n", CommandOrigin::UserConsole), false);
        s.submit(cmd("c\n", CommandOrigin::Internal), true);
        s.clear_on_interrupt();
        assert_eq!(s.normal_len(), 0);
        assert_eq!(s.priority_len(), 0);
    }

    #[test]
    fn at_most_one_in_flight_until_marked_ready() {
        let mut s = Scheduler::new();
        s.submit(cmd("a\n", CommandOrigin::UserConsole), false);
        s.note_delivered();
        assert!(s.try_dispatch().is_none(), "not ready yet");
        s.enqueue(cmd("b\n", CommandOrigin::UserConsole), false);
        assert!(s.try_dispatch().is_none(), "still not ready");
        s.mark_ready();
        assert!(s.try_dispatch().is_some());
    }
}

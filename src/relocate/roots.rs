//! Root set - every reference holder outside the object graph
//!
//! Roots keep objects alive from outside the heap: execution contexts
//! and their scheduler linkage, per-worker mutation lists, suspended
//! task chains, stable handle and name tables, legacy code references,
//! and the static object list. The engine drives each source through a
//! generic visitor so that threading stays a single code path.
//!
//! Root slots never move themselves; threading simply records them on
//! their target's chain so they are rewritten when the target relocates.

use crate::error::corruption;
use crate::heap::Segment;
use crate::memory::{read_word, word_at};
use crate::object::shape::{static_link_offset, STATIC_LIST_END};
use crate::object::tagged::untag;
use crate::object::{descriptor_at, HeaderState, HeaderWord, ObjectKind};
use crate::relocate::threading::thread;

/// A holder of root slots. `visit_slots` must present every reference
/// the holder owns, exactly once.
pub trait RootSource {
    fn visit_slots(&mut self, visit: &mut dyn FnMut(&mut usize));
}

/// One execution context (worker) of the runtime
#[derive(Debug, Default)]
pub struct Capability {
    /// Saved reference registers and the current continuation
    pub saved_refs: Vec<usize>,

    /// Head of this context's run queue
    pub run_queue_head: usize,
    /// Tail of this context's run queue
    pub run_queue_tail: usize,
    /// Head of the message inbox
    pub inbox: usize,

    /// Per-generation mutation lists: slots recorded by the write
    /// barrier, one list per generation, threaded word by word
    pub mut_lists: Vec<Vec<usize>>,
}

impl Capability {
    pub fn new(generations: usize) -> Self {
        Self {
            saved_refs: Vec::new(),
            run_queue_head: 0,
            run_queue_tail: 0,
            inbox: 0,
            mut_lists: vec![Vec::new(); generations],
        }
    }
}

impl RootSource for Capability {
    fn visit_slots(&mut self, visit: &mut dyn FnMut(&mut usize)) {
        for slot in &mut self.saved_refs {
            visit(slot);
        }
        visit(&mut self.run_queue_head);
        visit(&mut self.run_queue_tail);
        visit(&mut self.inbox);
        // mutation lists are walked separately, in list order
    }
}

/// Global scheduler queues
#[derive(Debug, Default)]
pub struct SchedulerRoots {
    pub blocked_queue_head: usize,
    pub blocked_queue_tail: usize,
    pub sleeping_queue: usize,
}

impl RootSource for SchedulerRoots {
    fn visit_slots(&mut self, visit: &mut dyn FnMut(&mut usize)) {
        visit(&mut self.blocked_queue_head);
        visit(&mut self.blocked_queue_tail);
        visit(&mut self.sleeping_queue);
    }
}

/// Suspended-computation references of one OS-level task
#[derive(Debug, Default)]
pub struct TaskRoot {
    /// Innermost first: the task objects of nested re-entries
    pub suspended: Vec<usize>,
}

/// All OS-level tasks known to the runtime
#[derive(Debug, Default)]
pub struct TaskTable {
    pub entries: Vec<TaskRoot>,
}

impl RootSource for TaskTable {
    fn visit_slots(&mut self, visit: &mut dyn FnMut(&mut usize)) {
        for entry in &mut self.entries {
            for slot in &mut entry.suspended {
                if *slot != 0 {
                    visit(slot);
                }
            }
        }
    }
}

/// Pointer-keyed lookup table (stable handles, stable names)
#[derive(Debug, Default)]
pub struct StableTable {
    /// Table slots; 0 marks an unused entry
    pub entries: Vec<usize>,
}

impl RootSource for StableTable {
    fn visit_slots(&mut self, visit: &mut dyn FnMut(&mut usize)) {
        for slot in &mut self.entries {
            visit(slot);
        }
    }
}

/// Everything the runtime holds references in, other than the heap
/// itself and the per-generation lists owned by [`crate::heap::Generation`].
#[derive(Debug, Default)]
pub struct RootSet {
    pub capabilities: Vec<Capability>,
    pub scheduler: SchedulerRoots,
    pub tasks: TaskTable,
    pub stable_handles: StableTable,
    pub stable_names: StableTable,
    /// References retained by legacy compiled code
    pub code_refs: Vec<usize>,
}

impl RootSet {
    pub fn new(capabilities: usize, generations: usize) -> Self {
        Self {
            capabilities: (0..capabilities)
                .map(|_| Capability::new(generations))
                .collect(),
            scheduler: SchedulerRoots::default(),
            tasks: TaskTable::default(),
            stable_handles: StableTable::default(),
            stable_names: StableTable::default(),
            code_refs: Vec::new(),
        }
    }
}

/// Walk the static object list, threading the reference fields each
/// static kind owns and following its kind-specific link field, until
/// the terminator.
///
/// Only evaluated static bindings (`StaticIndirection`) can point into
/// the heap; the other static kinds contribute no slots and are visited
/// purely to stay on the list.
///
/// # Safety
/// `head` must be the (possibly tagged) head of a well-formed static
/// list whose objects live outside the segment.
pub(crate) unsafe fn thread_static_list(segment: &Segment, head: usize) {
    let mut p = head;
    while p != STATIC_LIST_END {
        let obj = untag(p);
        let desc = match HeaderWord(read_word(obj)).state() {
            HeaderState::Descriptor(d) => descriptor_at(d),
            _ => corruption("static object with a threaded header", obj, read_word(obj)),
        };
        if !desc.kind.is_static() {
            corruption("non-static kind on the static list", obj, desc.kind.code());
        }
        if desc.kind == ObjectKind::StaticIndirection {
            thread(segment, word_at(obj, 1) as *mut usize);
        }
        let link = match static_link_offset(desc) {
            Some(off) => off,
            None => corruption("static object with no link field", obj, desc.kind.code()),
        };
        p = read_word(word_at(obj, link));
    }
}

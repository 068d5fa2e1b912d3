//! Object shapes - the per-kind layout table
//!
//! A shape descriptor classifies an object and tells the relocation
//! engine which payload words are references and how large the object
//! is. Dispatch is a closed enumeration of kinds: an address for which
//! no descriptor semantics apply in context (a static kind inside a heap
//! block, a non-container kind in a large-object block) is a fatal
//! consistency violation, not a recoverable condition.
//!
//! Descriptors are 8-aligned so their addresses always carry a zero tag
//! field; the header word encoding depends on that.

use lazy_static::lazy_static;

use crate::memory::WORD_BYTES;
use crate::object::refmap::{LargeRefMap, RefMap, MAX_INLINE_WORDS};
use crate::object::tagged::tag_of;

/// Closed enumeration of object kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Fixed layout: leading reference fields, then raw words
    Record,
    /// Callable record; descriptor also carries the argument shape
    Function,
    /// Mutable cell holding one reference
    MutVar,
    /// Transactional variable
    TVar,
    /// Forwarding node holding one reference
    Indirection,
    /// Payload described by an inline or out-of-line reference map
    BitmapRecord,
    /// Reference array (mutable, clean)
    ArrayPtrs,
    /// Reference array (mutable, dirty)
    ArrayPtrsDirty,
    /// Reference array (frozen, clean)
    ArrayPtrsFrozen,
    /// Reference array (frozen, dirty)
    ArrayPtrsFrozenDirty,
    /// Small reference array (mutable, clean)
    SmallArrayPtrs,
    /// Small reference array (mutable, dirty)
    SmallArrayPtrsDirty,
    /// Small reference array (frozen, clean)
    SmallArrayPtrsFrozen,
    /// Small reference array (frozen, dirty)
    SmallArrayPtrsFrozenDirty,
    /// Opaque byte buffer; no references
    ByteArray,
    /// Execution stack with activation records
    Stack,
    /// Partial application: function plus captured argument block
    PartialApply,
    /// Saturated application awaiting evaluation
    Apply,
    /// Suspended computation carrying a stack chunk
    ApplyStack,
    /// Weak reference
    Weak,
    /// Transactional log chunk
    TRecChunk,
    /// Task state (scheduler linkage, blocking info, stack reference)
    Task,
    /// Static top-level record
    StaticRecord,
    /// Static top-level function
    StaticFun,
    /// Static unevaluated top-level binding
    StaticThunk,
    /// Static binding evaluated into the heap
    StaticIndirection,
}

impl ObjectKind {
    /// Whether the kind only appears on the static object list
    #[inline]
    pub fn is_static(self) -> bool {
        matches!(
            self,
            ObjectKind::StaticRecord
                | ObjectKind::StaticFun
                | ObjectKind::StaticThunk
                | ObjectKind::StaticIndirection
        )
    }

    /// Numeric code for diagnostics
    #[inline]
    pub fn code(self) -> usize {
        self as usize
    }
}

/// How an object's payload is traversed
#[derive(Debug, Clone, Copy)]
pub enum ShapeLayout {
    /// `ptrs` leading reference words, then `nptrs` raw words
    Fixed { ptrs: u16, nptrs: u16 },
    /// Inline reference map over the payload
    Bitmap(RefMap),
    /// Out-of-line reference map for payloads wider than one bitmap word
    BitmapLarge(&'static LargeRefMap),
    /// Element counts read from the object itself (arrays)
    Indexed,
    /// No references; size from a stored byte length
    Opaque,
    /// Kind-specific walker (stacks, applications, weaks, logs, tasks)
    Custom,
}

/// Argument shape of a callable, used to interpret captured argument
/// blocks and call-return frames
#[derive(Debug, Clone, Copy)]
pub enum ArgShape {
    /// Inline map over the argument words
    Inline(RefMap),
    /// Out-of-line map for wide argument blocks
    OutOfLine(&'static LargeRefMap),
    /// One of the standard calling patterns
    Pattern(CallPattern),
}

impl ArgShape {
    /// Number of argument words the shape describes
    pub fn len(&self) -> usize {
        match self {
            ArgShape::Inline(map) => map.len(),
            ArgShape::OutOfLine(map) => map.len,
            ArgShape::Pattern(p) => p.refmap().len(),
        }
    }

    /// Whether argument word `index` is a reference
    pub fn is_ref(&self, index: usize) -> bool {
        match self {
            ArgShape::Inline(map) => map.is_ref(index),
            ArgShape::OutOfLine(map) => map.is_ref(index),
            ArgShape::Pattern(p) => p.refmap().is_ref(index),
        }
    }
}

/// Standard calling patterns; `P` is a reference argument word, `N` a raw
/// one. Callables with other shapes carry an explicit map instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPattern {
    NoArgs = 0,
    N,
    P,
    NN,
    NP,
    PN,
    PP,
    NNN,
    NNP,
    NPN,
    NPP,
    PNN,
    PNP,
    PPN,
    PPP,
    PPPP,
    PPPPP,
    PPPPPP,
}

const CALL_PATTERN_SPECS: [&str; 18] = [
    "", "N", "P", "NN", "NP", "PN", "PP", "NNN", "NNP", "NPN", "NPP", "PNN", "PNP", "PPN", "PPP",
    "PPPP", "PPPPP", "PPPPPP",
];

lazy_static! {
    static ref CALL_PATTERN_MAPS: Vec<RefMap> = CALL_PATTERN_SPECS
        .iter()
        .map(|pattern| {
            let mut bits: usize = 0;
            for (i, c) in pattern.chars().enumerate() {
                if c == 'P' {
                    bits |= 1 << i;
                }
            }
            RefMap::new(bits, pattern.len() as u16)
        })
        .collect();
}

impl CallPattern {
    /// Reference map of the pattern
    #[inline]
    pub fn refmap(self) -> RefMap {
        CALL_PATTERN_MAPS[self as usize]
    }
}

/// Shape descriptor: one per object kind/layout the runtime defines.
///
/// The address of a descriptor is what object headers store, so every
/// descriptor handed to the engine must live as long as the heap.
#[derive(Debug)]
#[repr(align(8))]
pub struct ShapeDescriptor {
    pub kind: ObjectKind,
    pub layout: ShapeLayout,
    /// Argument shape; present on callables only
    pub args: Option<ArgShape>,
}

impl ShapeDescriptor {
    pub const fn new(kind: ObjectKind, layout: ShapeLayout) -> ShapeDescriptor {
        ShapeDescriptor {
            kind,
            layout,
            args: None,
        }
    }

    /// Fixed-layout record with `ptrs` reference fields and `nptrs` raw words
    pub const fn record(ptrs: u16, nptrs: u16) -> ShapeDescriptor {
        ShapeDescriptor::new(ObjectKind::Record, ShapeLayout::Fixed { ptrs, nptrs })
    }

    /// Callable with `ptrs` captured references, `nptrs` raw words and the
    /// given argument shape
    pub const fn function(ptrs: u16, nptrs: u16, args: ArgShape) -> ShapeDescriptor {
        ShapeDescriptor {
            kind: ObjectKind::Function,
            layout: ShapeLayout::Fixed { ptrs, nptrs },
            args: Some(args),
        }
    }

    /// Record whose payload is described by an inline reference map
    pub const fn bitmap_record(map: RefMap) -> ShapeDescriptor {
        assert!(map.len() <= MAX_INLINE_WORDS);
        ShapeDescriptor::new(ObjectKind::BitmapRecord, ShapeLayout::Bitmap(map))
    }

    /// Record whose payload needs an out-of-line reference map
    pub const fn bitmap_record_large(map: &'static LargeRefMap) -> ShapeDescriptor {
        ShapeDescriptor::new(ObjectKind::BitmapRecord, ShapeLayout::BitmapLarge(map))
    }

    /// Address stored in object headers
    #[inline]
    pub fn address(&'static self) -> usize {
        let addr = self as *const ShapeDescriptor as usize;
        debug_assert!(tag_of(addr) == 0);
        addr
    }
}

/// Recover a descriptor from a header-stored address.
///
/// # Safety
/// `addr` must be the untagged address of a live `ShapeDescriptor`.
#[inline]
pub unsafe fn descriptor_at(addr: usize) -> &'static ShapeDescriptor {
    debug_assert!(tag_of(addr) == 0);
    &*(addr as *const ShapeDescriptor)
}

// === Stack activation records ===

/// Kinds of stack activation records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Return point with an inline-map payload
    Return,
    /// Return point with an out-of-line map payload
    ReturnBig,
    /// Return point whose argument block is shaped by a function reference
    CallReturn,
    /// Pending update of a once-entered binding
    Update,
    /// Exception handler
    Catch,
    /// Continuation into the previous stack chunk
    Underflow,
    /// Bottom of the outermost stack chunk
    Stop,
    /// Transaction entry point
    Atomically,
    /// Transactional retry handler
    CatchRetry,
    /// Transactional exception handler
    CatchTx,
}

/// Payload layout of an activation record
#[derive(Debug, Clone, Copy)]
pub enum FrameLayout {
    /// Inline reference map
    Small(RefMap),
    /// Out-of-line reference map
    Large(&'static LargeRefMap),
    /// Raw size word, function reference, then arguments shaped by the
    /// function's argument shape
    Call,
}

/// Frame descriptor; stack frames store its address in their first word.
/// Frame descriptors are not heap objects and are never threaded.
#[derive(Debug)]
#[repr(align(8))]
pub struct FrameDescriptor {
    pub kind: FrameKind,
    pub layout: FrameLayout,
}

impl FrameDescriptor {
    pub const fn new(kind: FrameKind, layout: FrameLayout) -> FrameDescriptor {
        FrameDescriptor { kind, layout }
    }

    pub const fn small(kind: FrameKind, map: RefMap) -> FrameDescriptor {
        FrameDescriptor::new(kind, FrameLayout::Small(map))
    }

    /// Address stored in stack frames
    #[inline]
    pub fn address(&'static self) -> usize {
        let addr = self as *const FrameDescriptor as usize;
        debug_assert!(tag_of(addr) == 0);
        addr
    }
}

/// Recover a frame descriptor from a frame header word.
///
/// # Safety
/// `addr` must be the address of a live `FrameDescriptor`.
#[inline]
pub unsafe fn frame_descriptor_at(addr: usize) -> &'static FrameDescriptor {
    debug_assert!(tag_of(addr) == 0);
    &*(addr as *const FrameDescriptor)
}

// === Canonical descriptors ===
//
// Kinds with a single possible shape share one static descriptor; the
// runtime builds its own descriptors only for records, callables and
// bitmap payloads.

pub static MUT_VAR_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::MutVar, ShapeLayout::Fixed { ptrs: 1, nptrs: 0 });
pub static TVAR_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::TVar, ShapeLayout::Fixed { ptrs: 2, nptrs: 1 });
pub static INDIRECTION_SHAPE: ShapeDescriptor = ShapeDescriptor::new(
    ObjectKind::Indirection,
    ShapeLayout::Fixed { ptrs: 1, nptrs: 0 },
);
pub static ARRAY_PTRS_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::ArrayPtrs, ShapeLayout::Indexed);
pub static ARRAY_PTRS_DIRTY_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::ArrayPtrsDirty, ShapeLayout::Indexed);
pub static ARRAY_PTRS_FROZEN_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::ArrayPtrsFrozen, ShapeLayout::Indexed);
pub static ARRAY_PTRS_FROZEN_DIRTY_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::ArrayPtrsFrozenDirty, ShapeLayout::Indexed);
pub static SMALL_ARRAY_PTRS_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::SmallArrayPtrs, ShapeLayout::Indexed);
pub static SMALL_ARRAY_PTRS_DIRTY_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::SmallArrayPtrsDirty, ShapeLayout::Indexed);
pub static SMALL_ARRAY_PTRS_FROZEN_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::SmallArrayPtrsFrozen, ShapeLayout::Indexed);
pub static SMALL_ARRAY_PTRS_FROZEN_DIRTY_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::SmallArrayPtrsFrozenDirty, ShapeLayout::Indexed);
pub static BYTE_ARRAY_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::ByteArray, ShapeLayout::Opaque);
pub static STACK_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::Stack, ShapeLayout::Custom);
pub static PARTIAL_APPLY_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::PartialApply, ShapeLayout::Custom);
pub static APPLY_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::Apply, ShapeLayout::Custom);
pub static APPLY_STACK_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::ApplyStack, ShapeLayout::Custom);
pub static WEAK_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::Weak, ShapeLayout::Custom);
pub static TREC_CHUNK_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::TRecChunk, ShapeLayout::Custom);
pub static TASK_SHAPE: ShapeDescriptor =
    ShapeDescriptor::new(ObjectKind::Task, ShapeLayout::Custom);

// Canonical activation-record descriptors. Return frames vary per call
// site and are built by the runtime; these fixed frames do not.
pub static UPDATE_FRAME: FrameDescriptor =
    FrameDescriptor::small(FrameKind::Update, RefMap::new(0b1, 1));
pub static CATCH_FRAME: FrameDescriptor =
    FrameDescriptor::small(FrameKind::Catch, RefMap::new(0b01, 2));
pub static UNDERFLOW_FRAME: FrameDescriptor =
    FrameDescriptor::small(FrameKind::Underflow, RefMap::new(0b1, 1));
pub static STOP_FRAME: FrameDescriptor =
    FrameDescriptor::small(FrameKind::Stop, RefMap::empty());
pub static ATOMICALLY_FRAME: FrameDescriptor =
    FrameDescriptor::small(FrameKind::Atomically, RefMap::new(0b11, 2));
pub static CATCH_RETRY_FRAME: FrameDescriptor =
    FrameDescriptor::small(FrameKind::CatchRetry, RefMap::new(0b011, 3));
pub static CATCH_TX_FRAME: FrameDescriptor =
    FrameDescriptor::small(FrameKind::CatchTx, RefMap::new(0b01, 2));

// === Word offsets within objects (header is word 0) ===

/// Reference-count word of both array families
pub const ARRAY_COUNT_WORD: usize = 1;
/// Total payload word count of a large array (references plus card words)
pub const ARRAY_SIZE_WORD: usize = 2;
/// First payload word of a large array
pub const ARRAY_PAYLOAD_WORD: usize = 3;
/// First payload word of a small array
pub const SMALL_ARRAY_PAYLOAD_WORD: usize = 2;

/// Byte-length word of a byte array
pub const BYTE_ARRAY_LEN_WORD: usize = 1;
/// First data word of a byte array
pub const BYTE_ARRAY_PAYLOAD_WORD: usize = 2;

/// Stack-area word count
pub const STACK_SIZE_WORD: usize = 1;
/// Saved stack pointer (absolute address into the stack area)
pub const STACK_SP_WORD: usize = 2;
/// Dirty/flag word
pub const STACK_FLAGS_WORD: usize = 3;
/// First word of the stack area
pub const STACK_AREA_WORD: usize = 4;

/// Arity word of a (partial) application
pub const PAP_ARITY_WORD: usize = 1;
/// Captured-argument count
pub const PAP_NARGS_WORD: usize = 2;
/// Function reference
pub const PAP_FUN_WORD: usize = 3;
/// First captured argument word
pub const PAP_PAYLOAD_WORD: usize = 4;

/// Stack-chunk word count of a suspended computation
pub const APSTACK_SIZE_WORD: usize = 1;
/// Function reference of a suspended computation
pub const APSTACK_FUN_WORD: usize = 2;
/// First word of the embedded stack chunk
pub const APSTACK_PAYLOAD_WORD: usize = 3;

/// Finalizer chain of a weak reference
pub const WEAK_FINALIZER_CHAIN_WORD: usize = 1;
pub const WEAK_KEY_WORD: usize = 2;
pub const WEAK_VALUE_WORD: usize = 3;
pub const WEAK_FINALIZER_WORD: usize = 4;
/// Next weak reference on the owning generation's list (0 when unlinked)
pub const WEAK_LINK_WORD: usize = 5;
pub const WEAK_SIZE_WORDS: usize = 6;

/// Previous chunk of a transactional log
pub const TREC_PREV_WORD: usize = 1;
/// Number of entries in use
pub const TREC_NEXT_IDX_WORD: usize = 2;
/// First entry word
pub const TREC_ENTRIES_WORD: usize = 3;
/// Words per entry: variable, expected value, new value
pub const TREC_ENTRY_WORDS: usize = 3;
/// Entry capacity of a chunk
pub const TREC_CAPACITY: usize = 16;
pub const TREC_SIZE_WORDS: usize = TREC_ENTRIES_WORD + TREC_CAPACITY * TREC_ENTRY_WORDS;

/// Scheduler run-queue link
pub const TASK_SCHED_LINK_WORD: usize = 1;
/// Resident-task list link
pub const TASK_GLOBAL_LINK_WORD: usize = 2;
/// Blocking state (raw; see `TASK_BLOCKED_*`)
pub const TASK_STATE_WORD: usize = 3;
/// What the task is blocked on; a heap reference only for some states
pub const TASK_BLOCKED_ON_WORD: usize = 4;
/// Pending asynchronous throws
pub const TASK_PENDING_THROWS_WORD: usize = 5;
/// Queue of tasks blocked on this one
pub const TASK_WAKEUP_QUEUE_WORD: usize = 6;
/// Innermost transactional log
pub const TASK_TX_LOG_WORD: usize = 7;
/// The task's stack object
pub const TASK_STACK_WORD: usize = 8;
/// Task id (raw)
pub const TASK_ID_WORD: usize = 9;
pub const TASK_SIZE_WORDS: usize = 10;

/// Raw size word of a call-return frame
pub const FRAME_CALL_SIZE_WORD: usize = 1;
/// Function reference of a call-return frame
pub const FRAME_CALL_FUN_WORD: usize = 2;
/// First argument word of a call-return frame
pub const FRAME_CALL_ARGS_WORD: usize = 3;

/// Static-list terminator
pub const STATIC_LIST_END: usize = 0;

// === Task blocking states ===

pub const TASK_RUNNABLE: usize = 0;
pub const TASK_BLOCKED_ON_VAR: usize = 1;
pub const TASK_BLOCKED_ON_VAR_READ: usize = 2;
pub const TASK_BLOCKED_ON_THUNK: usize = 3;
pub const TASK_BLOCKED_ON_THROW: usize = 4;
pub const TASK_BLOCKED_ON_IO: usize = 5;
pub const TASK_BLOCKED_ON_TIMER: usize = 6;

/// Whether `blocked_on` holds a heap reference for the given state.
/// I/O and timer waits park a non-heap token there instead.
#[inline]
pub fn task_blocked_on_is_ref(state: usize) -> bool {
    state <= TASK_BLOCKED_ON_THROW
}

/// Word offset of a static object's list link: directly after the
/// declared payload.
pub fn static_link_offset(desc: &ShapeDescriptor) -> Option<usize> {
    match desc.layout {
        ShapeLayout::Fixed { ptrs, nptrs } => Some(1 + ptrs as usize + nptrs as usize),
        _ => None,
    }
}

/// Byte offset helper for a word index
#[inline]
pub const fn word_offset(index: usize) -> usize {
    index * WORD_BYTES
}

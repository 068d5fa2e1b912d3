//! Per-kind object traversal
//!
//! One dispatch over the closed kind set: thread every reference field
//! of the object at `addr` and return the address just past it. The
//! caller supplies the descriptor because the object's own header may
//! currently be a chain word.
//!
//! Composite kinds delegate to the activation-record and argument-block
//! walkers. Interpreting a captured argument block requires the shape of
//! the function that will consume it, and the function reference may
//! already be threaded; its descriptor is recovered through the chain
//! *before* the reference itself is threaded.

use crate::error::corruption;
use crate::heap::Segment;
use crate::memory::{read_word, word_at, WORD_BYTES};
use crate::object::refmap::{LargeRefMap, RefMap};
use crate::object::shape::*;
use crate::object::tagged::{untag, TAG_MASK};
use crate::relocate::threading::{thread, threaded_descriptor};
use crate::util::alignment::bytes_to_words;

/// Thread every reference field of the object at `addr` and return the
/// address immediately following it.
///
/// # Safety
/// `addr` must be a live object of the given shape inside the segment;
/// all reachable slots must be valid.
pub unsafe fn thread_object(segment: &Segment, desc: &ShapeDescriptor, addr: usize) -> usize {
    match desc.kind {
        ObjectKind::Record
        | ObjectKind::Function
        | ObjectKind::MutVar
        | ObjectKind::TVar
        | ObjectKind::Indirection => match desc.layout {
            ShapeLayout::Fixed { ptrs, nptrs } => {
                let payload = word_at(addr, 1);
                thread_range(segment, payload, ptrs as usize);
                word_at(payload, ptrs as usize + nptrs as usize)
            }
            _ => corruption("fixed-arity kind with non-fixed layout", addr, desc.kind.code()),
        },

        ObjectKind::BitmapRecord => match desc.layout {
            ShapeLayout::Bitmap(map) => walk_refmap(segment, word_at(addr, 1), map),
            ShapeLayout::BitmapLarge(map) => walk_large_refmap(segment, word_at(addr, 1), map),
            _ => corruption("bitmap kind with non-bitmap layout", addr, desc.kind.code()),
        },

        ObjectKind::ArrayPtrs
        | ObjectKind::ArrayPtrsDirty
        | ObjectKind::ArrayPtrsFrozen
        | ObjectKind::ArrayPtrsFrozenDirty => {
            let count = read_word(word_at(addr, ARRAY_COUNT_WORD));
            let size = read_word(word_at(addr, ARRAY_SIZE_WORD));
            debug_assert!(size >= count);
            thread_range(segment, word_at(addr, ARRAY_PAYLOAD_WORD), count);
            word_at(addr, ARRAY_PAYLOAD_WORD + size)
        }

        ObjectKind::SmallArrayPtrs
        | ObjectKind::SmallArrayPtrsDirty
        | ObjectKind::SmallArrayPtrsFrozen
        | ObjectKind::SmallArrayPtrsFrozenDirty => {
            let count = read_word(word_at(addr, ARRAY_COUNT_WORD));
            thread_range(segment, word_at(addr, SMALL_ARRAY_PAYLOAD_WORD), count);
            word_at(addr, SMALL_ARRAY_PAYLOAD_WORD + count)
        }

        ObjectKind::ByteArray => {
            let bytes = read_word(word_at(addr, BYTE_ARRAY_LEN_WORD));
            word_at(addr, BYTE_ARRAY_PAYLOAD_WORD + bytes_to_words(bytes))
        }

        ObjectKind::Stack => {
            let area_words = read_word(word_at(addr, STACK_SIZE_WORD));
            let sp = read_word(word_at(addr, STACK_SP_WORD));
            let end = word_at(addr, STACK_AREA_WORD + area_words);
            debug_assert!(sp >= word_at(addr, STACK_AREA_WORD) && sp <= end);
            walk_stack(segment, sp, end);
            end
        }

        ObjectKind::PartialApply | ObjectKind::Apply => {
            let nargs = read_word(word_at(addr, PAP_NARGS_WORD));
            let fun_slot = word_at(addr, PAP_FUN_WORD) as *mut usize;
            let fun = function_shape_of(*fun_slot, addr);
            let end = walk_captured_args(segment, fun, word_at(addr, PAP_PAYLOAD_WORD), nargs);
            thread(segment, fun_slot);
            end
        }

        ObjectKind::ApplyStack => {
            let chunk_words = read_word(word_at(addr, APSTACK_SIZE_WORD));
            thread(segment, word_at(addr, APSTACK_FUN_WORD) as *mut usize);
            let chunk = word_at(addr, APSTACK_PAYLOAD_WORD);
            walk_stack(segment, chunk, chunk + chunk_words * WORD_BYTES);
            word_at(addr, APSTACK_PAYLOAD_WORD + chunk_words)
        }

        ObjectKind::Weak => {
            thread(segment, word_at(addr, WEAK_FINALIZER_CHAIN_WORD) as *mut usize);
            thread(segment, word_at(addr, WEAK_KEY_WORD) as *mut usize);
            thread(segment, word_at(addr, WEAK_VALUE_WORD) as *mut usize);
            thread(segment, word_at(addr, WEAK_FINALIZER_WORD) as *mut usize);
            let link = word_at(addr, WEAK_LINK_WORD);
            if read_word(link) != 0 {
                thread(segment, link as *mut usize);
            }
            word_at(addr, WEAK_SIZE_WORDS)
        }

        ObjectKind::TRecChunk => {
            thread(segment, word_at(addr, TREC_PREV_WORD) as *mut usize);
            let in_use = read_word(word_at(addr, TREC_NEXT_IDX_WORD));
            debug_assert!(in_use <= TREC_CAPACITY);
            for i in 0..in_use {
                let entry = word_at(addr, TREC_ENTRIES_WORD + i * TREC_ENTRY_WORDS);
                thread(segment, entry as *mut usize);
                thread(segment, (entry + WORD_BYTES) as *mut usize);
                thread(segment, (entry + 2 * WORD_BYTES) as *mut usize);
            }
            word_at(addr, TREC_SIZE_WORDS)
        }

        ObjectKind::Task => {
            thread(segment, word_at(addr, TASK_SCHED_LINK_WORD) as *mut usize);
            thread(segment, word_at(addr, TASK_GLOBAL_LINK_WORD) as *mut usize);
            let state = read_word(word_at(addr, TASK_STATE_WORD));
            if task_blocked_on_is_ref(state) {
                thread(segment, word_at(addr, TASK_BLOCKED_ON_WORD) as *mut usize);
            }
            thread(segment, word_at(addr, TASK_PENDING_THROWS_WORD) as *mut usize);
            thread(segment, word_at(addr, TASK_WAKEUP_QUEUE_WORD) as *mut usize);
            thread(segment, word_at(addr, TASK_TX_LOG_WORD) as *mut usize);
            thread(segment, word_at(addr, TASK_STACK_WORD) as *mut usize);
            word_at(addr, TASK_SIZE_WORDS)
        }

        ObjectKind::StaticRecord
        | ObjectKind::StaticFun
        | ObjectKind::StaticThunk
        | ObjectKind::StaticIndirection => {
            corruption("static object kind inside a heap block", addr, desc.kind.code())
        }
    }
}

/// Size in bytes of the object at `addr`, from its descriptor and any
/// length fields stored in the object (never from the header word).
///
/// # Safety
/// `addr` must be a live object of the given shape.
pub unsafe fn object_size(desc: &ShapeDescriptor, addr: usize) -> usize {
    let words = match desc.kind {
        ObjectKind::Record
        | ObjectKind::Function
        | ObjectKind::MutVar
        | ObjectKind::TVar
        | ObjectKind::Indirection => match desc.layout {
            ShapeLayout::Fixed { ptrs, nptrs } => 1 + ptrs as usize + nptrs as usize,
            _ => corruption("fixed-arity kind with non-fixed layout", addr, desc.kind.code()),
        },
        ObjectKind::BitmapRecord => match desc.layout {
            ShapeLayout::Bitmap(map) => 1 + map.len(),
            ShapeLayout::BitmapLarge(map) => 1 + map.len,
            _ => corruption("bitmap kind with non-bitmap layout", addr, desc.kind.code()),
        },
        ObjectKind::ArrayPtrs
        | ObjectKind::ArrayPtrsDirty
        | ObjectKind::ArrayPtrsFrozen
        | ObjectKind::ArrayPtrsFrozenDirty => {
            ARRAY_PAYLOAD_WORD + read_word(word_at(addr, ARRAY_SIZE_WORD))
        }
        ObjectKind::SmallArrayPtrs
        | ObjectKind::SmallArrayPtrsDirty
        | ObjectKind::SmallArrayPtrsFrozen
        | ObjectKind::SmallArrayPtrsFrozenDirty => {
            SMALL_ARRAY_PAYLOAD_WORD + read_word(word_at(addr, ARRAY_COUNT_WORD))
        }
        ObjectKind::ByteArray => {
            BYTE_ARRAY_PAYLOAD_WORD + bytes_to_words(read_word(word_at(addr, BYTE_ARRAY_LEN_WORD)))
        }
        ObjectKind::Stack => STACK_AREA_WORD + read_word(word_at(addr, STACK_SIZE_WORD)),
        ObjectKind::PartialApply | ObjectKind::Apply => {
            PAP_PAYLOAD_WORD + read_word(word_at(addr, PAP_NARGS_WORD))
        }
        ObjectKind::ApplyStack => {
            APSTACK_PAYLOAD_WORD + read_word(word_at(addr, APSTACK_SIZE_WORD))
        }
        ObjectKind::Weak => WEAK_SIZE_WORDS,
        ObjectKind::TRecChunk => TREC_SIZE_WORDS,
        ObjectKind::Task => TASK_SIZE_WORDS,
        ObjectKind::StaticRecord
        | ObjectKind::StaticFun
        | ObjectKind::StaticThunk
        | ObjectKind::StaticIndirection => {
            corruption("static object kind inside a heap block", addr, desc.kind.code())
        }
    };
    words * WORD_BYTES
}

/// Thread `count` consecutive slots starting at `base`
#[inline]
unsafe fn thread_range(segment: &Segment, base: usize, count: usize) {
    for i in 0..count {
        thread(segment, word_at(base, i) as *mut usize);
    }
}

/// Thread the reference words of a payload described by an inline map;
/// returns the address past the payload.
pub(crate) unsafe fn walk_refmap(segment: &Segment, base: usize, map: RefMap) -> usize {
    for i in 0..map.len() {
        if map.is_ref(i) {
            thread(segment, word_at(base, i) as *mut usize);
        }
    }
    word_at(base, map.len())
}

/// Same for an out-of-line map
pub(crate) unsafe fn walk_large_refmap(
    segment: &Segment,
    base: usize,
    map: &LargeRefMap,
) -> usize {
    for i in 0..map.len {
        if map.is_ref(i) {
            thread(segment, word_at(base, i) as *mut usize);
        }
    }
    word_at(base, map.len)
}

/// Resolve the shape of a function reference that may itself already be
/// threaded. `site` is only for diagnostics.
unsafe fn function_shape_of(fun_ref: usize, site: usize) -> &'static ShapeDescriptor {
    let fun = untag(fun_ref);
    let parked = threaded_descriptor(fun);
    let desc = descriptor_at(untag(parked));
    debug_assert!(
        !matches!(desc.kind, ObjectKind::PartialApply | ObjectKind::Apply),
        "argument shape lookup through another application at {:#x}",
        site
    );
    match desc.args {
        Some(_) => desc,
        None => corruption("callee descriptor carries no argument shape", site, fun_ref),
    }
}

/// Walk a captured argument block of `nargs` words using the callee's
/// argument shape. A partial application may hold fewer words than the
/// full pattern; only the words present are interpreted.
unsafe fn walk_captured_args(
    segment: &Segment,
    fun: &ShapeDescriptor,
    base: usize,
    nargs: usize,
) -> usize {
    let shape = fun.args.expect("checked by function_shape_of");
    for i in 0..nargs {
        if shape.is_ref(i) {
            thread(segment, word_at(base, i) as *mut usize);
        }
    }
    word_at(base, nargs)
}

/// Walk a full argument block at a call-return frame, sized by the
/// callee's argument shape itself.
unsafe fn walk_arg_block(segment: &Segment, fun: &ShapeDescriptor, base: usize) -> usize {
    match fun.args.expect("checked by function_shape_of") {
        ArgShape::Inline(map) => walk_refmap(segment, base, map),
        ArgShape::Pattern(p) => walk_refmap(segment, base, p.refmap()),
        ArgShape::OutOfLine(map) => walk_large_refmap(segment, base, map),
    }
}

/// Walk the activation records of a stack area from `sp` to `end`.
///
/// Each record starts with a frame-descriptor address; a word with a
/// nonzero tag field there, or a descriptor whose kind and layout
/// disagree, means the stack is corrupt.
pub(crate) unsafe fn walk_stack(segment: &Segment, sp: usize, end: usize) {
    let mut p = sp;
    while p < end {
        let fword = read_word(p);
        if fword & TAG_MASK != 0 || fword == 0 {
            corruption("malformed activation-record descriptor", p, fword);
        }
        let frame = frame_descriptor_at(fword);
        let is_call_layout = matches!(frame.layout, FrameLayout::Call);
        let is_call_kind = matches!(frame.kind, FrameKind::CallReturn);
        if is_call_layout != is_call_kind {
            corruption(
                "activation record kind does not match its layout",
                p,
                fword,
            );
        }
        match frame.layout {
            FrameLayout::Small(map) => {
                // payload starts immediately after the descriptor word
                p = walk_refmap(segment, p + WORD_BYTES, map);
            }
            FrameLayout::Large(map) => {
                p = walk_large_refmap(segment, p + WORD_BYTES, map);
            }
            FrameLayout::Call => {
                let fun_slot = word_at(p, FRAME_CALL_FUN_WORD) as *mut usize;
                // resolve the callee's shape before threading the slot
                let fun = function_shape_of(*fun_slot, p);
                thread(segment, fun_slot);
                p = walk_arg_block(segment, fun, word_at(p, FRAME_CALL_ARGS_WORD));
            }
        }
    }
}

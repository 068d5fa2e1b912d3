//! Compaction entry point
//!
//! One call performs the whole relocation: thread the roots, run the
//! forward update over every generation, then physically compact the
//! oldest generation's old blocks. From the outside the heap goes from
//! "marked" to "compacted, all references final" in one step.
//!
//! The engine runs inside a whole-heap pause arranged by the caller: no
//! allocation, no task execution, no concurrent access to the heap, the
//! root set or the mark bitmaps for the duration of the call.

use crate::heap::Heap;
use crate::relocate::backward::backward_compact;
use crate::relocate::forward::{forward_compact, forward_large, forward_plain};
use crate::relocate::roots::{thread_static_list, RootSet, RootSource};
use crate::relocate::threading::thread;
use crate::relocate::{CompactionContext, Phase};
use crate::stats::{CompactionStats, PhaseTimer};

/// Compact the heap in place.
///
/// `static_list` is the head of the static object list (0 for none);
/// `dead_weak_list` and `resurrected_tasks` are transient list heads the
/// collection cycle may carry across the pause, threaded like any other
/// root when present.
///
/// On return every reference in the heap and the root set refers to its
/// target's final address, block lists and live counts are consistent,
/// and empty trailing blocks are back in the segment pool.
pub fn compact(
    heap: &mut Heap,
    roots: &mut RootSet,
    static_list: usize,
    dead_weak_list: Option<&mut usize>,
    resurrected_tasks: Option<&mut usize>,
) -> CompactionStats {
    let segment = &heap.segment;
    let generations = &mut heap.generations;
    let generation_count = generations.len();
    let oldest = generation_count - 1;

    let mut ctx = CompactionContext::new();

    // --- step 1: thread the roots -------------------------------------
    ctx.enter(Phase::Threading);
    let timer = PhaseTimer::start();
    let mut roots_threaded: usize = 0;
    {
        let mut visit = |slot: &mut usize| {
            // Safety: root slots are owned by `roots` for the pause
            unsafe { thread(segment, slot as *mut usize) };
            roots_threaded += 1;
        };

        for cap in &mut roots.capabilities {
            cap.visit_slots(&mut visit);
        }
        roots.scheduler.visit_slots(&mut visit);

        // weak-reference lists, including the transient dead list
        for gen in generations.iter_mut() {
            if gen.weak_list != 0 {
                visit(&mut gen.weak_list);
            }
        }
        if let Some(dead) = dead_weak_list {
            visit(dead);
        }

        // write-barrier mutation lists, word by word; the young
        // generation has no record of older-to-younger references
        for cap in &mut roots.capabilities {
            for gen_index in 1..generation_count {
                if let Some(list) = cap.mut_lists.get_mut(gen_index) {
                    for slot in list.iter_mut() {
                        visit(slot);
                    }
                }
            }
        }

        // resident task lists and any tasks revived this cycle
        for gen in generations.iter_mut() {
            visit(&mut gen.tasks);
        }
        if let Some(revived) = resurrected_tasks {
            visit(revived);
        }

        roots.tasks.visit_slots(&mut visit);

        // Safety: the static list is immutable for the pause
        unsafe { thread_static_list(segment, static_list) };

        roots.stable_handles.visit_slots(&mut visit);
        roots.stable_names.visit_slots(&mut visit);
        for slot in roots.code_refs.iter_mut() {
            visit(slot);
        }
    }
    ctx.stats.roots_threaded = roots_threaded;
    ctx.stats.threading_micros = timer.elapsed_micros();

    // --- step 2: forward update over every generation ------------------
    ctx.enter(Phase::ForwardUpdate);
    let timer = PhaseTimer::start();
    for gen_index in 0..generation_count {
        let gen = &generations[gen_index];
        log::debug!("forward update: generation {}", gen_index);

        // Safety: the pause guarantees exclusive access; block lists
        // come from the mark phase and describe well-formed objects
        unsafe {
            forward_plain(segment, &gen.blocks);
            for worker in &gen.workers {
                forward_plain(segment, &worker.todo);
                forward_plain(segment, &worker.partial);
            }
            forward_large(segment, &gen.large_objects);

            if gen_index == oldest && !gen.old_blocks.is_empty() {
                log::debug!("forward update: generation {} (compacting)", gen_index);
                forward_compact(segment, &gen.old_blocks, &mut ctx.stats);
            }
        }
    }
    ctx.stats.forward_micros = timer.elapsed_micros();

    // --- step 3: move the survivors ------------------------------------
    ctx.enter(Phase::BackwardMove);
    let timer = PhaseTimer::start();
    let gen = &mut generations[oldest];
    if !gen.old_blocks.is_empty() {
        ctx.stats.blocks_before = gen.old_blocks.len();
        // Safety: forward pass completed over the same blocks above
        let live = unsafe { backward_compact(segment, gen, &mut ctx.stats) };
        gen.live_blocks = live;
        ctx.stats.blocks_after = live;
        log::debug!(
            "backward move: generation {} ({} blocks, now {})",
            oldest,
            ctx.stats.blocks_before,
            live
        );
    }
    ctx.stats.backward_micros = timer.elapsed_micros();

    ctx.enter(Phase::Done);
    debug_assert_eq!(
        ctx.stats.moved_bytes, ctx.stats.live_bytes,
        "backward pass must account for every live byte"
    );
    ctx.stats
}

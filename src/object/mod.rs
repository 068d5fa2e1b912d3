//! Object model: tagged references, header words, shapes

pub mod header;
pub mod refmap;
pub mod shape;
pub mod tagged;

pub use header::{HeaderState, HeaderWord};
pub use refmap::{LargeRefMap, RefMap, MAX_INLINE_WORDS};
pub use shape::{
    descriptor_at, frame_descriptor_at, ArgShape, CallPattern, FrameDescriptor, FrameKind,
    FrameLayout, ObjectKind, ShapeDescriptor, ShapeLayout,
};
pub use tagged::{tag_of, untag, with_tag, TAG_BITS, TAG_MASK};

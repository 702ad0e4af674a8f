//! Backends that can be plugged into an [`AsyncCacheWriter`](crate::writer::AsyncCacheWriter)
//! as its keeper and remover.
pub mod memory;

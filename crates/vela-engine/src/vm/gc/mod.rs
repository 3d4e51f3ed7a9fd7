//! Managed heap: arena allocation, pinning, and mark/sweep reclamation.

pub(crate) mod collector;
pub(crate) mod heap;

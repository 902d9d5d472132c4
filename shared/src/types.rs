/// Per-container local write counter
pub type StateIndex = u32;

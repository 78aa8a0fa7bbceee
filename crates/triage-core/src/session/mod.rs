//! Session history management.
//!
//! ```text
//! First turn
//!   │
//!   └─► Session created with its System turn
//!
//! Every turn
//!   │
//!   ├─► Turn appended to history and transcript
//!   │
//!   └─► History reaches threshold + 1 turns?
//!         └─► Compact: System + "Previous conversation summary" + last reply
//!
//! Termination
//!   │
//!   └─► Session closed, full transcript handed back
//! ```

mod store;

pub use store::*;

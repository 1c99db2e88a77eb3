//! A compact JavaScript-like interpreter for memory-constrained hosts.
//!
//! No AST is built: scripted functions hold a rewindable scan state and
//! the evaluator walks the token stream directly, so a function's
//! memory cost is its source text plus one scanner. Values live in a
//! slab-backed heap of tagged, reference-counted slots, with a
//! two-color mark-sweep pass for cycles.
//!
//! ```
//! use microjs::{Interp, InterpConfig};
//!
//! let mut interp = Interp::new(InterpConfig::default());
//! let v = interp.eval("var n = 6; n * 7;").unwrap();
//! assert_eq!(interp.heap.format_value(v), "42");
//! ```

mod builtins;
mod core;
mod error;
mod mem;

pub use crate::core::eval::{Ev, Signal};
pub use crate::core::number::Num;
pub use crate::core::scan::{ConstantsResolver, Scanner, Source, Tok};
pub use crate::core::value::{Class, Heap, NativeFn, ObjRef, SlotId, FALSE, NULL, TRUE, UNDEF};
pub use crate::core::{Interp, InterpConfig, ModuleLoader, TimerService};
pub use crate::error::JsError;

//! `boardstock-catalog` — master-data domain types.
//!
//! Components, PCBs and BOM lines with their creation/patch inputs. Edits go
//! through explicit patch structs whose fields are all optional and
//! individually validated; stock quantities themselves are only ever mutated
//! by the ledger operations in `boardstock-infra`.

pub mod bom_line;
pub mod component;
pub mod pcb;

pub use bom_line::{BomLine, NewBomLine};
pub use component::{Component, ComponentPatch, NewComponent};
pub use pcb::{NewPcb, Pcb, PcbPatch};

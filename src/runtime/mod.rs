pub mod pipeline;
pub mod router;

pub use pipeline::Pipeline;
pub use router::{SymbolRole, SymbolRouter};

pub mod assembler;
pub mod cancel;
pub mod quality;
pub mod stage;

pub use assembler::{DocumentAssembler, DocumentInput};
pub use cancel::CancellationToken;
pub use stage::PipelineStage;

pub mod batch;
pub mod inspect;
pub mod stage0_ingest;
pub mod stage1_shape;
pub mod stage2_enrich;
pub mod stage3_restructure;
pub mod stage4_translate;
pub mod stage5_clean;
pub mod stage6_merge;

pub use batch::*;
pub use inspect::*;
pub use stage0_ingest::*;
pub use stage1_shape::*;
pub use stage2_enrich::*;
pub use stage3_restructure::*;
pub use stage4_translate::*;
pub use stage5_clean::*;
pub use stage6_merge::*;

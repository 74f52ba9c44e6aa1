//! The four pipeline stages: front-end, renamer, reorder buffer, scheduler
//! (`SPEC_FULL.md` §4).

pub mod cacheblock;
pub mod frontend;
pub mod idq;
pub mod renamer;
pub mod rob;
pub mod scheduler;

pub use frontend::FrontEnd;
pub use idq::Idq;
pub use renamer::Renamer;
pub use rob::Rob;
pub use scheduler::Scheduler;

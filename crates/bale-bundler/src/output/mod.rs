//! Getting artifacts onto disk.

mod lock;
mod publish;
mod writer;

pub use lock::{LockOptions, OutputLock};
pub use publish::{PublishMode, publish};
pub use writer::{validate_and_normalize_dir, validate_output_path, write_artifacts};

pub mod logger;
pub mod maths;
pub mod object_id;
pub mod thread;

pub use object_id::ObjectId;

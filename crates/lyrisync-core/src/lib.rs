pub mod compositor;
pub mod ipc;
pub mod job;
pub mod layout;
pub mod scheduler;
pub mod worker;

pub use compositor::*;
pub use ipc::*;
pub use job::*;
pub use layout::*;
pub use scheduler::*;
pub use worker::*;

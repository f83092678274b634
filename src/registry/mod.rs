//! Entity registry: data links, their sessions and the pending queues.

mod handle;
mod ndl;
mod ndp;
mod ndp_id;
mod pending;
mod pool;

pub use handle::{InstanceId, NdlHandle};
pub use ndl::NdlSnapshot;
pub use ndp::NdpSnapshot;
pub use pending::{PendingQueue, PendingRequest, RequestKind};

pub(crate) use handle::NdpRef;
pub(crate) use ndl::Ndl;
pub(crate) use ndp::Ndp;
pub(crate) use pool::Registry;

//! Circulation: lending, returns and overdue fines.

mod clock;
mod policy;
mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use policy::LoanPolicy;
pub use service::Circulation;

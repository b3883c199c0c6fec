pub use crate::clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use crate::error::ErrorCategory;
pub use crate::security::resource::ResourceGuard;
pub use crate::{new_id, safe_nanoid, slug_id};
pub use apex_domain::ids::{AttemptId, CandidateId, DomainId, EntityId, TierId};

#[cfg(feature = "server")]
pub use crate::server::{ApiError, ApiResult, ApiState};

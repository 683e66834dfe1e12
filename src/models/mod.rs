pub mod account;
pub mod diet;
pub mod hormonal;
pub mod notification;
pub mod protocol;
pub mod subscription;
pub mod train;
pub mod validation;

pub use account::*;
pub use diet::*;
pub use hormonal::*;
pub use notification::*;
pub use protocol::*;
pub use subscription::*;
pub use train::*;
pub use validation::{FieldViolation, ValidationFailure};

/// New opaque identifier for a persisted entity.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

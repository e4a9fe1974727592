pub mod activity;
pub mod property;
pub mod record;
pub mod user;

pub use activity::{ActivityFilter, ActivityLog, NewActivity};
pub use property::{Member, NewProperty, Property, PropertyChanges, PropertyStatus};
pub use record::{ColumnSpec, ColumnType, ColumnValue, EntityKind, LinkedRecord, RecordValues};
pub use user::{NewUser, ProfileChanges, User, UserStatus};

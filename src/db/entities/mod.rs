//! SeaORM entities backing the database store.

pub mod alert_firing;
pub mod alert_rule;
pub mod probe_record;
pub mod target;
pub mod target_group;
pub mod target_group_member;

pub mod prelude {
    pub use super::alert_firing::Entity as AlertFiring;
    pub use super::alert_rule::Entity as AlertRule;
    pub use super::probe_record::Entity as ProbeRecord;
    pub use super::target::Entity as Target;
    pub use super::target_group::Entity as TargetGroup;
    pub use super::target_group_member::Entity as TargetGroupMember;
}

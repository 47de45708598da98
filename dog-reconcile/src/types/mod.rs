pub mod component;
pub mod ids;
pub mod menu;
pub mod route;
pub mod tenant;
pub mod user;

pub use component::{ComponentIdentity, ComponentPatch, ComponentRecord, ComponentSpec};
pub use ids::EntityId;
pub use menu::{MenuEntry, MenuRecord, MenuSpec};
pub use route::{RouteEntry, RouteSpec};
pub use tenant::{TenantConfig, TenantProfile, TenantRecord};
pub use user::{
    BusinessUnitRecord, EntityRef, InlineEntity, Membership, OrganizationRecord, SeedUserSpec,
    TeamRecord, UserRecord,
};

pub mod file;
pub mod group;
pub mod membership;
pub mod process;
pub mod project;
pub mod user;

pub use file::{FileRecord, Folder};
pub use group::{Group, GroupResponse, Visibility};
pub use membership::{MemberRole, Membership, MembershipStatus};
pub use process::{Element, ElementKind, ElementResponse, MoscowCategory, Task};
pub use project::{Project, ProjectMember, ProjectSummary};
pub use user::{User, UserProfile};

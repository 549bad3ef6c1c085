//! users, the current session and rwx permission checks
pub mod permission;
pub mod session;
pub mod table;

pub use permission::*;
pub use session::*;
pub use table::*;

pub const ROOT_UID: u32 = 0;
pub const ROOT_GID: u32 = 0;
/// the identity left behind by `logout`
pub const ANONYMOUS_UID: u32 = 65534;
pub const ANONYMOUS_GID: u32 = 65534;
/// first uid handed out when `create_user` is asked to pick one
pub const FIRST_USER_UID: u32 = 1000;
pub const DEFAULT_GID: u32 = 1000;
pub const MAX_USERS: usize = 32;
pub const MAX_USERNAME_LEN: usize = 31;

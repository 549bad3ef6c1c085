use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    device::{BlockStore, BLOCK_SIZE},
    error::{FsError, FsResult},
    fs::layout::{USER_TABLE_BLOCKS, USER_TABLE_START},
    utils::{
        digest::password_hash,
        time_util::{self, TimeDurationStruct},
        traits::{DigestInSelf, SerializeAndDigest},
    },
};

use super::{
    ANONYMOUS_GID, ANONYMOUS_UID, DEFAULT_GID, FIRST_USER_UID, MAX_USERNAME_LEN, MAX_USERS,
    ROOT_GID, ROOT_UID,
};

pub const ROOT_NAME: &str = "root";
pub const ANONYMOUS_NAME: &str = "anonymous";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub uid: u32,
    pub gid: u32,
    pub username: String,
    password_hash: [u8; 32],
    pub created_at: TimeDurationStruct,
    /// inactive users cannot log in
    pub active: bool,
}

impl UserRecord {
    fn new(username: &str, password: &str, uid: u32, gid: u32) -> Self {
        UserRecord {
            uid,
            gid,
            username: username.to_string(),
            password_hash: password_hash(password),
            created_at: time_util::now(),
            active: true,
        }
    }

    pub fn password_matches(&self, password: &str) -> bool {
        self.password_hash == password_hash(password)
    }
}

/// Fixed arena of [MAX_USERS] user slots, stored in its own region of the volume.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserTable {
    slots: Vec<Option<UserRecord>>,
    digest: [u8; 32],
}

impl DigestInSelf for UserTable {
    fn digest_field(&mut self) -> &mut [u8; 32] {
        &mut self.digest
    }
}

impl SerializeAndDigest for UserTable {}

impl Default for UserTable {
    fn default() -> Self {
        UserTable {
            slots: vec![None; MAX_USERS],
            digest: [0u8; 32],
        }
    }
}

/// for construction and persistence
impl UserTable {
    /// a table holding only `root` and `anonymous`
    pub fn with_defaults(root_password: &str) -> Self {
        let mut table = UserTable::default();
        table.slots[0] = Some(UserRecord::new(ROOT_NAME, root_password, ROOT_UID, ROOT_GID));
        table.slots[1] = Some(UserRecord::new(
            ANONYMOUS_NAME,
            "",
            ANONYMOUS_UID,
            ANONYMOUS_GID,
        ));
        table
    }

    pub fn persist(&mut self, store: &mut BlockStore) -> FsResult<()> {
        let bytes = SerializeAndDigest::serialize(self)?;
        let capacity = (USER_TABLE_BLOCKS * BLOCK_SIZE) as usize;
        if bytes.len() > capacity {
            return Err(FsError::NoSpace(format!(
                "user table needs {} bytes, its region holds {capacity}",
                bytes.len()
            )));
        }
        let mut region = vec![0u8; capacity];
        region[..bytes.len()].copy_from_slice(&bytes);
        store.write_blocks(USER_TABLE_START, &region)?;
        debug!("persisted user table ({} bytes)", bytes.len());
        Ok(())
    }

    pub fn load(store: &mut BlockStore) -> FsResult<Self> {
        let mut region = vec![0u8; (USER_TABLE_BLOCKS * BLOCK_SIZE) as usize];
        store.read_blocks(USER_TABLE_START, &mut region)?;
        let (table, _) = <Self as SerializeAndDigest>::deserialize(&region)?;
        if table.slots.len() != MAX_USERS {
            return Err(FsError::Corrupted(format!(
                "user table has {} slots instead of {MAX_USERS}",
                table.slots.len()
            )));
        }
        if table.find_uid(ROOT_UID).is_none() {
            return Err(FsError::Corrupted("user table lost the root user".into()));
        }
        Ok(table)
    }
}

/// user management
impl UserTable {
    /// add a user, picking a uid from [FIRST_USER_UID] on when `uid` is 0
    /// and [DEFAULT_GID] when `gid` is 0
    /// # Return
    /// the uid of the new user
    pub fn add(&mut self, username: &str, password: &str, uid: u32, gid: u32) -> FsResult<u32> {
        if username.is_empty() || username.len() > MAX_USERNAME_LEN {
            return Err(FsError::InvalidParam(format!(
                "user name must be 1 to {MAX_USERNAME_LEN} bytes, got {:?}",
                username
            )));
        }
        if self.find(username).is_some() {
            return Err(FsError::AlreadyExists(format!("user {username}")));
        }
        let uid = match uid {
            0 => self.next_free_uid()?,
            uid if self.find_uid(uid).is_some() => {
                return Err(FsError::AlreadyExists(format!("uid {uid}")))
            }
            uid => uid,
        };
        let gid = if gid == 0 { DEFAULT_GID } else { gid };
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or_else(|| FsError::NoSpace(format!("user table holds {MAX_USERS} users")))?;
        *slot = Some(UserRecord::new(username, password, uid, gid));
        Ok(uid)
    }

    fn next_free_uid(&self) -> FsResult<u32> {
        (FIRST_USER_UID..ANONYMOUS_UID)
            .find(|uid| self.find_uid(*uid).is_none())
            .ok_or_else(|| FsError::NoSpace("no uid left to assign".into()))
    }

    /// free the slot of `username`, root and anonymous always stay
    pub fn remove(&mut self, username: &str) -> FsResult<UserRecord> {
        if username == ROOT_NAME || username == ANONYMOUS_NAME {
            return Err(FsError::PermissionDenied(format!(
                "built-in user {username} cannot be removed"
            )));
        }
        self.slots
            .iter_mut()
            .find(|slot| matches!(slot, Some(u) if u.username == username))
            .and_then(Option::take)
            .ok_or_else(|| FsError::UserNotFound(username.to_string()))
    }

    pub fn set_active(&mut self, username: &str, active: bool) -> FsResult<()> {
        if username == ROOT_NAME && !active {
            return Err(FsError::PermissionDenied("root cannot be deactivated".into()));
        }
        let user = self
            .slots
            .iter_mut()
            .flatten()
            .find(|u| u.username == username)
            .ok_or_else(|| FsError::UserNotFound(username.to_string()))?;
        user.active = active;
        Ok(())
    }

    /// replace the password of `username`, the old one is not asked for here
    pub fn set_password(&mut self, username: &str, new_password: &str) -> FsResult<()> {
        let user = self
            .slots
            .iter_mut()
            .flatten()
            .find(|u| u.username == username)
            .ok_or_else(|| FsError::UserNotFound(username.to_string()))?;
        user.password_hash = password_hash(new_password);
        Ok(())
    }

    pub fn find(&self, username: &str) -> Option<&UserRecord> {
        self.users().find(|u| u.username == username)
    }

    pub fn find_uid(&self, uid: u32) -> Option<&UserRecord> {
        self.users().find(|u| u.uid == uid)
    }

    /// check a login attempt
    pub fn authenticate(&self, username: &str, password: &str) -> FsResult<&UserRecord> {
        let user = self
            .find(username)
            .ok_or_else(|| FsError::UserNotFound(username.to_string()))?;
        if !user.password_matches(password) {
            return Err(FsError::WrongPassword(username.to_string()));
        }
        if !user.active {
            return Err(FsError::PermissionDenied(format!(
                "account {username} is disabled"
            )));
        }
        Ok(user)
    }

    /// every user in slot order
    pub fn users(&self) -> impl Iterator<Item = &UserRecord> {
        self.slots.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let table = UserTable::with_defaults("root123");
        let names: Vec<_> = table.users().map(|u| u.username.as_str()).collect();
        assert_eq!(names, [ROOT_NAME, ANONYMOUS_NAME]);
        assert_eq!(table.authenticate("root", "root123").unwrap().uid, ROOT_UID);
        assert_eq!(
            table.authenticate("anonymous", "").unwrap().uid,
            ANONYMOUS_UID
        );
    }

    #[test]
    fn test_authenticate_errors_are_distinct() {
        let table = UserTable::with_defaults("root123");
        assert!(matches!(
            table.authenticate("nobody", "x"),
            Err(FsError::UserNotFound(_))
        ));
        assert!(matches!(
            table.authenticate("root", "root124"),
            Err(FsError::WrongPassword(_))
        ));
    }

    #[test]
    fn test_add_assigns_uids() -> FsResult<()> {
        let mut table = UserTable::with_defaults("root123");
        assert_eq!(table.add("alice", "a", 0, 0)?, FIRST_USER_UID);
        assert_eq!(table.add("bob", "b", 0, 0)?, FIRST_USER_UID + 1);
        assert_eq!(table.add("carol", "c", 2000, 50)?, 2000);
        let carol = table.find("carol").unwrap();
        assert_eq!(carol.gid, 50);
        assert_eq!(table.find("alice").unwrap().gid, DEFAULT_GID);

        assert!(matches!(
            table.add("alice", "x", 0, 0),
            Err(FsError::AlreadyExists(_))
        ));
        assert!(matches!(
            table.add("dave", "x", 2000, 0),
            Err(FsError::AlreadyExists(_))
        ));
        assert!(matches!(table.add("", "x", 0, 0), Err(FsError::InvalidParam(_))));
        let long = "x".repeat(MAX_USERNAME_LEN + 1);
        assert!(matches!(
            table.add(&long, "x", 0, 0),
            Err(FsError::InvalidParam(_))
        ));
        Ok(())
    }

    #[test]
    fn test_table_full_and_slot_reuse() -> FsResult<()> {
        let mut table = UserTable::with_defaults("root123");
        for i in 0..MAX_USERS - 2 {
            table.add(&format!("user{i}"), "pw", 0, 0)?;
        }
        assert!(matches!(
            table.add("late", "pw", 0, 0),
            Err(FsError::NoSpace(_))
        ));
        let removed = table.remove("user3")?;
        assert_eq!(removed.uid, FIRST_USER_UID + 3);
        // the freed uid and slot are both handed out again
        assert_eq!(table.add("late", "pw", 0, 0)?, FIRST_USER_UID + 3);
        Ok(())
    }

    #[test]
    fn test_remove_protects_builtins() {
        let mut table = UserTable::with_defaults("root123");
        assert!(matches!(
            table.remove("root"),
            Err(FsError::PermissionDenied(_))
        ));
        assert!(matches!(
            table.remove("anonymous"),
            Err(FsError::PermissionDenied(_))
        ));
        assert!(matches!(
            table.remove("ghost"),
            Err(FsError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_inactive_user_cannot_log_in() -> FsResult<()> {
        let mut table = UserTable::with_defaults("root123");
        table.add("alice", "secret", 0, 0)?;
        table.set_active("alice", false)?;
        assert!(matches!(
            table.authenticate("alice", "secret"),
            Err(FsError::PermissionDenied(_))
        ));
        table.set_active("alice", true)?;
        assert!(table.authenticate("alice", "secret").is_ok());
        assert!(table.set_active("root", false).is_err());
        Ok(())
    }

    #[test]
    fn test_set_password() -> FsResult<()> {
        let mut table = UserTable::with_defaults("root123");
        table.add("alice", "old", 0, 0)?;
        table.set_password("alice", "new")?;
        assert!(matches!(
            table.authenticate("alice", "old"),
            Err(FsError::WrongPassword(_))
        ));
        assert!(table.authenticate("alice", "new").is_ok());
        // the other accounts keep theirs
        assert!(table.authenticate("root", "root123").is_ok());
        assert!(matches!(
            table.set_password("ghost", "x"),
            Err(FsError::UserNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_persist_and_load() -> FsResult<()> {
        let dir = tempdir().unwrap();
        let mut store = BlockStore::open(dir.path().join("users.img"), 16 * 1024)?;
        let mut table = UserTable::with_defaults("root123");
        for i in 0..MAX_USERS - 2 {
            table.add(&("u".repeat(MAX_USERNAME_LEN - 2) + &format!("{i:02}")), "pw", 0, 0)?;
        }
        table.persist(&mut store)?;
        let loaded = UserTable::load(&mut store)?;
        assert_eq!(loaded, table);

        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        store.read_block(USER_TABLE_START, &mut buf)?;
        buf[40] ^= 0x10;
        store.write_block(USER_TABLE_START, &buf)?;
        assert!(UserTable::load(&mut store).is_err());
        Ok(())
    }
}

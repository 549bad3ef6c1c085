use std::fmt;

use super::{ANONYMOUS_GID, ANONYMOUS_UID, ROOT_GID, ROOT_UID};

/// who is acting right now, exactly one identity per mounted filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub uid: u32,
    pub gid: u32,
}

impl Session {
    pub const ROOT: Session = Session {
        uid: ROOT_UID,
        gid: ROOT_GID,
    };
    pub const ANONYMOUS: Session = Session {
        uid: ANONYMOUS_UID,
        gid: ANONYMOUS_GID,
    };

    pub fn new(uid: u32, gid: u32) -> Self {
        Session { uid, gid }
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.uid == ROOT_UID
    }

    #[inline]
    pub fn is_anonymous(&self) -> bool {
        self.uid == ANONYMOUS_UID
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::ANONYMOUS
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid={} gid={}", self.uid, self.gid)
    }
}

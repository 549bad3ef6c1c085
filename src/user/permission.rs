use crate::fs::Inode;

use super::Session;

/// one bit of an rwx triplet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Access {
    Read = 0b100,
    Write = 0b010,
    Execute = 0b001,
}

/// may `session` perform `access` on `inode`
///
/// uid 0 always may. Everybody else gets the owner triplet if they own the
/// file, else the group triplet if the gid matches, else the other triplet.
pub fn check_permission(session: &Session, inode: &Inode, access: Access) -> bool {
    if session.is_root() {
        return true;
    }
    let shift = if session.uid == inode.owner_uid {
        6
    } else if session.gid == inode.owner_gid {
        3
    } else {
        0
    };
    (inode.permissions >> shift) & access as u16 != 0
}

/// render the low nine mode bits as `ls` does
/// # Example
/// ```
/// use blockfs::user::permissions_to_string;
/// assert_eq!(permissions_to_string(0o755), "rwxr-xr-x");
/// assert_eq!(permissions_to_string(0o640), "rw-r-----");
/// ```
pub fn permissions_to_string(mode: u16) -> String {
    (0..9)
        .map(|i| {
            let bit = 0o400 >> i;
            match (mode & bit != 0, i % 3) {
                (false, _) => '-',
                (true, 0) => 'r',
                (true, 1) => 'w',
                (true, _) => 'x',
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FileKind;

    fn file(mode: u16) -> Inode {
        Inode::new(2, FileKind::RegularFile, mode, 1000, 100)
    }

    #[test]
    fn test_root_always_passes() {
        let inode = file(0o000);
        for access in [Access::Read, Access::Write, Access::Execute] {
            assert!(check_permission(&Session::ROOT, &inode, access));
        }
    }

    #[test]
    fn test_owner_group_other() {
        let inode = file(0o640);
        let owner = Session::new(1000, 1000);
        let group = Session::new(1001, 100);
        let other = Session::new(1002, 1002);
        assert!(check_permission(&owner, &inode, Access::Read));
        assert!(check_permission(&owner, &inode, Access::Write));
        assert!(check_permission(&group, &inode, Access::Read));
        assert!(!check_permission(&group, &inode, Access::Write));
        assert!(!check_permission(&other, &inode, Access::Read));
    }

    #[test]
    fn test_owner_class_wins_over_group() {
        // the owner is refused even though the group bits would allow it
        let inode = file(0o070);
        let owner = Session::new(1000, 100);
        assert!(!check_permission(&owner, &inode, Access::Read));
        assert!(check_permission(&Session::new(7, 100), &inode, Access::Write));
    }

    #[test]
    fn test_permission_strings() {
        assert_eq!(permissions_to_string(0o644), "rw-r--r--");
        assert_eq!(permissions_to_string(0o000), "---------");
        assert_eq!(permissions_to_string(0o777), "rwxrwxrwx");
        assert_eq!(permissions_to_string(0o4711), "rwx--x--x");
    }
}

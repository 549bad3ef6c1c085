//! user management and the login session
use log::info;

use crate::{
    error::{FsError, FsResult},
    user::{Session, UserRecord},
};

use super::FileSystem;

impl FileSystem {
    fn require_root(&self, what: &str) -> FsResult<()> {
        if !self.session.is_root() {
            return Err(FsError::PermissionDenied(format!(
                "only root may {what}, current session is {}",
                self.session
            )));
        }
        Ok(())
    }

    /// add a user, `uid` 0 picks the next free uid and `gid` 0 the default group
    /// # Return
    /// the uid of the new user
    pub fn create_user(
        &mut self,
        username: &str,
        password: &str,
        uid: u32,
        gid: u32,
    ) -> FsResult<u32> {
        info!("create_user() called with {username:?} {uid:?} {gid:?}");
        self.volume()?;
        self.require_root("create users")?;
        let uid = self.users.add(username, password, uid, gid)?;
        self.persist_users()?;
        Ok(uid)
    }

    pub fn remove_user(&mut self, username: &str) -> FsResult<()> {
        info!("remove_user() called with {username:?}");
        self.volume()?;
        self.require_root("remove users")?;
        self.users.remove(username)?;
        self.persist_users()
    }

    /// enable or disable logins for `username`
    pub fn set_user_active(&mut self, username: &str, active: bool) -> FsResult<()> {
        info!("set_user_active() called with {username:?} {active}");
        self.volume()?;
        self.require_root("change accounts")?;
        self.users.set_active(username, active)?;
        self.persist_users()
    }

    /// replace the password of `username`
    ///
    /// root may reset any password without knowing the old one, everyone
    /// else may only change their own and must give the current password
    pub fn change_password(
        &mut self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> FsResult<()> {
        info!("change_password() called with {username:?} as {}", self.session);
        self.volume()?;
        let user = self
            .users
            .find(username)
            .ok_or_else(|| FsError::UserNotFound(username.to_string()))?;
        if !self.session.is_root() {
            if user.uid != self.session.uid {
                return Err(FsError::PermissionDenied(format!(
                    "{} may not change the password of {username}",
                    self.session
                )));
            }
            if !user.password_matches(old_password) {
                return Err(FsError::WrongPassword(username.to_string()));
            }
        }
        self.users.set_password(username, new_password)?;
        self.persist_users()
    }

    /// switch the session to `username`
    pub fn login(&mut self, username: &str, password: &str) -> FsResult<Session> {
        info!("login() called with {username:?}");
        self.volume()?;
        let user = self.users.authenticate(username, password)?;
        self.session = Session::new(user.uid, user.gid);
        Ok(self.session)
    }

    /// fall back to the anonymous identity
    pub fn logout(&mut self) -> FsResult<()> {
        info!("logout() called as {}", self.session);
        if self.session.is_anonymous() {
            return Err(FsError::NotLoggedIn);
        }
        self.session = Session::ANONYMOUS;
        Ok(())
    }

    pub fn list_users(&self) -> FsResult<Vec<UserRecord>> {
        self.volume()?;
        Ok(self.users.users().cloned().collect())
    }

    /// the record behind the current session
    pub fn current_user(&self) -> Option<&UserRecord> {
        self.users.find_uid(self.session.uid)
    }

    pub fn session(&self) -> Session {
        self.session
    }
}

pub mod navigate;
pub mod session;

use crate::portal::types::UserProfileUpdate;

#[derive(Debug)]
pub enum Action {
    LoginUrl,
    Login { code: String },
    Logout,
    Profile,
    UpdateProfile { patch: UserProfileUpdate },
    Sync,
    Refresh,
    Navigate { path: String },
    Routes,
}

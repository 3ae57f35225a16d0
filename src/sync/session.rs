use crate::profile::Profile;

/// The signed-in account's basic profile, as exposed by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicProfile {
    pub name: String,
    pub photo_url: String,
}

/// A change in the Classroom session's sign-in state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInChange {
    SignedIn(BasicProfile),
    SignedOut,
}

/// Propagate a sign-in state change to the stored profile.
///
/// On sign-in, the stored name and icon are updated only when the account
/// name differs from what is stored. On sign-out, name and icon reset to
/// their defaults and nothing else changes.
pub fn apply_signin_change(change: &SignInChange, profile: &Profile) {
    match change {
        SignInChange::SignedIn(basic) => {
            if basic.name != profile.name() {
                profile.set_name(&basic.name);
                profile.set_icon(&basic.photo_url);
            }
        }
        SignInChange::SignedOut => {
            log::info!("Classroom session ended, resetting profile");
            profile.sign_out_reset();
        }
    }
}

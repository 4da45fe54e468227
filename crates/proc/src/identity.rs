// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolves the textual or numeric `uid`/`gid` on a [`twitcher_core::WatchDescriptor`]
//! into the numeric ids the kernel wants, mirroring `core.py`'s use of
//! `pwd.getpwnam`/`grp.getgrnam` at fork time.

use nix::unistd::{Gid, Uid};
use twitcher_core::{Identity, IdentityError};

/// Resolves a user identity. A numeric id of `0` is honored as-is (no
/// silent fallback to an unprivileged user).
pub fn resolve_uid(identity: &Identity) -> Result<Uid, IdentityError> {
    match identity {
        Identity::Numeric(n) => Ok(Uid::from_raw(*n)),
        Identity::Name(name) => users::get_user_by_name(name)
            .map(|u| Uid::from_raw(u.uid()))
            .ok_or_else(|| IdentityError::UnknownUser(name.clone())),
    }
}

/// Resolves a group identity.
pub fn resolve_gid(identity: &Identity) -> Result<Gid, IdentityError> {
    match identity {
        Identity::Numeric(n) => Ok(Gid::from_raw(*n)),
        Identity::Name(name) => users::get_group_by_name(name)
            .map(|g| Gid::from_raw(g.gid()))
            .ok_or_else(|| IdentityError::UnknownGroup(name.clone())),
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;

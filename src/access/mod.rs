//! Role membership and the guard every privileged ledger call runs first.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::LedgerError;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Deployer role: withdraws funds, prices tiers, burns and scores.
    Admin,
    /// Granted to dependent components: burns and scores only.
    Friend,
}

impl Role {
    /// Role whose holders may grant and revoke `self`.
    pub fn admin_role(self) -> Role {
        match self {
            Role::Admin | Role::Friend => Role::Admin,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("ADMIN"),
            Role::Friend => f.write_str("FRIEND_CONTRACT"),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessControl {
    members: BTreeMap<Role, BTreeSet<Address>>,
}

impl AccessControl {
    /// Role table with `admin` as the sole `ADMIN`.
    pub fn new(admin: Address) -> Self {
        let mut access = Self::default();
        access.members.entry(Role::Admin).or_default().insert(admin);
        access
    }

    pub fn has_role(&self, role: Role, principal: &Address) -> bool {
        self.members
            .get(&role)
            .is_some_and(|set| set.contains(principal))
    }

    /// Passes if `caller` holds at least one of `roles`.
    pub fn ensure_any(
        &self,
        caller: &Address,
        roles: &[Role],
        action: &'static str,
    ) -> Result<(), LedgerError> {
        if roles.iter().any(|role| self.has_role(*role, caller)) {
            return Ok(());
        }
        Err(LedgerError::Unauthorized {
            caller: *caller,
            action,
        })
    }

    /// Returns whether membership changed; re-granting is a successful no-op.
    pub fn grant_role(
        &mut self,
        caller: &Address,
        role: Role,
        principal: Address,
    ) -> Result<bool, LedgerError> {
        self.ensure_any(caller, &[role.admin_role()], "grant roles")?;
        if principal.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        Ok(self.members.entry(role).or_default().insert(principal))
    }

    /// Returns whether membership changed; revoking an unheld role is a no-op.
    pub fn revoke_role(
        &mut self,
        caller: &Address,
        role: Role,
        principal: &Address,
    ) -> Result<bool, LedgerError> {
        self.ensure_any(caller, &[role.admin_role()], "revoke roles")?;
        Ok(self.remove(role, principal))
    }

    /// A principal dropping its own membership needs no administering role.
    pub fn renounce_role(&mut self, caller: &Address, role: Role) -> bool {
        self.remove(role, caller)
    }

    pub fn members(&self, role: Role) -> impl Iterator<Item = &Address> {
        self.members.get(&role).into_iter().flatten()
    }

    fn remove(&mut self, role: Role, principal: &Address) -> bool {
        let Some(set) = self.members.get_mut(&role) else {
            return false;
        };
        let removed = set.remove(principal);
        if set.is_empty() {
            self.members.remove(&role);
        }
        removed
    }
}

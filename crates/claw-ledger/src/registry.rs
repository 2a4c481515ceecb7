//! Holder registry
//!
//! Tracks which account currently holds each voucher. The ledger only reads
//! the holder, except to freeze it when a voucher is burned. Transfers are
//! executed inside the ledger's serialized section, so no operation can ever
//! observe two holders, or none.

use std::collections::HashMap;

use claw_types::{AccountId, ClawError, Result, VoucherId};

#[derive(Debug, Clone)]
struct HolderEntry {
    holder: AccountId,
    /// Set on burn; a frozen voucher can no longer change hands
    frozen: bool,
}

/// Voucher id -> current holder
#[derive(Debug, Clone)]
pub struct HolderRegistry {
    /// Identity that may never hold a voucher
    custody: AccountId,
    entries: HashMap<VoucherId, HolderEntry>,
}

impl HolderRegistry {
    pub fn new(custody: AccountId) -> Self {
        Self {
            custody,
            entries: HashMap::new(),
        }
    }

    /// Reject the custodial identity as a holder
    pub fn ensure_allowed_holder(&self, id: VoucherId, target: &AccountId) -> Result<()> {
        if target == &self.custody {
            return Err(ClawError::SelfTransferNotAllowed {
                id,
                target: target.clone(),
            });
        }
        Ok(())
    }

    /// Register the first holder of a freshly created voucher
    pub(crate) fn register(&mut self, id: VoucherId, holder: AccountId) {
        debug_assert!(!self.entries.contains_key(&id), "voucher {id} registered twice");
        self.entries.insert(
            id,
            HolderEntry {
                holder,
                frozen: false,
            },
        );
    }

    pub fn holder_of(&self, id: VoucherId) -> Option<&AccountId> {
        self.entries.get(&id).map(|e| &e.holder)
    }

    /// Move a voucher from `caller` to `to`. Returns the previous holder.
    pub fn transfer(
        &mut self,
        id: VoucherId,
        caller: &AccountId,
        to: &AccountId,
    ) -> Result<AccountId> {
        let entry = self
            .entries
            .get(&id)
            .ok_or(ClawError::InvalidTokenId { id })?;
        if &entry.holder != caller {
            return Err(ClawError::not_owner(id, caller));
        }
        if entry.frozen {
            return Err(ClawError::VoucherAlreadyBurned { id });
        }
        self.ensure_allowed_holder(id, to)?;

        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(ClawError::InvalidTokenId { id })?;
        Ok(std::mem::replace(&mut entry.holder, to.clone()))
    }

    pub(crate) fn set_frozen(&mut self, id: VoucherId, frozen: bool) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.frozen = frozen;
        }
    }

    /// Non-frozen vouchers held by `account`, in id order
    pub fn held_by(&self, account: &AccountId) -> Vec<VoucherId> {
        let mut ids: Vec<VoucherId> = self
            .entries
            .iter()
            .filter(|(_, e)| &e.holder == account && !e.frozen)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }
}

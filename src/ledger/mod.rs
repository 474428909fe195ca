use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type AccountId = String;
pub type Amount = u64;

pub const UNIT_SCALE: u64 = 100_000_000; // 1 TBK = 1e8 minimal units

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("amount should be positive")]
    InvalidAmount,
    #[error("account {account} cannot transfer to itself")]
    SelfTransfer { account: AccountId },
    #[error("insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        account: AccountId,
        balance: Amount,
        requested: Amount,
    },
    #[error(
        "insufficient allowance for spender {spender} on account {owner}: \
         allowed {allowed}, requested {requested}"
    )]
    InsufficientAllowance {
        owner: AccountId,
        spender: AccountId,
        allowed: Amount,
        requested: Amount,
    },
    #[error("account {caller} is not the administrator")]
    Unauthorized { caller: AccountId },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenEvent {
    /// Balance movement. `from: None` marks a mint, `to: None` a burn.
    Transfer {
        from: Option<AccountId>,
        to: Option<AccountId>,
        amount: Amount,
    },
    Approval {
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub meta: TokenMetadata,
    pub admin: AccountId,
    pub total_supply: Amount,
    pub balances: BTreeMap<AccountId, Amount>,
    pub allowances: BTreeMap<AccountId, BTreeMap<AccountId, Amount>>,
    pub events: Vec<TokenEvent>,
    pub state_digest: String,
}

/// The token ledger: balances, allowances, and supply, mutated only through
/// the operations below. `&mut self` keeps mutations one-at-a-time; every
/// precondition is checked before the first write, so a returned error means
/// no state changed and no event was recorded.
#[derive(Debug)]
pub struct Ledger {
    meta: TokenMetadata,
    admin: AccountId,
    total_supply: Amount,
    balances: BTreeMap<AccountId, Amount>,
    allowances: BTreeMap<AccountId, BTreeMap<AccountId, Amount>>,
    events: Vec<TokenEvent>,
}

impl Ledger {
    /// Genesis: the whole initial supply lands on the creating account,
    /// which becomes the administrator.
    pub fn deploy(
        creator: AccountId,
        name: String,
        symbol: String,
        decimals: u8,
        initial_supply: Amount,
    ) -> Self {
        let mut balances = BTreeMap::new();
        if initial_supply > 0 {
            balances.insert(creator.clone(), initial_supply);
        }
        Self {
            meta: TokenMetadata {
                name,
                symbol,
                decimals,
            },
            admin: creator,
            total_supply: initial_supply,
            balances,
            allowances: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn symbol(&self) -> &str {
        &self.meta.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.meta.decimals
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn admin(&self) -> &AccountId {
        &self.admin
    }

    /// Zero for accounts that never transacted.
    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Zero for pairs the owner never approved.
    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn events(&self) -> &[TokenEvent] {
        &self.events
    }

    pub fn transfer(
        &mut self,
        caller: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        if amount == 0 {
            return Err(TokenError::InvalidAmount);
        }
        if to == caller {
            return Err(TokenError::SelfTransfer {
                account: caller.clone(),
            });
        }
        self.debit(caller, amount)?;
        self.credit(to, amount);
        self.events.push(TokenEvent::Transfer {
            from: Some(caller.clone()),
            to: Some(to.clone()),
            amount,
        });
        Ok(())
    }

    /// Overwrites any previous allowance for (caller, spender). Callers that
    /// want a delta must read-then-approve and accept the race this opens.
    pub fn approve(
        &mut self,
        caller: &AccountId,
        spender: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        if amount == 0 {
            return Err(TokenError::InvalidAmount);
        }
        self.allowances
            .entry(caller.clone())
            .or_default()
            .insert(spender.clone(), amount);
        self.events.push(TokenEvent::Approval {
            owner: caller.clone(),
            spender: spender.clone(),
            amount,
        });
        Ok(())
    }

    pub fn transfer_from(
        &mut self,
        caller: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        if amount == 0 {
            return Err(TokenError::InvalidAmount);
        }
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                account: from.clone(),
                balance,
                requested: amount,
            });
        }
        let allowed = self.allowance(from, caller);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                owner: from.clone(),
                spender: caller.clone(),
                allowed,
                requested: amount,
            });
        }
        self.debit(from, amount)?;
        self.credit(to, amount);
        self.allowances
            .entry(from.clone())
            .or_default()
            .insert(caller.clone(), allowed - amount);
        self.events.push(TokenEvent::Transfer {
            from: Some(from.clone()),
            to: Some(to.clone()),
            amount,
        });
        Ok(())
    }

    pub fn mint(
        &mut self,
        caller: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.require_admin(caller)?;
        if amount == 0 {
            return Err(TokenError::InvalidAmount);
        }
        // total_supply must stay equal to the sum of balances, so an
        // overflowing mint is rejected before any write
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::InvalidAmount)?;
        self.total_supply = new_supply;
        self.credit(to, amount);
        self.events.push(TokenEvent::Transfer {
            from: None,
            to: Some(to.clone()),
            amount,
        });
        Ok(())
    }

    pub fn burn(
        &mut self,
        caller: &AccountId,
        from: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.require_admin(caller)?;
        if amount == 0 {
            return Err(TokenError::InvalidAmount);
        }
        self.debit(from, amount)?;
        self.total_supply -= amount;
        self.events.push(TokenEvent::Transfer {
            from: Some(from.clone()),
            to: None,
            amount,
        });
        Ok(())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            meta: self.meta.clone(),
            admin: self.admin.clone(),
            total_supply: self.total_supply,
            balances: self.balances.clone(),
            allowances: self.allowances.clone(),
            events: self.events.clone(),
            state_digest: hex::encode(compute_state_digest(
                &self.meta,
                &self.admin,
                self.total_supply,
                &self.balances,
                &self.allowances,
            )),
        }
    }

    /// Rebuild a ledger from a snapshot whose integrity the caller has
    /// already verified (see the store module).
    pub fn restore(snapshot: LedgerSnapshot) -> Self {
        Self {
            meta: snapshot.meta,
            admin: snapshot.admin,
            total_supply: snapshot.total_supply,
            balances: snapshot.balances,
            allowances: snapshot.allowances,
            events: snapshot.events,
        }
    }

    fn require_admin(&self, caller: &AccountId) -> Result<(), TokenError> {
        if *caller != self.admin {
            return Err(TokenError::Unauthorized {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    fn credit(&mut self, account: &AccountId, amount: Amount) {
        let balance = self.balances.entry(account.clone()).or_insert(0);
        *balance += amount;
    }

    fn debit(&mut self, account: &AccountId, amount: Amount) -> Result<(), TokenError> {
        let balance = self.balance_of(account);
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                account: account.clone(),
                balance,
                requested: amount,
            });
        }
        self.balances.insert(account.clone(), balance - amount);
        Ok(())
    }
}

pub fn compute_state_digest(
    meta: &TokenMetadata,
    admin: &AccountId,
    total_supply: Amount,
    balances: &BTreeMap<AccountId, Amount>,
    allowances: &BTreeMap<AccountId, BTreeMap<AccountId, Amount>>,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"meta");
    hasher.update(meta.name.as_bytes());
    hasher.update(meta.symbol.as_bytes());
    hasher.update([meta.decimals]);
    hasher.update(b"admin");
    hasher.update(admin.as_bytes());
    hasher.update(total_supply.to_le_bytes());
    for (account, amount) in balances {
        hasher.update(b"acct");
        hasher.update(account.as_bytes());
        hasher.update(amount.to_le_bytes());
    }
    for (owner, spenders) in allowances {
        for (spender, amount) in spenders {
            hasher.update(b"allow");
            hasher.update(owner.as_bytes());
            hasher.update(spender.as_bytes());
            hasher.update(amount.to_le_bytes());
        }
    }
    hasher.finalize().into()
}

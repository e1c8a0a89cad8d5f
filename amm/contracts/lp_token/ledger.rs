use ink::prelude::{collections::BTreeMap, vec::Vec};
use ink::primitives::AccountId;
use traits::{Checkpoint, Env, PSP22Error, PSP22Event, TokenLedger, TokenMetadata};

use crate::LpTokenData;

#[derive(Debug, Clone, PartialEq, Eq)]
enum JournalEntry {
    Created {
        token: AccountId,
    },
    TotalSupply {
        token: AccountId,
        previous: u128,
    },
    Balance {
        token: AccountId,
        owner: AccountId,
        previous: u128,
    },
    Allowance {
        token: AccountId,
        owner: AccountId,
        spender: AccountId,
        previous: u128,
    },
}

/// All tokens known to the system, keyed by their address.
///
/// While a checkpoint is open every change is journaled so it can be undone.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    tokens: BTreeMap<AccountId, LpTokenData>,
    journal: Vec<JournalEntry>,
    depth: usize,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self, token: AccountId) -> Result<&LpTokenData, PSP22Error> {
        self.tokens
            .get(&token)
            .ok_or(PSP22Error::TokenNotFound(token))
    }

    fn token_mut(&mut self, token: AccountId) -> Result<&mut LpTokenData, PSP22Error> {
        self.tokens
            .get_mut(&token)
            .ok_or(PSP22Error::TokenNotFound(token))
    }

    fn record(&mut self, entry: JournalEntry) {
        if self.depth > 0 {
            self.journal.push(entry);
        }
    }

    fn record_balance(&mut self, token: AccountId, owner: AccountId) {
        let previous = self.balance_of(token, owner);
        self.record(JournalEntry::Balance {
            token,
            owner,
            previous,
        });
    }

    fn record_allowance(&mut self, token: AccountId, owner: AccountId, spender: AccountId) {
        let previous = self.allowance(token, owner, spender);
        self.record(JournalEntry::Allowance {
            token,
            owner,
            spender,
            previous,
        });
    }

    fn record_total_supply(&mut self, token: AccountId) {
        let previous = self.total_supply(token);
        self.record(JournalEntry::TotalSupply { token, previous });
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Created { token } => {
                self.tokens.remove(&token);
            }
            JournalEntry::TotalSupply { token, previous } => {
                if let Some(data) = self.tokens.get_mut(&token) {
                    data.set_total_supply(previous);
                }
            }
            JournalEntry::Balance {
                token,
                owner,
                previous,
            } => {
                if let Some(data) = self.tokens.get_mut(&token) {
                    data.set_balance(owner, previous);
                }
            }
            JournalEntry::Allowance {
                token,
                owner,
                spender,
                previous,
            } => {
                if let Some(data) = self.tokens.get_mut(&token) {
                    data.set_allowance(owner, spender, previous);
                }
            }
        }
    }

    fn emit_events(env: &mut Env, token: AccountId, events: Vec<PSP22Event>) {
        for event in events {
            env.emit_event(token, event);
        }
    }
}

impl TokenLedger for Ledger {
    fn create_token(
        &mut self,
        token: AccountId,
        metadata: TokenMetadata,
        minter: AccountId,
    ) -> Result<(), PSP22Error> {
        if self.tokens.contains_key(&token) {
            return Err(PSP22Error::TokenAlreadyExists(token));
        }
        self.tokens
            .insert(token, LpTokenData::new(token, metadata, minter));
        self.record(JournalEntry::Created { token });
        Ok(())
    }

    fn token_metadata(&self, token: AccountId) -> Result<TokenMetadata, PSP22Error> {
        Ok(self.token(token)?.metadata().clone())
    }

    fn total_supply(&self, token: AccountId) -> u128 {
        self.tokens
            .get(&token)
            .map(|data| data.total_supply())
            .unwrap_or_default()
    }

    fn balance_of(&self, token: AccountId, owner: AccountId) -> u128 {
        self.tokens
            .get(&token)
            .map(|data| data.balance_of(owner))
            .unwrap_or_default()
    }

    fn allowance(&self, token: AccountId, owner: AccountId, spender: AccountId) -> u128 {
        self.tokens
            .get(&token)
            .map(|data| data.allowance(owner, spender))
            .unwrap_or_default()
    }

    fn transfer(
        &mut self,
        env: &mut Env,
        token: AccountId,
        to: AccountId,
        value: u128,
    ) -> Result<(), PSP22Error> {
        let caller = env.caller();
        self.token(token)?;
        self.record_balance(token, caller);
        self.record_balance(token, to);
        let events = self.token_mut(token)?.transfer(caller, to, value)?;
        Self::emit_events(env, token, events);
        Ok(())
    }

    fn transfer_from(
        &mut self,
        env: &mut Env,
        token: AccountId,
        from: AccountId,
        to: AccountId,
        value: u128,
    ) -> Result<(), PSP22Error> {
        let caller = env.caller();
        self.token(token)?;
        self.record_allowance(token, from, caller);
        self.record_balance(token, from);
        self.record_balance(token, to);
        let events = self
            .token_mut(token)?
            .transfer_from(caller, from, to, value)?;
        Self::emit_events(env, token, events);
        Ok(())
    }

    fn approve(
        &mut self,
        env: &mut Env,
        token: AccountId,
        spender: AccountId,
        value: u128,
    ) -> Result<(), PSP22Error> {
        let owner = env.caller();
        self.token(token)?;
        self.record_allowance(token, owner, spender);
        let events = self.token_mut(token)?.approve(owner, spender, value)?;
        Self::emit_events(env, token, events);
        Ok(())
    }

    fn increase_allowance(
        &mut self,
        env: &mut Env,
        token: AccountId,
        spender: AccountId,
        delta_value: u128,
    ) -> Result<(), PSP22Error> {
        let owner = env.caller();
        self.token(token)?;
        self.record_allowance(token, owner, spender);
        let events = self
            .token_mut(token)?
            .increase_allowance(owner, spender, delta_value)?;
        Self::emit_events(env, token, events);
        Ok(())
    }

    fn decrease_allowance(
        &mut self,
        env: &mut Env,
        token: AccountId,
        spender: AccountId,
        delta_value: u128,
    ) -> Result<(), PSP22Error> {
        let owner = env.caller();
        self.token(token)?;
        self.record_allowance(token, owner, spender);
        let events = self
            .token_mut(token)?
            .decrease_allowance(owner, spender, delta_value)?;
        Self::emit_events(env, token, events);
        Ok(())
    }

    fn mint(
        &mut self,
        env: &mut Env,
        token: AccountId,
        to: AccountId,
        value: u128,
    ) -> Result<(), PSP22Error> {
        let caller = env.caller();
        self.token(token)?;
        self.record_total_supply(token);
        self.record_balance(token, to);
        let events = self.token_mut(token)?.mint(caller, to, value)?;
        Self::emit_events(env, token, events);
        Ok(())
    }

    fn burn_from(
        &mut self,
        env: &mut Env,
        token: AccountId,
        from: AccountId,
        value: u128,
    ) -> Result<(), PSP22Error> {
        let caller = env.caller();
        self.token(token)?;
        self.record_total_supply(token);
        self.record_balance(token, from);
        let events = self.token_mut(token)?.burn_from(caller, from, value)?;
        Self::emit_events(env, token, events);
        Ok(())
    }

    fn checkpoint(&mut self) -> Checkpoint {
        self.depth += 1;
        Checkpoint(self.journal.len())
    }

    fn commit(&mut self, _checkpoint: Checkpoint) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.journal.clear();
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.0 {
            if let Some(entry) = self.journal.pop() {
                self.undo(entry);
            }
        }
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.journal.clear();
        }
    }
}

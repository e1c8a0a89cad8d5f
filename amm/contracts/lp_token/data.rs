use amm_helpers::ensure;
use ink::prelude::{collections::BTreeMap, vec, vec::Vec};
use ink::primitives::AccountId;
use traits::{PSP22Error, PSP22Event, TokenMetadata};

/// State of a single fungible token whose supply only `minter` can change.
#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct LpTokenData {
    address: AccountId,
    minter: AccountId,
    metadata: TokenMetadata,
    total_supply: u128,
    balances: BTreeMap<AccountId, u128>,
    allowances: BTreeMap<(AccountId, AccountId), u128>,
}

impl LpTokenData {
    pub fn new(address: AccountId, metadata: TokenMetadata, minter: AccountId) -> Self {
        Self {
            address,
            minter,
            metadata,
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> AccountId {
        self.address
    }

    pub fn minter(&self) -> AccountId {
        self.minter
    }

    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn balance_of(&self, owner: AccountId) -> u128 {
        self.balances.get(&owner).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: AccountId, spender: AccountId) -> u128 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn set_total_supply(&mut self, value: u128) {
        self.total_supply = value;
    }

    pub(crate) fn set_balance(&mut self, owner: AccountId, value: u128) {
        if value == 0 {
            self.balances.remove(&owner);
        } else {
            self.balances.insert(owner, value);
        }
    }

    pub(crate) fn set_allowance(&mut self, owner: AccountId, spender: AccountId, value: u128) {
        if value == 0 {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), value);
        }
    }

    /// Transfers `value` tokens from `caller` to `to`.
    pub fn transfer(
        &mut self,
        caller: AccountId,
        to: AccountId,
        value: u128,
    ) -> Result<Vec<PSP22Event>, PSP22Error> {
        ensure!(to != self.address, PSP22Error::SelfTransfer);
        if caller == to || value == 0 {
            return Ok(vec![]);
        }
        let from_balance = self.balance_of(caller);
        ensure!(from_balance >= value, PSP22Error::InsufficientBalance);
        let to_balance = self
            .balance_of(to)
            .checked_add(value)
            .ok_or(PSP22Error::Overflow)?;
        self.set_balance(caller, from_balance - value);
        self.set_balance(to, to_balance);
        Ok(vec![PSP22Event::Transfer {
            from: Some(caller),
            to: Some(to),
            value,
        }])
    }

    /// Transfers `value` tokens on behalf of `from` to `to`, spending `caller`'s allowance.
    pub fn transfer_from(
        &mut self,
        caller: AccountId,
        from: AccountId,
        to: AccountId,
        value: u128,
    ) -> Result<Vec<PSP22Event>, PSP22Error> {
        if caller == from {
            return self.transfer(caller, to, value);
        }
        ensure!(to != self.address, PSP22Error::SelfTransfer);
        if from == to || value == 0 {
            return Ok(vec![]);
        }
        let allowance = self.allowance(from, caller);
        ensure!(allowance >= value, PSP22Error::InsufficientAllowance);
        let from_balance = self.balance_of(from);
        ensure!(from_balance >= value, PSP22Error::InsufficientBalance);
        let to_balance = self
            .balance_of(to)
            .checked_add(value)
            .ok_or(PSP22Error::Overflow)?;
        self.set_allowance(from, caller, allowance - value);
        self.set_balance(from, from_balance - value);
        self.set_balance(to, to_balance);
        Ok(vec![
            PSP22Event::Approval {
                owner: from,
                spender: caller,
                amount: allowance - value,
            },
            PSP22Event::Transfer {
                from: Some(from),
                to: Some(to),
                value,
            },
        ])
    }

    pub fn approve(
        &mut self,
        owner: AccountId,
        spender: AccountId,
        value: u128,
    ) -> Result<Vec<PSP22Event>, PSP22Error> {
        if owner == spender {
            return Ok(vec![]);
        }
        self.set_allowance(owner, spender, value);
        Ok(vec![PSP22Event::Approval {
            owner,
            spender,
            amount: value,
        }])
    }

    pub fn increase_allowance(
        &mut self,
        owner: AccountId,
        spender: AccountId,
        delta_value: u128,
    ) -> Result<Vec<PSP22Event>, PSP22Error> {
        if owner == spender || delta_value == 0 {
            return Ok(vec![]);
        }
        let amount = self.allowance(owner, spender).saturating_add(delta_value);
        self.approve(owner, spender, amount)
    }

    pub fn decrease_allowance(
        &mut self,
        owner: AccountId,
        spender: AccountId,
        delta_value: u128,
    ) -> Result<Vec<PSP22Event>, PSP22Error> {
        if owner == spender || delta_value == 0 {
            return Ok(vec![]);
        }
        let allowance = self.allowance(owner, spender);
        ensure!(allowance >= delta_value, PSP22Error::InsufficientAllowance);
        self.approve(owner, spender, allowance - delta_value)
    }

    /// Mints `value` tokens to `to`. Only the minter may call it.
    pub fn mint(
        &mut self,
        caller: AccountId,
        to: AccountId,
        value: u128,
    ) -> Result<Vec<PSP22Event>, PSP22Error> {
        ensure!(caller == self.minter, PSP22Error::OnlyMinter);
        ensure!(value != 0, PSP22Error::MintZero);
        ensure!(to != self.address, PSP22Error::SelfTransfer);
        let total_supply = self
            .total_supply
            .checked_add(value)
            .ok_or(PSP22Error::Overflow)?;
        let to_balance = self
            .balance_of(to)
            .checked_add(value)
            .ok_or(PSP22Error::Overflow)?;
        self.total_supply = total_supply;
        self.set_balance(to, to_balance);
        Ok(vec![PSP22Event::Transfer {
            from: None,
            to: Some(to),
            value,
        }])
    }

    /// Burns `value` tokens held by `from`. Only the minter may call it.
    pub fn burn_from(
        &mut self,
        caller: AccountId,
        from: AccountId,
        value: u128,
    ) -> Result<Vec<PSP22Event>, PSP22Error> {
        ensure!(caller == self.minter, PSP22Error::OnlyMinter);
        if value == 0 {
            return Ok(vec![]);
        }
        let from_balance = self.balance_of(from);
        ensure!(from_balance >= value, PSP22Error::InsufficientBalance);
        self.set_balance(from, from_balance - value);
        self.total_supply = self.total_supply.saturating_sub(value);
        Ok(vec![PSP22Event::Transfer {
            from: Some(from),
            to: None,
            value,
        }])
    }
}

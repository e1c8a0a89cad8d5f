use ink::prelude::string::String;
use ink::primitives::AccountId;

use crate::Env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub enum PSP22Error {
    InsufficientBalance,
    InsufficientAllowance,
    /// Minting zero tokens.
    MintZero,
    /// Transfer to the token's own address.
    SelfTransfer,
    /// Mint or burn by an account other than the token's minter.
    OnlyMinter,
    TokenNotFound(AccountId),
    TokenAlreadyExists(AccountId),
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: u8,
}

/// Marks a point the ledger can be rolled back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(pub usize);

/// Registry of PSP22-like tokens, each addressed by its own account.
///
/// Operations that act on behalf of an account take it from `env.caller()`,
/// and emit their events into `env`.
pub trait TokenLedger {
    /// Registers a new token. Only `minter` may mint and burn it.
    fn create_token(
        &mut self,
        token: AccountId,
        metadata: TokenMetadata,
        minter: AccountId,
    ) -> Result<(), PSP22Error>;

    fn token_metadata(&self, token: AccountId) -> Result<TokenMetadata, PSP22Error>;

    fn total_supply(&self, token: AccountId) -> u128;

    fn balance_of(&self, token: AccountId, owner: AccountId) -> u128;

    fn allowance(&self, token: AccountId, owner: AccountId, spender: AccountId) -> u128;

    fn transfer(
        &mut self,
        env: &mut Env,
        token: AccountId,
        to: AccountId,
        value: u128,
    ) -> Result<(), PSP22Error>;

    /// Transfers `value` from `from` to `to`, spending the caller's allowance.
    fn transfer_from(
        &mut self,
        env: &mut Env,
        token: AccountId,
        from: AccountId,
        to: AccountId,
        value: u128,
    ) -> Result<(), PSP22Error>;

    fn approve(
        &mut self,
        env: &mut Env,
        token: AccountId,
        spender: AccountId,
        value: u128,
    ) -> Result<(), PSP22Error>;

    fn increase_allowance(
        &mut self,
        env: &mut Env,
        token: AccountId,
        spender: AccountId,
        delta_value: u128,
    ) -> Result<(), PSP22Error>;

    fn decrease_allowance(
        &mut self,
        env: &mut Env,
        token: AccountId,
        spender: AccountId,
        delta_value: u128,
    ) -> Result<(), PSP22Error>;

    /// Caller must be the token's minter.
    fn mint(
        &mut self,
        env: &mut Env,
        token: AccountId,
        to: AccountId,
        value: u128,
    ) -> Result<(), PSP22Error>;

    /// Caller must be the token's minter.
    fn burn_from(
        &mut self,
        env: &mut Env,
        token: AccountId,
        from: AccountId,
        value: u128,
    ) -> Result<(), PSP22Error>;

    /// Starts recording changes. Checkpoints nest.
    fn checkpoint(&mut self) -> Checkpoint;

    /// Keeps changes made since `checkpoint`.
    fn commit(&mut self, checkpoint: Checkpoint);

    /// Undoes changes made since `checkpoint`.
    fn rollback(&mut self, checkpoint: Checkpoint);
}

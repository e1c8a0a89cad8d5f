use ink::prelude::vec::Vec;
use ink::primitives::AccountId;

/// Seconds since the unix epoch.
pub type Timestamp = u64;

/// Event emitted by a token held in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub enum PSP22Event {
    Transfer {
        /// Transfer sender. `None` in case of minting new tokens.
        from: Option<AccountId>,
        /// Transfer recipient. `None` in case of burning tokens.
        to: Option<AccountId>,
        /// Amount of tokens transferred (or minted/burned).
        value: u128,
    },
    Approval {
        /// Account providing allowance.
        owner: AccountId,
        /// Allowance beneficiary.
        spender: AccountId,
        /// New allowance amount.
        amount: u128,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub enum StablePoolEvent {
    TokenSwap {
        buyer: AccountId,
        tokens_sold: u128,
        tokens_bought: u128,
        sold_id: u8,
        bought_id: u8,
    },
    /// Ids index into `[meta tokens..., base pool tokens...]`.
    TokenSwapUnderlying {
        buyer: AccountId,
        tokens_sold: u128,
        tokens_bought: u128,
        sold_id: u8,
        bought_id: u8,
    },
    AddLiquidity {
        provider: AccountId,
        token_amounts: Vec<u128>,
        fees: Vec<u128>,
        invariant: u128,
        lp_token_supply: u128,
    },
    RemoveLiquidity {
        provider: AccountId,
        token_amounts: Vec<u128>,
        lp_token_supply: u128,
    },
    RemoveLiquidityOne {
        provider: AccountId,
        lp_token_amount: u128,
        lp_token_supply: u128,
        bought_id: u8,
        tokens_bought: u128,
    },
    RemoveLiquidityImbalance {
        provider: AccountId,
        token_amounts: Vec<u128>,
        fees: Vec<u128>,
        invariant: u128,
        lp_token_supply: u128,
    },
    NewSwapFee {
        new_swap_fee: u64,
    },
    NewAdminFee {
        new_admin_fee: u64,
    },
    FeeAddressChanged {
        new_fee_address: AccountId,
    },
    OwnerChanged {
        new_owner: AccountId,
    },
    RampA {
        old_a: u128,
        new_a: u128,
        initial_time: Timestamp,
        future_time: Timestamp,
    },
    StopRampA {
        current_a: u128,
        time: Timestamp,
    },
    Paused {
        account: AccountId,
    },
    Unpaused {
        account: AccountId,
    },
    AdminFeesWithdrawn {
        to: AccountId,
        amounts: Vec<u128>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub enum Event {
    PSP22(PSP22Event),
    StablePool(StablePoolEvent),
}

impl From<PSP22Event> for Event {
    fn from(event: PSP22Event) -> Self {
        Event::PSP22(event)
    }
}

impl From<StablePoolEvent> for Event {
    fn from(event: StablePoolEvent) -> Self {
        Event::StablePool(event)
    }
}

/// An event together with the account (token or pool) that emitted it.
#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct EmittedEvent {
    pub emitter: AccountId,
    pub event: Event,
}

/// Execution context of a call: who is calling, at what time,
/// and the log of events emitted so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Env {
    caller: AccountId,
    block_timestamp: Timestamp,
    events: Vec<EmittedEvent>,
}

impl Env {
    pub fn new(caller: AccountId, block_timestamp: Timestamp) -> Self {
        Self {
            caller,
            block_timestamp,
            events: Vec::new(),
        }
    }

    pub fn caller(&self) -> AccountId {
        self.caller
    }

    pub fn set_caller(&mut self, caller: AccountId) {
        self.caller = caller;
    }

    pub fn block_timestamp(&self) -> Timestamp {
        self.block_timestamp
    }

    pub fn advance_block_timestamp(&mut self, seconds: Timestamp) {
        self.block_timestamp = self.block_timestamp.saturating_add(seconds);
    }

    /// Runs `f` with `caller` as the caller, restoring the current one afterwards.
    /// This is how one contract calls into another.
    pub fn call_as<T>(&mut self, caller: AccountId, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = core::mem::replace(&mut self.caller, caller);
        let result = f(self);
        self.caller = previous;
        result
    }

    pub fn emit_event(&mut self, emitter: AccountId, event: impl Into<Event>) {
        self.events.push(EmittedEvent {
            emitter,
            event: event.into(),
        });
    }

    pub fn events(&self) -> &[EmittedEvent] {
        &self.events
    }

    /// Number of events emitted so far, to be passed to [`Env::revert_events`].
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Drops events emitted after `event_count` was taken.
    pub fn revert_events(&mut self, event_count: usize) {
        self.events.truncate(event_count);
    }
}

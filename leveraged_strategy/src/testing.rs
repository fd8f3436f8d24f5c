//! Test fixture wiring a strategy to in-memory collaborators

use alloy_primitives::{Address, U256};

use crate::{
    adapters::{
        memory::{MemoryMarket, MemorySwap, MemoryVault, MemoryYieldVault},
        Collaborators,
    },
    strategy::Strategy,
    types::InitArgs,
};

/// `value` whole tokens with 18 decimals
pub fn e18(value: u64) -> U256 {
    U256::from(value) * U256::from(10u64).pow(U256::from(18))
}

pub struct World {
    pub vault: MemoryVault,
    pub market: MemoryMarket,
    pub yield_vault: MemoryYieldVault,
    pub swap: MemorySwap,
    pub governance: Address,
    pub strategist: Address,
    pub keeper: Address,
    pub rewards: Address,
}

impl World {
    pub fn new() -> Self {
        Self::with_vault(Address::repeat_byte(0x01))
    }

    pub fn with_vault(vault: Address) -> Self {
        let governance = Address::repeat_byte(0x0a);
        // one want is worth two stablecoins, 90% maximum loan to value
        let market = MemoryMarket::new(Address::repeat_byte(0x02), e18(2), 90_000);
        Self {
            vault: MemoryVault::new(vault, governance),
            swap: MemorySwap::new(market.clone()),
            market,
            yield_vault: MemoryYieldVault::new(Address::repeat_byte(0x03)),
            governance,
            strategist: Address::repeat_byte(0x0b),
            keeper: Address::repeat_byte(0x0c),
            rewards: Address::repeat_byte(0x0d),
        }
    }

    pub fn vault_address(&self) -> Address {
        use crate::adapters::ParentVault;
        self.vault.address()
    }

    pub fn market_address(&self) -> Address {
        use crate::adapters::LendingMarket;
        self.market.address()
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new(
            Box::new(self.vault.clone()),
            Box::new(self.market.clone()),
            Box::new(self.yield_vault.clone()),
            Box::new(self.swap.clone()),
        )
    }

    pub fn init_args(&self) -> InitArgs {
        InitArgs {
            name: "StrategyLeveragedWant".to_string(),
            strategist: self.strategist.to_string(),
            keeper: self.keeper.to_string(),
            rewards: self.rewards.to_string(),
            min_ratio_bps: 65_000,
            max_ratio_bps: 75_000,
        }
    }

    /// An initialized strategy registered with the vault for its whole capacity
    pub fn strategy(&self, address: Address) -> Strategy {
        let mut strategy = Strategy::new(address, self.collaborators());
        strategy
            .initialize(self.init_args())
            .expect("fixture arguments are valid");
        self.vault.add_strategy(address, 10_000, U256::MAX);
        strategy
    }

    /// Deposits `amount` into the vault and lends it to `strategy`
    pub fn fund(&self, strategy: &mut Strategy, amount: U256) {
        self.vault.deposit(amount);
        self.vault
            .fund(strategy, amount)
            .expect("the vault has enough credit");
    }
}

// src/economy.rs
//
// Player economy: the contract the survival timer writes through, and an
// in-memory ledger holding the persisted player record.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Storage key under which hosts persist [`SaveData`].
pub const SAVE_KEY: &str = "fretgate_save_v3";

const STARTING_COINS: i64 = 1000;
const STARTING_STOCK: [u32; 5] = [1, 2, 3, 4, 5];
const FINAL_STAGE: u32 = 5;
const DEFAULT_TORCH: f64 = 100.0;

/// Items up to this id restore torch.
const MAX_HEALING_ITEM: u32 = 10;
const ITEM_HEAL: f64 = 30.0;

/// What the survival timer needs from the player's state.
pub trait EconomyState {
    fn credit_currency(&mut self, amount: i64);

    fn current_torch(&self) -> f64;
    fn set_current_torch(&mut self, value: f64);

    fn max_torch(&self) -> f64;
    fn set_max_torch(&mut self, value: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

/// The persisted part of the player record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaveData {
    pub coins: i64,
    pub inventory: Vec<u32>,
    pub shop_stock: Vec<u32>,
    pub current_stage: u32,
    pub max_stage_reached: u32,
    pub death_count: u32,
    pub difficulty: Difficulty,
}

impl Default for SaveData {
    fn default() -> Self {
        Self {
            coins: STARTING_COINS,
            inventory: Vec::new(),
            shop_stock: STARTING_STOCK.to_vec(),
            current_stage: 1,
            max_stage_reached: 1,
            death_count: 0,
            difficulty: Difficulty::Normal,
        }
    }
}

/// Result of using an item from the inventory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemUse {
    /// Consumed; the caller restores this much torch.
    Healed { amount: f64 },
    NotOwned,
    /// The torch is already full; the item is kept.
    NotNeeded,
    /// The item has no use here; the item is kept.
    Unusable,
}

/// In-memory player record plus the live torch mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerLedger {
    save: SaveData,
    torch: f64,
    max_torch: f64,
}

impl Default for PlayerLedger {
    fn default() -> Self {
        Self::new(SaveData::default())
    }
}

impl PlayerLedger {
    pub fn new(save: SaveData) -> Self {
        Self {
            save,
            torch: DEFAULT_TORCH,
            max_torch: DEFAULT_TORCH,
        }
    }

    pub fn save(&self) -> &SaveData {
        &self.save
    }

    pub fn coins(&self) -> i64 {
        self.save.coins
    }

    pub fn inventory(&self) -> &[u32] {
        &self.save.inventory
    }

    pub fn shop_stock(&self) -> &[u32] {
        &self.save.shop_stock
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.save.difficulty = difficulty;
    }

    pub fn set_current_stage(&mut self, stage: u32) {
        self.save.current_stage = stage;
    }

    /// Pay `price` and take the item. False if the coins do not cover it.
    pub fn buy(&mut self, item_id: u32, price: i64) -> bool {
        if self.save.coins < price {
            return false;
        }
        self.save.coins = self.save.coins.saturating_sub(price);
        self.save.inventory.push(item_id);
        true
    }

    /// Sell the item at inventory slot `index`. The shop stocks it from then on.
    pub fn sell(&mut self, index: usize, item_id: u32, price: i64) -> bool {
        if index >= self.save.inventory.len() {
            return false;
        }
        self.save.inventory.remove(index);
        self.save.coins = self.save.coins.saturating_add(price);

        if let Err(pos) = self.save.shop_stock.binary_search(&item_id) {
            self.save.shop_stock.insert(pos, item_id);
        }
        true
    }

    pub fn obtain(&mut self, item_id: u32) {
        self.save.inventory.push(item_id);
    }

    /// Death costs half the coins.
    pub fn die(&mut self) {
        self.save.death_count = self.save.death_count.saturating_add(1);
        self.save.coins = self.save.coins.div_euclid(2);
        debug!(
            "[Fretgate] Death {} ({} coins left)",
            self.save.death_count, self.save.coins
        );
    }

    /// Pay `cost` to drop a cursed item at inventory slot `index`.
    pub fn remove_curse(&mut self, index: usize, cost: i64) -> bool {
        if self.save.coins < cost || index >= self.save.inventory.len() {
            return false;
        }
        self.save.coins = self.save.coins.saturating_sub(cost);
        self.save.inventory.remove(index);
        true
    }

    /// Open the stage after `cleared`, if `cleared` is the frontier.
    pub fn unlock_next_stage(&mut self, cleared: u32) {
        if cleared >= self.save.max_stage_reached {
            self.save.max_stage_reached = cleared.saturating_add(1).min(FINAL_STAGE);
        }
    }

    /// Use one item. Only a consumed item leaves the inventory.
    pub fn consume_item(&mut self, item_id: u32, torch_full: bool) -> ItemUse {
        let Some(index) = self.save.inventory.iter().position(|id| *id == item_id) else {
            return ItemUse::NotOwned;
        };

        if item_id > MAX_HEALING_ITEM {
            return ItemUse::Unusable;
        }
        if torch_full {
            return ItemUse::NotNeeded;
        }

        self.save.inventory.remove(index);
        ItemUse::Healed { amount: ITEM_HEAL }
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(&self.save)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }
}

impl EconomyState for PlayerLedger {
    fn credit_currency(&mut self, amount: i64) {
        self.save.coins = self.save.coins.saturating_add(amount);
    }

    fn current_torch(&self) -> f64 {
        self.torch
    }

    fn set_current_torch(&mut self, value: f64) {
        self.torch = value;
    }

    fn max_torch(&self) -> f64 {
        self.max_torch
    }

    fn set_max_torch(&mut self, value: f64) {
        self.max_torch = value;
    }
}

#![no_std]

//! # Card Arena
//!
//! An on-ledger collectible card game: buy packs of randomly minted
//! cards, assemble a three-card deck, and fight a fixed ladder of
//! battle levels for token rewards.
//!
//! ## Game flow
//! 1. `buy_pack` — pay the pack price, receive 5 freshly minted cards.
//!    Rarity is drawn from a uniform roll against fixed cumulative
//!    thresholds; attack/health are `base(rarity) + uniform[0,20)`,
//!    capped at 100.
//! 2. `update_deck` — pick exactly 3 distinct owned cards as the
//!    active deck. A card's `in_deck` flag is true iff it currently
//!    occupies a deck slot.
//! 3. `enter_battle` — pay the level's fee and run the fight to
//!    completion in a single call: each round the deck's total attack
//!    hits the enemy, then (if it survives) the enemy hits back.
//!    Winning pays out the level's reward immediately.
//!
//! ## Payments
//! All prices, fees and rewards are transfers of a single payment
//! token configured at deployment. `withdraw` moves the contract's
//! accumulated balance to the admin.
//!
//! ## Randomness
//! Minting uses the host PRNG, which is derived from ledger metadata.
//! It is NOT cryptographically secure and a sophisticated caller could
//! bias pack contents; acceptable for a game, unsuitable for anything
//! with adversarial stakes.

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, token, vec, Address, Env,
    Vec,
};

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract Events
// ═══════════════════════════════════════════════════════════════════════════════

/// Emitted once per card minted inside a pack purchase.
#[contractevent]
pub struct EvCardMinted {
    pub owner: Address,
    pub card_id: u32,
    pub rarity: u32,
    pub attack: u32,
    pub health: u32,
}

/// Emitted once per pack purchase, carrying all 5 minted card ids.
#[contractevent]
pub struct EvPackOpened {
    pub buyer: Address,
    pub card_ids: Vec<u32>,
}

#[contractevent]
pub struct EvDeckUpdated {
    pub player: Address,
    pub card1: u32,
    pub card2: u32,
    pub card3: u32,
}

/// Emitted after every battle, win or lose. `reward` is 0 on a loss.
#[contractevent]
pub struct EvBattleResult {
    pub player: Address,
    pub level: u32,
    pub won: bool,
    pub rounds: u32,
    pub reward: i128,
}

#[contractevent]
pub struct EvOwnershipTransferred {
    pub previous_admin: Address,
    pub new_admin: Address,
}

#[contractevent]
pub struct EvPackPriceUpdated {
    pub old_price: i128,
    pub new_price: i128,
}

#[contractevent]
pub struct EvWithdrawal {
    pub to: Address,
    pub amount: i128,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum CardArenaError {
    AdminNotSet = 1,
    TokenNotSet = 2,
    PriceNotSet = 3,
    CardNotFound = 4,
    BattleNotFound = 5,
    NotCardOwner = 6,
    DuplicateDeckCard = 7,
    DeckNotFull = 8,
    DeckPowerTooLow = 9,
    CollectionFull = 10,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Types & storage keys
// ═══════════════════════════════════════════════════════════════════════════════

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Card {
    pub id: u32,
    pub rarity: u32, // 1 (common) ..= 5 (legendary)
    pub attack: u32,
    pub health: u32,
    pub in_deck: bool,
}

/// One rung of the battle ladder. Built in the constructor and never
/// mutated afterwards.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Battle {
    pub level: u32,
    pub reward: i128,
    pub fee: i128,
    pub min_power: u32,
    pub enemy_card1: u32,
    pub enemy_card2: u32,
    pub enemy_card3: u32,
    pub enemy_attack: u32,
    pub enemy_health: u32,
}

#[contracttype]
#[derive(Clone)]
enum DataKey {
    Admin,
    PayToken,
    PackPrice,
    NextCardId,
    Card(u32),
    PlayerCards(Address),
    PlayerDeck(Address),
    Battle(u32),
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Constants
// ═══════════════════════════════════════════════════════════════════════════════

pub const CARDS_PER_PACK: u32 = 5;
pub const DECK_SIZE: u32 = 3;
pub const MAX_CARDS_PER_PLAYER: u32 = 100;
pub const STAT_CEILING: u32 = 100;
pub const MAX_BATTLE_ROUNDS: u32 = 100;
pub const BATTLE_LEVELS: u32 = 20;

/// Random stat bonus range: stat = base(rarity) + uniform[0, 20).
const STAT_BONUS_RANGE: u64 = 20;

// One unit of the payment token in stroops-style 7-decimal fixed point.
const TOKEN_UNIT: i128 = 10_000_000;

// Ledger rate is approximately 5 seconds per ledger on Stellar
const LEDGER_RATE_SECS: u32 = 5;

// TTL expressed in human-readable time units (120 days)
const TTL_SECONDS: u32 = 120 * 24 * 60 * 60; // 10,368,000 seconds

/// TTL for persistent entries in ledgers: 120 * 24 * 60 * 60 / 5 = 2,073,600 ledgers
const TTL_LEDGERS: u32 = TTL_SECONDS / LEDGER_RATE_SECS;

// ═══════════════════════════════════════════════════════════════════════════════
//  Pure game math (unit-tested directly)
// ═══════════════════════════════════════════════════════════════════════════════

/// Map a uniform roll in [0,100) to a rarity bucket via cumulative
/// thresholds {60, 85, 95, 99, 100}.
pub(crate) fn rarity_for_roll(roll: u32) -> u32 {
    match roll {
        r if r < 60 => 1,
        r if r < 85 => 2,
        r if r < 95 => 3,
        r if r < 99 => 4,
        _ => 5,
    }
}

/// Base attack/health for a rarity. The max roll (base + 19) stays
/// under `STAT_CEILING` even for legendaries.
pub(crate) fn base_stat(rarity: u32) -> u32 {
    match rarity {
        1 => 10,
        2 => 25,
        3 => 40,
        4 => 55,
        _ => 70,
    }
}

/// Run a battle to completion. Returns (player_won, rounds_fought).
///
/// Each round: the player's total attack hits the enemy first; the win
/// is checked before the enemy strikes back, so a simultaneous-kill
/// round goes to the player. Health floors at zero on both sides.
/// Hard-capped at `MAX_BATTLE_ROUNDS` rounds; running out is a loss.
pub(crate) fn simulate_battle(
    player_attack: u32,
    player_health: u32,
    enemy_attack: u32,
    enemy_health: u32,
) -> (bool, u32) {
    let mut player_hp = player_health;
    let mut enemy_hp = enemy_health;
    let mut round: u32 = 0;

    while round < MAX_BATTLE_ROUNDS {
        round += 1;

        enemy_hp = enemy_hp.saturating_sub(player_attack);
        if enemy_hp == 0 {
            return (true, round);
        }

        player_hp = player_hp.saturating_sub(enemy_attack);
        if player_hp == 0 {
            return (false, round);
        }
    }

    // Stalemate: neither side can finish the other within the cap
    (false, MAX_BATTLE_ROUNDS)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract
// ═══════════════════════════════════════════════════════════════════════════════

#[contract]
pub struct CardArenaContract;

#[contractimpl]
impl CardArenaContract {
    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Constructor
    // ───────────────────────────────────────────────────────────────────────────

    /// Deploy with an admin, a payment token and the pack price.
    /// The 20-level battle ladder is generated here and is immutable
    /// for the lifetime of the contract.
    pub fn __constructor(env: Env, admin: Address, token: Address, pack_price: i128) {
        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::PayToken, &token);
        env.storage().instance().set(&DataKey::PackPrice, &pack_price);
        env.storage().instance().set(&DataKey::NextCardId, &1u32);

        let mut level: u32 = 1;
        while level <= BATTLE_LEVELS {
            let battle = Self::make_battle(level);
            let key = DataKey::Battle(level);
            env.storage().persistent().set(&key, &battle);
            env.storage()
                .persistent()
                .extend_ttl(&key, TTL_LEDGERS, TTL_LEDGERS);
            level += 1;
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Pack purchase & minting
    // ───────────────────────────────────────────────────────────────────────────

    /// Buy one pack: pay `pack_price`, receive 5 freshly minted cards.
    /// Each card gets the next sequential global id; rarity and stats
    /// are independent per-card draws. Returns the new card ids.
    pub fn buy_pack(env: Env, buyer: Address) -> Result<Vec<u32>, CardArenaError> {
        buyer.require_auth();

        let mut owned = Self::read_player_cards(&env, &buyer);
        if owned.len() + CARDS_PER_PACK > MAX_CARDS_PER_PLAYER {
            return Err(CardArenaError::CollectionFull);
        }

        let price = Self::load_pack_price(&env)?;
        let pay = token::TokenClient::new(&env, &Self::load_token(&env)?);
        pay.transfer(&buyer, &env.current_contract_address(), &price);

        let mut next_id: u32 = env
            .storage()
            .instance()
            .get(&DataKey::NextCardId)
            .unwrap_or(1);

        let mut minted: Vec<u32> = Vec::new(&env);
        let mut i: u32 = 0;
        while i < CARDS_PER_PACK {
            let roll = env.prng().gen_range::<u64>(0..=99) as u32;
            let rarity = rarity_for_roll(roll);
            let card = Card {
                id: next_id,
                rarity,
                attack: Self::roll_stat(&env, rarity),
                health: Self::roll_stat(&env, rarity),
                in_deck: false,
            };
            Self::write_card(&env, &card);

            EvCardMinted {
                owner: buyer.clone(),
                card_id: card.id,
                rarity: card.rarity,
                attack: card.attack,
                health: card.health,
            }
            .publish(&env);

            owned.push_back(next_id);
            minted.push_back(next_id);
            next_id += 1;
            i += 1;
        }

        env.storage().instance().set(&DataKey::NextCardId, &next_id);
        Self::write_player_cards(&env, &buyer, &owned);

        EvPackOpened {
            buyer,
            card_ids: minted.clone(),
        }
        .publish(&env);

        Ok(minted)
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Deck management
    // ───────────────────────────────────────────────────────────────────────────

    /// Replace the player's active deck with three distinct owned
    /// cards. Clears `in_deck` on the previous deck and sets it on the
    /// new one, so the flag always mirrors actual deck membership.
    pub fn update_deck(
        env: Env,
        player: Address,
        card1: u32,
        card2: u32,
        card3: u32,
    ) -> Result<(), CardArenaError> {
        player.require_auth();

        if card1 == card2 || card1 == card3 || card2 == card3 {
            return Err(CardArenaError::DuplicateDeckCard);
        }

        let owned = Self::read_player_cards(&env, &player);
        for id in [card1, card2, card3] {
            if !owned.contains(id) {
                return Err(CardArenaError::NotCardOwner);
            }
        }

        // Unflag the outgoing deck before flagging the incoming one;
        // a card kept across both updates ends up flagged.
        let old_deck = Self::read_player_deck(&env, &player);
        let mut i: u32 = 0;
        while i < old_deck.len() {
            let id = old_deck.get(i).unwrap();
            let mut card = Self::read_card(&env, id)?;
            card.in_deck = false;
            Self::write_card(&env, &card);
            i += 1;
        }

        for id in [card1, card2, card3] {
            let mut card = Self::read_card(&env, id)?;
            card.in_deck = true;
            Self::write_card(&env, &card);
        }

        let deck = vec![&env, card1, card2, card3];
        Self::write_player_deck(&env, &player, &deck);

        EvDeckUpdated {
            player,
            card1,
            card2,
            card3,
        }
        .publish(&env);

        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Battles
    // ───────────────────────────────────────────────────────────────────────────

    /// Fight the given battle level with the current deck. Pays the
    /// level's fee up front; the reward is transferred back only on a
    /// win. The whole fight resolves within this call.
    pub fn enter_battle(env: Env, player: Address, level: u32) -> Result<bool, CardArenaError> {
        player.require_auth();

        let battle = Self::read_battle(&env, level)?;

        let deck = Self::read_player_deck(&env, &player);
        if deck.len() != DECK_SIZE {
            return Err(CardArenaError::DeckNotFull);
        }

        let mut total_attack: u32 = 0;
        let mut total_health: u32 = 0;
        let mut i: u32 = 0;
        while i < deck.len() {
            let card = Self::read_card(&env, deck.get(i).unwrap())?;
            total_attack += card.attack;
            total_health += card.health;
            i += 1;
        }

        if total_attack + total_health < battle.min_power {
            return Err(CardArenaError::DeckPowerTooLow);
        }

        let pay = token::TokenClient::new(&env, &Self::load_token(&env)?);
        pay.transfer(&player, &env.current_contract_address(), &battle.fee);

        let (won, rounds) = simulate_battle(
            total_attack,
            total_health,
            battle.enemy_attack,
            battle.enemy_health,
        );

        let reward = if won {
            pay.transfer(&env.current_contract_address(), &player, &battle.reward);
            battle.reward
        } else {
            0
        };

        EvBattleResult {
            player,
            level,
            won,
            rounds,
            reward,
        }
        .publish(&env);

        Ok(won)
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Read-only
    // ───────────────────────────────────────────────────────────────────────────

    pub fn get_card(env: Env, card_id: u32) -> Result<Card, CardArenaError> {
        Self::read_card(&env, card_id)
    }

    pub fn get_battle(env: Env, level: u32) -> Result<Battle, CardArenaError> {
        Self::read_battle(&env, level)
    }

    /// All card ids ever bought by the player, in mint order.
    pub fn get_player_cards(env: Env, player: Address) -> Vec<u32> {
        Self::read_player_cards(&env, &player)
    }

    /// The player's active deck: empty, or exactly 3 card ids.
    pub fn get_player_deck(env: Env, player: Address) -> Vec<u32> {
        Self::read_player_deck(&env, &player)
    }

    pub fn get_admin(env: Env) -> Result<Address, CardArenaError> {
        Self::load_admin(&env)
    }

    pub fn get_pack_price(env: Env) -> Result<i128, CardArenaError> {
        Self::load_pack_price(&env)
    }

    /// Global count of cards minted so far (ids are 1-based and dense).
    pub fn total_cards_minted(env: Env) -> u32 {
        let next: u32 = env
            .storage()
            .instance()
            .get(&DataKey::NextCardId)
            .unwrap_or(1);
        next - 1
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Admin
    // ───────────────────────────────────────────────────────────────────────────

    /// Drain the contract's token balance to the admin. Returns the
    /// amount withdrawn.
    pub fn withdraw(env: Env) -> Result<i128, CardArenaError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();

        let pay = token::TokenClient::new(&env, &Self::load_token(&env)?);
        let contract = env.current_contract_address();
        let balance = pay.balance(&contract);
        if balance > 0 {
            pay.transfer(&contract, &admin, &balance);
            EvWithdrawal {
                to: admin,
                amount: balance,
            }
            .publish(&env);
        }

        Ok(balance)
    }

    pub fn transfer_ownership(env: Env, new_admin: Address) -> Result<(), CardArenaError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();
        env.storage().instance().set(&DataKey::Admin, &new_admin);

        EvOwnershipTransferred {
            previous_admin: admin,
            new_admin,
        }
        .publish(&env);

        Ok(())
    }

    pub fn set_pack_price(env: Env, new_price: i128) -> Result<(), CardArenaError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();

        let old_price = Self::load_pack_price(&env)?;
        env.storage().instance().set(&DataKey::PackPrice, &new_price);

        EvPackPriceUpdated {
            old_price,
            new_price,
        }
        .publish(&env);

        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Minting
    // ═══════════════════════════════════════════════════════════════════════════

    /// stat = base(rarity) + uniform[0, 20), clamped to the ceiling.
    fn roll_stat(env: &Env, rarity: u32) -> u32 {
        let base = base_stat(rarity);
        let bonus = env.prng().gen_range::<u64>(0..=(STAT_BONUS_RANGE - 1)) as u32;
        let stat = base + bonus;
        if stat > STAT_CEILING {
            STAT_CEILING
        } else {
            stat
        }
    }

    /// Battle ladder formula. Fees, rewards, power gates and enemy
    /// stats all scale linearly with the level; the three enemy card
    /// ids are display-only and packed consecutively per level.
    fn make_battle(level: u32) -> Battle {
        Battle {
            level,
            fee: (level as i128) * TOKEN_UNIT,
            reward: (level as i128) * TOKEN_UNIT * 3,
            min_power: 60 + (level - 1) * 20,
            enemy_card1: (level - 1) * 3 + 1,
            enemy_card2: (level - 1) * 3 + 2,
            enemy_card3: (level - 1) * 3 + 3,
            enemy_attack: 10 + level * 4,
            enemy_health: 40 + level * 20,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Storage
    // ═══════════════════════════════════════════════════════════════════════════

    fn read_card(env: &Env, card_id: u32) -> Result<Card, CardArenaError> {
        env.storage()
            .persistent()
            .get(&DataKey::Card(card_id))
            .ok_or(CardArenaError::CardNotFound)
    }

    fn write_card(env: &Env, card: &Card) {
        let key = DataKey::Card(card.id);
        env.storage().persistent().set(&key, card);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_LEDGERS, TTL_LEDGERS);
    }

    fn read_battle(env: &Env, level: u32) -> Result<Battle, CardArenaError> {
        env.storage()
            .persistent()
            .get(&DataKey::Battle(level))
            .ok_or(CardArenaError::BattleNotFound)
    }

    fn read_player_cards(env: &Env, player: &Address) -> Vec<u32> {
        env.storage()
            .persistent()
            .get(&DataKey::PlayerCards(player.clone()))
            .unwrap_or_else(|| Vec::new(env))
    }

    fn write_player_cards(env: &Env, player: &Address, cards: &Vec<u32>) {
        let key = DataKey::PlayerCards(player.clone());
        env.storage().persistent().set(&key, cards);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_LEDGERS, TTL_LEDGERS);
        // Keep instance storage (admin, token, prices) alive
        env.storage().instance().extend_ttl(TTL_LEDGERS, TTL_LEDGERS);
    }

    fn read_player_deck(env: &Env, player: &Address) -> Vec<u32> {
        env.storage()
            .persistent()
            .get(&DataKey::PlayerDeck(player.clone()))
            .unwrap_or_else(|| Vec::new(env))
    }

    fn write_player_deck(env: &Env, player: &Address, deck: &Vec<u32>) {
        let key = DataKey::PlayerDeck(player.clone());
        env.storage().persistent().set(&key, deck);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_LEDGERS, TTL_LEDGERS);
    }

    fn load_admin(env: &Env) -> Result<Address, CardArenaError> {
        env.storage()
            .instance()
            .get(&DataKey::Admin)
            .ok_or(CardArenaError::AdminNotSet)
    }

    fn load_token(env: &Env) -> Result<Address, CardArenaError> {
        env.storage()
            .instance()
            .get(&DataKey::PayToken)
            .ok_or(CardArenaError::TokenNotSet)
    }

    fn load_pack_price(env: &Env) -> Result<i128, CardArenaError> {
        env.storage()
            .instance()
            .get(&DataKey::PackPrice)
            .ok_or(CardArenaError::PriceNotSet)
    }
}

#[cfg(test)]
mod test;

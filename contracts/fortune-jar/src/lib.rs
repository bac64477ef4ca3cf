#![no_std]

//! # Fortune Jar
//!
//! An on-ledger fortune cookie dispensary. Anyone can pay for a random
//! fortune, submit new ones (with a fully refunded deposit as a spam
//! gate), and vote submissions up or down. The admin seeds the jar
//! once at launch and can reject bad submissions.
//!
//! ## Id space
//! Fortune ids are dense and 0-based: always exactly `[0, count)`.
//! Rejecting fortune `i` moves the LAST fortune into slot `i` and
//! shrinks the count, so ids are not stable across rejections.
//! Per-user vote rows for the moved fortune are not relocated; its
//! up/down tallies travel with it, but a user who voted on it cannot
//! vote again under its new id until their orphaned row is garbage.
//! Known gap, kept for O(1) removal.
//!
//! ## Ranking
//! `get_top_fortunes` recomputes the top 10 by net score (upvotes −
//! downvotes) on every read: one pass over the jar with a 10-slot
//! insertion sort. The jar is capped at 100 fortunes, so the whole
//! scan is O(1000) and fits comfortably in the execution budget.

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, token, Address, Env,
    String, Vec,
};

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract Events
// ═══════════════════════════════════════════════════════════════════════════════

/// Emitted when a caller pays for and receives a random fortune.
#[contractevent]
pub struct EvFortuneReceived {
    pub caller: Address,
    pub fortune_id: u32,
}

#[contractevent]
pub struct EvFortuneSubmitted {
    pub submitter: Address,
    pub fortune_id: u32,
}

/// Emitted when the admin rejects a fortune. `fortune_id` is the slot
/// that was vacated (and refilled by the previous last fortune unless
/// it WAS the last).
#[contractevent]
pub struct EvFortuneRejected {
    pub fortune_id: u32,
}

#[contractevent]
pub struct EvVoteCast {
    pub voter: Address,
    pub fortune_id: u32,
    pub upvote: bool,
}

#[contractevent]
pub struct EvVoteRemoved {
    pub voter: Address,
    pub fortune_id: u32,
}

#[contractevent]
pub struct EvOwnershipTransferred {
    pub previous_admin: Address,
    pub new_admin: Address,
}

#[contractevent]
pub struct EvFortunePriceUpdated {
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
pub enum FortuneJarError {
    AdminNotSet = 1,
    TokenNotSet = 2,
    PriceNotSet = 3,
    FortuneNotFound = 4,
    JarEmpty = 5,
    JarFull = 6,
    AlreadySeeded = 7,
    EmptyText = 8,
    TextTooLong = 9,
    AlreadyVoted = 10,
    NoVoteToRemove = 11,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Vote states (compact u32 encoding for storage efficiency)
// ═══════════════════════════════════════════════════════════════════════════════

pub(crate) type VoteState = u32;

pub const VOTE_NONE: VoteState = 0;
pub const VOTE_UP: VoteState = 1;
pub const VOTE_DOWN: VoteState = 2;

// ═══════════════════════════════════════════════════════════════════════════════
//  Types & storage keys
// ═══════════════════════════════════════════════════════════════════════════════

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Fortune {
    pub text: String,
    pub upvotes: u32,
    pub downvotes: u32,
}

#[contracttype]
#[derive(Clone)]
enum DataKey {
    Admin,
    PayToken,
    FortunePrice,
    /// One-shot flag: `add_initial_fortunes` has run.
    Seeded,
    FortuneCount,
    Fortune(u32),
    /// Vote(voter, fortune_id) → VoteState
    Vote(Address, u32),
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Constants
// ═══════════════════════════════════════════════════════════════════════════════

pub const MAX_FORTUNES: u32 = 100;
pub const TOP_LIST_SIZE: u32 = 10;
pub const MAX_FORTUNE_LEN: u32 = 256;

// Ledger rate is approximately 5 seconds per ledger on Stellar
const LEDGER_RATE_SECS: u32 = 5;

// TTL expressed in human-readable time units (120 days)
const TTL_SECONDS: u32 = 120 * 24 * 60 * 60; // 10,368,000 seconds

/// TTL for persistent entries in ledgers: 120 * 24 * 60 * 60 / 5 = 2,073,600 ledgers
const TTL_LEDGERS: u32 = TTL_SECONDS / LEDGER_RATE_SECS;

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract
// ═══════════════════════════════════════════════════════════════════════════════

#[contract]
pub struct FortuneJarContract;

#[contractimpl]
impl FortuneJarContract {
    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Constructor & seeding
    // ───────────────────────────────────────────────────────────────────────────

    pub fn __constructor(env: Env, admin: Address, token: Address, fortune_price: i128) {
        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::PayToken, &token);
        env.storage()
            .instance()
            .set(&DataKey::FortunePrice, &fortune_price);
        env.storage().instance().set(&DataKey::FortuneCount, &0u32);
    }

    /// Seed the jar with an initial batch. Admin-gated and one-time:
    /// fails once any seeding has happened.
    pub fn add_initial_fortunes(env: Env, list: Vec<String>) -> Result<(), FortuneJarError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();

        if env.storage().instance().has(&DataKey::Seeded) {
            return Err(FortuneJarError::AlreadySeeded);
        }
        if list.len() > MAX_FORTUNES {
            return Err(FortuneJarError::JarFull);
        }

        let mut count = Self::read_count(&env);
        let mut i: u32 = 0;
        while i < list.len() {
            let text = list.get(i).unwrap();
            Self::check_text(&text)?;
            Self::write_fortune(
                &env,
                count,
                &Fortune {
                    text,
                    upvotes: 0,
                    downvotes: 0,
                },
            );
            EvFortuneSubmitted {
                submitter: admin.clone(),
                fortune_id: count,
            }
            .publish(&env);
            count += 1;
            i += 1;
        }

        Self::write_count(&env, count);
        env.storage().instance().set(&DataKey::Seeded, &true);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Dispensing & submission
    // ───────────────────────────────────────────────────────────────────────────

    /// Pay the fortune price and receive a uniformly random fortune.
    ///
    /// Uses the host PRNG, derived from ledger metadata — NOT
    /// cryptographically secure, which is fine for a cookie jar.
    pub fn get_fortune(env: Env, caller: Address) -> Result<String, FortuneJarError> {
        caller.require_auth();

        let count = Self::read_count(&env);
        if count == 0 {
            return Err(FortuneJarError::JarEmpty);
        }

        let price = Self::load_price(&env)?;
        let pay = token::TokenClient::new(&env, &Self::load_token(&env)?);
        pay.transfer(&caller, &env.current_contract_address(), &price);

        let fortune_id = env.prng().gen_range::<u64>(0..=((count - 1) as u64)) as u32;
        let fortune = Self::read_fortune(&env, fortune_id)?;

        EvFortuneReceived { caller, fortune_id }.publish(&env);

        Ok(fortune.text)
    }

    /// Submit a new fortune. The caller puts down the fortune price as
    /// a deposit and gets it back in full within the same call — it
    /// only proves the submitter holds a funded account, as a spam
    /// gate. Returns the new fortune's id.
    pub fn submit_fortune(
        env: Env,
        caller: Address,
        text: String,
    ) -> Result<u32, FortuneJarError> {
        caller.require_auth();

        Self::check_text(&text)?;

        let count = Self::read_count(&env);
        if count >= MAX_FORTUNES {
            return Err(FortuneJarError::JarFull);
        }

        let price = Self::load_price(&env)?;
        let pay = token::TokenClient::new(&env, &Self::load_token(&env)?);
        let contract = env.current_contract_address();
        pay.transfer(&caller, &contract, &price);
        pay.transfer(&contract, &caller, &price);

        Self::write_fortune(
            &env,
            count,
            &Fortune {
                text,
                upvotes: 0,
                downvotes: 0,
            },
        );
        Self::write_count(&env, count + 1);

        EvFortuneSubmitted {
            submitter: caller,
            fortune_id: count,
        }
        .publish(&env);

        Ok(count)
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Voting
    // ───────────────────────────────────────────────────────────────────────────

    /// Upvote a fortune. Switching from a downvote retracts it first;
    /// upvoting twice is an error.
    pub fn upvote_fortune(env: Env, voter: Address, fortune_id: u32) -> Result<(), FortuneJarError> {
        Self::cast_vote(&env, voter, fortune_id, true)
    }

    /// Downvote a fortune. Switching from an upvote retracts it first;
    /// downvoting twice is an error.
    pub fn downvote_fortune(
        env: Env,
        voter: Address,
        fortune_id: u32,
    ) -> Result<(), FortuneJarError> {
        Self::cast_vote(&env, voter, fortune_id, false)
    }

    /// Retract the caller's vote on a fortune.
    pub fn remove_vote(env: Env, voter: Address, fortune_id: u32) -> Result<(), FortuneJarError> {
        voter.require_auth();

        let mut fortune = Self::read_fortune(&env, fortune_id)?;
        let key = DataKey::Vote(voter.clone(), fortune_id);
        let current: VoteState = env.storage().persistent().get(&key).unwrap_or(VOTE_NONE);

        // Saturating: a row orphaned by compaction may point at a
        // fortune whose tallies never included it.
        match current {
            VOTE_UP => fortune.upvotes = fortune.upvotes.saturating_sub(1),
            VOTE_DOWN => fortune.downvotes = fortune.downvotes.saturating_sub(1),
            _ => return Err(FortuneJarError::NoVoteToRemove),
        }

        Self::write_fortune(&env, fortune_id, &fortune);
        env.storage().persistent().remove(&key);

        EvVoteRemoved { voter, fortune_id }.publish(&env);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Moderation
    // ───────────────────────────────────────────────────────────────────────────

    /// Reject a fortune: O(1) compaction that overwrites slot
    /// `fortune_id` with the last fortune (text AND tallies) and
    /// shrinks the count. Vote rows keyed on the moved fortune's old
    /// id are deliberately left behind.
    pub fn reject_fortune(env: Env, fortune_id: u32) -> Result<(), FortuneJarError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();

        let count = Self::read_count(&env);
        if fortune_id >= count {
            return Err(FortuneJarError::FortuneNotFound);
        }

        let last = count - 1;
        if fortune_id != last {
            let moved = Self::read_fortune(&env, last)?;
            Self::write_fortune(&env, fortune_id, &moved);
        }
        env.storage().persistent().remove(&DataKey::Fortune(last));
        Self::write_count(&env, last);

        EvFortuneRejected { fortune_id }.publish(&env);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Read-only
    // ───────────────────────────────────────────────────────────────────────────

    /// The current top 10 fortune ids by net score (upvotes −
    /// downvotes), strictly descending, ties broken toward the lower
    /// id. Always exactly 10 entries, zero-padded when the jar holds
    /// fewer candidates — cross-check against `fortune_count`.
    pub fn get_top_fortunes(env: Env) -> Result<Vec<u32>, FortuneJarError> {
        const TOP: usize = TOP_LIST_SIZE as usize;

        let count = Self::read_count(&env);

        let mut top_ids = [0u32; TOP];
        let mut top_scores = [i64::MIN; TOP];

        // Scan in id order with a strict `>` so an equal score never
        // displaces an earlier (lower) id.
        let mut id: u32 = 0;
        while id < count {
            let fortune = Self::read_fortune(&env, id)?;
            let score = fortune.upvotes as i64 - fortune.downvotes as i64;

            let mut slot: usize = 0;
            while slot < TOP {
                if score > top_scores[slot] {
                    let mut j = TOP - 1;
                    while j > slot {
                        top_ids[j] = top_ids[j - 1];
                        top_scores[j] = top_scores[j - 1];
                        j -= 1;
                    }
                    top_ids[slot] = id;
                    top_scores[slot] = score;
                    break;
                }
                slot += 1;
            }
            id += 1;
        }

        let mut result = Vec::new(&env);
        let mut i: usize = 0;
        while i < TOP {
            result.push_back(top_ids[i]);
            i += 1;
        }
        Ok(result)
    }

    pub fn get_fortune_by_id(env: Env, fortune_id: u32) -> Result<String, FortuneJarError> {
        Ok(Self::read_fortune(&env, fortune_id)?.text)
    }

    /// Full record including vote tallies.
    pub fn get_fortune_details(env: Env, fortune_id: u32) -> Result<Fortune, FortuneJarError> {
        Self::read_fortune(&env, fortune_id)
    }

    pub fn fortune_count(env: Env) -> u32 {
        Self::read_count(&env)
    }

    /// The voter's stored vote on a fortune: 0 = none, 1 = up, 2 = down.
    pub fn get_user_vote(env: Env, voter: Address, fortune_id: u32) -> u32 {
        env.storage()
            .persistent()
            .get(&DataKey::Vote(voter, fortune_id))
            .unwrap_or(VOTE_NONE)
    }

    pub fn get_fortune_price(env: Env) -> Result<i128, FortuneJarError> {
        Self::load_price(&env)
    }

    pub fn get_admin(env: Env) -> Result<Address, FortuneJarError> {
        Self::load_admin(&env)
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Admin
    // ───────────────────────────────────────────────────────────────────────────

    pub fn set_fortune_price(env: Env, new_price: i128) -> Result<(), FortuneJarError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();

        let old_price = Self::load_price(&env)?;
        env.storage()
            .instance()
            .set(&DataKey::FortunePrice, &new_price);

        EvFortunePriceUpdated {
            old_price,
            new_price,
        }
        .publish(&env);

        Ok(())
    }

    pub fn transfer_ownership(env: Env, new_admin: Address) -> Result<(), FortuneJarError> {
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

    /// Drain the contract's token balance to the admin. Returns the
    /// amount withdrawn.
    pub fn withdraw(env: Env) -> Result<i128, FortuneJarError> {
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

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Voting
    // ═══════════════════════════════════════════════════════════════════════════

    fn cast_vote(
        env: &Env,
        voter: Address,
        fortune_id: u32,
        upvote: bool,
    ) -> Result<(), FortuneJarError> {
        voter.require_auth();

        let mut fortune = Self::read_fortune(env, fortune_id)?;
        let key = DataKey::Vote(voter.clone(), fortune_id);
        let current: VoteState = env.storage().persistent().get(&key).unwrap_or(VOTE_NONE);
        let target = if upvote { VOTE_UP } else { VOTE_DOWN };

        if current == target {
            return Err(FortuneJarError::AlreadyVoted);
        }

        // Retract the opposite polarity before applying the new one,
        // so each (voter, fortune) pair counts at most once.
        match current {
            VOTE_UP => fortune.upvotes = fortune.upvotes.saturating_sub(1),
            VOTE_DOWN => fortune.downvotes = fortune.downvotes.saturating_sub(1),
            _ => {}
        }
        if upvote {
            fortune.upvotes += 1;
        } else {
            fortune.downvotes += 1;
        }

        Self::write_fortune(env, fortune_id, &fortune);
        env.storage().persistent().set(&key, &target);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_LEDGERS, TTL_LEDGERS);

        EvVoteCast {
            voter,
            fortune_id,
            upvote,
        }
        .publish(env);

        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Validation & storage
    // ═══════════════════════════════════════════════════════════════════════════

    fn check_text(text: &String) -> Result<(), FortuneJarError> {
        if text.len() == 0 {
            return Err(FortuneJarError::EmptyText);
        }
        if text.len() > MAX_FORTUNE_LEN {
            return Err(FortuneJarError::TextTooLong);
        }
        Ok(())
    }

    fn read_fortune(env: &Env, fortune_id: u32) -> Result<Fortune, FortuneJarError> {
        env.storage()
            .persistent()
            .get(&DataKey::Fortune(fortune_id))
            .ok_or(FortuneJarError::FortuneNotFound)
    }

    fn write_fortune(env: &Env, fortune_id: u32, fortune: &Fortune) {
        let key = DataKey::Fortune(fortune_id);
        env.storage().persistent().set(&key, fortune);
        env.storage()
            .persistent()
            .extend_ttl(&key, TTL_LEDGERS, TTL_LEDGERS);
    }

    fn read_count(env: &Env) -> u32 {
        env.storage()
            .instance()
            .get(&DataKey::FortuneCount)
            .unwrap_or(0)
    }

    fn write_count(env: &Env, count: u32) {
        env.storage().instance().set(&DataKey::FortuneCount, &count);
        // Keep instance storage (admin, token, price, count) alive
        env.storage().instance().extend_ttl(TTL_LEDGERS, TTL_LEDGERS);
    }

    fn load_admin(env: &Env) -> Result<Address, FortuneJarError> {
        env.storage()
            .instance()
            .get(&DataKey::Admin)
            .ok_or(FortuneJarError::AdminNotSet)
    }

    fn load_token(env: &Env) -> Result<Address, FortuneJarError> {
        env.storage()
            .instance()
            .get(&DataKey::PayToken)
            .ok_or(FortuneJarError::TokenNotSet)
    }

    fn load_price(env: &Env) -> Result<i128, FortuneJarError> {
        env.storage()
            .instance()
            .get(&DataKey::FortunePrice)
            .ok_or(FortuneJarError::PriceNotSet)
    }
}

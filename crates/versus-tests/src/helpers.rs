//! Shared fixtures for the integration tests.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use versus_core::config::EngineConfig;
use versus_core::spoiler::SpoilerLevel;
use versus_core::types::{
    ComparisonKey, ContentItem, DiffCategory, ItemId, ItemStatus, UserId, Vote, VoteValue,
    WorkId, WorkKind, WorkRef,
};
use versus_engine::{Engine, MemoryStore, NewDiff, WorkRecord};
use versus_reputation::Clock;

/// Fixed "now" used by every fixture.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn fixed_clock() -> Clock {
    Arc::new(now)
}

pub fn user(n: u128) -> UserId {
    UserId::from_u128(n)
}

pub fn work_id(n: u128) -> WorkId {
    WorkId::from_u128(n)
}

pub fn work(n: u128, title: &str, kind: WorkKind) -> WorkRecord {
    WorkRecord {
        work: WorkRef {
            id: work_id(n),
            title: title.to_string(),
            slug: title.to_lowercase().replace(' ', "-"),
            kind,
        },
        creator: None,
        summary: None,
        popularity: None,
        updated_at: now() - Duration::days(30),
    }
}

pub fn comparison(source: u128, adaptation: u128) -> ComparisonKey {
    ComparisonKey::new(work_id(source), work_id(adaptation))
}

/// A diff row for seeding, created `age` before [`now`].
pub fn seeded_item(n: u128, key: ComparisonKey, author: UserId, age: Duration) -> ContentItem {
    ContentItem {
        id: ItemId::from_u128(n),
        comparison: key,
        author,
        title: format!("Diff {n}"),
        body: String::new(),
        category: DiffCategory::Plot,
        spoiler: SpoilerLevel::None,
        status: ItemStatus::Live,
        created_at: now() - age,
        updated_at: now() - age,
    }
}

pub fn seeded_vote(item: ItemId, voter: UserId, value: VoteValue, age: Duration) -> Vote {
    Vote {
        item,
        voter,
        value,
        created_at: now() - age,
    }
}

/// An engine over an empty store with the given works and a fixed clock.
pub fn engine_with(works: Vec<WorkRecord>, config: EngineConfig) -> Engine<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for record in works {
        store.insert_work(record);
    }
    Engine::with_clock(store, config, fixed_clock()).unwrap()
}

/// One book and its adaptation, default config.
pub fn basic_engine() -> Engine<MemoryStore> {
    engine_with(
        vec![work(1, "Dune", WorkKind::Book), work(2, "Dune Part One", WorkKind::Screen)],
        EngineConfig::default(),
    )
}

pub fn new_diff(key: ComparisonKey, author: UserId) -> NewDiff {
    NewDiff {
        comparison: key,
        author,
        title: "The banquet scene is cut".to_string(),
        body: String::new(),
        category: DiffCategory::Plot,
        spoiler: SpoilerLevel::None,
    }
}

/// Cast `counts` votes (accurate, needs nuance, inaccurate) from fresh voters
/// starting at `first_voter`.
pub fn cast_tally(
    engine: &Engine<MemoryStore>,
    item: ItemId,
    first_voter: u128,
    counts: (u64, u64, u64),
) {
    let values = std::iter::repeat_n(VoteValue::Accurate, counts.0 as usize)
        .chain(std::iter::repeat_n(VoteValue::NeedsNuance, counts.1 as usize))
        .chain(std::iter::repeat_n(VoteValue::Inaccurate, counts.2 as usize));
    for (offset, value) in values.enumerate() {
        engine
            .cast_vote(item, user(first_voter + offset as u128), value)
            .unwrap();
    }
}

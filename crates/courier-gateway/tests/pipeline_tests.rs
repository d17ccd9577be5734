//! End-to-end pipeline scenarios
//!
//! Drives raw dispatch events through the pipeline against the in-memory
//! store and checks the emitted stream events plus the cache invariants.

use std::sync::Arc;

use tokio::sync::mpsc;

use courier_cache::{CacheProjection, KvStore, MemoryStore};
use courier_common::{CacheSettings, PipelineSettings};
use courier_core::{Snowflake, StreamEvent};
use courier_gateway::pipeline::{MarshalContext, MarshalerRegistry, Pipeline};
use courier_gateway::RawEvent;

struct Harness {
    pipeline: Pipeline,
    ctx: MarshalContext,
    produce_tx: mpsc::Sender<StreamEvent>,
    produce_rx: mpsc::Receiver<StreamEvent>,
    sequence: u64,
}

impl Harness {
    fn new() -> Self {
        Self::with_settings(PipelineSettings::default())
    }

    fn with_settings(settings: PipelineSettings) -> Self {
        let cache = CacheProjection::new(
            Arc::new(MemoryStore::new()),
            CacheSettings {
                namespace: "test".to_string(),
                ..CacheSettings::default()
            },
        );
        let registry = Arc::new(MarshalerRegistry::with_defaults());
        let (produce_tx, produce_rx) = mpsc::channel(256);

        Self {
            pipeline: Pipeline::new(&settings, registry),
            ctx: MarshalContext::new(cache),
            produce_tx,
            produce_rx,
            sequence: 0,
        }
    }

    fn cache(&self) -> &CacheProjection {
        &self.ctx.cache
    }

    async fn dispatch(&mut self, kind: &str, data: serde_json::Value) {
        self.sequence += 1;
        let event = RawEvent::dispatch(0, self.sequence, kind, data);
        self.pipeline
            .process(&mut self.ctx, event, &self.produce_tx)
            .await;
    }

    fn drain(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.produce_rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn drain_kinds(&mut self) -> Vec<String> {
        self.drain().into_iter().map(|e| e.kind).collect()
    }
}

fn guild_payload(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": format!("guild {id}"),
        "owner_id": "900",
        "member_count": 2,
        "roles": [{"id": format!("{id}01"), "name": "everyone"}],
        "channels": [
            {"id": format!("{id}02"), "guild_id": id, "name": "general", "type": 0}
        ],
        "emojis": [{"id": format!("{id}03"), "name": "blob"}],
        "members": [
            {"user": {"id": "700", "username": "a"}},
            {"user": {"id": "701", "username": "b"}}
        ]
    })
}

fn ready_payload(guild_ids: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "v": 8,
        "session_id": "session-0",
        "user": {"id": "1", "username": "bot", "bot": true},
        "guilds": guild_ids
            .iter()
            .map(|id| serde_json::json!({"id": id, "unavailable": true}))
            .collect::<Vec<_>>()
    })
}

/// Invariant checks over the whole cached object graph
async fn assert_cache_invariants(cache: &CacheProjection) {
    let store = cache.store();
    let keys = cache.keys();

    let guild_ids = store.hkeys(&keys.guilds()).await.unwrap();
    for gid in &guild_ids {
        let guild_id = Snowflake::parse(gid).unwrap();
        let guild = cache.guild(guild_id).await.unwrap().unwrap();

        // Every role id on the guild resolves in the role table
        for role_id in &guild.roles {
            assert!(
                cache.role(guild_id, *role_id).await.unwrap().is_some(),
                "role {role_id} of guild {gid} is dangling"
            );
        }

        // The guild-channel index agrees with the global channel table
        for channel_id in &guild.channels {
            let global = cache.channel(*channel_id).await.unwrap();
            let indexed = store
                .hget(&keys.guild_channels(guild_id), &channel_id.to_string())
                .await
                .unwrap();
            assert!(global.is_some(), "channel {channel_id} is dangling");
            assert!(indexed.is_some(), "channel {channel_id} missing from index");
            assert_eq!(global.unwrap().guild_id, Some(guild_id));
        }
    }

    // Mutual sets equal the member hashes
    let user_ids = store.hkeys(&keys.users()).await.unwrap();
    for uid in &user_ids {
        let user_id = Snowflake::parse(uid).unwrap();
        let mutuals = cache.mutual_guilds(user_id).await.unwrap();
        for gid in &guild_ids {
            let guild_id = Snowflake::parse(gid).unwrap();
            let is_member = store
                .hexists(&keys.guild_members(guild_id), uid)
                .await
                .unwrap();
            assert_eq!(
                mutuals.contains(&guild_id),
                is_member,
                "mutual set of user {uid} disagrees with membership of guild {gid}"
            );
        }
    }
}

#[tokio::test]
async fn fresh_start_emits_one_shard_ready_and_no_joins() {
    let mut harness = Harness::new();

    harness.dispatch("READY", ready_payload(&["100", "200"])).await;
    harness.dispatch("GUILD_CREATE", guild_payload("100")).await;
    harness.dispatch("GUILD_CREATE", guild_payload("200")).await;

    let kinds = harness.drain_kinds();
    assert!(!kinds.contains(&"GUILD_JOIN".to_string()), "kinds: {kinds:?}");
    assert_eq!(
        kinds.iter().filter(|k| *k == "SHARD_READY").count(),
        1,
        "kinds: {kinds:?}"
    );

    assert_eq!(harness.ctx.unavailable_count(), 0);
    assert!(harness.cache().guild_exists(Snowflake::new(100)).await.unwrap());
    assert!(harness.cache().guild_exists(Snowflake::new(200)).await.unwrap());
    assert_cache_invariants(harness.cache()).await;
}

#[tokio::test]
async fn guild_create_after_startup_is_a_join() {
    let mut harness = Harness::new();

    harness.dispatch("READY", ready_payload(&["100"])).await;
    harness.dispatch("GUILD_CREATE", guild_payload("100")).await;
    harness.drain();

    harness.dispatch("GUILD_CREATE", guild_payload("300")).await;

    let kinds = harness.drain_kinds();
    assert_eq!(kinds, vec!["GUILD_JOIN"]);
    assert!(harness.cache().guild_exists(Snowflake::new(300)).await.unwrap());
    assert_cache_invariants(harness.cache()).await;
}

#[tokio::test]
async fn availability_flap_keeps_the_cache() {
    let mut harness = Harness::new();

    harness.dispatch("READY", ready_payload(&["100"])).await;
    harness.dispatch("GUILD_CREATE", guild_payload("100")).await;
    harness.drain();

    harness
        .dispatch(
            "GUILD_DELETE",
            serde_json::json!({"id": "100", "unavailable": true}),
        )
        .await;

    assert_eq!(harness.drain_kinds(), vec!["GUILD_UNAVAILABLE"]);
    assert_eq!(harness.ctx.unavailable_count(), 1);
    // The guild stays cached while unavailable
    assert!(harness.cache().guild_exists(Snowflake::new(100)).await.unwrap());

    harness.dispatch("GUILD_CREATE", guild_payload("100")).await;
    assert_eq!(harness.drain_kinds(), vec!["GUILD_AVAILABLE"]);
    assert_eq!(harness.ctx.unavailable_count(), 0);
}

#[tokio::test]
async fn guild_remove_cascades_through_every_table() {
    let mut harness = Harness::new();

    harness.dispatch("GUILD_CREATE", guild_payload("300")).await;
    harness.drain();

    harness
        .dispatch(
            "GUILD_DELETE",
            serde_json::json!({"id": "300", "unavailable": false}),
        )
        .await;

    assert_eq!(harness.drain_kinds(), vec!["GUILD_REMOVE"]);

    let cache = harness.cache();
    assert!(!cache.guild_exists(Snowflake::new(300)).await.unwrap());
    assert!(cache.channel(Snowflake::new(30002)).await.unwrap().is_none());
    assert!(cache.emoji(Snowflake::new(30003)).await.unwrap().is_none());

    // Every per-guild key is gone
    let keys = cache.store().scan_match("test:guild:300*").await.unwrap();
    assert!(keys.is_empty(), "leftover keys: {keys:?}");

    // Memberships and users went with the guild
    assert!(cache.mutual_guilds(Snowflake::new(700)).await.unwrap().is_empty());
    assert!(cache.user(Snowflake::new(700)).await.unwrap().is_none());
}

#[tokio::test]
async fn identical_update_after_create_is_dropped() {
    let mut harness = Harness::new();

    harness.dispatch("GUILD_CREATE", guild_payload("100")).await;
    harness.drain();

    // Same payload again as an update: structurally equal, nothing emitted
    harness.dispatch("GUILD_UPDATE", guild_payload("100")).await;
    assert!(harness.drain().is_empty());

    // An actual change emits a before/after pair
    let mut changed = guild_payload("100");
    changed["name"] = serde_json::json!("renamed");
    harness.dispatch("GUILD_UPDATE", changed).await;

    let events = harness.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, "GUILD_UPDATE");
    assert_eq!(events[0].data["before"]["name"], "guild 100");
    assert_eq!(events[0].data["after"]["name"], "renamed");
}

#[tokio::test]
async fn role_lifecycle_updates_guild_and_table() {
    let mut harness = Harness::new();
    harness.dispatch("GUILD_CREATE", guild_payload("100")).await;
    harness.drain();

    harness
        .dispatch(
            "GUILD_ROLE_CREATE",
            serde_json::json!({"guild_id": "100", "role": {"id": "555", "name": "mods"}}),
        )
        .await;
    assert_eq!(harness.drain_kinds(), vec!["GUILD_ROLE_CREATE"]);

    let guild = harness.cache().guild(Snowflake::new(100)).await.unwrap().unwrap();
    assert!(guild.roles.contains(&Snowflake::new(555)));
    assert_cache_invariants(harness.cache()).await;

    // Unchanged role update is dropped
    harness
        .dispatch(
            "GUILD_ROLE_UPDATE",
            serde_json::json!({"guild_id": "100", "role": {"id": "555", "name": "mods"}}),
        )
        .await;
    assert!(harness.drain().is_empty());

    // Changed role update emits a diff
    harness
        .dispatch(
            "GUILD_ROLE_UPDATE",
            serde_json::json!({"guild_id": "100", "role": {"id": "555", "name": "admins"}}),
        )
        .await;
    let events = harness.drain();
    assert_eq!(events[0].kind, "GUILD_ROLE_UPDATE");
    assert_eq!(events[0].data["before"]["name"], "mods");
    assert_eq!(events[0].data["after"]["name"], "admins");

    harness
        .dispatch(
            "GUILD_ROLE_DELETE",
            serde_json::json!({"guild_id": "100", "role_id": "555"}),
        )
        .await;
    let events = harness.drain();
    assert_eq!(events[0].kind, "GUILD_ROLE_DELETE");
    assert_eq!(events[0].data["role"]["name"], "admins");

    let guild = harness.cache().guild(Snowflake::new(100)).await.unwrap().unwrap();
    assert!(!guild.roles.contains(&Snowflake::new(555)));
    assert_cache_invariants(harness.cache()).await;
}

#[tokio::test]
async fn channel_lifecycle_keeps_index_consistent() {
    let mut harness = Harness::new();
    harness.dispatch("GUILD_CREATE", guild_payload("100")).await;
    harness.drain();

    harness
        .dispatch(
            "CHANNEL_CREATE",
            serde_json::json!({
                "id": "777", "guild_id": "100", "name": "new-channel", "type": 0
            }),
        )
        .await;
    assert_eq!(harness.drain_kinds(), vec!["CHANNEL_CREATE"]);
    assert_cache_invariants(harness.cache()).await;

    harness
        .dispatch(
            "CHANNEL_PINS_UPDATE",
            serde_json::json!({
                "guild_id": "100",
                "channel_id": "777",
                "last_pin_timestamp": "2020-06-01T12:00:00Z"
            }),
        )
        .await;
    assert_eq!(harness.drain_kinds(), vec!["CHANNEL_PINS_UPDATE"]);

    let channel = harness.cache().channel(Snowflake::new(777)).await.unwrap().unwrap();
    assert!(channel.last_pin_timestamp.is_some());

    harness
        .dispatch(
            "CHANNEL_DELETE",
            serde_json::json!({"id": "777", "guild_id": "100", "type": 0}),
        )
        .await;
    assert_eq!(harness.drain_kinds(), vec!["CHANNEL_DELETE"]);

    assert!(harness.cache().channel(Snowflake::new(777)).await.unwrap().is_none());
    let guild = harness.cache().guild(Snowflake::new(100)).await.unwrap().unwrap();
    assert!(!guild.channels.contains(&Snowflake::new(777)));
    assert_cache_invariants(harness.cache()).await;
}

#[tokio::test]
async fn member_lifecycle_maintains_mutual_sets() {
    let mut harness = Harness::new();
    harness.dispatch("GUILD_CREATE", guild_payload("100")).await;
    harness.dispatch("GUILD_CREATE", guild_payload("200")).await;
    harness.drain();

    harness
        .dispatch(
            "GUILD_MEMBER_ADD",
            serde_json::json!({
                "guild_id": "100",
                "user": {"id": "800", "username": "newcomer"}
            }),
        )
        .await;
    assert_eq!(harness.drain_kinds(), vec!["GUILD_MEMBER_ADD"]);
    assert_eq!(
        harness.cache().mutual_guilds(Snowflake::new(800)).await.unwrap(),
        vec![Snowflake::new(100)]
    );
    assert_cache_invariants(harness.cache()).await;

    // Member count tracked on the guild
    let guild = harness.cache().guild(Snowflake::new(100)).await.unwrap().unwrap();
    assert_eq!(guild.member_count, 3);

    // Unchanged member update is dropped
    harness
        .dispatch(
            "GUILD_MEMBER_UPDATE",
            serde_json::json!({
                "guild_id": "100",
                "user": {"id": "800", "username": "newcomer"}
            }),
        )
        .await;
    assert!(harness.drain().is_empty());

    harness
        .dispatch(
            "GUILD_MEMBER_UPDATE",
            serde_json::json!({
                "guild_id": "100",
                "nick": "shiny",
                "user": {"id": "800", "username": "newcomer"}
            }),
        )
        .await;
    let events = harness.drain();
    assert_eq!(events[0].kind, "GUILD_MEMBER_UPDATE");
    assert_eq!(events[0].data["after"]["nick"], "shiny");

    harness
        .dispatch(
            "GUILD_MEMBER_REMOVE",
            serde_json::json!({
                "guild_id": "100",
                "user": {"id": "800", "username": "newcomer"}
            }),
        )
        .await;
    assert_eq!(harness.drain_kinds(), vec!["GUILD_MEMBER_REMOVE"]);
    assert!(harness
        .cache()
        .mutual_guilds(Snowflake::new(800))
        .await
        .unwrap()
        .is_empty());
    assert_cache_invariants(harness.cache()).await;
}

#[tokio::test]
async fn thousand_member_chunk_is_bulk_cached() {
    let mut harness = Harness::new();
    harness.dispatch("GUILD_CREATE", guild_payload("100")).await;
    harness.drain();

    let members: Vec<serde_json::Value> = (0..1000)
        .map(|i| {
            serde_json::json!({
                "user": {"id": format!("{}", 10_000 + i), "username": format!("m{i}")}
            })
        })
        .collect();

    harness
        .dispatch(
            "GUILD_MEMBERS_CHUNK",
            serde_json::json!({"guild_id": "100", "members": members}),
        )
        .await;

    // Chunks are cached but never republished
    assert!(harness.drain().is_empty());

    let cache = harness.cache();
    let member_ids = cache
        .store()
        .hkeys(&cache.keys().guild_members(Snowflake::new(100)))
        .await
        .unwrap();
    // 2 from GUILD_CREATE plus the chunk
    assert_eq!(member_ids.len(), 1002);

    let member = cache
        .member(Snowflake::new(100), Snowflake::new(10_500))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member.user.username, "m500");
    assert_eq!(member.guild_id, Some(Snowflake::new(100)));
}

#[tokio::test]
async fn chunk_and_create_are_idempotent_either_way() {
    let mut harness = Harness::new();

    // Chunk arrives for a guild whose GUILD_CREATE lands afterwards
    harness
        .dispatch(
            "GUILD_MEMBERS_CHUNK",
            serde_json::json!({
                "guild_id": "100",
                "members": [{"user": {"id": "700", "username": "early"}}]
            }),
        )
        .await;
    harness.dispatch("GUILD_CREATE", guild_payload("100")).await;

    // Last write wins on the user id
    let member = harness
        .cache()
        .member(Snowflake::new(100), Snowflake::new(700))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member.user.username, "a");
    assert_cache_invariants(harness.cache()).await;
}

#[tokio::test]
async fn emoji_update_replaces_global_table() {
    let mut harness = Harness::new();
    harness.dispatch("GUILD_CREATE", guild_payload("100")).await;
    harness.drain();

    harness
        .dispatch(
            "GUILD_EMOJIS_UPDATE",
            serde_json::json!({
                "guild_id": "100",
                "emojis": [{"id": "999", "name": "fresh"}]
            }),
        )
        .await;
    assert_eq!(harness.drain_kinds(), vec!["GUILD_EMOJIS_UPDATE"]);

    let cache = harness.cache();
    assert!(cache.emoji(Snowflake::new(10003)).await.unwrap().is_none());
    assert!(cache.emoji(Snowflake::new(999)).await.unwrap().is_some());

    let guild = cache.guild(Snowflake::new(100)).await.unwrap().unwrap();
    assert_eq!(guild.emojis, vec![Snowflake::new(999)]);
}

#[tokio::test]
async fn bans_and_webhooks_pass_through() {
    let mut harness = Harness::new();

    harness
        .dispatch(
            "GUILD_BAN_ADD",
            serde_json::json!({"guild_id": "1", "user": {"id": "2", "username": "u"}}),
        )
        .await;
    harness
        .dispatch(
            "WEBHOOKS_UPDATE",
            serde_json::json!({"guild_id": "1", "channel_id": "3"}),
        )
        .await;
    harness
        .dispatch(
            "GUILD_INTEGRATIONS_UPDATE",
            serde_json::json!({"guild_id": "1"}),
        )
        .await;

    assert_eq!(
        harness.drain_kinds(),
        vec!["GUILD_BAN_ADD", "WEBHOOKS_UPDATE", "GUILD_INTEGRATIONS_UPDATE"]
    );
}

#[tokio::test]
async fn full_produce_queue_blocks_the_pipeline() {
    let mut harness = Harness::new();

    // Replace the produce side with a single-slot queue and fill it
    let (produce_tx, mut produce_rx) = mpsc::channel::<StreamEvent>(1);
    produce_tx
        .send(StreamEvent::new("FILLER", serde_json::json!({})))
        .await
        .unwrap();

    let event = RawEvent::dispatch(
        0,
        1,
        "GUILD_BAN_ADD",
        serde_json::json!({"guild_id": "1", "user": {"id": "2"}}),
    );

    // The send inside process() must block while the queue is full
    let blocked = tokio::time::timeout(
        std::time::Duration::from_millis(50),
        harness.pipeline.process(&mut harness.ctx, event, &produce_tx),
    )
    .await;
    assert!(blocked.is_err(), "pipeline should back-pressure, not drop");

    assert_eq!(produce_rx.recv().await.unwrap().kind, "FILLER");
}

#[tokio::test]
async fn published_frames_decode_as_msgpack() {
    use courier_gateway::{Broker, Publisher, RecordingBroker};

    let mut harness = Harness::new();
    harness.dispatch("GUILD_CREATE", guild_payload("300")).await;

    let broker = Arc::new(RecordingBroker::new());
    let publisher = Publisher::new(broker.clone() as Arc<dyn Broker>, "events");
    for event in harness.drain() {
        publisher.publish(event).await;
    }

    let published = broker.published();
    assert_eq!(published.len(), 1);

    let decoded: StreamEvent = rmp_serde::from_slice(&published[0].1).unwrap();
    assert_eq!(decoded.kind, "GUILD_JOIN");
    assert_eq!(decoded.data["id"], "300");
}

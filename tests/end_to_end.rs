//! End-to-end scenarios from spec §8: drive a full [`Orchestrator`] lifecycle
//! against an in-memory [`Transport`] double, the way the teacher's own
//! integration tests drive a client against a stub HTTP server.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use lcc_cdi::{
    cache::CacheConfig,
    entry::EntryKey,
    orchestrator::{Observer, Orchestrator, State},
    space::MemorySpace,
    transport::{Transport, TransportError},
};

/// An in-memory node: a CDI document plus a byte store per memory space.
struct FakeNode {
    cdi_xml: String,
    spaces: Mutex<HashMap<MemorySpace, HashMap<i64, u8>>>,
    fail_reads_in: Mutex<Vec<MemorySpace>>,
}

#[async_trait]
impl Transport for FakeNode {
    async fn read_cdi_stream(&self, _node: &str) -> Result<String, TransportError> {
        Ok(self.cdi_xml.clone())
    }

    async fn read_bytes(&self, node: &str, space: MemorySpace, offset: i64, length: u32) -> Result<Vec<u8>, TransportError> {
        if self.fail_reads_in.lock().unwrap().contains(&space) {
            return Err(TransportError::Failed {
                node: node.to_string(),
                reason: "simulated read failure".to_string(),
            });
        }
        let spaces = self.spaces.lock().unwrap();
        let bytes = spaces.get(&space);
        let out = (offset..offset + length as i64)
            .map(|addr| bytes.and_then(|b| b.get(&addr)).copied().unwrap_or(0))
            .collect();
        Ok(out)
    }

    async fn write_bytes(&self, _node: &str, space: MemorySpace, offset: i64, bytes: Vec<u8>) -> Result<(), TransportError> {
        let mut spaces = self.spaces.lock().unwrap();
        let store = spaces.entry(space).or_default();
        for (i, b) in bytes.into_iter().enumerate() {
            store.insert(offset + i as i64, b);
        }
        Ok(())
    }
}

struct FailingTransport;

#[async_trait]
impl Transport for FailingTransport {
    async fn read_cdi_stream(&self, node: &str) -> Result<String, TransportError> {
        Err(TransportError::Timeout { node: node.to_string() })
    }

    async fn read_bytes(&self, _node: &str, _space: MemorySpace, _offset: i64, _length: u32) -> Result<Vec<u8>, TransportError> {
        unreachable!("should never be reached once the fetch fails")
    }

    async fn write_bytes(&self, _node: &str, _space: MemorySpace, _offset: i64, _bytes: Vec<u8>) -> Result<(), TransportError> {
        unreachable!("should never be reached once the fetch fails")
    }
}

/// Delivers a successful fetch whose body is not well-formed XML, so the
/// failure surfaces in the parser rather than the transport (spec §8
/// scenario 6).
struct MalformedXmlTransport;

#[async_trait]
impl Transport for MalformedXmlTransport {
    async fn read_cdi_stream(&self, _node: &str) -> Result<String, TransportError> {
        Ok("<cdi><segment space=\"1\"><int size=\"2\"></segment></cdi>".to_string())
    }

    async fn read_bytes(&self, _node: &str, _space: MemorySpace, _offset: i64, _length: u32) -> Result<Vec<u8>, TransportError> {
        unreachable!("should never be reached once the parse fails")
    }

    async fn write_bytes(&self, _node: &str, _space: MemorySpace, _offset: i64, _bytes: Vec<u8>) -> Result<(), TransportError> {
        unreachable!("should never be reached once the parse fails")
    }
}

/// Records every `UPDATE_STATE`/`UPDATE_REP`/`UPDATE_CACHE_COMPLETE` firing,
/// in order, plus how many times each has fired — used to assert the
/// fire-once guarantees from spec §6.
#[derive(Default)]
struct RecordingObserver {
    states: Mutex<Vec<State>>,
    representation_ready_count: AtomicUsize,
    cache_complete_count: AtomicUsize,
    entry_data: Mutex<Vec<EntryKey>>,
}

impl Observer for RecordingObserver {
    fn on_state_changed(&self, state: &State) {
        self.states.lock().unwrap().push(state.clone());
    }

    fn on_representation_ready(&self, _root: &Arc<lcc_cdi::entry::Root>) {
        self.representation_ready_count.fetch_add(1, Ordering::SeqCst);
    }

    fn on_cache_complete(&self) {
        self.cache_complete_count.fetch_add(1, Ordering::SeqCst);
    }

    fn on_entry_data(&self, key: &EntryKey) {
        self.entry_data.lock().unwrap().push(key.clone());
    }
}

fn single_integer_cdi() -> String {
    r#"
        <cdi>
          <segment space="1" origin="0">
            <name>root</name>
            <int size="2" offset="4"><name>v</name></int>
          </segment>
        </cdi>
    "#
    .to_string()
}

fn repeated_group_cdi() -> String {
    r#"
        <cdi>
          <segment space="1" origin="0">
            <name>root</name>
            <group replication="3">
              <name>g</name>
              <int size="1" offset="0"><name>a</name></int>
              <int size="1" offset="1"><name>b</name></int>
            </group>
          </segment>
        </cdi>
    "#
    .to_string()
}

fn string_cdi() -> String {
    r#"
        <cdi>
          <segment space="1" origin="0">
            <name>root</name>
            <string size="8" offset="0"><name>label</name></string>
          </segment>
        </cdi>
    "#
    .to_string()
}

/// Scenario 1/4 (spec §8): a single integer and a string fetch, parse, and
/// prefill correctly, and every prefill byte ends up readable through the
/// cache registry.
#[tokio::test]
async fn fetches_parses_and_prefills_a_single_integer() {
    let mut initial = HashMap::new();
    initial.insert(MemorySpace(1), {
        let mut m = HashMap::new();
        m.insert(4i64, 0x01);
        m.insert(5i64, 0x02);
        m
    });
    let node = Arc::new(FakeNode {
        cdi_xml: single_integer_cdi(),
        spaces: Mutex::new(initial),
        fail_reads_in: Mutex::new(Vec::new()),
    });
    let orchestrator = Orchestrator::new("node-1", node, CacheConfig::default());
    let observer = Arc::new(RecordingObserver::default());
    orchestrator.add_observer(observer.clone());

    orchestrator.start().await.unwrap();

    assert_eq!(orchestrator.state(), State::CacheComplete);
    assert_eq!(observer.representation_ready_count.load(Ordering::SeqCst), 1);
    assert_eq!(observer.cache_complete_count.load(Ordering::SeqCst), 1);

    let root = orchestrator.representation().unwrap();
    let entry = root.find("root.v").unwrap();
    let header = entry.header();
    assert_eq!(header.origin, 4);
    assert_eq!(header.size, 2);

    let cache = orchestrator.cache_registry().get_or_create(MemorySpace(1));
    assert_eq!(cache.read(4, 2), Some(vec![0x01, 0x02]));
}

/// Scenario 2 (spec §8): a 3x-replicated group resolves to three contiguous
/// replicas whose cached bytes are independently addressable.
#[tokio::test]
async fn prefills_a_repeated_group() {
    let node = Arc::new(FakeNode {
        cdi_xml: repeated_group_cdi(),
        spaces: Mutex::new(HashMap::new()),
        fail_reads_in: Mutex::new(Vec::new()),
    });
    let orchestrator = Orchestrator::new("node-1", node, CacheConfig::default());
    orchestrator.start().await.unwrap();

    let root = orchestrator.representation().unwrap();
    let group = root.find("root.g").unwrap();
    assert_eq!(group.header().size, 6);

    let cache = orchestrator.cache_registry().get_or_create(MemorySpace(1));
    for i in 0..3i64 {
        assert_eq!(cache.read(i * 2, 2), Some(vec![0, 0]));
    }
}

/// Scenario 5 (spec §8): `UPDATE_CACHE_COMPLETE` fires exactly once, after
/// every registered space has reported `LoadingComplete`, even when a
/// prefill read fails for one chunk.
#[tokio::test]
async fn cache_complete_fires_once_even_with_partial_prefill_failures() {
    let node = Arc::new(FakeNode {
        cdi_xml: string_cdi(),
        spaces: Mutex::new(HashMap::new()),
        fail_reads_in: Mutex::new(vec![MemorySpace(1)]),
    });
    let orchestrator = Orchestrator::new("node-1", node, CacheConfig::default());
    let observer = Arc::new(RecordingObserver::default());
    orchestrator.add_observer(observer.clone());

    orchestrator.start().await.unwrap();

    assert_eq!(orchestrator.state(), State::CacheComplete);
    assert_eq!(observer.cache_complete_count.load(Ordering::SeqCst), 1);

    let cache = orchestrator.cache_registry().get_or_create(MemorySpace(1));
    assert_eq!(cache.read(0, 8), None);
}

/// Scenario 6 (spec §8): when the fetch itself fails, the orchestrator moves
/// to `Failed` and never reaches `UPDATE_REP`.
#[tokio::test]
async fn fetch_failure_moves_to_failed_without_representation() {
    let orchestrator = Orchestrator::new("node-1", Arc::new(FailingTransport), CacheConfig::default());
    let observer = Arc::new(RecordingObserver::default());
    orchestrator.add_observer(observer.clone());

    let result = orchestrator.start().await;

    assert!(result.is_err());
    assert!(matches!(orchestrator.state(), State::Failed(_)));
    assert_eq!(observer.representation_ready_count.load(Ordering::SeqCst), 0);
    assert_eq!(observer.cache_complete_count.load(Ordering::SeqCst), 0);
    assert!(orchestrator.representation().is_none());
}

/// Scenario 6 (spec §8): a malformed CDI document moves the orchestrator
/// Uninitialized -> Fetching -> Parsing -> Failed, with the parser's own
/// error reason surfaced in the failure message, and `UPDATE_REP` never
/// fires.
#[tokio::test]
async fn malformed_xml_moves_to_failed_with_parser_error() {
    let orchestrator = Orchestrator::new("node-1", Arc::new(MalformedXmlTransport), CacheConfig::default());
    let observer = Arc::new(RecordingObserver::default());
    orchestrator.add_observer(observer.clone());

    let result = orchestrator.start().await;

    assert!(result.is_err());
    let state = orchestrator.state();
    let message = match &state {
        State::Failed(msg) => msg,
        other => panic!("expected Failed, got {:?}", other),
    };
    assert!(
        message.contains("CDI parse error"),
        "failure message should surface the parser's own error, got: {}",
        message
    );
    assert_eq!(observer.representation_ready_count.load(Ordering::SeqCst), 0);
    assert_eq!(observer.cache_complete_count.load(Ordering::SeqCst), 0);
    assert!(orchestrator.representation().is_none());

    let states = observer.states.lock().unwrap();
    assert_eq!(*states, vec![State::Fetching, State::Parsing, state.clone()]);
}

/// String accessors read truncated/padded values back through the same cache
/// the orchestrator prefilled (spec §4.5).
#[tokio::test]
async fn string_accessor_reads_prefilled_bytes() {
    let mut initial = HashMap::new();
    let mut space = HashMap::new();
    for (i, b) in b"hi\0\0\0\0\0\0".iter().enumerate() {
        space.insert(i as i64, *b);
    }
    initial.insert(MemorySpace(1), space);
    let node = Arc::new(FakeNode {
        cdi_xml: string_cdi(),
        spaces: Mutex::new(initial),
        fail_reads_in: Mutex::new(Vec::new()),
    });
    let orchestrator = Orchestrator::new("node-1", node, CacheConfig::default());
    orchestrator.start().await.unwrap();

    let root = orchestrator.representation().unwrap();
    let entry = root.find("root.label").unwrap();
    let string_entry = match entry {
        lcc_cdi::entry::Entry::String(s) => s,
        other => panic!("expected a string entry, got {:?}", other),
    };
    let accessor = lcc_cdi::accessors::StringAccessor::new(orchestrator.cache_registry(), string_entry);
    assert_eq!(accessor.get().as_deref(), Some("hi"));
}

// Integration tests for the bounded session registry

mod common;

use anyhow::Result;
use common::{settle, ScriptedAdapter};
use mentormeet::{
    LifecycleState, RecordingSession, RegistryError, SessionConfig, SessionId, SessionRegistry,
    DEFAULT_MAX_SESSIONS,
};
use std::sync::Arc;

fn sessions(adapter: &Arc<ScriptedAdapter>, count: usize) -> Vec<Arc<RecordingSession>> {
    (0..count)
        .map(|i| {
            Arc::new(RecordingSession::new(
                SessionId::from(format!("mentor-{:02}", i)),
                adapter.clone(),
                SessionConfig::default(),
            ))
        })
        .collect()
}

#[tokio::test]
async fn test_overflow_session_is_not_dropped() -> Result<()> {
    let adapter = ScriptedAdapter::new();
    let registry = SessionRegistry::default();
    let all = sessions(&adapter, DEFAULT_MAX_SESSIONS + 1);

    for session in &all[..DEFAULT_MAX_SESSIONS] {
        registry.register(Arc::clone(session))?;
    }
    assert!(registry.is_full());

    let overflow = &all[DEFAULT_MAX_SESSIONS];
    let err = registry.register(Arc::clone(overflow)).unwrap_err();
    assert_eq!(err, RegistryError::CapacityExceeded { capacity: 40 });

    // Nobody was evicted to make room
    assert_eq!(registry.count(), DEFAULT_MAX_SESSIONS);
    for session in &all[..DEFAULT_MAX_SESSIONS] {
        assert!(registry.contains(session.id()));
    }
    assert!(!registry.contains(overflow.id()));

    // The untracked session still records
    overflow.start().await?;
    assert_eq!(overflow.lifecycle(), LifecycleState::Recording);
    adapter.push(&[4, 1]);
    settle().await;
    let clip = overflow.stop().await.expect("overflow session should finalize");
    assert_eq!(clip.data(), &[4u8, 1][..]);
    Ok(())
}

#[tokio::test]
async fn test_slot_frees_after_unregister() -> Result<()> {
    let adapter = ScriptedAdapter::new();
    let registry = SessionRegistry::new(2);
    let all = sessions(&adapter, 3);

    registry.register(Arc::clone(&all[0]))?;
    registry.register(Arc::clone(&all[1]))?;
    assert!(registry.register(Arc::clone(&all[2])).is_err());

    assert!(registry.unregister(all[0].id()).is_some());
    registry.register(Arc::clone(&all[2]))?;

    let mut ids = registry.ids();
    ids.sort();
    assert_eq!(ids, vec![all[1].id().clone(), all[2].id().clone()]);
    Ok(())
}

#[tokio::test]
async fn test_independent_registries() -> Result<()> {
    let adapter = ScriptedAdapter::new();
    let first = SessionRegistry::new(1);
    let second = SessionRegistry::new(1);
    let all = sessions(&adapter, 1);

    first.register(Arc::clone(&all[0]))?;
    assert_eq!(first.count(), 1);
    assert_eq!(second.count(), 0);
    assert!(second.get(all[0].id()).is_none());
    Ok(())
}

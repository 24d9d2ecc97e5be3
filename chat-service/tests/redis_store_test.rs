//! Runs against a real Redis when `REDIS_TEST_URL` is set; skipped otherwise.

use chat_service::config::SessionConfig;
use chat_service::models::NewMessage;
use chat_service::services::{KvStore, RedisStore, SessionStore};
use std::sync::Arc;

async fn connect() -> Option<Arc<RedisStore>> {
    let Ok(url) = std::env::var("REDIS_TEST_URL") else {
        eprintln!("REDIS_TEST_URL not set; skipping Redis test");
        return None;
    };
    let store = RedisStore::new(&url).expect("valid Redis URL");
    store.connect().await.expect("Redis reachable");
    Some(Arc::new(store))
}

#[tokio::test]
async fn push_capped_trims_atomically() {
    let Some(store) = connect().await else {
        return;
    };
    let key = format!("test:capped:{}", uuid::Uuid::new_v4());

    for value in ["a", "b", "c"] {
        let evicted = store.push_capped(&key, value, 2, 60).await.unwrap();
        if value == "c" {
            assert_eq!(evicted, vec!["a".to_string()]);
        } else {
            assert!(evicted.is_empty());
        }
    }

    assert_eq!(store.lrange(&key, 0, -1).await.unwrap(), vec!["c", "b"]);
    assert!(store.del(&key).await.unwrap());
}

#[tokio::test]
async fn session_store_round_trip() {
    let Some(store) = connect().await else {
        return;
    };
    let sessions = SessionStore::new(
        store.clone(),
        SessionConfig {
            ttl_seconds: 60,
            max_sessions_per_user: 2,
            max_messages_per_session: 2,
        },
    );
    let user = format!("redis-test-{}", uuid::Uuid::new_v4());

    let session = sessions
        .create_session(&user, Some("redis".to_string()), None)
        .await
        .unwrap();
    for content in ["one", "two", "three"] {
        sessions
            .add_message(&session.id, NewMessage::user(content))
            .await
            .unwrap();
    }

    let messages = sessions.get_session_messages(&session.id, 10, 0).await.unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["two", "three"]);

    let stored = sessions.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.message_count, 2);

    assert!(sessions.delete_session(&session.id).await.unwrap());
    assert!(sessions.get_user_sessions(&user).await.unwrap().is_empty());
    store.disconnect();
}

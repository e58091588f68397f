//! Test: Cache typing - keys must be strings, values text or bytes

use dagpipe::error::{CacheError, SerializationError};
use dagpipe::persistence::{seed_cache, CacheStore, CacheValue, InMemoryCache};
use dagpipe::serialization::{JsonSerializer, Serializer};

#[tokio::test]
async fn test_non_string_key_is_rejected_and_nothing_written() {
    let cache = InMemoryCache::new();

    let err = seed_cache(&cache, "42: v\n").await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CacheError>(),
        Some(CacheError::InvalidKeyType(_))
    ));
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_non_text_value_is_rejected() {
    let cache = InMemoryCache::new();

    let err = seed_cache(&cache, "k: {nested: true}\n").await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CacheError>(),
        Some(CacheError::InvalidValueType(_))
    ));
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_text_and_bytes_keep_their_type() {
    let cache = InMemoryCache::new();
    seed_cache(&cache, "label: hello\nblob: [104, 105]\n").await.unwrap();

    let label = cache.read("label").await.unwrap().unwrap();
    let blob = cache.read("blob").await.unwrap().unwrap();

    assert!(label.is_text());
    assert_eq!(blob, CacheValue::Bytes(b"hi".to_vec()));
    assert_eq!(label.as_bytes(), b"hello");
}

#[tokio::test]
async fn test_text_cannot_be_deserialized() {
    let err = JsonSerializer
        .deserialize(&CacheValue::from("7"))
        .unwrap_err();
    assert!(matches!(err, SerializationError::InvalidTypeForDeserialization(_)));

    let value = JsonSerializer
        .deserialize(&CacheValue::from(b"7".as_slice()))
        .unwrap();
    assert_eq!(value, serde_json::json!(7));
}

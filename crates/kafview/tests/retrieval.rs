use std::time::Duration;

use futures_util::future::join;

use kafview::{
    ClusterConfig, FetchConfig, InspectError, Inspector, MemoryBroker, MessageFormat,
    RecordHeader, RetrievalRequest, TextDeserializer, TopicPartition, EMPTY_VALUE,
};

async fn seeded_broker(topic: &str, counts: &[usize]) -> MemoryBroker {
    let broker = MemoryBroker::new();
    broker.create_topic(topic, counts.len() as i32).await;
    for (partition, count) in counts.iter().enumerate() {
        for idx in 0..*count {
            let key = format!("key-{idx}");
            let value = format!("{topic}-{partition}-{idx}");
            broker
                .produce(topic, partition as i32, Some(key.as_str()), Some(value.as_bytes()))
                .await
                .expect("produce");
        }
    }
    broker
}

fn inspector(broker: &MemoryBroker) -> Inspector<MemoryBroker> {
    Inspector::new(broker.clone(), ClusterConfig::new("memory:9092"))
}

#[fluvio_future::test]
async fn test_orders_fetch_from() {
    let broker = seeded_broker("orders", &[5]).await;
    let inspector = inspector(&broker);

    let records = inspector
        .fetch_from(&TopicPartition::new("orders", 0), 2, 10, &TextDeserializer)
        .await
        .expect("fetch");

    let offsets: Vec<_> = records.iter().map(|r| r.offset).collect();
    assert_eq!(offsets, vec![2, 3, 4]);
    assert_eq!(records[0].value, "orders-0-2");
    assert_eq!(records[0].key.as_deref(), Some("key-2"));
    assert_eq!(records[0].serialized_key_size, 5);
    assert!(records.iter().all(|r| r.timestamp_delta == 0));
}

#[fluvio_future::test]
async fn test_fetch_from_returns_min_of_count_and_available() {
    let broker = seeded_broker("orders", &[20]).await;
    broker.set_max_poll_records(3).await;
    let inspector = inspector(&broker);
    let partition = TopicPartition::new("orders", 0);

    for (start, count, expected) in [(0, 5, 5), (15, 10, 5), (19, 1, 1), (7, 13, 13)] {
        let records = inspector
            .fetch_from(&partition, start, count, &TextDeserializer)
            .await
            .expect("fetch");
        assert_eq!(records.len(), expected, "start {start} count {count}");
        for (idx, record) in records.iter().enumerate() {
            assert_eq!(record.offset, start + idx as i64);
        }
    }
}

#[fluvio_future::test]
async fn test_fetch_from_zero_count_does_not_poll() {
    let broker = seeded_broker("orders", &[5]).await;
    let inspector = inspector(&broker);

    let records = inspector
        .fetch_from(&TopicPartition::new("orders", 0), 0, 0, &TextDeserializer)
        .await
        .expect("fetch");
    assert!(records.is_empty());
    assert_eq!(broker.poll_count(), 0);
}

#[fluvio_future::test]
async fn test_fetch_from_waits_through_empty_polls() {
    let broker = seeded_broker("orders", &[3]).await;
    broker.delay_polls(4).await;
    let inspector = inspector(&broker);

    let records = inspector
        .fetch_from(&TopicPartition::new("orders", 0), 0, 3, &TextDeserializer)
        .await
        .expect("fetch");
    assert_eq!(records.len(), 3);
    assert_eq!(broker.poll_count(), 5);
}

#[fluvio_future::test]
async fn test_fetch_from_truncated_partition() {
    let broker = seeded_broker("orders", &[10]).await;
    broker.truncate_before("orders", 0, 6).await.expect("truncate");
    let inspector = inspector(&broker);

    let records = inspector
        .fetch_from(&TopicPartition::new("orders", 0), 2, 3, &TextDeserializer)
        .await
        .expect("fetch");
    let offsets: Vec<_> = records.iter().map(|r| r.offset).collect();
    assert_eq!(offsets, vec![6, 7, 8]);
}

#[fluvio_future::test]
async fn test_fetch_latest_per_partition() {
    let broker = seeded_broker("payments", &[12, 7, 30]).await;
    broker.set_max_poll_records(4).await;
    let inspector = inspector(&broker);
    let count = 5;

    let records = inspector
        .fetch_latest("payments", count, &TextDeserializer)
        .await
        .expect("fetch");
    assert_eq!(records.len(), count * 3);

    let sizes = inspector.partition_sizes("payments").await.expect("sizes");
    for (id, partition) in &sizes {
        let size = partition.size.expect("size");
        let offsets: Vec<_> = records
            .iter()
            .filter(|r| r.partition == *id)
            .map(|r| r.offset)
            .collect();
        let expected: Vec<_> = (size - count as i64..size).collect();
        assert_eq!(offsets, expected, "partition {id}");
    }

    let partitions: Vec<_> = records.iter().map(|r| r.partition).collect();
    let mut sorted = partitions.clone();
    sorted.sort();
    assert_eq!(partitions, sorted);
}

#[fluvio_future::test]
async fn test_fetch_latest_short_partitions() {
    let broker = seeded_broker("payments", &[2, 0, 9]).await;
    let inspector = inspector(&broker);

    let records = inspector
        .fetch_latest("payments", 4, &TextDeserializer)
        .await
        .expect("fetch");
    let placed: Vec<_> = records.iter().map(|r| (r.partition, r.offset)).collect();
    assert_eq!(
        placed,
        vec![(0, 0), (0, 1), (2, 5), (2, 6), (2, 7), (2, 8)]
    );
}

#[fluvio_future::test]
async fn test_empty_topic() {
    let broker = seeded_broker("empty-topic", &[0]).await;
    let inspector = inspector(&broker);

    let sizes = inspector.partition_sizes("empty-topic").await.expect("sizes");
    assert_eq!(sizes[&0].first_offset, Some(0));
    assert_eq!(sizes[&0].size, Some(0));

    let polls = broker.poll_count();
    let records = inspector
        .fetch_latest("empty-topic", 10, &TextDeserializer)
        .await
        .expect("fetch");
    assert!(records.is_empty());
    assert_eq!(broker.poll_count(), polls);
}

#[fluvio_future::test]
async fn test_unknown_topic() {
    let broker = MemoryBroker::new();
    let inspector = inspector(&broker);

    let topic = inspector.topic("ghost").await.expect("topic");
    assert!(topic.partitions.is_empty());
    assert!(inspector.partition_sizes("ghost").await.expect("sizes").is_empty());
    assert!(
        inspector
            .fetch_latest("ghost", 10, &TextDeserializer)
            .await
            .expect("fetch")
            .is_empty()
    );
    assert_eq!(broker.poll_count(), 0);
}

#[fluvio_future::test]
async fn test_topology_leaders() {
    let broker = MemoryBroker::new();
    broker
        .create_topic_with_layout(
            "replicated",
            vec![
                (Some(1), vec![1, 2, 3]),
                (Some(2), vec![2, 3, 1]),
                (None, vec![3, 1, 2]),
                (Some(3), vec![3, 1, 2]),
            ],
        )
        .await;
    let inspector = inspector(&broker);

    let topic = inspector.topic("replicated").await.expect("topic");
    assert_eq!(topic.partitions.len(), 4);
    for (id, partition) in &topic.partitions {
        assert_eq!(partition.id, *id);
        let leaders = partition.replicas.iter().filter(|r| r.leader).count();
        let expected = if *id == 2 { 0 } else { 1 };
        assert_eq!(leaders, expected, "partition {id}");
        assert!(partition.replicas.iter().all(|r| r.in_sync));
    }
    // the leader node shows up again among the plain replicas
    assert_eq!(topic.partitions[&0].replicas.len(), 4);
    assert_eq!(topic.partitions[&2].replicas.len(), 3);
}

#[fluvio_future::test]
async fn test_watermarks_match_end_offsets() {
    let broker = seeded_broker("orders", &[4, 9]).await;
    broker.truncate_before("orders", 1, 3).await.expect("truncate");
    let inspector = inspector(&broker);

    let sizes = inspector.partition_sizes("orders").await.expect("sizes");
    for partition in sizes.values() {
        let first = partition.first_offset.expect("first offset");
        let size = partition.size.expect("size");
        assert!(first <= size);
    }
    assert_eq!(sizes[&1].first_offset, Some(3));
    assert_eq!(sizes[&1].record_count(), Some(6));

    // sizes are read at call time
    broker
        .produce("orders", 0, None, Some(b"late".as_slice()))
        .await
        .expect("produce");
    let sizes = inspector.partition_sizes("orders").await.expect("sizes");
    assert_eq!(sizes[&0].size, Some(5));
}

#[fluvio_future::test]
async fn test_tombstones_render_empty() {
    let broker = MemoryBroker::new();
    broker.create_topic("compacted", 1).await;
    broker
        .produce("compacted", 0, Some("user-1"), Some(b"{\"active\":true}".as_slice()))
        .await
        .expect("produce");
    broker
        .produce_with_headers(
            "compacted",
            0,
            Some("user-1"),
            None,
            vec![RecordHeader::new("reason", Some(b"gdpr".as_slice()))],
        )
        .await
        .expect("produce");
    let inspector = inspector(&broker);

    let json = MessageFormat::Json.deserializer();
    let records = inspector
        .fetch_from(&TopicPartition::new("compacted", 0), 0, 2, json.as_ref())
        .await
        .expect("fetch");
    assert_eq!(records[0].value, r#"{"active":true}"#);
    assert_eq!(records[1].value, EMPTY_VALUE);
    assert_eq!(records[1].serialized_value_size, -1);
    assert_eq!(records[1].headers[0].key, "reason");
}

#[fluvio_future::test]
async fn test_custom_deserializer() {
    let broker = seeded_broker("orders", &[2]).await;
    let inspector = inspector(&broker);

    let length = |payload: &[u8]| payload.len().to_string();
    let records = inspector
        .retrieve(&RetrievalRequest::latest("orders", 1), &length)
        .await
        .expect("fetch");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value, "10");
}

#[fluvio_future::test]
async fn test_expired_partition_returns_empty() {
    let broker = seeded_broker("orders", &[5]).await;
    broker.truncate_before("orders", 0, 5).await.expect("truncate");
    let inspector = inspector(&broker);

    let latest = inspector
        .fetch_latest("orders", 3, &TextDeserializer)
        .await
        .expect("fetch latest");
    assert!(latest.is_empty());

    let from = inspector
        .fetch_from(&TopicPartition::new("orders", 0), 0, 3, &TextDeserializer)
        .await
        .expect("fetch from");
    assert!(from.is_empty());
    assert_eq!(broker.poll_count(), 0);

    let sizes = inspector.partition_sizes("orders").await.expect("sizes");
    assert_eq!(sizes[&0].first_offset, Some(5));
    assert_eq!(sizes[&0].size, Some(5));
}

#[fluvio_future::test]
async fn test_partially_expired_partition() {
    let broker = seeded_broker("orders", &[5, 5]).await;
    broker.truncate_before("orders", 1, 4).await.expect("truncate");
    let inspector = inspector(&broker);

    let latest: Vec<_> = inspector
        .fetch_latest("orders", 3, &TextDeserializer)
        .await
        .expect("fetch latest")
        .iter()
        .map(|r| (r.partition, r.offset))
        .collect();
    assert_eq!(latest, vec![(0, 2), (0, 3), (0, 4), (1, 4)]);
}

#[fluvio_future::test]
async fn test_idle_poll_limit() {
    let broker = seeded_broker("orders", &[3]).await;
    broker.delay_polls(50).await;
    let config = ClusterConfig::new("memory").with_fetch(FetchConfig {
        idle_poll_limit: Some(5),
        ..Default::default()
    });
    let inspector = Inspector::new(broker.clone(), config);

    let records = inspector
        .fetch_from(&TopicPartition::new("orders", 0), 0, 3, &TextDeserializer)
        .await
        .expect("fetch");
    assert!(records.is_empty());
    assert_eq!(broker.poll_count(), 5);
}

#[fluvio_future::test]
async fn test_lazy_single_connection() {
    let broker = seeded_broker("orders", &[3]).await;
    let inspector = inspector(&broker);
    assert!(!inspector.session().is_connected());
    assert_eq!(broker.connect_count(), 0);

    inspector.topics(&[]).await.expect("topics");
    inspector.partition_sizes("orders").await.expect("sizes");
    inspector
        .fetch_latest("orders", 1, &TextDeserializer)
        .await
        .expect("fetch");

    assert!(inspector.session().is_connected());
    assert_eq!(broker.connect_count(), 1);
}

#[fluvio_future::test]
async fn test_connect_failure_surfaces_and_retries() {
    let broker = seeded_broker("orders", &[3]).await;
    broker.fail_connections(Some("SASL authentication failed")).await;
    let inspector = inspector(&broker);

    let result = inspector.topic("orders").await;
    assert!(matches!(
        result,
        Err(InspectError::Connect { reason, .. }) if reason.contains("SASL")
    ));

    broker.fail_connections(None).await;
    let topic = inspector.topic("orders").await.expect("topic");
    assert_eq!(topic.partitions.len(), 1);
    assert_eq!(broker.connect_count(), 2);
}

#[fluvio_future::test]
async fn test_concurrent_calls_are_serialized() {
    let broker = seeded_broker("orders", &[6, 6]).await;
    broker.set_max_poll_records(1).await;
    broker.set_poll_latency(Duration::from_millis(5)).await;
    let inspector = inspector(&broker);

    let (from, latest) = join(
        inspector.fetch_from(&TopicPartition::new("orders", 1), 0, 6, &TextDeserializer),
        inspector.fetch_latest("orders", 2, &TextDeserializer),
    )
    .await;

    let from: Vec<_> = from.expect("fetch from").iter().map(|r| r.offset).collect();
    assert_eq!(from, vec![0, 1, 2, 3, 4, 5]);

    let latest: Vec<_> = latest
        .expect("fetch latest")
        .iter()
        .map(|r| (r.partition, r.offset))
        .collect();
    assert_eq!(latest, vec![(0, 4), (0, 5), (1, 4), (1, 5)]);
    assert_eq!(broker.connect_count(), 1);
}

#[fluvio_future::test]
async fn test_topics_listing() {
    let broker = seeded_broker("orders", &[1, 1]).await;
    broker.create_topic("audit", 1).await;
    let inspector = inspector(&broker);

    let all = inspector.topics(&[]).await.expect("topics");
    assert_eq!(
        all.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["audit", "orders"]
    );
    assert_eq!(all["orders"].partitions.len(), 2);

    let one = inspector
        .topics(&["audit".to_owned()])
        .await
        .expect("topics");
    assert_eq!(one.len(), 1);
}

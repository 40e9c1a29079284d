use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use kafka_consumer::kafka::test_utils::{
    partition_list, test_message, FakeConsumerHandle, ScriptedPoll,
};
use kafka_consumer::kafka::{ConsumerSettings, KafkaConsumer};
use kafka_consumer::metrics_consts::KAFKA_CONSUMERS_LIVE;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use tokio_util::sync::CancellationToken;

const BATCHES: i64 = 50;
const BATCH_SIZE: i64 = 20;

fn new_consumer(handle: &FakeConsumerHandle) -> KafkaConsumer<FakeConsumerHandle> {
    KafkaConsumer::new(
        handle.clone(),
        ConsumerSettings::new(BATCH_SIZE as usize, Duration::ZERO),
        CancellationToken::new(),
        vec!["events".to_string()],
    )
}

#[test]
fn test_stat_snapshots_while_consuming() {
    let handle = FakeConsumerHandle::new();
    for batch in 0..BATCHES {
        let mut poll = ScriptedPoll::new();
        if batch % 10 == 0 {
            // periodic rebalances keep the reader busy with assignment churn
            poll = poll
                .revoke(partition_list(&[("events", 0)]))
                .assign(partition_list(&[("events", 0)]));
            handle.push_poll(poll);
            continue;
        }
        let first = batch * BATCH_SIZE;
        poll = poll.messages(
            (first..first + BATCH_SIZE)
                .map(|offset| Ok(test_message("events", 0, offset, "x")))
                .collect(),
        );
        handle.push_poll(poll);
    }

    let mut consumer = new_consumer(&handle);
    consumer.subscribe().unwrap();
    let stats = consumer.stats_handle();
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let stats = stats.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut last_read = 0;
            let mut last_commits = 0;
            let mut snapshots = 0u64;
            while !done.load(Ordering::Acquire) {
                let stat = stats.get_stat();
                assert!(stat.num_messages_read >= last_read);
                assert!(stat.num_commits >= last_commits);
                assert!(stat.assignments.len() <= 1);
                last_read = stat.num_messages_read;
                last_commits = stat.num_commits;
                snapshots += 1;
            }
            snapshots
        })
    };

    let mut delivered = 0;
    while handle.remaining_polls() > 0 || consumer.has_more_polled_messages() {
        if consumer.consume().unwrap().is_some() {
            delivered += 1;
            consumer.store_last_read_message_offset().unwrap();
            if !consumer.has_more_polled_messages() {
                consumer.commit().unwrap();
            }
        }
    }
    done.store(true, Ordering::Release);
    let snapshots = reader.join().unwrap();

    assert!(snapshots > 0);
    let non_empty_batches = BATCHES - BATCHES / 10;
    let expected = non_empty_batches * BATCH_SIZE;
    assert_eq!(delivered, expected);

    let stat = consumer.get_stat();
    assert_eq!(stat.num_messages_read, expected as u64);
    assert_eq!(stat.num_rebalance_revocations, (BATCHES / 10) as u64);
    // the intermediate commit before each poll finds nothing left to commit
    assert_eq!(stat.num_commits, non_empty_batches as u64);
    assert_eq!(handle.commit_calls(), non_empty_batches as usize);
    assert_eq!(handle.committed("events", 0), Some(BATCHES * BATCH_SIZE));
    assert_eq!(stat.consumer_id, FakeConsumerHandle::MEMBER_ID);
    assert!(stat.last_poll_time > 0);
}

#[test]
fn test_stat_serializes_for_monitoring() {
    let handle = FakeConsumerHandle::new();
    handle.push_poll(
        ScriptedPoll::new()
            .assign(partition_list(&[("events", 3)]))
            .messages(vec![Ok(test_message("events", 3, 99, "x"))]),
    );
    let mut consumer = new_consumer(&handle);
    consumer.subscribe().unwrap();
    assert!(consumer.consume().unwrap().is_some());

    let json = serde_json::to_value(consumer.get_stat()).unwrap();
    assert_eq!(json["consumer_id"], FakeConsumerHandle::MEMBER_ID);
    assert_eq!(json["assignments"][0]["topic"], "events");
    assert_eq!(json["assignments"][0]["partition_id"], 3);
    assert_eq!(json["assignments"][0]["current_offset"], 100);
    assert_eq!(json["num_messages_read"], 1);
}

fn live_consumers(recorder: &DebuggingRecorder) -> Option<f64> {
    recorder
        .snapshotter()
        .snapshot()
        .into_vec()
        .into_iter()
        .find(|(key, _, _, _)| key.key().name() == KAFKA_CONSUMERS_LIVE)
        .and_then(|(_, _, _, value)| match value {
            DebugValue::Gauge(v) => Some(v.into_inner()),
            _ => None,
        })
}

#[test]
fn test_live_consumer_gauge_follows_lifetimes() {
    let recorder = DebuggingRecorder::new();

    metrics::with_local_recorder(&recorder, || {
        let handle = FakeConsumerHandle::new();
        let first = new_consumer(&handle);
        let second = new_consumer(&handle);
        assert_eq!(live_consumers(&recorder), Some(2.0));

        drop(first);
        assert_eq!(live_consumers(&recorder), Some(1.0));

        drop(second);
        assert_eq!(live_consumers(&recorder), Some(0.0));
    });
}

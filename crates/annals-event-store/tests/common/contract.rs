//! Behavior every `EventRepository` must show, written once against the trait
//! and run against each implementation.

use annals_core::error::ErrorKind;
use annals_core::repository::EventRepository;
use annals_core::search::{Field, Operation, SearchQuery};

use super::{AGGREGATE_TYPE, make_event, make_unchecked_event, new_aggregate_id, stream};

const CONCURRENT_ROUNDS: u64 = 20;

// --- push ---

pub async fn push_empty_batch_is_noop(repo: &dyn EventRepository) {
    repo.push(&mut []).await.unwrap();

    let events = repo.filter(&SearchQuery::events()).await.unwrap();
    assert!(events.is_empty());
}

pub async fn push_assigns_server_fields(repo: &dyn EventRepository) {
    let aggregate_id = new_aggregate_id();
    let mut events = [make_event(&aggregate_id, 0)];

    repo.push(&mut events).await.unwrap();

    let pushed = &events[0];
    assert!(pushed.id.is_some());
    assert_eq!(pushed.sequence, 1);
    assert_eq!(pushed.previous_sequence, 0);
    assert!(pushed.creation_date.is_some());

    let loaded = repo.filter(&stream(&aggregate_id)).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, pushed.id);
    assert_eq!(loaded[0].sequence, 1);
    assert_eq!(loaded[0].creation_date, pushed.creation_date);
    assert_eq!(loaded[0].data, Some(serde_json::json!({"key": "value"})));
    assert_eq!(loaded[0].editor_service, "management");
    assert_eq!(loaded[0].version, "v1");
}

// --- optimistic concurrency ---

pub async fn stale_previous_sequence_is_rejected(repo: &dyn EventRepository) {
    let aggregate_id = new_aggregate_id();
    repo.push(&mut [make_event(&aggregate_id, 0)]).await.unwrap();

    let mut next = [make_event(&aggregate_id, 1)];
    repo.push(&mut next).await.unwrap();
    assert_eq!(next[0].sequence, 2);
    assert_eq!(next[0].previous_sequence, 1);

    let mut stale = [make_event(&aggregate_id, 1)];
    let err = repo.push(&mut stale).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(err.code(), "APPEND-CONFLICT");
    assert_eq!(stale[0].sequence, 0);

    let loaded = repo.filter(&stream(&aggregate_id)).await.unwrap();
    assert_eq!(loaded.len(), 2);
}

pub async fn first_event_with_previous_sequence_is_rejected(repo: &dyn EventRepository) {
    let aggregate_id = new_aggregate_id();

    let err = repo
        .push(&mut [make_event(&aggregate_id, 3)])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
}

pub async fn unchecked_push_ignores_previous_sequence(repo: &dyn EventRepository) {
    let aggregate_id = new_aggregate_id();
    repo.push(&mut [make_event(&aggregate_id, 0)]).await.unwrap();

    let mut unchecked = make_unchecked_event(&aggregate_id);
    unchecked.previous_sequence = 42;
    repo.push(std::slice::from_mut(&mut unchecked)).await.unwrap();

    assert_eq!(unchecked.sequence, 2);
    assert_eq!(unchecked.previous_sequence, 0);

    let loaded = repo.filter(&stream(&aggregate_id)).await.unwrap();
    assert!(loaded[0].check_previous_sequence);
    assert!(!loaded[1].check_previous_sequence);
}

pub async fn concurrent_checked_pushes_admit_one(repo: &dyn EventRepository) {
    let aggregate_id = new_aggregate_id();
    let mut a = [make_event(&aggregate_id, 0)];
    let mut b = [make_event(&aggregate_id, 0)];

    let (ra, rb) = tokio::join!(repo.push(&mut a), repo.push(&mut b));

    let outcomes = [ra, rb];
    let succeeded = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    let failure = outcomes.into_iter().find_map(Result::err).unwrap();
    assert_eq!(failure.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(failure.code(), "APPEND-CONFLICT");
}

pub async fn concurrent_unchecked_pushes_all_succeed(repo: &dyn EventRepository) {
    let aggregate_id = new_aggregate_id();

    for _ in 0..CONCURRENT_ROUNDS {
        let mut a = [make_unchecked_event(&aggregate_id)];
        let mut b = [make_unchecked_event(&aggregate_id)];

        let (ra, rb) = tokio::join!(repo.push(&mut a), repo.push(&mut b));

        ra.unwrap();
        rb.unwrap();
    }

    let loaded = repo.filter(&stream(&aggregate_id)).await.unwrap();
    let sequences: Vec<u64> = loaded.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, (1..=2 * CONCURRENT_ROUNDS).collect::<Vec<_>>());
}

pub async fn crossing_multi_stream_batches_both_commit(repo: &dyn EventRepository) {
    let agg_a = new_aggregate_id();
    let agg_b = new_aggregate_id();

    for _ in 0..CONCURRENT_ROUNDS {
        let mut forward = [make_unchecked_event(&agg_a), make_unchecked_event(&agg_b)];
        let mut backward = [make_unchecked_event(&agg_b), make_unchecked_event(&agg_a)];

        let (rf, rb) = tokio::join!(repo.push(&mut forward), repo.push(&mut backward));

        rf.unwrap();
        rb.unwrap();
    }

    for aggregate_id in [&agg_a, &agg_b] {
        let latest = repo
            .latest_sequence(&SearchQuery::max_sequence().aggregate(AGGREGATE_TYPE, aggregate_id))
            .await
            .unwrap();
        assert_eq!(latest, 2 * CONCURRENT_ROUNDS);
    }
}

// --- sequences ---

pub async fn sequential_pushes_produce_gapless_sequences(repo: &dyn EventRepository) {
    let aggregate_id = new_aggregate_id();

    for expected in 1..=5_u64 {
        let mut events = [make_event(&aggregate_id, expected - 1)];
        repo.push(&mut events).await.unwrap();
        assert_eq!(events[0].sequence, expected);
    }

    let loaded = repo.filter(&stream(&aggregate_id)).await.unwrap();
    let sequences: Vec<u64> = loaded.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
}

pub async fn streams_are_sequenced_independently(repo: &dyn EventRepository) {
    let mut events = [
        make_event(&new_aggregate_id(), 0),
        make_event(&new_aggregate_id(), 0),
    ];

    repo.push(&mut events).await.unwrap();

    assert_eq!(events[0].sequence, 1);
    assert_eq!(events[1].sequence, 1);
}

// --- batches ---

pub async fn chained_batch_assigns_consecutive_sequences(repo: &dyn EventRepository) {
    let aggregate_id = new_aggregate_id();
    let first = make_event(&aggregate_id, 0);
    let mut second = make_event(&aggregate_id, 0);
    second.previous_event = Some(0);
    let mut events = [first, second];

    repo.push(&mut events).await.unwrap();

    assert_eq!(events[0].sequence, 1);
    assert_eq!(events[1].sequence, events[0].sequence + 1);
    assert_eq!(events[1].previous_sequence, events[0].sequence);
}

pub async fn mismatched_chain_fails_whole_batch(repo: &dyn EventRepository) {
    let first = make_event(&new_aggregate_id(), 0);
    let mut second = make_event(&new_aggregate_id(), 0);
    second.previous_event = Some(0);

    let err = repo.push(&mut [first, second]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    let loaded = repo.filter(&SearchQuery::events()).await.unwrap();
    assert!(loaded.is_empty());
}

pub async fn failed_event_rolls_back_whole_batch(repo: &dyn EventRepository) {
    let aggregate_id = new_aggregate_id();
    let mut events = [
        make_event(&aggregate_id, 0),
        make_event(&new_aggregate_id(), 0),
        make_event(&aggregate_id, 7),
    ];

    let err = repo.push(&mut events).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    let loaded = repo.filter(&SearchQuery::events()).await.unwrap();
    assert!(loaded.is_empty());
    let latest = repo
        .latest_sequence(&SearchQuery::max_sequence())
        .await
        .unwrap();
    assert_eq!(latest, 0);
}

// --- filter ---

pub async fn filter_in_set_and_latest_sequence(repo: &dyn EventRepository) {
    let aggregate_id = new_aggregate_id();
    for (previous, user) in (0_u64..).zip(["alice", "bob", "carol"]) {
        let mut event = make_event(&aggregate_id, previous);
        event.editor_user = user.to_string();
        repo.push(&mut [event]).await.unwrap();
    }

    let query =
        stream(&aggregate_id).filter(Field::EditorUser, Operation::In, vec!["alice", "carol"]);
    let events = repo.filter(&query).await.unwrap();

    let users: Vec<&str> = events.iter().map(|e| e.editor_user.as_str()).collect();
    assert_eq!(users, vec!["alice", "carol"]);

    let latest = repo
        .latest_sequence(&SearchQuery::max_sequence().aggregate(AGGREGATE_TYPE, &aggregate_id))
        .await
        .unwrap();
    assert_eq!(latest, 3);
}

pub async fn empty_in_set_returns_no_rows(repo: &dyn EventRepository) {
    repo.push(&mut [make_event(&new_aggregate_id(), 0)])
        .await
        .unwrap();

    let query =
        SearchQuery::events().filter(Field::EditorUser, Operation::In, Vec::<String>::new());
    let events = repo.filter(&query).await.unwrap();

    assert!(events.is_empty());
}

pub async fn filter_sequence_range_descending_with_limit(repo: &dyn EventRepository) {
    let aggregate_id = new_aggregate_id();
    for previous in 0..5_u64 {
        repo.push(&mut [make_event(&aggregate_id, previous)])
            .await
            .unwrap();
    }

    let query = stream(&aggregate_id)
        .filter(Field::Sequence, Operation::Greater, 1_u64)
        .descending()
        .limit(2);
    let events = repo.filter(&query).await.unwrap();

    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![5, 4]);
}

pub async fn latest_sequence_of_unknown_aggregate_is_zero(repo: &dyn EventRepository) {
    let latest = repo
        .latest_sequence(&SearchQuery::max_sequence().aggregate(AGGREGATE_TYPE, "missing"))
        .await
        .unwrap();

    assert_eq!(latest, 0);
}

pub async fn mismatched_query_intent_is_invalid_argument(repo: &dyn EventRepository) {
    let err = repo
        .filter(&SearchQuery::max_sequence())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = repo
        .latest_sequence(&SearchQuery::events())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

pub async fn untranslatable_filter_is_invalid_argument(repo: &dyn EventRepository) {
    let query = SearchQuery::events().filter(Field::Sequence, Operation::In, "1");

    let err = repo.filter(&query).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

// --- payload serialization ---

pub async fn complex_json_payload_round_trip(repo: &dyn EventRepository) {
    let aggregate_id = new_aggregate_id();
    let complex_payload = serde_json::json!({
        "nested": {"key": "value", "number": 42},
        "array": [1, "two", null, true, false],
        "null_field": null,
        "empty_object": {},
        "empty_array": []
    });
    let mut event = make_event(&aggregate_id, 0);
    event.data = Some(complex_payload.clone());
    let mut without_payload = make_event(&aggregate_id, 0);
    without_payload.data = None;
    without_payload.previous_event = Some(0);

    repo.push(&mut [event, without_payload]).await.unwrap();

    let loaded = repo.filter(&stream(&aggregate_id)).await.unwrap();
    assert_eq!(loaded[0].data, Some(complex_payload));
    assert_eq!(loaded[1].data, None);
}

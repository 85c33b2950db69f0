use conv_core::MessageId;
use conv_dispatcher::{Action, ActionOutcome, AddMessageParams, BranchOffOutcome, BranchOffParams, DeleteBranchParams};
use conv_test_support::dispatcher_with_capacity;

async fn add(
    dispatcher: &conv_dispatcher::Dispatcher,
    thread_id: conv_core::ThreadId,
    content: &str,
    prev: Option<MessageId>,
    batch_size: usize,
) -> MessageId {
    let outcome = dispatcher
        .dispatch(Action::AddMessage(AddMessageParams {
            thread_id,
            content: content.to_string(),
            prev_message_id: prev,
            trigger_summarization: true,
            summary_batch_size: batch_size,
        }))
        .await
        .unwrap();
    match outcome {
        ActionOutcome::MessageId(id) => id,
        other => panic!("expected MessageId, got {other:?}"),
    }
}

#[tokio::test]
async fn linear_chain_summarizes_once_a_topic_shift_is_detected() {
    let (dispatcher, store, thread) = dispatcher_with_capacity(4).await.unwrap();

    let a = add(&dispatcher, thread, "Message A", None, 1).await;
    let b = add(&dispatcher, thread, "Message B", Some(a), 1).await;
    let _c = add(&dispatcher, thread, "new Message C", Some(b), 1).await;

    let summaries = store.fetch_summaries(thread).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].start_message_id, a);
    assert_eq!(summaries[0].end_message_id, b);
}

#[tokio::test]
async fn batch_size_gate_suppresses_summarization_until_threshold_and_forking_leaves_it_unchanged() {
    let (dispatcher, store, thread) = dispatcher_with_capacity(4).await.unwrap();

    let m1 = add(&dispatcher, thread, "new one", None, 2).await;
    let m2 = add(&dispatcher, thread, "new two", Some(m1), 2).await;
    let _m3 = add(&dispatcher, thread, "new three", Some(m2), 2).await;

    let summaries = store.fetch_summaries(thread).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].start_message_id, m1);
    assert_eq!(summaries[0].end_message_id, m2);

    // A fork off of m2 must not disturb the existing summary.
    let _m4 = add(&dispatcher, thread, "new four", Some(m2), 2).await;
    let summaries_after_fork = store.fetch_summaries(thread).await.unwrap();
    assert_eq!(summaries_after_fork, summaries);
}

#[tokio::test]
async fn branch_off_splits_the_enclosing_summary_at_the_fork_point() {
    let (dispatcher, store, thread) = dispatcher_with_capacity(4).await.unwrap();

    let m1 = add(&dispatcher, thread, "new one", None, 2).await;
    let m2 = add(&dispatcher, thread, "new two", Some(m1), 2).await;
    let _m3 = add(&dispatcher, thread, "new three", Some(m2), 2).await;
    let _m4 = add(&dispatcher, thread, "new four", Some(m1), 2).await;

    let outcome = dispatcher
        .dispatch(Action::BranchOff(BranchOffParams {
            thread_id: thread,
            branch_off_message_id: m1,
        }))
        .await
        .unwrap();

    let (pre, post) = match outcome {
        ActionOutcome::BranchOff(BranchOffOutcome::Split { pre, post }) => (pre, post),
        other => panic!("expected a split, got {other:?}"),
    };

    let summaries = store.fetch_summaries(thread).await.unwrap();
    assert_eq!(summaries.len(), 2);
    let pre_summary = summaries.iter().find(|s| s.id == pre).unwrap();
    let post_summary = summaries.iter().find(|s| s.id == post).unwrap();
    assert_eq!(pre_summary.start_message_id, m1);
    assert_eq!(pre_summary.end_message_id, m1);
    assert_eq!(post_summary.start_message_id, m2);
    assert_eq!(post_summary.end_message_id, m2);
}

#[tokio::test]
async fn branch_off_at_an_existing_summary_end_is_a_no_op() {
    let (dispatcher, _store, thread) = dispatcher_with_capacity(4).await.unwrap();

    let a = add(&dispatcher, thread, "new A", None, 1).await;
    let b = add(&dispatcher, thread, "new B", Some(a), 1).await;

    let outcome = dispatcher
        .dispatch(Action::BranchOff(BranchOffParams {
            thread_id: thread,
            branch_off_message_id: b,
        }))
        .await
        .unwrap();

    assert!(matches!(outcome, ActionOutcome::BranchOff(BranchOffOutcome::NoSplit)));
}

#[tokio::test]
async fn delete_branch_removes_the_subtree_and_the_next_get_reflects_it() {
    let (dispatcher, store, thread) = dispatcher_with_capacity(4).await.unwrap();

    let m1 = add(&dispatcher, thread, "one", None, 999).await;
    let m2 = add(&dispatcher, thread, "two", Some(m1), 999).await;
    let _m3 = add(&dispatcher, thread, "three", Some(m2), 999).await;
    let m4 = add(&dispatcher, thread, "four", Some(m2), 999).await;

    dispatcher
        .dispatch(Action::DeleteBranch(DeleteBranchParams {
            thread_id: thread,
            branch_start_message_id: m4,
        }))
        .await
        .unwrap();

    let remaining = store.fetch_messages(thread).await.unwrap();
    assert_eq!(remaining.len(), 3);
    assert!(remaining.iter().all(|m| m.id != m4));

    let links = store.fetch_links(thread).await.unwrap();
    assert!(links
        .iter()
        .all(|l| l.previous_message_id != m2 || l.next_message_id != m4));
}

#[tokio::test]
async fn delete_branch_leaves_no_dangling_summary_when_the_branch_was_summarized() {
    let (dispatcher, store, thread) = dispatcher_with_capacity(4).await.unwrap();

    let a = add(&dispatcher, thread, "new A", None, 1).await;
    let _b = add(&dispatcher, thread, "new B", Some(a), 1).await;
    let summaries_before = store.fetch_summaries(thread).await.unwrap();
    assert_eq!(summaries_before.len(), 1);

    dispatcher
        .dispatch(Action::DeleteBranch(DeleteBranchParams {
            thread_id: thread,
            branch_start_message_id: a,
        }))
        .await
        .unwrap();

    let summaries_after = store.fetch_summaries(thread).await.unwrap();
    assert!(summaries_after.is_empty());
}

#[tokio::test]
async fn dispatch_named_rejects_unknown_actions() {
    let (dispatcher, _store, _thread) = dispatcher_with_capacity(4).await.unwrap();
    let err = dispatcher
        .dispatch_named("reticulate_splines", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, conv_error::Error::UnsupportedAction(_)));
}

#[tokio::test]
async fn dispatch_named_add_message_round_trips_through_json_payload() {
    let (dispatcher, _store, thread) = dispatcher_with_capacity(4).await.unwrap();
    let outcome = dispatcher
        .dispatch_named(
            "add_message",
            serde_json::json!({
                "thread_id": thread,
                "content": "hello",
                "prev_message_id": null,
                "trigger_summarization": false,
                "summary_batch_size": 1,
            }),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, ActionOutcome::MessageId(_)));
}

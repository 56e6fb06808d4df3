//! Kernel integration tests. Modules exchange messages on separate tasks.

use beehive_core::{Content, Kernel, Message, MessageId, Operation};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// Helper: kernel with the given modules already added.
async fn kernel_with(modules: &[&str]) -> Arc<Kernel> {
    let kernel = Arc::new(Kernel::default());
    for module in modules {
        kernel.add_module(module).await;
    }
    kernel
}

#[tokio::test]
async fn test_sync_round_trip_between_modules() {
    let kernel = kernel_with(&["A", "B"]).await;

    // module B: receive one request, answer "ok"
    let b = {
        let kernel = kernel.clone();
        tokio::spawn(async move {
            let req = kernel.receive("B").await.unwrap();
            assert_eq!(req.id().as_str(), "m1");
            kernel.send_resp(Message::new_response(&req, "ok")).await;
        })
    };

    let m1 = Message::builder()
        .id(MessageId::from_string("m1".to_string()).unwrap())
        .route("A", "")
        .resource_operation("pod", Operation::Query)
        .build();

    let started = tokio::time::Instant::now();
    let resp = kernel
        .send_sync("B", m1, Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(resp.content(), &Content::Text("ok".to_string()));
    assert_eq!(resp.parent_id().map(|p| p.as_str()), Some("m1"));
    assert!(started.elapsed() < Duration::from_secs(2));
    b.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_sync_call_to_silent_module_times_out() {
    let kernel = kernel_with(&["A", "B"]).await;

    let started = tokio::time::Instant::now();
    let err = kernel
        .send_sync("B", Message::new(None), Duration::from_secs(2))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_error_reply_escalates_to_grandparent() {
    let kernel = kernel_with(&["A", "B", "C"]).await;

    // C fails and reports the error to whoever is waiting on the request's parent
    let c = {
        let kernel = kernel.clone();
        tokio::spawn(async move {
            let req = kernel.receive("C").await.unwrap();
            kernel.send_resp(Message::new_error(&req, "backend down")).await;
        })
    };
    // B forwards A's request to C, parenting the forwarded message on A's request
    let b = {
        let kernel = kernel.clone();
        tokio::spawn(async move {
            let from_a = kernel.receive("B").await.unwrap();
            let forward = Message::new(Some(from_a.id().clone()))
                .to_builder()
                .route("B", "")
                .resource_operation("pod", Operation::Query)
                .build();
            kernel.send("C", forward).await.unwrap();
        })
    };

    let resp = kernel
        .send_sync("B", Message::new(None), Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(resp.operation(), Some(Operation::Error));
    assert_eq!(resp.content().as_text(), Some("backend down"));
    b.await.unwrap();
    c.await.unwrap();
}

#[tokio::test]
async fn test_group_copies_are_independent() {
    let kernel = kernel_with(&["twin", "meta", "hub"]).await;
    for module in ["twin", "meta", "hub"] {
        kernel.add_module_group(module, "edge").await.unwrap();
    }

    let original = Message::builder()
        .route("cloud", "edge")
        .resource_operation("configmap", Operation::Update)
        .content(serde_json::json!({"replicas": 3}))
        .build();
    assert_eq!(kernel.send_to_group("edge", original.clone()).await.unwrap(), 3);

    let twin_copy = kernel.receive("twin").await.unwrap();
    let meta_copy = kernel.receive("meta").await.unwrap();

    // "mutate" one recipient's copy by deriving from it
    let changed = twin_copy
        .to_builder()
        .content(serde_json::json!({"replicas": 0}))
        .build();

    assert_eq!(meta_copy.content(), original.content());
    assert_eq!(twin_copy.content(), original.content());
    assert_ne!(changed.content(), meta_copy.content());
    assert_eq!(meta_copy.parent_id(), original.parent_id());
}

#[tokio::test]
async fn test_group_broadcast_skips_vanished_member() {
    let kernel = kernel_with(&["a", "b"]).await;
    kernel.add_module_group("a", "edge").await.unwrap();
    kernel.add_module_group("b", "edge").await.unwrap();
    kernel.cleanup("a").await;

    assert_eq!(kernel.send_to_group("edge", Message::new(None)).await.unwrap(), 1);
    assert_eq!(kernel.mailbox_len("b").await.unwrap(), 1);
}

#[tokio::test]
async fn test_group_sync_with_all_members_answering() {
    let members = ["m0", "m1", "m2", "m3"];
    let kernel = kernel_with(&members).await;
    for member in members {
        kernel.add_module_group(member, "all").await.unwrap();
        let kernel = kernel.clone();
        tokio::spawn(async move {
            while let Ok(req) = kernel.receive(member).await {
                kernel.send_resp(Message::new_response(&req, member)).await;
            }
        });
    }

    let responses = kernel
        .send_to_group_sync("all", Message::new(None), Duration::from_secs(2))
        .await
        .unwrap();
    let answered: Vec<_> = responses
        .iter()
        .filter_map(|r| r.content().as_text())
        .collect();
    assert_eq!(answered, members.to_vec());

    kernel.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_releases_many_waiters() {
    let names: Vec<String> = (0..32).map(|i| format!("module-{i}")).collect();
    let kernel = Arc::new(Kernel::default());
    for name in &names {
        kernel.add_module(name).await;
    }

    let mut waiters = Vec::new();
    for name in names.iter().cloned() {
        let kernel = kernel.clone();
        waiters.push(tokio::spawn(async move { kernel.receive(&name).await }));
    }
    for name in names.iter().take(8).cloned() {
        let kernel = kernel.clone();
        waiters.push(tokio::spawn(async move {
            kernel
                .send_sync(&name, Message::new(None), Duration::from_secs(60))
                .await
        }));
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    kernel.cancel();

    for waiter in waiters {
        let outcome = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter hung after cancel")
            .unwrap();
        // a receiver may have picked up a sync request before the cancel
        if let Err(err) = outcome {
            assert!(err.is_cancelled(), "unexpected error: {err}");
        }
    }
    assert_eq!(kernel.pending_calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_senders_keep_per_sender_order() {
    let kernel = kernel_with(&["sink"]).await;
    let senders = 4;
    let per_sender = 200;

    let mut handles = Vec::new();
    for s in 0..senders {
        let kernel = kernel.clone();
        handles.push(tokio::spawn(async move {
            for seq in 0..per_sender {
                let msg = Message::builder()
                    .source(format!("sender-{s}"))
                    .content(serde_json::json!(seq))
                    .build();
                kernel.send("sink", msg).await.unwrap();
            }
        }));
    }

    let mut last_seen = vec![-1_i64; senders];
    for _ in 0..senders * per_sender {
        let msg = kernel.receive("sink").await.unwrap();
        let sender: usize = msg.source().trim_start_matches("sender-").parse().unwrap();
        let seq: i64 = msg.content().decode().unwrap();
        assert!(seq > last_seen[sender], "out of order from sender {sender}");
        last_seen[sender] = seq;
    }
    for handle in handles {
        handle.await.unwrap();
    }
}

proptest! {
    #[test]
    fn prop_mailbox_is_fifo(payloads in proptest::collection::vec(any::<u32>(), 0..64)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let received = rt.block_on(async {
            let kernel = kernel_with(&["m"]).await;
            for p in &payloads {
                let msg = Message::builder().content(serde_json::json!(p)).build();
                kernel.send("m", msg).await.unwrap();
            }
            let mut out = Vec::new();
            for _ in 0..payloads.len() {
                let msg = kernel.receive("m").await.unwrap();
                out.push(msg.content().decode::<u32>().unwrap());
            }
            out
        });
        prop_assert_eq!(received, payloads);
    }

    #[test]
    fn prop_derivations_keep_correlation(text in ".*", with_parent in any::<bool>()) {
        let parent = with_parent.then(MessageId::new);
        let req = Message::new(parent.clone());

        let copy = req.clone_with_new_id();
        prop_assert_ne!(copy.id(), req.id());
        prop_assert_eq!(copy.parent_id(), req.parent_id());

        let resp = Message::new_response(&req, text.clone());
        prop_assert_eq!(resp.parent_id(), Some(req.id()));
        prop_assert_eq!(resp.content().as_text(), Some(text.as_str()));

        let err = Message::new_error(&req, text);
        prop_assert_eq!(err.parent_id(), parent.as_ref());
    }
}

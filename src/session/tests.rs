use std::net::SocketAddr;
use std::time::Duration;

use super::*;
use crate::codec::BerCodec;
use crate::error::ErrorStatus;
use crate::message::Security;
use crate::oid;
use crate::oid_table::OidTable;
use crate::pdu::Pdu;
use crate::transport::{MockTransport, Transport};
use super::dispatcher::{DispatchSettings, Dispatcher};
use super::id::IdAllocator;

pub(crate) fn target() -> SocketAddr {
    "192.0.2.1:161".parse().unwrap()
}

/// 1.3.6.1.2.1.1.{1..=n}.0 => INTEGER i
pub(crate) fn system_table(n: u32) -> OidTable<Value> {
    (1..=n)
        .map(|i| (oid!(1, 3, 6, 1, 2, 1, 1, i, 0), Value::Integer(i as i32)))
        .collect()
}

pub(crate) async fn session_over(mock: &MockTransport, version: Version, retries: u32) -> Session {
    Session::community("192.0.2.1", b"public")
        .version(version)
        .retries(retries)
        .timeout(Duration::from_secs(1))
        .build_with_transport(mock.clone())
        .await
        .unwrap()
}

pub(crate) async fn wait_for_sent(mock: &MockTransport, count: usize) {
    while mock.sent_count() < count {
        tokio::task::yield_now().await;
    }
}

fn reply_to(request: &Message, value: Value) -> Message {
    let oid = request.pdu.varbinds[0].oid.clone();
    request.response(vec![VarBind::new(oid, value)])
}

#[tokio::test(start_paused = true)]
async fn test_get_returns_agent_reply() {
    let mock = MockTransport::new();
    mock.respond_from_table(system_table(3));
    let session = session_over(&mock, Version::V2c, 1).await;

    let reply = session.get(&oid!(1, 3, 6, 1, 2, 1, 1, 2, 0)).await.unwrap();
    assert_eq!(reply.pdu.pdu_type, PduType::Response);
    assert_eq!(reply.pdu.varbinds[0].value, Value::Integer(2));

    let sent = mock.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].version, Version::V2c);
    assert_eq!(sent[0].community_string().unwrap().as_ref(), b"public");
    assert_eq!(sent[0].pdu.pdu_type, PduType::GetRequest);
    assert_eq!(sent[0].pdu.varbinds[0].value, Value::Null);
    assert_eq!(sent[0].pdu.request_id, reply.pdu.request_id);
    assert_eq!(mock.sent()[0].1, target());
    assert_eq!(session.in_flight().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_replies_reach_their_callers() {
    let mock = MockTransport::new();
    let session = session_over(&mock, Version::V2c, 0).await;

    let handles: Vec<_> = (1..=3u32)
        .map(|i| {
            let session = session.clone();
            tokio::spawn(async move { session.get(&oid!(1, 3, 6, 1, 2, 1, 1, i, 0)).await })
        })
        .collect();
    wait_for_sent(&mock, 3).await;

    // Answer in reverse order of sending.
    for request in mock.sent_messages().iter().rev() {
        let arc = request.pdu.varbinds[0].oid.arcs()[7];
        mock.inject_message(&reply_to(request, Value::Integer(arc as i32 * 100)), target());
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let reply = handle.await.unwrap().unwrap();
        let expected = oid!(1, 3, 6, 1, 2, 1, 1, i as u32 + 1, 0);
        assert_eq!(reply.pdu.varbinds[0].oid, expected);
        assert_eq!(
            reply.pdu.varbinds[0].value,
            Value::Integer((i as i32 + 1) * 100)
        );
    }
    assert_eq!(session.in_flight().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_request_id_is_ignored() {
    let mock = MockTransport::new();
    let session = session_over(&mock, Version::V2c, 0).await;

    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await })
    };
    wait_for_sent(&mock, 1).await;

    let request = &mock.sent_messages()[0];
    let mut stray = reply_to(request, Value::Integer(1));
    stray.pdu.request_id = request.pdu.request_id.wrapping_add(1);
    mock.inject_message(&stray, target());
    tokio::task::yield_now().await;

    assert_eq!(session.in_flight().await.unwrap(), 1);
    assert!(!pending.is_finished());

    mock.inject_message(&reply_to(request, Value::Integer(7)), target());
    let reply = pending.await.unwrap().unwrap();
    assert_eq!(reply.pdu.varbinds[0].value, Value::Integer(7));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_after_all_retries() {
    let mock = MockTransport::new();
    let session = session_over(&mock, Version::V2c, 2).await;

    let err = session
        .get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0))
        .await
        .unwrap_err();
    match err {
        Error::Timeout {
            target: t,
            request_id,
            retries,
            ..
        } => {
            assert_eq!(t, Some(target()));
            assert_eq!(retries, 2);
            assert_eq!(request_id, mock.sent_messages()[0].pdu.request_id);
        }
        other => panic!("expected timeout, got {other:?}"),
    }

    // First send plus two retransmissions of identical bytes.
    let sent = mock.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|(data, _)| *data == sent[0].0));
    assert_eq!(session.in_flight().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_lost_request() {
    let mock = MockTransport::new();
    let mut table = system_table(1);
    let mut seen = 0;
    mock.respond_with(move |request| {
        seen += 1;
        (seen > 1).then(|| {
            Message::new(
                request.version,
                request.security.clone(),
                table.answer(request.version, &request.pdu),
            )
        })
    });
    let session = session_over(&mock, Version::V2c, 1).await;

    let reply = session.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.unwrap();
    assert_eq!(reply.pdu.varbinds[0].value, Value::Integer(1));
    assert_eq!(mock.sent_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_caller_stops_retransmission() {
    let mock = MockTransport::new();
    let session = session_over(&mock, Version::V2c, 3).await;

    let attempt = tokio::time::timeout(
        Duration::from_millis(500),
        session.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)),
    )
    .await;
    assert!(attempt.is_err());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(mock.sent_count(), 1);
    assert_eq!(session.in_flight().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_close_fails_pending_and_later_calls() {
    let mock = MockTransport::new();
    let session = session_over(&mock, Version::V2c, 1).await;

    let handles: Vec<_> = (1..=3u32)
        .map(|i| {
            let session = session.clone();
            tokio::spawn(async move { session.get(&oid!(1, 3, 6, 1, 2, 1, 1, i, 0)).await })
        })
        .collect();
    wait_for_sent(&mock, 3).await;

    session.close().await;
    assert!(session.is_closed());
    for handle in handles {
        assert!(handle.await.unwrap().unwrap_err().is_closed());
    }

    let err = session.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.unwrap_err();
    assert!(err.is_closed());
    assert!(session.in_flight().await.unwrap_err().is_closed());
    assert_eq!(mock.sent_count(), 3);

    // Idempotent.
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_datagrams_are_dropped() {
    let mock = MockTransport::new();
    mock.respond_from_table(system_table(1));
    let session = session_over(&mock, Version::V2c, 0).await;

    mock.inject(&b"\x30\x03\x02\x01"[..], target());
    mock.inject(&b"garbage"[..], target());

    let reply = session.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.unwrap();
    assert_eq!(reply.pdu.varbinds[0].value, Value::Integer(1));
    assert!(!session.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_reply_from_other_address_is_accepted() {
    let mock = MockTransport::new();
    let session = session_over(&mock, Version::V2c, 0).await;

    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await })
    };
    wait_for_sent(&mock, 1).await;

    let request = &mock.sent_messages()[0];
    mock.inject_message(
        &reply_to(request, Value::Integer(1)),
        "192.0.2.99:161".parse().unwrap(),
    );
    assert!(pending.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_fails_only_that_request() {
    let mock = MockTransport::new();
    mock.respond_from_table(system_table(1));
    let session = session_over(&mock, Version::V2c, 1).await;

    mock.fail_sends(1);
    let err = session.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.unwrap_err();
    assert!(matches!(err, Error::Io { target: Some(t), .. } if t == target()));

    assert!(session.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.is_ok());
    assert_eq!(session.in_flight().await.unwrap(), 0);
    assert!(!session.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_receive_error_closes_session() {
    let mock = MockTransport::new();
    let session = session_over(&mock, Version::V2c, 1).await;

    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await })
    };
    wait_for_sent(&mock, 1).await;

    mock.inject_error(std::io::Error::other("interface down"));
    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Io { .. }));

    session.close().await;
    assert!(session.is_closed());
    assert!(session.get(&oid!(1, 3, 6, 1)).await.unwrap_err().is_closed());
    assert_eq!(mock.sent_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_peer_does_not_close_session() {
    let mock = MockTransport::new();
    let session = session_over(&mock, Version::V2c, 1).await;
    let healthy: SocketAddr = "198.51.100.7:161".parse().unwrap();

    let pending = {
        let session = session.retarget(healthy);
        tokio::spawn(async move { session.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await })
    };
    wait_for_sent(&mock, 1).await;

    // ICMP port unreachable from some other agent.
    mock.inject_error(std::io::ErrorKind::ConnectionReset.into());
    tokio::task::yield_now().await;
    assert!(!session.is_closed());
    assert_eq!(session.in_flight().await.unwrap(), 1);

    let request = &mock.sent_messages()[0];
    mock.inject_message(&reply_to(request, Value::Integer(3)), healthy);
    let reply = pending.await.unwrap().unwrap();
    assert_eq!(reply.pdu.varbinds[0].value, Value::Integer(3));
    assert!(!session.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_handle_stops_dispatcher() {
    let mock = MockTransport::new();
    let session = session_over(&mock, Version::V2c, 0).await;
    let finished = session.shared.finished.clone();

    drop(session);
    finished.cancelled().await;
}

#[tokio::test(start_paused = true)]
async fn test_get_many_set_and_get_next() {
    let mock = MockTransport::new();
    mock.respond_from_table(system_table(3));
    let session = session_over(&mock, Version::V2c, 0).await;

    let reply = session
        .get_many(&[oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)])
        .await
        .unwrap();
    let values: Vec<_> = reply.pdu.varbinds.iter().map(|vb| vb.value.clone()).collect();
    assert_eq!(values, vec![Value::Integer(3), Value::Integer(1)]);

    let name = oid!(1, 3, 6, 1, 2, 1, 1, 2, 0);
    session
        .set(VarBind::new(name.clone(), Value::from("edge-7")))
        .await
        .unwrap();
    assert_eq!(mock.sent_messages()[1].pdu.pdu_type, PduType::SetRequest);
    let reply = session.get(&name).await.unwrap();
    assert_eq!(reply.pdu.varbinds[0].value, Value::from("edge-7"));

    let reply = session.get_next(&name).await.unwrap();
    assert_eq!(reply.pdu.varbinds[0].oid, oid!(1, 3, 6, 1, 2, 1, 1, 3, 0));
}

#[tokio::test(start_paused = true)]
async fn test_agent_error_status_is_not_an_error() {
    let mock = MockTransport::new();
    mock.respond_from_table(system_table(1));
    let session = session_over(&mock, Version::V1, 0).await;

    let reply = session.get(&oid!(1, 3, 6, 1, 2, 1, 1, 9, 0)).await.unwrap();
    assert_eq!(reply.pdu.error_status, ErrorStatus::NoSuchName);
    assert_eq!(reply.pdu.error_index, 1);
}

#[tokio::test(start_paused = true)]
async fn test_with_port_changes_destination() {
    let mock = MockTransport::new();
    mock.respond_from_table(system_table(1));
    let session = session_over(&mock, Version::V2c, 0).await;

    let other = session.with_port(1161);
    assert_eq!(other.target().port(), 1161);
    other.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.unwrap();
    assert_eq!(mock.sent()[0].1, "192.0.2.1:1161".parse::<SocketAddr>().unwrap());

    let elsewhere: SocketAddr = "198.51.100.7:161".parse().unwrap();
    session
        .retarget(elsewhere)
        .get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0))
        .await
        .unwrap();
    assert_eq!(mock.sent()[1].1, elsewhere);
    assert_eq!(session.target(), target());
}

#[tokio::test(start_paused = true)]
async fn test_trap_is_fire_and_forget() {
    let mock = MockTransport::new();
    let session = session_over(&mock, Version::V2c, 3).await;
    let link_down = oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 3);

    tokio::time::sleep(Duration::from_secs(2)).await;
    session
        .trap(
            &link_down,
            vec![VarBind::new(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 4), Value::Integer(4))],
        )
        .await
        .unwrap();
    assert_eq!(session.in_flight().await.unwrap(), 0);

    let (_, dest) = mock.sent()[0].clone();
    assert_eq!(dest, "192.0.2.1:162".parse::<SocketAddr>().unwrap());

    let trap = &mock.sent_messages()[0];
    assert_eq!(trap.pdu.pdu_type, PduType::TrapV2);
    assert!((0..=0xFFFF).contains(&trap.pdu.request_id));
    assert_eq!(trap.pdu.varbinds.len(), 3);
    assert_eq!(trap.pdu.varbinds[0].oid, oid!(1, 3, 6, 1, 2, 1, 1, 3, 0));
    assert_eq!(trap.pdu.varbinds[0].value, Value::TimeTicks(200));
    assert_eq!(trap.pdu.varbinds[1].oid, oid!(1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0));
    assert_eq!(trap.pdu.varbinds[1].value, Value::ObjectIdentifier(link_down));

    // Never retransmitted.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(mock.sent_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_inform_is_acknowledged() {
    let mock = MockTransport::new();
    mock.respond_from_table(OidTable::new());
    let session = session_over(&mock, Version::V2c, 0).await;

    let reply = session
        .inform(&oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 1), vec![])
        .await
        .unwrap();
    assert_eq!(reply.pdu.pdu_type, PduType::Response);
    assert_eq!(reply.pdu.varbinds.len(), 2);
    assert_eq!(mock.sent()[0].1.port(), 162);
    assert_eq!(mock.sent_messages()[0].pdu.pdu_type, PduType::InformRequest);
}

#[tokio::test(start_paused = true)]
async fn test_v1_session_rejects_notifications() {
    let mock = MockTransport::new();
    let session = session_over(&mock, Version::V1, 0).await;

    let err = session.trap(&oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 1), vec![]).await;
    assert!(matches!(err, Err(Error::Configuration { .. })));
    let err = session.inform(&oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 1), vec![]).await;
    assert!(matches!(err, Err(Error::Configuration { .. })));
    assert_eq!(mock.sent_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_v3_session_frames_usm() {
    let mock = MockTransport::new();
    mock.respond_from_table(system_table(1));
    let credential = Credential::new("monitor").engine(&b"\x80\x00\x1f\x88\x04"[..], 1, 10);
    let session = Session::with_credential("192.0.2.1", credential)
        .build_with_transport(mock.clone())
        .await
        .unwrap();
    assert_eq!(session.version(), Version::V3);

    let reply = session.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.unwrap();
    assert_eq!(reply.version, Version::V3);
    let Security::Usm(sent) = &mock.sent_messages()[0].security else {
        panic!("expected USM security");
    };
    assert_eq!(sent.user_name.as_ref(), b"monitor");
}

#[tokio::test]
async fn test_configuration_is_validated() {
    let cases = [
        Session::builder("192.0.2.1"),
        Session::builder("192.0.2.1")
            .community("public")
            .credential(Credential::new("u")),
        Session::community("192.0.2.1", "public").version(Version::V3),
        Session::builder("192.0.2.1")
            .credential(Credential::new("u"))
            .version(Version::V1),
        Session::with_credential("192.0.2.1", Credential::new("u")).version(Version::V2c),
    ];
    for builder in cases {
        let mock = MockTransport::new();
        let err = builder.build_with_transport(mock.clone()).await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }), "{err}");
        assert_eq!(mock.sent_count(), 0);
    }
}

#[tokio::test]
async fn test_target_forms_resolve() {
    for (input, expected) in [
        ("192.0.2.1", "192.0.2.1:161"),
        ("192.0.2.1:1161", "192.0.2.1:1161"),
        ("[2001:db8::1]:1161", "[2001:db8::1]:1161"),
        ("2001:db8::1", "[2001:db8::1]:161"),
        ("localhost:1161", "127.0.0.1:1161"),
    ] {
        let session = Session::community(input, "public")
            .build_with_transport(MockTransport::new())
            .await
            .unwrap();
        let expected: SocketAddr = expected.parse().unwrap();
        if input.starts_with("localhost") {
            assert!(session.target().ip().is_loopback());
            assert_eq!(session.target().port(), expected.port());
        } else {
            assert_eq!(session.target(), expected);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_id_exhaustion_is_reported() {
    let mock = MockTransport::new();
    let (commands, rx) = mpsc::unbounded_channel();
    let closed = CancellationToken::new();
    let finished = CancellationToken::new();
    let settings = DispatchSettings {
        version: Version::V2c,
        security: Security::Community("public".into()),
        retries: 0,
        timeout: Duration::from_secs(1),
        max_message_size: 1500,
        warn_on_source_mismatch: true,
    };
    let dispatcher = Dispatcher::new(mock.clone(), BerCodec, settings, rx, closed.clone())
        .with_ids(IdAllocator::with_source(|| Ok(5)));
    tokio::spawn(dispatcher.run(finished.clone()));
    let session = Session::from_parts(
        commands,
        closed,
        finished,
        SessionConfig::default(),
        mock.local_addr(),
        target(),
    );

    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.get(&oid!(1, 3, 6, 1)).await })
    };
    wait_for_sent(&mock, 1).await;

    let err = session.get(&oid!(1, 3, 6, 1)).await.unwrap_err();
    assert!(matches!(
        err,
        Error::ResourceExhausted {
            attempts: MAX_ALLOCATION_ATTEMPTS
        }
    ));
    assert_eq!(mock.sent_count(), 1);
    assert_eq!(
        mock.sent_messages()[0].pdu,
        Pdu::new(PduType::GetRequest, 5, vec![VarBind::null(oid!(1, 3, 6, 1))])
    );

    assert!(first.await.unwrap().unwrap_err().is_timeout());
}

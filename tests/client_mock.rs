//! Client request/response handling over MockTransport.

mod common;

use std::time::Duration;

use snmp_cache::client::Retry;
use snmp_cache::transport::{MockAgent, ResponseBuilder};
use snmp_cache::{Auth, Client, Error, ErrorStatus, Value, oid};

use common::{mock_client, mock_transport};

#[tokio::test]
async fn get_returns_agent_value() {
    let mock = mock_transport();
    mock.set_agent(MockAgent::new().with(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("edge-1")));
    let client = mock_client(&mock);

    let vb = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)).await.unwrap();
    assert_eq!(vb.oid, oid!(1, 3, 6, 1, 2, 1, 1, 5, 0));
    assert_eq!(vb.value.as_str(), Some("edge-1"));
    assert_eq!(mock.requests().len(), 1);
}

#[tokio::test]
async fn missing_object_is_an_exception_not_an_error() {
    let mock = mock_transport();
    mock.set_agent(MockAgent::new());
    let client = mock_client(&mock);

    let vb = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)).await.unwrap();
    assert_eq!(vb.value, Value::NoSuchObject);
}

#[tokio::test]
async fn get_many_batches_in_order() {
    let mock = mock_transport();
    mock.set_agent(
        MockAgent::new()
            .with(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(100))
            .with(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("edge-1"))
            .with(oid!(1, 3, 6, 1, 2, 1, 1, 6, 0), Value::from("rack 4")),
    );
    let client = Client::builder("192.0.2.10:161", Auth::v2c("public"))
        .max_oids_per_request(2)
        .retry(Retry::none())
        .build(mock.clone())
        .unwrap();

    let oids = [
        oid!(1, 3, 6, 1, 2, 1, 1, 6, 0),
        oid!(1, 3, 6, 1, 2, 1, 1, 3, 0),
        oid!(1, 3, 6, 1, 2, 1, 1, 5, 0),
    ];
    let results = client.get_many(&oids).await.unwrap();

    assert_eq!(mock.requests().len(), 2);
    let found: Vec<_> = results.iter().map(|vb| vb.oid.clone()).collect();
    assert_eq!(found, oids);
    assert_eq!(results[1].value, Value::TimeTicks(100));
}

#[tokio::test]
async fn get_many_empty_sends_nothing() {
    let mock = mock_transport();
    let client = mock_client(&mock);
    assert!(client.get_many(&[]).await.unwrap().is_empty());
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn error_status_maps_to_snmp_error() {
    let mock = mock_transport();
    mock.queue_response(
        ResponseBuilder::new(0)
            .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::Null)
            .error_status(5)
            .error_index(1)
            .build_v2c(b"public"),
    );
    let client = mock_client(&mock);

    let err = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.unwrap_err();
    match *err {
        Error::Snmp {
            status, index, oid, ..
        } => {
            assert_eq!(status, ErrorStatus::GenErr);
            assert_eq!(index, 1);
            assert_eq!(oid, Some(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)));
        }
        ref other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn timeout_without_retries() {
    let mock = mock_transport();
    mock.queue_timeout();
    let client = mock_client(&mock);

    let err = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.unwrap_err();
    assert!(matches!(*err, Error::Timeout { retries: 0, .. }));
    assert_eq!(err.target(), Some(client.peer_addr()));
    assert_eq!(mock.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn retries_until_answered() {
    let mock = mock_transport();
    mock.queue_timeout();
    mock.queue_timeout();
    mock.set_agent(MockAgent::new().with(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("edge-1")));
    let client = Client::builder("192.0.2.10:161", Auth::v2c("public"))
        .timeout(Duration::from_secs(1))
        .retry(Retry::fixed(2, Duration::from_millis(100)))
        .build(mock.clone())
        .unwrap();

    let vb = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)).await.unwrap();
    assert_eq!(vb.value.as_str(), Some("edge-1"));
    assert_eq!(mock.requests().len(), 3);
}

#[tokio::test]
async fn io_error_is_network_error() {
    let mock = mock_transport();
    mock.queue_io_error("connection refused");
    let client = mock_client(&mock);

    let err = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.unwrap_err();
    assert!(matches!(*err, Error::Network { .. }));
}

#[tokio::test]
async fn get_bulk_returns_repetitions() {
    let mock = mock_transport();
    mock.set_agent(common::interface_agent());
    let client = mock_client(&mock);

    let varbinds = client
        .get_bulk(&[oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2)], 0, 2)
        .await
        .unwrap();
    assert_eq!(varbinds.len(), 2);
    assert_eq!(varbinds[0].value.as_str(), Some("lo"));
    assert_eq!(varbinds[1].value.as_str(), Some("eth0"));
}

//! Subtree walks and table grouping over MockTransport.

mod common;

use snmp_cache::client::Retry;
use snmp_cache::transport::{MockAgent, ResponseBuilder};
use snmp_cache::{Auth, Client, Error, OidOrdering, PduType, Value, WalkAbortReason, WalkMode, oid};

use common::{interface_agent, mock_client, mock_transport};

fn request_types(mock: &snmp_cache::MockTransport) -> Vec<PduType> {
    mock.requests()
        .iter()
        .filter_map(|r| r.pdu())
        .map(|pdu| pdu.pdu_type)
        .collect()
}

#[tokio::test]
async fn getnext_walk_stays_in_subtree() {
    let mock = mock_transport();
    mock.set_agent(interface_agent());
    let client = mock_client(&mock);

    let results = client
        .walk(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2))
        .collect()
        .await
        .unwrap();
    let values: Vec<_> = results.iter().filter_map(|vb| vb.value.as_str()).collect();
    assert_eq!(values, ["lo", "eth0"]);
    // two hits plus the one that left the subtree
    assert_eq!(mock.requests().len(), 3);
    assert!(request_types(&mock).iter().all(|t| *t == PduType::GetNextRequest));
}

#[tokio::test]
async fn bulk_walk_uses_getbulk() {
    let mock = mock_transport();
    mock.set_agent(interface_agent());
    let client = mock_client(&mock);

    let results = client
        .bulk_walk(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1), 4)
        .collect()
        .await
        .unwrap();
    assert_eq!(results.len(), 11);
    assert_eq!(results[0].oid, oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 1));
    assert_eq!(results[10].value, Value::Gauge32(7));
    assert!(request_types(&mock).iter().all(|t| *t == PduType::GetBulkRequest));
}

#[tokio::test]
async fn walk_auto_follows_configured_mode() {
    let mock = mock_transport();
    mock.set_agent(interface_agent());
    let client = Client::builder("192.0.2.10:161", Auth::v2c("public"))
        .walk_mode(WalkMode::GetNext)
        .retry(Retry::none())
        .build(mock.clone())
        .unwrap();

    let mut walk = client.walk_auto(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 7)).unwrap();
    let mut seen = Vec::new();
    while let Some(vb) = walk.next().await {
        seen.push(vb.unwrap().value);
    }
    assert_eq!(seen, [Value::Integer(1), Value::Integer(2)]);
    assert_eq!(request_types(&mock)[0], PduType::GetNextRequest);
}

#[tokio::test]
async fn walk_past_end_of_view_is_empty() {
    let mock = mock_transport();
    mock.set_agent(MockAgent::new().with(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("router")));
    let client = mock_client(&mock);

    let results = client.walk_auto(oid!(1, 3, 6, 1, 4)).unwrap().collect().await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn looping_agent_aborts_walk() {
    let mock = mock_transport();
    // second answer goes backwards
    mock.queue_response(
        ResponseBuilder::new(0)
            .varbind(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 5), Value::Integer(5))
            .build_v2c(b"public"),
    );
    mock.queue_response(
        ResponseBuilder::new(0)
            .varbind(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 3), Value::Integer(3))
            .build_v2c(b"public"),
    );
    let client = mock_client(&mock);

    let err = client
        .walk(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1))
        .collect()
        .await
        .unwrap_err();
    assert!(matches!(
        *err,
        Error::WalkAborted {
            reason: WalkAbortReason::NonIncreasing,
            ..
        }
    ));
}

#[tokio::test]
async fn relaxed_ordering_accepts_out_of_order_agent() {
    let mock = mock_transport();
    mock.queue_response(
        ResponseBuilder::new(0)
            .varbind(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 9), Value::Integer(9))
            .build_v2c(b"public"),
    );
    mock.queue_response(
        ResponseBuilder::new(0)
            .varbind(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 3), Value::Integer(3))
            .build_v2c(b"public"),
    );
    mock.queue_response(
        ResponseBuilder::new(0)
            .varbind(oid!(1, 3, 6, 1, 2, 1, 2, 3, 0), Value::Integer(0))
            .build_v2c(b"public"),
    );
    let client = Client::builder("192.0.2.10:161", Auth::v2c("public"))
        .oid_ordering(OidOrdering::AllowNonIncreasing)
        .retry(Retry::none())
        .build(mock.clone())
        .unwrap();

    let results = client
        .walk(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1))
        .collect()
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].value, Value::Integer(3));
}

#[tokio::test]
async fn table_groups_rows_by_index() {
    let mock = mock_transport();
    mock.set_agent(interface_agent());
    let client = mock_client(&mock);

    let rows = client.table(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1)).await.unwrap();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].index, "1");
    let columns: Vec<u32> = rows[0].columns.iter().map(|(c, _)| *c).collect();
    assert_eq!(columns, [1, 2, 6, 7, 10]);
    assert_eq!(rows[0].column(10), Some(&Value::Counter32(1500)));

    assert_eq!(rows[1].index, "2");
    assert_eq!(rows[1].column(99), Some(&Value::Gauge32(7)));
    assert_eq!(rows[1].column(2).and_then(Value::as_str), Some("eth0"));
}

#[tokio::test]
async fn table_of_missing_object_is_empty() {
    let mock = mock_transport();
    mock.set_agent(interface_agent());
    let client = mock_client(&mock);

    let rows = client.table(&oid!(1, 3, 6, 1, 2, 1, 31, 1, 1, 1)).await.unwrap();
    assert!(rows.is_empty());
}

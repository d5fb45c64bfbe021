//! Table retrieval: a subtree walk regrouped into rows.

use std::collections::HashMap;

use crate::error::Result;
use crate::oid::Oid;
use crate::transport::Transport;
use crate::value::Value;

use super::Client;

/// One conceptual row of an SNMP table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// Arcs after `table.column`, dotted (`"1"`, `"10.0.0.1"`, ...).
    pub index: String,
    /// `(column number, value)` in the order the agent returned them.
    pub columns: Vec<(u32, Value)>,
}

impl TableRow {
    pub fn column(&self, column: u32) -> Option<&Value> {
        self.columns
            .iter()
            .find_map(|(c, v)| (*c == column).then_some(v))
    }
}

impl<T: Transport + 'static> Client<T> {
    /// Walk a table and group its cells by row index.
    ///
    /// `oid` is the table or entry OID; every returned OID must look like
    /// `oid.column.index...`. Rows keep the order in which their index
    /// first appeared, so a column-major walk yields rows in agent order.
    #[tracing::instrument(skip(self), err, fields(snmp.target = %self.peer_addr(), snmp.oid = %oid))]
    pub async fn table(&self, oid: &Oid) -> Result<Vec<TableRow>> {
        let varbinds = self.walk_auto(oid.clone())?.collect().await?;

        let mut rows: Vec<TableRow> = Vec::new();
        // index -> position in `rows`
        let mut positions: HashMap<String, usize> = HashMap::new();
        for vb in varbinds {
            let Some((&column, index_arcs)) = vb
                .oid
                .strip_prefix(oid)
                .and_then(|tail| tail.split_first())
            else {
                tracing::debug!(target: "snmp_cache::client", { snmp.oid = %vb.oid }, "skipping varbind without a column");
                continue;
            };

            let index = index_arcs
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(".");

            match positions.get(&index) {
                Some(&pos) => rows[pos].columns.push((column, vb.value)),
                None => {
                    positions.insert(index.clone(), rows.len());
                    rows.push(TableRow {
                        index,
                        columns: vec![(column, vb.value)],
                    });
                }
            }
        }

        tracing::debug!(target: "snmp_cache::client", { snmp.row_count = rows.len() }, "table retrieved");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientConfig, Retry};
    use crate::oid;
    use crate::transport::{MockAgent, MockTransport};
    use std::net::SocketAddr;
    use std::time::Duration;

    fn if_table_client() -> Client<MockTransport> {
        let mock = MockTransport::new(SocketAddr::from(([127, 0, 0, 1], 161)));
        mock.set_agent(
            MockAgent::new()
                .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 1), Value::Integer(1))
                .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 2), Value::Integer(2))
                .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 1), Value::from("lo"))
                .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 2), Value::from("eth0"))
                .with(oid!(1, 3, 6, 1, 2, 1, 2, 3, 0), Value::Integer(9)),
        );
        Client::new(
            mock,
            ClientConfig {
                timeout: Duration::from_secs(1),
                retry: Retry::none(),
                ..ClientConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn groups_columns_by_index() {
        let client = if_table_client();
        let rows = client.table(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1)).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, "1");
        assert_eq!(rows[1].index, "2");
        assert_eq!(rows[0].column(1), Some(&Value::Integer(1)));
        assert_eq!(rows[1].column(2), Some(&Value::from("eth0")));
        assert_eq!(rows[1].column(7), None);
    }

    #[tokio::test]
    async fn composite_index_is_dotted() {
        let mock = MockTransport::new(SocketAddr::from(([127, 0, 0, 1], 161)));
        mock.set_agent(
            MockAgent::new()
                .with(oid!(1, 3, 6, 1, 2, 1, 4, 22, 1, 2, 3, 10, 0, 0, 1), Value::from(&[0u8, 1, 2, 3, 4, 5][..]))
                .with(oid!(1, 3, 6, 1, 2, 1, 4, 22, 1, 4, 3, 10, 0, 0, 1), Value::Integer(3)),
        );
        let client = Client::new(mock, ClientConfig::default());

        let rows = client.table(&oid!(1, 3, 6, 1, 2, 1, 4, 22, 1)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].index, "3.10.0.0.1");
        assert_eq!(rows[0].columns.len(), 2);
    }

    #[tokio::test]
    async fn large_table_keeps_agent_order() {
        const ROWS: u32 = 4000;
        let mock = MockTransport::new(SocketAddr::from(([127, 0, 0, 1], 161)));
        let mut agent = MockAgent::new();
        for index in 1..=ROWS {
            agent.insert(oid!(1, 3, 6, 1, 2, 1, 4, 22, 1, 1).child(index), Value::Integer(1));
            agent.insert(oid!(1, 3, 6, 1, 2, 1, 4, 22, 1, 2).child(index), Value::Integer(2));
            agent.insert(oid!(1, 3, 6, 1, 2, 1, 4, 22, 1, 4).child(index), Value::Integer(3));
        }
        mock.set_agent(agent);
        let client = Client::new(mock, ClientConfig::default());

        let rows = client.table(&oid!(1, 3, 6, 1, 2, 1, 4, 22, 1)).await.unwrap();
        assert_eq!(rows.len(), ROWS as usize);
        assert!(rows.iter().all(|row| row.columns.len() == 3));

        let indices: Vec<u32> = rows.iter().map(|r| r.index.parse().unwrap()).collect();
        assert_eq!(indices, (1..=ROWS).collect::<Vec<_>>());
        assert_eq!(
            rows[0].columns.iter().map(|(c, _)| *c).collect::<Vec<_>>(),
            [1, 2, 4]
        );
    }
}

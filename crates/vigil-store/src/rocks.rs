// crates/vigil-store/src/rocks.rs
//
// RocksDB-backed persistent report log and engine state.
//
// Key format (ids and target/node ids zero-padded to 20 digits so lexical
// order equals numeric order):
//   - Primary:   `report:{id}`              -> JSON-serialized Report
//   - Secondary: `target:{target_id}:{id}`  -> empty value (index only)
//   - Secondary: `node:{node_id}:{id}`      -> empty value (index only)
//   - Meta:      `meta:next_id`             -> next id, big-endian u64
//   - State:     `consensus:{target_id}`    -> JSON-serialized StoredRound
//   - State:     `reputation:{node_id}`     -> JSON-serialized ReputationEntry
//   - State:     `balance:{node_id}`        -> balance, big-endian u64
//   - State:     `settled:{target_id}`      -> last settled round, big-endian u64
//
// Each append writes its four keys in a single WriteBatch, and so does each
// state save.

use std::sync::Mutex;

use rocksdb::{DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options, WriteBatch};

use vigil_core::{
    Amount, EngineState, NodeId, Report, ReportId, ReportLog, ReputationEntry, StateStore,
    StoredRound, TargetId, Timestamp, VigilError,
};

const NEXT_ID_KEY: &[u8] = b"meta:next_id";
const CONSENSUS_PREFIX: &str = "consensus:";
const REPUTATION_PREFIX: &str = "reputation:";
const BALANCE_PREFIX: &str = "balance:";
const SETTLED_PREFIX: &str = "settled:";

/// RocksDB wrapper implementing the `ReportLog` and `StateStore` traits.
#[derive(Debug)]
pub struct RocksReportLog {
    db: DBWithThreadMode<MultiThreaded>,
    /// Next id to assign. Held for the whole append so ids stay dense.
    next_id: Mutex<ReportId>,
}

impl RocksReportLog {
    /// Open a RocksDB database at the given filesystem path.
    ///
    /// Creates the database directory if it does not exist and resumes id
    /// assignment where a previous process left off.
    pub fn open(path: &str) -> Result<Self, VigilError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path).map_err(|e| {
            VigilError::Storage(format!("Failed to open RocksDB at {}: {}", path, e))
        })?;

        let next_id = match db
            .get(NEXT_ID_KEY)
            .map_err(|e| VigilError::Storage(format!("RocksDB get failed: {}", e)))?
        {
            Some(bytes) => decode_u64(&bytes, "next_id")?,
            None => 0,
        };

        Ok(Self {
            db,
            next_id: Mutex::new(next_id),
        })
    }

    fn report_key(id: ReportId) -> Vec<u8> {
        format!("report:{:020}", id).into_bytes()
    }

    fn target_prefix(target_id: TargetId) -> String {
        format!("target:{:020}:", target_id)
    }

    fn node_prefix(node_id: NodeId) -> String {
        format!("node:{:020}:", node_id)
    }

    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, VigilError> {
        self.db
            .get(key)
            .map_err(|e| VigilError::Storage(format!("RocksDB get failed: {}", e)))
    }

    fn state_key(prefix: &str, id: u64) -> Vec<u8> {
        format!("{}{:020}", prefix, id).into_bytes()
    }

    /// Forward scan of a prefix, returning `(numeric key suffix, value)` in
    /// key order.
    fn scan_entries(&self, prefix: &str) -> Result<Vec<(u64, Box<[u8]>)>, VigilError> {
        let prefix = prefix.as_bytes();
        let mut entries = Vec::new();
        for item in self.db.prefix_iterator(prefix) {
            let (key, value) = item
                .map_err(|e| VigilError::Storage(format!("RocksDB iteration error: {}", e)))?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((parse_id_suffix(&key[prefix.len()..])?, value));
        }
        Ok(entries)
    }

    /// Forward scan of an index prefix, returning the ids in key order.
    fn scan_ids(&self, prefix: &str) -> Result<Vec<ReportId>, VigilError> {
        Ok(self
            .scan_entries(prefix)?
            .into_iter()
            .map(|(id, _value)| id)
            .collect())
    }

    fn write(&self, batch: WriteBatch) -> Result<(), VigilError> {
        self.db
            .write(batch)
            .map_err(|e| VigilError::Storage(format!("RocksDB write failed: {}", e)))
    }
}

impl ReportLog for RocksReportLog {
    fn append(&self, report: Report) -> Result<ReportId, VigilError> {
        let mut next_id = self
            .next_id
            .lock()
            .map_err(|_| VigilError::Storage("report id lock poisoned".to_string()))?;
        let id = *next_id;

        let json = serde_json::to_vec(&report)?;
        let mut batch = WriteBatch::default();
        batch.put(Self::report_key(id), json);
        batch.put(
            format!("{}{:020}", Self::target_prefix(report.target_id), id).into_bytes(),
            b"",
        );
        batch.put(
            format!("{}{:020}", Self::node_prefix(report.node_id), id).into_bytes(),
            b"",
        );
        batch.put(NEXT_ID_KEY, (id + 1).to_be_bytes());

        self.write(batch)?;
        *next_id = id + 1;
        Ok(id)
    }

    fn recent(&self, target_id: TargetId, limit: usize) -> Result<Vec<ReportId>, VigilError> {
        let prefix_str = Self::target_prefix(target_id);
        let prefix = prefix_str.as_bytes();
        // '~' sorts after every digit, so this seeks to the newest entry.
        let upper = format!("{}~", prefix_str);

        let mut ids = Vec::with_capacity(limit);
        let iter = self
            .db
            .iterator(IteratorMode::From(upper.as_bytes(), Direction::Reverse));
        for item in iter {
            if ids.len() == limit {
                break;
            }
            let (key, _value) = item
                .map_err(|e| VigilError::Storage(format!("RocksDB iteration error: {}", e)))?;
            if !key.starts_with(prefix) {
                break;
            }
            ids.push(parse_id_suffix(&key[prefix.len()..])?);
        }
        ids.reverse();
        Ok(ids)
    }

    fn get(&self, id: ReportId) -> Result<Report, VigilError> {
        match self.get_raw(&Self::report_key(id))? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(VigilError::NotFound(format!("report {}", id))),
        }
    }

    fn by_node(&self, node_id: NodeId) -> Result<Vec<ReportId>, VigilError> {
        self.scan_ids(&Self::node_prefix(node_id))
    }

    fn len(&self) -> Result<u64, VigilError> {
        self.next_id
            .lock()
            .map(|next| *next)
            .map_err(|_| VigilError::Storage("report id lock poisoned".to_string()))
    }
}

impl StateStore for RocksReportLog {
    fn save_resolution(
        &self,
        round: &StoredRound,
        reputation: &[(NodeId, ReputationEntry)],
    ) -> Result<(), VigilError> {
        let mut batch = WriteBatch::default();
        batch.put(
            Self::state_key(CONSENSUS_PREFIX, round.target_id),
            serde_json::to_vec(round)?,
        );
        for (node_id, entry) in reputation {
            batch.put(
                Self::state_key(REPUTATION_PREFIX, *node_id),
                serde_json::to_vec(entry)?,
            );
        }
        self.write(batch)
    }

    fn save_settlement(
        &self,
        target_id: TargetId,
        resolved_at: Timestamp,
        balances: &[(NodeId, Amount)],
    ) -> Result<(), VigilError> {
        let mut batch = WriteBatch::default();
        batch.put(
            Self::state_key(SETTLED_PREFIX, target_id),
            resolved_at.to_be_bytes(),
        );
        for (recipient, amount) in balances {
            batch.put(
                Self::state_key(BALANCE_PREFIX, *recipient),
                amount.to_be_bytes(),
            );
        }
        self.write(batch)
    }

    fn load_state(&self) -> Result<EngineState, VigilError> {
        let rounds = self
            .scan_entries(CONSENSUS_PREFIX)?
            .into_iter()
            .map(|(_, value)| -> Result<StoredRound, VigilError> {
                Ok(serde_json::from_slice(&value)?)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let reputation = self
            .scan_entries(REPUTATION_PREFIX)?
            .into_iter()
            .map(|(node_id, value)| -> Result<(NodeId, ReputationEntry), VigilError> {
                Ok((node_id, serde_json::from_slice(&value)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let balances = self
            .scan_entries(BALANCE_PREFIX)?
            .into_iter()
            .map(|(recipient, value)| -> Result<(NodeId, Amount), VigilError> {
                Ok((recipient, decode_u64(&value, "balance")?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let settled = self
            .scan_entries(SETTLED_PREFIX)?
            .into_iter()
            .map(|(target_id, value)| -> Result<(TargetId, Timestamp), VigilError> {
                Ok((target_id, decode_u64(&value, "settled_at")?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EngineState {
            rounds,
            reputation,
            balances,
            settled,
        })
    }
}

fn decode_u64(bytes: &[u8], what: &str) -> Result<u64, VigilError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| VigilError::Storage(format!("corrupt {} of {} bytes", what, bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}

fn parse_id_suffix(bytes: &[u8]) -> Result<ReportId, VigilError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| VigilError::Storage("corrupt report index key".to_string()))
}

use amrview_core::{DispatchPayload, PayloadTemplate, TaskCell, Zone};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;

const HISTORY_LEN: usize = 200;

/// Sends one task-order payload to the RCS. Success means HTTP 2xx.
pub trait DispatchTransport: Send + Sync + 'static {
    fn send(&self, payload: DispatchPayload) -> BoxFuture<'static, Result<(), DispatchError>>;
}

/// Visual state of one grid cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CellState {
    #[default]
    Idle,
    Sending,
    Success,
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub cell: u32,
    pub zone: Zone,
    pub payload: DispatchPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub cell: u32,
    pub zone: Zone,
    pub at: DateTime<Utc>,
    /// Task path on success.
    pub outcome: Result<String, DispatchError>,
}

/// Outcome of a failed supply-then-demand dispatch. A successful supply leg is not rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairedError {
    #[error("supply dispatch failed: {0}")]
    Supply(DispatchError),
    #[error("supply dispatched, demand failed: {error}")]
    Demand {
        supply: DispatchRecord,
        error: DispatchError,
    },
}

#[derive(Debug, Default)]
struct CellEntry {
    state: CellState,
    epoch: u64,
}

#[derive(Debug, Default)]
struct GridState {
    cells: HashMap<(Zone, u32), CellEntry>,
    in_flight: Option<(Zone, u32)>,
    epoch: u64,
    history: VecDeque<HistoryEntry>,
}

struct ControllerInner {
    transport: Arc<dyn DispatchTransport>,
    template: PayloadTemplate,
    cooldown: Duration,
    cancel: CancellationToken,
    state: Mutex<GridState>,
}

impl ControllerInner {
    fn lock(&self) -> MutexGuard<'_, GridState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Dispatches tasks into grid cells, one request at a time per controller.
#[derive(Clone)]
pub struct GridController {
    inner: Arc<ControllerInner>,
}

// Clears the in-flight slot even when the dispatch future is dropped mid-request.
struct InFlight<'a> {
    inner: &'a Arc<ControllerInner>,
    key: (Zone, u32),
    epoch: u64,
    done: bool,
}

impl InFlight<'_> {
    fn finish(mut self, outcome: &Result<DispatchRecord, DispatchError>) {
        self.done = true;
        let now = Utc::now();
        let (zone, cell) = self.key;
        let mut st = self.inner.lock();
        st.in_flight = None;
        let entry = st.cells.entry(self.key).or_default();
        if entry.epoch == self.epoch {
            entry.state = match outcome {
                Ok(_) => CellState::Success,
                Err(e) => CellState::Failed {
                    message: e.to_string(),
                },
            };
        }
        st.history.push_back(HistoryEntry {
            cell,
            zone,
            at: now,
            outcome: outcome
                .as_ref()
                .map(|r| r.payload.task_path.clone())
                .map_err(Clone::clone),
        });
        while st.history.len() > HISTORY_LEN {
            st.history.pop_front();
        }
        drop(st);

        if outcome.is_err() {
            tokio::spawn(revert_after_cooldown(Arc::clone(self.inner), self.key, self.epoch));
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let mut st = self.inner.lock();
        st.in_flight = None;
        if let Some(entry) = st.cells.get_mut(&self.key) {
            if entry.epoch == self.epoch {
                entry.state = CellState::Idle;
            }
        }
    }
}

impl GridController {
    pub fn new(
        transport: Arc<dyn DispatchTransport>,
        template: PayloadTemplate,
        cooldown: Duration,
        parent: &CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                transport,
                template,
                cooldown,
                cancel: parent.child_token(),
                state: Mutex::new(GridState::default()),
            }),
        }
    }

    pub fn cell_state(&self, zone: Zone, cell: u32) -> CellState {
        self.inner
            .lock()
            .cells
            .get(&(zone, cell))
            .map(|e| e.state.clone())
            .unwrap_or_default()
    }

    /// All cells that ever left `Idle`, sorted by zone then cell.
    pub fn cells(&self) -> Vec<(Zone, u32, CellState)> {
        let st = self.inner.lock();
        let mut out: Vec<_> = st
            .cells
            .iter()
            .map(|(&(zone, cell), e)| (zone, cell, e.state.clone()))
            .collect();
        out.sort_by_key(|(zone, cell, _)| (*zone, *cell));
        out
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.lock().history.iter().cloned().collect()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.lock().in_flight.is_some()
    }

    /// Stops cooldown timers and aborts a pending request.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    fn begin(&self, zone: Zone, cell: u32) -> Result<InFlight<'_>, DispatchError> {
        let mut st = self.inner.lock();
        if st.in_flight.is_some() {
            return Err(DispatchError::Busy);
        }
        st.epoch += 1;
        let epoch = st.epoch;
        st.in_flight = Some((zone, cell));
        st.cells.insert(
            (zone, cell),
            CellEntry {
                state: CellState::Sending,
                epoch,
            },
        );
        Ok(InFlight {
            inner: &self.inner,
            key: (zone, cell),
            epoch,
            done: false,
        })
    }

    /// Dispatches the task row bound to `cell-<cell>` in `rows` (the rows of `zone`).
    pub async fn dispatch(
        &self,
        cell: u32,
        zone: Zone,
        rows: &[TaskCell],
    ) -> Result<DispatchRecord, DispatchError> {
        let guard = self.begin(zone, cell)?;
        let outcome = self.send(cell, zone, rows).await;
        match &outcome {
            Ok(_) => tracing::info!(cell, %zone, "dispatch succeeded"),
            Err(e) => tracing::warn!(cell, %zone, error = %e, "dispatch failed"),
        }
        guard.finish(&outcome);
        outcome
    }

    async fn send(
        &self,
        cell: u32,
        zone: Zone,
        rows: &[TaskCell],
    ) -> Result<DispatchRecord, DispatchError> {
        let task_path = lookup_task_path(cell, zone, rows)?;
        let payload = DispatchPayload::build(&self.inner.template, cell, zone, task_path, Utc::now());
        tokio::select! {
            _ = self.inner.cancel.cancelled() => {
                Err(DispatchError::Transport("dispatch cancelled".to_string()))
            }
            sent = self.inner.transport.send(payload.clone()) => sent.map(|()| DispatchRecord {
                cell,
                zone,
                payload,
            }),
        }
    }

    /// Supply first; demand only after supply succeeds.
    pub async fn dispatch_paired(
        &self,
        supply_cell: u32,
        supply_rows: &[TaskCell],
        demand_cell: u32,
        demand_rows: &[TaskCell],
    ) -> Result<(DispatchRecord, DispatchRecord), PairedError> {
        let supply = self
            .dispatch(supply_cell, Zone::Supply, supply_rows)
            .await
            .map_err(PairedError::Supply)?;
        match self.dispatch(demand_cell, Zone::Demand, demand_rows).await {
            Ok(demand) => Ok((supply, demand)),
            Err(error) => Err(PairedError::Demand { supply, error }),
        }
    }
}

pub fn lookup_task_path(cell: u32, zone: Zone, rows: &[TaskCell]) -> Result<&str, DispatchError> {
    let key = TaskCell::cell_key(cell);
    let Some(row) = rows.iter().find(|r| r.cell == key) else {
        return Err(if rows.is_empty() {
            DispatchError::NoRowsInZone { zone, cell }
        } else {
            DispatchError::NoRowForCell {
                zone,
                cell,
                rows: rows.len(),
            }
        });
    };
    row.task_path()
        .ok_or(DispatchError::MissingTaskPath { zone, cell })
}

async fn revert_after_cooldown(inner: Arc<ControllerInner>, key: (Zone, u32), epoch: u64) {
    tokio::select! {
        _ = inner.cancel.cancelled() => return,
        _ = tokio::time::sleep(inner.cooldown) => {}
    }
    let mut st = inner.lock();
    if let Some(entry) = st.cells.get_mut(&key) {
        if entry.epoch == epoch && matches!(entry.state, CellState::Failed { .. }) {
            entry.state = CellState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeTransport {
        calls: AtomicUsize,
        sent: Mutex<Vec<DispatchPayload>>,
        fail: Mutex<Vec<Zone>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeTransport {
        fn failing(zone: Zone) -> Self {
            let t = Self::default();
            t.fail.lock().unwrap().push(zone);
            t
        }
    }

    impl DispatchTransport for FakeTransport {
        fn send(&self, payload: DispatchPayload) -> BoxFuture<'static, Result<(), DispatchError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fails = self.fail.lock().unwrap().contains(&payload.zone);
            self.sent.lock().unwrap().push(payload);
            let gate = self.gate.clone();
            async move {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                if fails {
                    Err(DispatchError::Transport("HTTP 500".into()))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }
    }

    fn rows(cells: &[(u32, &str)]) -> Vec<TaskCell> {
        cells
            .iter()
            .map(|(cell, path)| {
                serde_json::from_value(json!({
                    "cell": format!("cell-{cell}"),
                    "value": {"taskOrderDetail": [{"taskPath": path}]}
                }))
                .unwrap()
            })
            .collect()
    }

    fn controller(transport: &Arc<FakeTransport>) -> GridController {
        let transport: Arc<dyn DispatchTransport> = transport.clone();
        GridController::new(
            transport,
            PayloadTemplate::default(),
            Duration::from_secs(4),
            &CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn supply_cell_payload_carries_task_path_and_collection() {
        let transport = Arc::new(FakeTransport::default());
        let ctl = controller(&transport);

        let record = ctl
            .dispatch(1, Zone::Supply, &rows(&[(1, "P1")]))
            .await
            .expect("dispatch");

        assert_eq!(record.payload.task_path, "P1");
        assert_eq!(record.payload.collection, "supply");
        assert_eq!(record.payload.task_order_detail[0].task_path, "P1");
        assert_eq!(ctl.cell_state(Zone::Supply, 1), CellState::Success);
        assert_eq!(ctl.history()[0].outcome, Ok("P1".to_string()));
    }

    #[tokio::test]
    async fn lookup_errors_distinguish_empty_zone_from_missing_cell() {
        let transport = Arc::new(FakeTransport::default());
        let ctl = controller(&transport);

        let empty = ctl.dispatch(3, Zone::Demand, &[]).await.unwrap_err();
        assert_eq!(empty, DispatchError::NoRowsInZone { zone: Zone::Demand, cell: 3 });

        let gap = ctl.dispatch(3, Zone::Demand, &rows(&[(1, "P1")])).await.unwrap_err();
        assert_eq!(
            gap,
            DispatchError::NoRowForCell { zone: Zone::Demand, cell: 3, rows: 1 }
        );
        assert!(gap.is_no_data());

        let no_path: Vec<TaskCell> =
            vec![serde_json::from_value(json!({"cell": "cell-3", "value": {"taskOrderDetail": [{}]}})).unwrap()];
        let missing = ctl.dispatch(3, Zone::Demand, &no_path).await.unwrap_err();
        assert_eq!(missing, DispatchError::MissingTaskPath { zone: Zone::Demand, cell: 3 });

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert!(matches!(ctl.cell_state(Zone::Demand, 3), CellState::Failed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cell_reverts_to_idle_after_cooldown() {
        let transport = Arc::new(FakeTransport::failing(Zone::Supply));
        let ctl = controller(&transport);

        let err = ctl.dispatch(2, Zone::Supply, &rows(&[(2, "P2")])).await.unwrap_err();
        assert_eq!(err, DispatchError::Transport("HTTP 500".into()));
        assert!(matches!(ctl.cell_state(Zone::Supply, 2), CellState::Failed { .. }));
        assert!(!ctl.is_busy());

        tokio::time::sleep(Duration::from_millis(3_900)).await;
        assert!(matches!(ctl.cell_state(Zone::Supply, 2), CellState::Failed { .. }));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(ctl.cell_state(Zone::Supply, 2), CellState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn second_dispatch_is_rejected_while_one_is_sending() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(FakeTransport {
            gate: Some(Arc::clone(&gate)),
            ..FakeTransport::default()
        });
        let ctl = controller(&transport);
        let table = rows(&[(1, "P1"), (2, "P2")]);

        let first = {
            let ctl = ctl.clone();
            let table = table.clone();
            tokio::spawn(async move { ctl.dispatch(1, Zone::Supply, &table).await })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(ctl.cell_state(Zone::Supply, 1), CellState::Sending);
        assert_eq!(ctl.dispatch(2, Zone::Supply, &table).await, Err(DispatchError::Busy));
        assert_eq!(ctl.cell_state(Zone::Supply, 2), CellState::Idle);

        gate.notify_one();
        first.await.expect("join").expect("dispatch");
        assert!(!ctl.is_busy());
        assert_eq!(ctl.cell_state(Zone::Supply, 1), CellState::Success);
    }

    #[tokio::test]
    async fn paired_dispatch_skips_demand_when_supply_fails() {
        let transport = Arc::new(FakeTransport::failing(Zone::Supply));
        let ctl = controller(&transport);

        let err = ctl
            .dispatch_paired(1, &rows(&[(1, "S1")]), 4, &rows(&[(4, "D4")]))
            .await
            .unwrap_err();

        assert!(matches!(err, PairedError::Supply(DispatchError::Transport(_))));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctl.cell_state(Zone::Demand, 4), CellState::Idle);
    }

    #[tokio::test]
    async fn paired_dispatch_keeps_supply_when_demand_fails() {
        let transport = Arc::new(FakeTransport::failing(Zone::Demand));
        let ctl = controller(&transport);

        let err = ctl
            .dispatch_paired(1, &rows(&[(1, "S1")]), 4, &rows(&[(4, "D4")]))
            .await
            .unwrap_err();

        let PairedError::Demand { supply, error } = err else {
            panic!("expected demand failure");
        };
        assert_eq!(supply.payload.task_path, "S1");
        assert!(matches!(error, DispatchError::Transport(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(ctl.cell_state(Zone::Supply, 1), CellState::Success);
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].zone, Zone::Supply);
        assert_eq!(sent[1].collection, "demand");
    }

    #[tokio::test]
    async fn dropped_dispatch_frees_the_controller() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(FakeTransport {
            gate: Some(gate),
            ..FakeTransport::default()
        });
        let ctl = controller(&transport);
        let table = rows(&[(1, "P1")]);

        {
            let fut = ctl.dispatch(1, Zone::Supply, &table);
            futures_util::pin_mut!(fut);
            assert!(futures_util::poll!(fut.as_mut()).is_pending());
            assert!(ctl.is_busy());
        }

        assert!(!ctl.is_busy());
        assert_eq!(ctl.cell_state(Zone::Supply, 1), CellState::Idle);
    }
}

//! Parallel batch runner
//!
//! Runs one independent session per job on scoped threads. Sessions share
//! nothing, so a failure in one job never affects another. Results come back
//! in job order regardless of completion order.

use std::thread;

use tracing::{error, info};
use types::ids::InstrumentId;

use crate::config::FeedCapabilities;
use crate::error::SyncError;
use crate::events::{BookMessage, SnapshotFile};
use crate::lock::ExpectedStats;
use crate::session::{AlignmentSession, SessionReport};

/// Inputs for one instrument's session.
#[derive(Debug, Clone)]
pub struct SessionJob {
    pub instrument: InstrumentId,
    pub snapshot: SnapshotFile,
    pub messages: Vec<BookMessage>,
    pub capabilities: FeedCapabilities,
    pub lock: Option<ExpectedStats>,
}

pub type JobResult = (InstrumentId, Result<SessionReport, SyncError>);

/// Run a single job on the current thread.
pub fn run_job(job: SessionJob) -> JobResult {
    let SessionJob {
        instrument,
        snapshot,
        messages,
        capabilities,
        lock,
    } = job;

    let mut session =
        AlignmentSession::new(&snapshot, &capabilities).with_instrument(instrument.clone());
    let result = session.push_all(messages).and_then(|()| match &lock {
        Some(lock) => session.finish_verified(lock),
        None => session.finish(),
    });

    if let Err(e) = &result {
        error!(instrument = %instrument, status = e.status_label(), error = %e, "Job failed");
    }
    (instrument, result)
}

/// Run every job on its own scoped thread.
pub fn run_parallel(jobs: Vec<SessionJob>) -> Vec<JobResult> {
    run_parallel_with(jobs, run_job)
}

fn run_parallel_with<F>(jobs: Vec<SessionJob>, runner: F) -> Vec<JobResult>
where
    F: Fn(SessionJob) -> JobResult + Sync,
{
    let total = jobs.len();
    let runner = &runner;
    info!(jobs = total, "Starting batch");

    let results: Vec<JobResult> = thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let instrument = job.instrument.clone();
                (instrument, scope.spawn(move || runner(job)))
            })
            .collect();

        handles
            .into_iter()
            .map(|(instrument, handle)| {
                handle.join().unwrap_or_else(|_| {
                    error!(instrument = %instrument, "Session thread panicked");
                    let err = SyncError::SessionPanicked {
                        instrument: instrument.as_str().to_string(),
                    };
                    (instrument, Err(err))
                })
            })
            .collect()
    });

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    info!(jobs = total, failed, "Batch finished");
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Level;
    use types::ids::SeqId;

    fn lvl(price: &str, size: &str) -> Level {
        Level::new(price, size).unwrap()
    }

    fn job(name: &str, base: i64, gap: bool) -> SessionJob {
        let second_prev = if gap { base + 5 } else { base + 1 };
        SessionJob {
            instrument: InstrumentId::try_new(name).unwrap(),
            snapshot: SnapshotFile {
                seq_id: SeqId::new(base),
                bids: vec![lvl("100", "1")],
                asks: vec![lvl("101", "1")],
            },
            messages: vec![
                BookMessage::Update {
                    seq_id: SeqId::new(base + 1),
                    prev_seq_id: SeqId::new(base),
                    bids: vec![lvl("99.5", "2")],
                    asks: vec![],
                },
                BookMessage::Update {
                    seq_id: SeqId::new(second_prev + 1),
                    prev_seq_id: SeqId::new(second_prev),
                    bids: vec![],
                    asks: vec![lvl("101", "0")],
                },
            ],
            capabilities: FeedCapabilities::with_reorder_window(2).unwrap(),
            lock: None,
        }
    }

    #[test]
    fn test_results_in_job_order() {
        let jobs: Vec<_> = (0..8)
            .map(|i| job(&format!("INST-{i}"), 1_000 * i, false))
            .collect();

        let results = run_parallel(jobs);
        assert_eq!(results.len(), 8);
        for (i, (instrument, result)) in results.iter().enumerate() {
            assert_eq!(instrument.as_str(), format!("INST-{i}"));
            let report = result.as_ref().unwrap();
            assert_eq!(report.instrument.as_ref(), Some(instrument));
            assert_eq!(report.stats.final_seq_id, SeqId::new(1_000 * i as i64 + 2));
        }
    }

    #[test]
    fn test_failure_is_isolated() {
        let jobs = vec![
            job("BTC-USDT", 10, false),
            job("ETH-USDT", 20, true),
            job("SOL-USDT", 30, false),
        ];

        let results = run_parallel(jobs);
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].1.as_ref().unwrap_err().status_label(), "ALIGN_GAP_FATAL");
        assert!(results[2].1.is_ok());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let jobs: Vec<_> = (0..4).map(|i| job(&format!("I{i}"), 50 * i, false)).collect();

        let sequential: Vec<_> = jobs.iter().cloned().map(run_job).collect();
        let parallel = run_parallel(jobs);

        for ((_, a), (_, b)) in sequential.iter().zip(parallel.iter()) {
            let (a, b) = (a.as_ref().unwrap(), b.as_ref().unwrap());
            assert_eq!(a.book.digest, b.book.digest);
            assert_eq!(a.stats, b.stats);
        }
    }

    #[test]
    fn test_panicking_session_reported_per_job() {
        let jobs = vec![job("BTC-USDT", 10, false), job("ETH-USDT", 20, false)];

        let results = run_parallel_with(jobs, |job| {
            if job.instrument.as_str() == "ETH-USDT" {
                panic!("book exploded");
            }
            run_job(job)
        });

        assert!(results[0].1.is_ok());
        assert_eq!(results[1].0.as_str(), "ETH-USDT");
        assert_eq!(
            results[1].1.as_ref().unwrap_err(),
            &SyncError::SessionPanicked {
                instrument: "ETH-USDT".to_string()
            }
        );
    }

    #[test]
    fn test_locked_job_verified() {
        let (_, first) = run_job(job("BTC-USDT", 10, false));
        let lock = ExpectedStats::from_report(&first.unwrap());

        let mut locked = job("BTC-USDT", 10, false);
        locked.lock = Some(lock);
        let (_, result) = run_job(locked);
        assert!(result.unwrap().verified);
    }
}

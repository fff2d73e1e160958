//! Bounded-concurrency fan-out of the benchmark loop.
//!
//! [`TaskRunner`] partitions environments into chunks and feeds them to a
//! fixed set of worker threads through a shared queue; each worker runs
//! the single-threaded loop over its chunk with its own fresh learners and
//! streams result records and log lines back over a channel. Learners are
//! never shared across workers, so per-pair results are bit-identical
//! whatever the worker count — only the arrival order differs, which is
//! why records are keyed by `(env_index, learner_name, batch_index)`.
//!
//! A panicking worker is recorded with one `[worker]` log line and the
//! other workers continue. A `None` on the work queue is the stop
//! sentinel; the cancellation token is additionally checked between
//! batches inside the loop.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Mutex};

use crate::benchmark::{evaluate_environment, BenchmarkResult, UniversalBenchmark};
use crate::error::BenchError;
use crate::learners::LearnerFactory;
use crate::logging::Logger;

enum WorkerMessage {
    Record(BenchmarkResult),
    Log(String),
    Cancelled,
}

/// Forwards log lines over the worker's channel, suffixed with the worker
/// name so the parent can attribute them.
struct ChannelLogger {
    sender: Mutex<mpsc::Sender<WorkerMessage>>,
    worker_name: String,
}

impl Logger for ChannelLogger {
    fn log(&self, line: &str) {
        let tagged = format!("{line} ({})", self.worker_name);
        // A send failure means the parent is gone; nothing left to do.
        let _ = self
            .sender
            .lock()
            .expect("ChannelLogger mutex poisoned")
            .send(WorkerMessage::Log(tagged));
    }
}

/// Fans environments out to `workers` threads in chunks of `chunk_size`.
pub struct TaskRunner {
    workers: usize,
    chunk_size: usize,
}

impl TaskRunner {
    pub fn new(workers: usize, chunk_size: usize) -> TaskRunner {
        TaskRunner { workers: workers.max(1), chunk_size: chunk_size.max(1) }
    }

    /// Evaluate the benchmark across the worker pool and collect every
    /// record. With one worker this degenerates to the plain loop.
    pub fn run(
        &self,
        benchmark: &UniversalBenchmark,
        factories: &[LearnerFactory],
        logger: &dyn Logger,
    ) -> Vec<BenchmarkResult> {
        let cancel = AtomicBool::new(false);
        self.run_with_cancel(benchmark, factories, logger, &cancel)
    }

    /// [`run`](Self::run) with a cooperative cancellation token. The
    /// cancel line is logged exactly once however many workers observe it.
    pub fn run_with_cancel(
        &self,
        benchmark: &UniversalBenchmark,
        factories: &[LearnerFactory],
        logger: &dyn Logger,
        cancel: &AtomicBool,
    ) -> Vec<BenchmarkResult> {
        if self.workers == 1 {
            return benchmark.evaluate_with_cancel(factories, logger, cancel);
        }

        let env_count = benchmark.environments().len();
        let mut queue: VecDeque<Option<Vec<usize>>> = (0..env_count)
            .collect::<Vec<usize>>()
            .chunks(self.chunk_size)
            .map(|chunk| Some(chunk.to_vec()))
            .collect();
        for _ in 0..self.workers {
            queue.push_back(None); // stop sentinel, one per worker
        }
        let queue = Mutex::new(queue);

        let (sender, receiver) = mpsc::channel::<WorkerMessage>();
        let mut results = Vec::new();

        std::thread::scope(|scope| {
            for worker_index in 0..self.workers {
                let worker_name = format!("bench-worker-{worker_index}");
                let sender = sender.clone();
                let queue = &queue;

                std::thread::Builder::new()
                    .name(worker_name.clone())
                    .spawn_scoped(scope, move || {
                        let channel_logger = ChannelLogger {
                            sender: Mutex::new(sender.clone()),
                            worker_name: worker_name.clone(),
                        };

                        loop {
                            if cancel.load(Ordering::SeqCst) {
                                let _ = sender.send(WorkerMessage::Cancelled);
                                break;
                            }
                            let chunk = {
                                let mut queue =
                                    queue.lock().expect("work queue poisoned");
                                queue.pop_front()
                            };
                            let indexes = match chunk {
                                Some(Some(indexes)) => indexes,
                                // Sentinel or exhausted queue: stop.
                                Some(None) | None => break,
                            };

                            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                                for env_index in indexes {
                                    let completed = evaluate_environment(
                                        env_index,
                                        benchmark.environments()[env_index].as_ref(),
                                        benchmark.batching(),
                                        factories,
                                        &channel_logger,
                                        cancel,
                                        &mut |record| {
                                            let _ =
                                                sender.send(WorkerMessage::Record(record));
                                        },
                                    );
                                    if !completed {
                                        let _ = sender.send(WorkerMessage::Cancelled);
                                        return;
                                    }
                                }
                            }));
                            if outcome.is_err() {
                                let _ = sender.send(WorkerMessage::Log(
                                    BenchError::worker(format!(
                                        "unexpected exception in {worker_name}"
                                    ))
                                    .log_line(),
                                ));
                            }
                        }
                    })
                    .expect("failed to spawn benchmark worker");
            }
            drop(sender);

            let mut cancel_logged = false;
            for message in receiver {
                match message {
                    WorkerMessage::Record(record) => results.push(record),
                    WorkerMessage::Log(line) => logger.log(&line),
                    WorkerMessage::Cancelled => {
                        if !cancel_logged {
                            cancel_logged = true;
                            logger.log(&BenchError::Cancelled.log_line());
                        }
                    }
                }
            }
        });

        results
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::Batching;
    use crate::environments::{
        Action, Context, Environment, Feature, LambdaEnvironment, MemoryEnvironment,
    };
    use crate::error::BenchResult;
    use crate::learners::LambdaLearner;
    use crate::logging::{MemoryLogger, NullLogger};

    fn counting_env(n: usize, offset: usize) -> Box<dyn Environment> {
        Box::new(LambdaEnvironment::new(
            n,
            Box::new(|i, _| Context::from(i as f64)),
            Box::new(move |_, _, _| {
                (offset..offset + 3).map(|v| Action::num(v as f64)).collect()
            }),
            Box::new(|_, _, action, _| match action {
                Action::Single(Feature::Num(v)) => *v,
                _ => 0.0,
            }),
            1,
        ))
    }

    fn mod3_factory() -> LearnerFactory {
        Box::new(|| {
            Box::new(
                LambdaLearner::new(Box::new(|key, _, _| key as usize % 3)).with_name("0"),
            )
        })
    }

    fn sort_key(record: &BenchmarkResult) -> (u32, String, u32) {
        (record.env_index, record.learner_name.clone(), record.batch_index)
    }

    #[test]
    fn test_single_worker_matches_plain_evaluate() {
        let build = || {
            UniversalBenchmark::new(
                vec![counting_env(10, 0), counting_env(10, 3)],
                Batching::Count(2),
            )
        };
        let direct = build().evaluate(&[mod3_factory()], &NullLogger);
        let runner = TaskRunner::new(1, 1).run(&build(), &[mod3_factory()], &NullLogger);
        assert_eq!(direct, runner);
    }

    #[test]
    fn test_results_identical_across_worker_counts() {
        let build = || {
            UniversalBenchmark::new(
                vec![
                    counting_env(12, 0),
                    counting_env(9, 3),
                    counting_env(15, 0),
                    counting_env(6, 3),
                ],
                Batching::Count(3),
            )
        };

        let mut single = TaskRunner::new(1, 1).run(&build(), &[mod3_factory()], &NullLogger);
        let mut quad = TaskRunner::new(4, 1).run(&build(), &[mod3_factory()], &NullLogger);
        let mut chunked = TaskRunner::new(2, 2).run(&build(), &[mod3_factory()], &NullLogger);

        single.sort_by_key(sort_key);
        quad.sort_by_key(sort_key);
        chunked.sort_by_key(sort_key);

        assert_eq!(single, quad);
        assert_eq!(single, chunked);
    }

    #[test]
    fn test_worker_panic_is_logged_and_others_continue() {
        struct PanickingEnvironment;
        impl Environment for PanickingEnvironment {
            fn params(&self) -> crate::environments::Params {
                crate::environments::Params::new()
            }
            fn read(&self) -> BenchResult<MemoryEnvironment> {
                panic!("worker goes down");
            }
        }

        let benchmark = UniversalBenchmark::new(
            vec![Box::new(PanickingEnvironment), counting_env(6, 0)],
            Batching::Count(2),
        );
        let logger = MemoryLogger::new();
        let mut results =
            TaskRunner::new(2, 1).run(&benchmark, &[mod3_factory()], &logger);
        results.sort_by_key(sort_key);

        assert_eq!(results.len(), 2, "the healthy environment still completes");
        assert!(results.iter().all(|r| r.env_index == 1));
        let lines = logger.lines();
        assert!(
            lines.iter().any(|l| l.starts_with("[worker]") && l.contains("unexpected exception")),
            "expected a worker failure line, got {lines:?}"
        );
    }

    #[test]
    fn test_environment_failure_logged_with_worker_tag_suffix() {
        struct BrokenEnvironment;
        impl Environment for BrokenEnvironment {
            fn params(&self) -> crate::environments::Params {
                crate::environments::Params::new()
            }
            fn read(&self) -> BenchResult<MemoryEnvironment> {
                Err(BenchError::environment("fetch failed"))
            }
        }

        let benchmark = UniversalBenchmark::new(
            vec![Box::new(BrokenEnvironment)],
            Batching::Count(1),
        );
        let logger = MemoryLogger::new();
        TaskRunner::new(2, 1).run(&benchmark, &[mod3_factory()], &logger);

        let lines = logger.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("[environment] fetch failed"), "got: {}", lines[0]);
        assert!(lines[0].contains("(bench-worker-"), "got: {}", lines[0]);
    }

    #[test]
    fn test_cancel_before_run_logs_once_and_emits_nothing() {
        let benchmark = UniversalBenchmark::new(
            vec![counting_env(10, 0), counting_env(10, 0)],
            Batching::Count(2),
        );
        let logger = MemoryLogger::new();
        let cancel = AtomicBool::new(true);
        let results = TaskRunner::new(3, 1).run_with_cancel(
            &benchmark,
            &[mod3_factory()],
            &logger,
            &cancel,
        );

        assert!(results.is_empty());
        let cancel_lines =
            logger.lines().iter().filter(|l| l.starts_with("[cancel]")).count();
        assert_eq!(cancel_lines, 1, "the cancel line is logged exactly once");
    }
}

//! Parallel batch export: the same scene geometry applied across many
//! source files on a bounded worker pool.

use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;

use crate::assets::AssetProvider;
use crate::compile::FilterGraphCompiler;
use crate::encode::{ExportConfig, VideoEncoder, run_export};
use crate::error::{PlatemarkError, PlatemarkResult};
use crate::scene::Scene;

/// Worker count when the caller does not pick one.
pub const DEFAULT_BATCH_THREADS: usize = 4;

/// One unit of batch work.
#[derive(Clone, Debug)]
pub struct BatchJob {
    pub scene: Scene,
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Clone, Debug)]
pub struct BatchOpts {
    /// Worker threads; `None` uses [`DEFAULT_BATCH_THREADS`].
    pub threads: Option<usize>,
    pub encoder: VideoEncoder,
    pub assets_root: Option<PathBuf>,
    pub overwrite: bool,
}

impl Default for BatchOpts {
    fn default() -> Self {
        Self {
            threads: None,
            encoder: VideoEncoder::default(),
            assets_root: None,
            overwrite: true,
        }
    }
}

/// Result of one job; order matches the submitted job list.
#[derive(Clone, Debug)]
pub struct JobOutcome {
    pub index: usize,
    pub output: PathBuf,
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub jobs_total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Clone, Debug)]
pub struct BatchReport {
    pub outcomes: Vec<JobOutcome>,
    pub stats: BatchStats,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.stats.failed == 0
    }
}

/// Executes one job. The seam exists so batch scheduling can be tested
/// without spawning `ffmpeg`.
pub trait JobRunner: Sync {
    fn run(&self, job: &BatchJob, cfg: &ExportConfig) -> PlatemarkResult<()>;
}

/// Production runner: compile the job's scene, then invoke the encoder.
pub struct ExportRunner {
    fonts: Arc<dyn AssetProvider>,
}

impl ExportRunner {
    pub fn new(fonts: Arc<dyn AssetProvider>) -> Self {
        Self { fonts }
    }
}

impl JobRunner for ExportRunner {
    fn run(&self, job: &BatchJob, cfg: &ExportConfig) -> PlatemarkResult<()> {
        // Compilers hold shaping state and are not shared across workers.
        let mut compiler = FilterGraphCompiler::new(self.fonts.clone());
        let program = compiler.compile(&job.scene)?;
        run_export(&program, cfg)
    }
}

/// Run every job, collecting per-job outcomes in submission order. A failed
/// job never aborts the rest of the batch.
#[tracing::instrument(skip(jobs, runner, opts), fields(jobs = jobs.len()))]
pub fn run_batch(
    jobs: &[BatchJob],
    runner: &dyn JobRunner,
    opts: &BatchOpts,
) -> PlatemarkResult<BatchReport> {
    let pool = build_thread_pool(opts.threads)?;

    let outcomes: Vec<JobOutcome> = pool.install(|| {
        jobs.par_iter()
            .enumerate()
            .map(|(index, job)| {
                let cfg = ExportConfig {
                    input: job.input.clone(),
                    output: job.output.clone(),
                    assets_root: opts.assets_root.clone(),
                    encoder: opts.encoder,
                    overwrite: opts.overwrite,
                };
                match runner.run(job, &cfg) {
                    Ok(()) => {
                        tracing::info!(index, output = %job.output.display(), "batch job finished");
                        JobOutcome {
                            index,
                            output: job.output.clone(),
                            error: None,
                        }
                    }
                    Err(e) => {
                        tracing::error!(index, input = %job.input.display(), error = %e, "batch job failed");
                        JobOutcome {
                            index,
                            output: job.output.clone(),
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect()
    });

    let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
    let stats = BatchStats {
        jobs_total: jobs.len(),
        succeeded,
        failed: jobs.len() - succeeded,
    };
    tracing::info!(?stats, "batch finished");
    Ok(BatchReport { outcomes, stats })
}

fn build_thread_pool(threads: Option<usize>) -> PlatemarkResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(PlatemarkError::validation(
            "batch 'threads' must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    builder = builder.num_threads(threads.unwrap_or(DEFAULT_BATCH_THREADS));
    builder
        .build()
        .map_err(|e| PlatemarkError::render(format!("failed to build batch thread pool: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_threads_is_rejected() {
        let opts = BatchOpts {
            threads: Some(0),
            ..BatchOpts::default()
        };
        let err = run_batch(&[], &NoopRunner, &opts).unwrap_err();
        assert!(err.to_string().contains("threads"));
    }

    struct NoopRunner;

    impl JobRunner for NoopRunner {
        fn run(&self, _job: &BatchJob, _cfg: &ExportConfig) -> PlatemarkResult<()> {
            Ok(())
        }
    }
}

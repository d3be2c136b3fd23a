//! Page dispatch across a worker pool.
//!
//! The document is opened once to learn its page count, then every page is
//! handed to its own task. Each task opens a private backend handle, so no
//! parser state is shared between workers. Results come back over a channel
//! tagged with their page index and are written into an index-addressed slot
//! vector; the returned list is always in page order, whatever order the
//! workers finished in.
//!
//! With a page timeout configured, a page whose task outlives the limit is
//! failed and its worker counted as stuck. Once every worker is stuck, pages
//! still waiting in the queue are failed too, since nothing is left to run
//! them.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};

use crate::backend::{BackendLoader, PdfBackend};
use crate::error::{Error, Result};
use crate::extract::{extract_page, remove_images};
use crate::model::PageResult;
use crate::options::ExtractOptions;

/// Message from a page task back to the coordinator.
enum Event {
    Started(usize, Instant),
    Finished(usize, PageResult),
    /// A task whose page was already failed by the coordinator returned.
    Released(usize),
}

const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;
const ABANDONED: u8 = 3;

/// Per-page task state shared by the tasks and the coordinator.
///
/// Every transition is a compare-and-swap, so a page is either reported by
/// its task or failed by the coordinator, never both.
struct Claims(Vec<AtomicU8>);

impl Claims {
    fn new(page_count: usize) -> Self {
        Self((0..page_count).map(|_| AtomicU8::new(QUEUED)).collect())
    }

    fn transition(&self, index: usize, from: u8, to: u8) -> bool {
        self.0[index]
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Extract every page of the document at `path`.
///
/// Returns one [`PageResult`] per page, in page order. Page-level failures
/// are recorded on their page; only failures to open the document at all
/// are returned as `Err`.
pub fn extract_all(
    loader: Arc<dyn BackendLoader>,
    path: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<Vec<PageResult>> {
    extract_all_with_progress(loader, path, options, |_| {})
}

/// Like [`extract_all`], calling `progress` once per page as it completes.
///
/// In parallel mode pages are reported in completion order.
pub fn extract_all_with_progress<F>(
    loader: Arc<dyn BackendLoader>,
    path: impl AsRef<Path>,
    options: &ExtractOptions,
    progress: F,
) -> Result<Vec<PageResult>>
where
    F: FnMut(&PageResult),
{
    options.validate()?;
    let path = path.as_ref();

    let backend = loader.load(path)?;
    let page_count = backend.page_count();
    if page_count == 0 {
        log::info!("Document has no pages.");
        return Ok(Vec::new());
    }

    if !options.parallel {
        log::info!("Processing {} pages sequentially.", page_count);
        return Ok(run_sequential(backend.as_ref(), page_count, options, progress));
    }
    drop(backend);

    run_parallel(loader, path, page_count, options, progress)
}

fn run_sequential<F>(
    backend: &dyn PdfBackend,
    page_count: usize,
    options: &ExtractOptions,
    mut progress: F,
) -> Vec<PageResult>
where
    F: FnMut(&PageResult),
{
    let mut pages = Vec::with_capacity(page_count);
    for index in 0..page_count {
        let page = isolate(index, || Ok(extract_page(backend, index, options)));
        progress(&page);
        pages.push(page);
    }
    pages
}

fn run_parallel<F>(
    loader: Arc<dyn BackendLoader>,
    path: &Path,
    page_count: usize,
    options: &ExtractOptions,
    mut progress: F,
) -> Result<Vec<PageResult>>
where
    F: FnMut(&PageResult),
{
    let workers = options.worker_count(page_count);
    log::info!("Processing {} pages with {} workers.", page_count, workers);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("pdfharvest-worker-{}", i))
        .build()
        .map_err(|e| Error::Other(format!("Failed to build worker pool: {}", e)))?;

    let claims = Arc::new(Claims::new(page_count));
    let (tx, rx) = unbounded::<Event>();
    for index in 0..page_count {
        let tx = tx.clone();
        let loader = Arc::clone(&loader);
        let claims = Arc::clone(&claims);
        let path = path.to_path_buf();
        let options = options.clone();
        pool.spawn(move || run_task(loader.as_ref(), &path, index, &options, &claims, &tx));
    }
    drop(tx);

    let mut slots: Vec<Option<PageResult>> = vec![None; page_count];
    let mut started: Vec<Option<Instant>> = vec![None; page_count];
    let mut filled = 0;
    // Workers still busy with a page that has already timed out
    let mut stuck = 0;

    while filled < page_count {
        let event = match next_deadline(&slots, &started, options.page_timeout) {
            Some(deadline) => {
                rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match event {
            Ok(Event::Started(index, at)) => started[index] = Some(at),
            Ok(Event::Finished(index, page)) => {
                progress(&page);
                slots[index] = Some(page);
                filled += 1;
            }
            Ok(Event::Released(_)) => stuck -= 1,
            Err(RecvTimeoutError::Timeout) => {
                // recv_timeout only runs with a timeout configured
                let Some(limit) = options.page_timeout else {
                    continue;
                };
                let now = Instant::now();
                for index in 0..page_count {
                    let expired =
                        matches!(started[index], Some(at) if now.duration_since(at) >= limit);
                    // A failed swap means the task just finished and its
                    // result is already on the way.
                    if slots[index].is_some()
                        || !expired
                        || !claims.transition(index, RUNNING, ABANDONED)
                    {
                        continue;
                    }
                    stuck += 1;
                    let page_num = index + 1;
                    let err = Error::Timeout {
                        page_num,
                        seconds: limit.as_secs_f64(),
                    };
                    log::error!("Error processing page {}: {}", page_num, err);
                    let page = PageResult::failed(page_num, err.to_string());
                    progress(&page);
                    slots[index] = Some(page);
                    filled += 1;
                }

                if stuck >= workers {
                    for index in 0..page_count {
                        let queued = slots[index].is_none()
                            && claims.transition(index, QUEUED, ABANDONED);
                        if !queued {
                            continue;
                        }
                        let page_num = index + 1;
                        let err = Error::PoolExhausted { page_num, workers };
                        log::error!("Error processing page {}: {}", page_num, err);
                        let page = PageResult::failed(page_num, err.to_string());
                        progress(&page);
                        slots[index] = Some(page);
                        filled += 1;
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                for (index, slot) in slots.iter_mut().enumerate() {
                    if slot.is_none() {
                        let page = PageResult::failed(
                            index + 1,
                            "Worker exited without producing a result",
                        );
                        progress(&page);
                        *slot = Some(page);
                    }
                }
                break;
            }
        }
    }

    // Tasks still running past their deadline keep their worker; dropping
    // the pool does not wait for them.
    drop(pool);

    Ok(slots.into_iter().flatten().collect())
}

fn run_task(
    loader: &dyn BackendLoader,
    path: &Path,
    index: usize,
    options: &ExtractOptions,
    claims: &Claims,
    tx: &Sender<Event>,
) {
    if !claims.transition(index, QUEUED, RUNNING) {
        // Already failed while waiting in the queue
        return;
    }

    // Send errors only mean the coordinator has stopped listening.
    let _ = tx.send(Event::Started(index, Instant::now()));
    let page = isolate(index, || {
        let backend = loader.load(path)?;
        Ok(extract_page(backend.as_ref(), index, options))
    });

    if claims.transition(index, RUNNING, DONE) {
        let _ = tx.send(Event::Finished(index, page));
    } else {
        log::warn!(
            "Discarding late result for page {} after timeout.",
            index + 1
        );
        remove_images(&page.images);
        let _ = tx.send(Event::Released(index));
    }
}

/// Run one page's work, turning errors and panics into a failed page.
fn isolate<F>(index: usize, work: F) -> PageResult
where
    F: FnOnce() -> Result<PageResult>,
{
    let page_num = index + 1;
    let err = match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(page)) => return page,
        Ok(Err(e)) => e,
        Err(payload) => Error::WorkerPanic(panic_message(payload.as_ref())),
    };
    log::error!("Error processing page {}: {}", page_num, err);
    PageResult::failed(page_num, err.to_string())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Earliest instant at which a started, unfinished page times out.
fn next_deadline(
    slots: &[Option<PageResult>],
    started: &[Option<Instant>],
    timeout: Option<Duration>,
) -> Option<Instant> {
    let timeout = timeout?;
    slots
        .iter()
        .zip(started)
        .filter(|(slot, _)| slot.is_none())
        .filter_map(|(_, at)| *at)
        .min()
        .map(|at| at + timeout)
}

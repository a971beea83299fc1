use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{error, trace};

use super::DiskManager;
use crate::common::{PageId, Result, StrataError, TableId, DISK_REQUEST_QUEUE_DEPTH};

/// A disk I/O request together with the channel its result is sent back on.
pub enum DiskRequest {
    Read {
        page_id: PageId,
        reply: Sender<Result<Vec<u8>>>,
    },
    Write {
        page_id: PageId,
        data: Bytes,
        reply: Sender<Result<()>>,
    },
    Allocate {
        page_id: PageId,
        reply: Sender<Result<()>>,
    },
}

/// DiskScheduler runs a background worker thread that performs every disk I/O
/// request in submission order.
pub struct DiskScheduler {
    /// The disk manager for actual I/O operations
    disk_manager: Arc<dyn DiskManager>,
    /// Channel sender for queuing requests
    request_sender: Sender<DiskRequest>,
    /// Flag to signal shutdown
    shutdown: Arc<AtomicBool>,
    /// Handle to the background worker thread
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Creates a new DiskScheduler with the given DiskManager.
    /// Spawns a background worker thread to process requests.
    pub fn new(disk_manager: Arc<dyn DiskManager>) -> Self {
        let (sender, receiver) = bounded::<DiskRequest>(DISK_REQUEST_QUEUE_DEPTH);
        let shutdown = Arc::new(AtomicBool::new(false));

        let dm_clone = Arc::clone(&disk_manager);
        let shutdown_clone = Arc::clone(&shutdown);

        let worker_handle = thread::spawn(move || {
            Self::start_worker_thread(dm_clone, receiver, shutdown_clone);
        });

        Self {
            disk_manager,
            request_sender: sender,
            shutdown,
            worker_handle: Some(worker_handle),
        }
    }

    /// Schedules a disk request for processing by the background worker.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        self.request_sender
            .send(request)
            .map_err(|e| StrataError::DiskScheduler(format!("Failed to schedule request: {}", e)))
    }

    fn wait<T>(rx: Receiver<Result<T>>) -> Result<T> {
        rx.recv().map_err(|e| {
            StrataError::DiskScheduler(format!("Failed to receive completion: {}", e))
        })?
    }

    /// Schedules a read request and waits for the page bytes.
    pub fn schedule_read_sync(&self, page_id: PageId) -> Result<Vec<u8>> {
        let (tx, rx) = bounded(1);
        self.schedule(DiskRequest::Read { page_id, reply: tx })?;
        Self::wait(rx)
    }

    /// Schedules a write request and waits for completion.
    pub fn schedule_write_sync(&self, page_id: PageId, data: Bytes) -> Result<()> {
        let (tx, rx) = bounded(1);
        self.schedule(DiskRequest::Write {
            page_id,
            data,
            reply: tx,
        })?;
        Self::wait(rx)
    }

    /// Schedules a page allocation and waits for completion.
    pub fn schedule_allocate_sync(&self, page_id: PageId) -> Result<()> {
        let (tx, rx) = bounded(1);
        self.schedule(DiskRequest::Allocate { page_id, reply: tx })?;
        Self::wait(rx)
    }

    /// Page count of a table, asked of the disk manager directly.
    pub fn num_pages(&self, table_id: TableId) -> Result<u32> {
        self.disk_manager.num_pages(table_id)
    }

    pub fn page_size(&self) -> usize {
        self.disk_manager.page_size()
    }

    /// The background worker thread function.
    /// Processes requests from the queue until shutdown is signaled.
    fn start_worker_thread(
        disk_manager: Arc<dyn DiskManager>,
        receiver: Receiver<DiskRequest>,
        shutdown: Arc<AtomicBool>,
    ) {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                // Drain remaining requests before exiting
                while let Ok(request) = receiver.try_recv() {
                    Self::process_request(disk_manager.as_ref(), request);
                }
                break;
            }

            match receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(request) => Self::process_request(disk_manager.as_ref(), request),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn process_request(disk_manager: &dyn DiskManager, request: DiskRequest) {
        // A caller that stopped waiting drops its receiver; the send error is ignored.
        match request {
            DiskRequest::Read { page_id, reply } => {
                trace!("disk read {}", page_id);
                let mut data = vec![0u8; disk_manager.page_size()];
                let result = disk_manager.read_page(page_id, &mut data).map(|_| data);
                if let Err(e) = &result {
                    error!("read of {} failed: {}", page_id, e);
                }
                let _ = reply.send(result);
            }
            DiskRequest::Write {
                page_id,
                data,
                reply,
            } => {
                trace!("disk write {}", page_id);
                let result = disk_manager.write_page(page_id, &data);
                if let Err(e) = &result {
                    error!("write of {} failed: {}", page_id, e);
                }
                let _ = reply.send(result);
            }
            DiskRequest::Allocate { page_id, reply } => {
                trace!("disk allocate {}", page_id);
                let _ = reply.send(disk_manager.allocate_page(page_id));
            }
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);

        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

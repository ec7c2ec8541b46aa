mod listing_sync_worker;

pub use listing_sync_worker::ListingSyncWorker;

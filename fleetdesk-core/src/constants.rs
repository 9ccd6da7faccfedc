/// Rows per history page unless configured otherwise
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Port fleetdesk-server listens on by default
pub const DEFAULT_SERVER_PORT: u16 = 4097;

/// Buffered change notifications per subscriber before lag kicks in
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// First wait before resubscribing to a closed change feed; doubles per attempt
pub const RESUBSCRIBE_DELAY_MS: u64 = 250;

pub const RESUBSCRIBE_MAX_DELAY_MS: u64 = 10_000;

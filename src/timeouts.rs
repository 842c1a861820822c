pub mod ms {
    pub const POLL_INTERVAL: u64 = 500;
    pub const READINESS_POLL: u64 = 100;
    pub const RETRY_BACKOFF: u64 = 5000;
    pub const CLICK_SETTLE: u64 = 1000;
    pub const TEARDOWN_SETTLE: u64 = 5000;
    pub const PAGE_SETTLE: u64 = 3000;
    pub const SUBMIT_SETTLE: u64 = 5000;
    pub const BETWEEN_FLOWS: u64 = 2000;
}

pub mod secs {
    pub const ELEMENT_WAIT: u64 = 40;
    pub const PAGE_LOAD: u64 = 300;
    pub const REQUEST: u64 = 120;
}

pub mod attempts {
    pub const MAX_RETRIES: u32 = 2;
    pub const LOGIN: u32 = 20;
    pub const DIALOG: u32 = 20;
    pub const PUBLISH: u32 = 60;
}

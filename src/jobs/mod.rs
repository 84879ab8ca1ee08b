// Background jobs, driven by external cron through the internal endpoints

pub mod payout_release;
pub mod tier_refresh;

/// Company headquarters, used as route origin/destination when a location
/// has no coordinates.
pub const HQ_LATITUDE: f64 = 9.016465390275195;
pub const HQ_LONGITUDE: f64 = 38.76856893855111;

pub const MAX_ROUTE_DURATION_MINUTES: u32 = 90;

pub const CLUSTER_MAX_SECONDS: u64 = 5;

/// Planning sessions untouched for this long are dropped.
pub const SESSION_TTL_MINUTES: i64 = 120;

pub const MAX_ROUTE_NAME_LEN: usize = 255;

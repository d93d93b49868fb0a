use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

/// Why a file is being burned. Carried through the burn queue for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurnReason {
    /// A download or preview found the record past its expiry.
    Expired,
    /// A one-time file was handed out.
    OneTimeDownload,
    /// Metadata pointed at a blob that no longer exists.
    DanglingMetadata,
    /// Scheduled by the reconciliation sweep.
    Sweep,
    /// Explicit request (CLI or admin).
    Manual,
}

impl Display for BurnReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            BurnReason::Expired => "expired",
            BurnReason::OneTimeDownload => "one_time_download",
            BurnReason::DanglingMetadata => "dangling_metadata",
            BurnReason::Sweep => "sweep",
            BurnReason::Manual => "manual",
        };
        f.write_str(s)
    }
}
